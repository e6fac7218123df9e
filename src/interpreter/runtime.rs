//! Statement execution and expression evaluation.

use std::io::{self, BufRead, Write};
use std::rc::Rc;

use crate::ast::{BinaryOperator, Expression, Statement, Stmt};

use super::error::RuntimeError;
use super::value::{ObjectData, ObjectRef, Value};
use super::{Function, Interpreter};

/// Control flow threaded through block execution. `Normal` carries the value
/// of the last statement so a trailing call doubles as a function result.
#[derive(Debug)]
pub(crate) enum Flow {
    Normal(Value),
    Break,
    Continue,
    Return(Value),
}

impl<W: Write> Interpreter<W> {
    /// Runs a function or method body. Statement-level errors are logged and
    /// execution carries on with the next statement.
    fn exec_block(&mut self, body: &[Stmt]) -> Flow {
        let mut last = Value::Null;
        for stmt in body {
            self.current_line = Some(stmt.line);
            match self.exec_statement(&stmt.statement) {
                Ok(Flow::Normal(value)) => last = value,
                Ok(flow) => return flow,
                Err(err) => {
                    self.log_error(&err);
                    last = Value::Null;
                }
            }
        }
        Flow::Normal(last)
    }

    /// Runs an `if`/`while` body: loop control and `return` pass through, a
    /// normal finish yields null to the enclosing statement.
    fn exec_nested_block(&mut self, body: &[Stmt]) -> Flow {
        match self.exec_block(body) {
            Flow::Normal(_) => Flow::Normal(Value::Null),
            flow => flow,
        }
    }

    fn condition(&mut self, expr: &Expression, what: &str) -> Result<bool, RuntimeError> {
        match self.evaluate(expr) {
            Value::Bool(b) => Ok(b),
            _ => Err(RuntimeError::TypeMismatch {
                message: format!("{what} condition must evaluate to a boolean"),
            }),
        }
    }

    pub(crate) fn exec_statement(&mut self, statement: &Statement) -> Result<Flow, RuntimeError> {
        match statement {
            Statement::Let {
                name,
                annotation,
                value,
            } => {
                let value = self.evaluate(value);
                if let Some(annotation) = annotation {
                    if !value.matches(*annotation) {
                        return Err(RuntimeError::TypeMismatch {
                            message: format!(
                                "Variable '{name}' annotated as {}, got {}",
                                annotation.name(),
                                value.type_name()
                            ),
                        });
                    }
                }
                self.variables.insert(name.clone(), value);
                Ok(Flow::Normal(Value::Null))
            }

            Statement::Assign { target, value } => {
                let value = self.evaluate(value);
                let name = identifier_target(target, "Assignment")?;
                if name.contains('.') {
                    self.assign_dotted(name, value)?;
                } else {
                    self.variables.insert(name.to_string(), value);
                }
                Ok(Flow::Normal(Value::Null))
            }

            Statement::AugAssign { target, op, value } => {
                let rhs = self.evaluate(value);
                let name = identifier_target(target, "Augmented assignment")?;
                if name.contains('.') {
                    self.aug_assign_dotted(name, *op, rhs)?;
                } else {
                    let current = self.variables.get(name).cloned().ok_or_else(|| {
                        RuntimeError::UndefinedVariable {
                            name: name.to_string(),
                        }
                    })?;
                    let next = apply_binary(&current, *op, &rhs)?;
                    self.variables.insert(name.to_string(), next);
                }
                Ok(Flow::Normal(Value::Null))
            }

            Statement::Print(expr) => {
                let value = self.evaluate(expr);
                let _ = writeln!(self.out, "{value}");
                Ok(Flow::Normal(Value::Null))
            }

            Statement::If {
                condition,
                then_body,
                elif_branches,
                else_body,
            } => {
                if self.condition(condition, "If")? {
                    return Ok(self.exec_nested_block(then_body));
                }
                for (elif_condition, elif_body) in elif_branches {
                    if self.condition(elif_condition, "Elif")? {
                        return Ok(self.exec_nested_block(elif_body));
                    }
                }
                if !else_body.is_empty() {
                    return Ok(self.exec_nested_block(else_body));
                }
                Ok(Flow::Normal(Value::Null))
            }

            Statement::While { condition, body } => {
                loop {
                    if !self.condition(condition, "While")? {
                        break;
                    }
                    match self.exec_nested_block(body) {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal(_) => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal(Value::Null))
            }

            Statement::Define(def) => {
                self.functions.insert(
                    def.name.clone(),
                    Function {
                        params: def.params.clone(),
                        body: def.body.clone(),
                    },
                );
                Ok(Flow::Normal(Value::Null))
            }

            Statement::ClassDef { name, methods } => {
                let methods = methods
                    .iter()
                    .map(|def| {
                        (
                            def.name.clone(),
                            Function {
                                params: def.params.clone(),
                                body: def.body.clone(),
                            },
                        )
                    })
                    .collect();
                self.classes.insert(name.clone(), methods);
                Ok(Flow::Normal(Value::Null))
            }

            Statement::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.evaluate(expr),
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }

            Statement::Break => Ok(Flow::Break),
            Statement::Continue => Ok(Flow::Continue),

            Statement::Expr(expr) => match expr {
                Expression::Call { .. } | Expression::MethodCall { .. } => {
                    Ok(Flow::Normal(self.evaluate(expr)))
                }
                _ => Err(RuntimeError::InvalidStatement {
                    message: "Expression statements must be calls".to_string(),
                }),
            },
        }
    }

    /// Evaluates with the fault-tolerance net: an error is logged and the
    /// expression's value becomes null.
    pub fn evaluate(&mut self, expr: &Expression) -> Value {
        match self.eval_expression(expr) {
            Ok(value) => value,
            Err(err) => {
                self.log_error(&err);
                Value::Null
            }
        }
    }

    fn eval_expression(&mut self, expr: &Expression) -> Result<Value, RuntimeError> {
        match expr {
            Expression::Int(n) => Ok(Value::Int(*n)),
            Expression::Float(v) => Ok(Value::Float(*v)),
            Expression::Bool(b) => Ok(Value::Bool(*b)),
            Expression::Null => Ok(Value::Null),
            Expression::Str(s) => Ok(Value::Str(self.interpolate(s))),

            Expression::Identifier(name) => {
                if name.contains('.') {
                    self.resolve_dotted(name)
                } else {
                    self.variables.get(name).cloned().ok_or_else(|| {
                        RuntimeError::UndefinedVariable { name: name.clone() }
                    })
                }
            }

            Expression::Binary { op, left, right } => {
                let left = self.evaluate(left);
                let right = self.evaluate(right);
                apply_binary(&left, *op, &right)
            }

            Expression::Index { base, index } => {
                let base = self.evaluate(base);
                let index = self.evaluate(index);
                let items = match &base {
                    Value::Tuple(items) => items,
                    other => {
                        return Err(RuntimeError::TypeMismatch {
                            message: format!("Cannot index non-tuple value: {other}"),
                        })
                    }
                };
                let index = match index {
                    Value::Int(n) => n,
                    other => {
                        return Err(RuntimeError::TypeMismatch {
                            message: format!("Index must be an integer, got: {other}"),
                        })
                    }
                };
                usize::try_from(index)
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .ok_or(RuntimeError::IndexOutOfRange {
                        index,
                        len: items.len(),
                    })
            }

            Expression::Attribute { object, name } => {
                let object = self.evaluate(object);
                attribute_of(&object, name)
            }

            Expression::MethodCall {
                receiver,
                method,
                args,
            } => {
                let receiver = match self.evaluate(receiver) {
                    Value::Object(obj) => obj,
                    _ => {
                        return Err(RuntimeError::TypeMismatch {
                            message: "Attempt to call method on non-object".to_string(),
                        })
                    }
                };
                self.call_method(receiver, method, args)
            }

            Expression::Call { name, args } => self.eval_call(name, args),
        }
    }

    /// Resolves a dotted name segment by segment through objects and tuples.
    fn resolve_dotted(&self, name: &str) -> Result<Value, RuntimeError> {
        let mut parts = name.split('.');
        let first = parts.next().unwrap_or("");
        let mut value = match self.variables.get(first) {
            Some(Value::Null) | None => {
                return Err(RuntimeError::UndefinedVariable {
                    name: first.to_string(),
                })
            }
            Some(value) => value.clone(),
        };
        for part in parts {
            value = match &value {
                Value::Object(_) => attribute_of(&value, part)?,
                Value::Tuple(items) => {
                    let index: usize = part.parse().map_err(|_| RuntimeError::TypeMismatch {
                        message: format!(
                            "Cannot access attribute '{part}' on non-object or non-tuple"
                        ),
                    })?;
                    items
                        .get(index)
                        .cloned()
                        .ok_or(RuntimeError::IndexOutOfRange {
                            index: index as i64,
                            len: items.len(),
                        })?
                }
                _ => {
                    return Err(RuntimeError::TypeMismatch {
                        message: format!(
                            "Cannot access attribute '{part}' on non-object or non-tuple"
                        ),
                    })
                }
            };
            if matches!(value, Value::Null) && part != "__class__" {
                return Err(RuntimeError::NullAttribute {
                    attribute: part.to_string(),
                });
            }
        }
        Ok(value)
    }

    /// `a.b.c = v`: intermediate segments are created as untagged mappings.
    fn assign_dotted(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        let parts: Vec<&str> = name.split('.').collect();
        let mut current = self.dotted_base(parts[0])?;
        for part in &parts[1..parts.len() - 1] {
            let next = {
                let mut data = current.borrow_mut();
                match data.fields.get(*part) {
                    Some(Value::Object(obj)) => obj.clone(),
                    Some(_) => {
                        return Err(RuntimeError::TypeMismatch {
                            message: format!("Cannot assign to attribute on non-object '{part}'"),
                        })
                    }
                    None => {
                        let fresh = ObjectData::untagged();
                        data.fields
                            .insert((*part).to_string(), Value::Object(fresh.clone()));
                        fresh
                    }
                }
            };
            current = next;
        }
        current
            .borrow_mut()
            .fields
            .insert(parts[parts.len() - 1].to_string(), value);
        Ok(())
    }

    /// `a.b.c += v`: a missing intermediate becomes a detached mapping, so
    /// the write is silently lost; a missing leaf defaults to 0.
    fn aug_assign_dotted(
        &mut self,
        name: &str,
        op: BinaryOperator,
        rhs: Value,
    ) -> Result<(), RuntimeError> {
        let parts: Vec<&str> = name.split('.').collect();
        let mut current = self.dotted_base(parts[0])?;
        for part in &parts[1..parts.len() - 1] {
            let next = match current.borrow().fields.get(*part) {
                Some(Value::Object(obj)) => obj.clone(),
                Some(_) => {
                    return Err(RuntimeError::TypeMismatch {
                        message: format!("Cannot assign to attribute on non-object '{part}'"),
                    })
                }
                None => ObjectData::untagged(),
            };
            current = next;
        }
        let leaf = parts[parts.len() - 1];
        let old = current
            .borrow()
            .fields
            .get(leaf)
            .cloned()
            .unwrap_or(Value::Int(0));
        let next = apply_binary(&old, op, &rhs)?;
        current.borrow_mut().fields.insert(leaf.to_string(), next);
        Ok(())
    }

    fn dotted_base(&self, base: &str) -> Result<ObjectRef, RuntimeError> {
        match self.variables.get(base) {
            Some(Value::Object(obj)) => Ok(obj.clone()),
            _ => Err(RuntimeError::TypeMismatch {
                message: format!("Cannot assign to attribute on non-object '{base}'"),
            }),
        }
    }

    /// Expands `{name}` placeholders. On an undefined variable the error is
    /// logged and the raw string comes back untouched.
    fn interpolate(&mut self, raw: &str) -> String {
        let mut result = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(open) = rest.find('{') {
            result.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if is_identifier(&after[..close]) => {
                    let name = &after[..close];
                    match self.variables.get(name).cloned() {
                        Some(value) => result.push_str(&value.to_string()),
                        None => {
                            self.log_error(&RuntimeError::InterpolationUndefined {
                                name: name.to_string(),
                            });
                            return raw.to_string();
                        }
                    }
                    rest = &after[close + 1..];
                }
                _ => {
                    result.push('{');
                    rest = after;
                }
            }
        }
        result.push_str(rest);
        result
    }

    fn eval_call(&mut self, name: &str, args: &[Expression]) -> Result<Value, RuntimeError> {
        // A dotted call whose head names a class instance is method dispatch.
        if let Some((receiver, method)) = name.rsplit_once('.') {
            if let Some(Value::Object(obj)) = self.variables.get(receiver) {
                if obj.borrow().class_name.is_some() {
                    let obj = obj.clone();
                    return self.call_method(obj, method, args);
                }
            }
        }
        match name {
            "ocl.classes" => self.instantiate(args),
            "ocl.get_input" => self.read_input(name, args, false),
            "ocl.get_set_input" => self.read_input(name, args, true),
            _ => match name.strip_prefix("ocl.get_ocl2dra.") {
                Some(op) => self.call_gateway(op, name, args),
                None => self.call_function(name, args),
            },
        }
    }

    fn instantiate(&mut self, args: &[Expression]) -> Result<Value, RuntimeError> {
        let values = self.eval_args(args);
        let class_name = match values.as_slice() {
            [Value::Str(class_name)] => class_name,
            _ => {
                return Err(RuntimeError::TypeMismatch {
                    message: "ocl.classes expects one string argument".to_string(),
                })
            }
        };
        if !self.classes.contains_key(class_name) {
            return Err(RuntimeError::UndefinedClass {
                name: class_name.clone(),
            });
        }
        Ok(Value::Object(ObjectData::instance(class_name)))
    }

    fn read_input(
        &mut self,
        name: &str,
        args: &[Expression],
        set_variable: bool,
    ) -> Result<Value, RuntimeError> {
        let values = self.eval_args(args);
        let prompt = match values.as_slice() {
            [Value::Str(prompt)] => prompt,
            _ => {
                return Err(RuntimeError::TypeMismatch {
                    message: format!("{name} expects one string argument"),
                })
            }
        };
        let _ = write!(self.out, "{prompt}");
        let _ = self.out.flush();
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => {
                return Err(RuntimeError::InputFailed {
                    message: "unexpected end of input".to_string(),
                })
            }
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                return Err(RuntimeError::InterruptedInput)
            }
            Err(err) => {
                return Err(RuntimeError::InputFailed {
                    message: err.to_string(),
                })
            }
        }
        let line = line.trim_end_matches(['\n', '\r']).to_string();
        let _ = writeln!(self.out);
        if set_variable {
            self.variables
                .insert("input_value".to_string(), Value::Str(line));
            Ok(Value::Null)
        } else {
            Ok(Value::Str(line))
        }
    }

    fn eval_args(&mut self, args: &[Expression]) -> Vec<Value> {
        args.iter().map(|arg| self.evaluate(arg)).collect()
    }

    /// Calls a user-defined function under copy/merge/restore scoping: the
    /// environment is snapshotted, arguments are merged in, and the snapshot
    /// is restored afterwards. Object mutations survive through shared
    /// references.
    fn call_function(&mut self, name: &str, args: &[Expression]) -> Result<Value, RuntimeError> {
        let values = self.eval_args(args);
        let function =
            self.functions
                .get(name)
                .cloned()
                .ok_or_else(|| RuntimeError::UndefinedFunction {
                    name: name.to_string(),
                })?;
        if function.params.len() != values.len() {
            return Err(RuntimeError::FunctionArityMismatch {
                name: name.to_string(),
                expected: function.params.len(),
                found: values.len(),
            });
        }
        let saved = self.variables.clone();
        for (param, value) in function.params.iter().zip(values) {
            self.variables.insert(param.name.clone(), value);
        }
        let flow = self.exec_block(&function.body);
        self.variables = saved;
        Ok(finish_call(flow))
    }

    /// Method dispatch: a leading `self` parameter binds the receiver and is
    /// excluded from the arity count.
    fn call_method(
        &mut self,
        receiver: ObjectRef,
        method: &str,
        args: &[Expression],
    ) -> Result<Value, RuntimeError> {
        let class_name = match receiver.borrow().class_name.clone() {
            Some(class_name) => class_name,
            None => {
                return Err(RuntimeError::TypeMismatch {
                    message: "Attempt to call method on non-object".to_string(),
                })
            }
        };
        let function = self
            .classes
            .get(&class_name)
            .and_then(|methods| methods.get(method))
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownMethod {
                class_name: class_name.clone(),
                method: method.to_string(),
            })?;
        let values = self.eval_args(args);
        let takes_self = function.params.first().is_some_and(|p| p.name == "self");
        let expected = function.params.len() - usize::from(takes_self);
        if expected != values.len() {
            return Err(RuntimeError::MethodArityMismatch {
                method: method.to_string(),
                expected,
                found: values.len(),
            });
        }
        let saved = self.variables.clone();
        let params = if takes_self {
            self.variables
                .insert("self".to_string(), Value::Object(receiver.clone()));
            &function.params[1..]
        } else {
            &function.params[..]
        };
        for (param, value) in params.iter().zip(values) {
            self.variables.insert(param.name.clone(), value);
        }
        let flow = self.exec_block(&function.body);
        self.variables = saved;
        Ok(finish_call(flow))
    }

    /// Dispatches an `ocl.get_ocl2dra.*` operation. Arity and argument kinds
    /// are checked here; the gateway only ever sees well-formed calls.
    fn call_gateway(
        &mut self,
        op: &str,
        name: &str,
        args: &[Expression],
    ) -> Result<Value, RuntimeError> {
        let values = self.eval_args(args);
        let sig = |signature: &'static str| RuntimeError::NativeSignature {
            name: name.to_string(),
            signature,
        };
        let gateway = self
            .gateway
            .as_deref_mut()
            .ok_or(RuntimeError::NativeUnavailable)?;
        match op {
            "init" => {
                let (width, height, title) = match values.as_slice() {
                    [w, h, t] => match (want_int(w), want_int(h), want_str(t)) {
                        (Some(w), Some(h), Some(t)) => (w, h, t),
                        _ => return Err(sig("(width: int, height: int, title: string)")),
                    },
                    _ => return Err(sig("(width: int, height: int, title: string)")),
                };
                match gateway.init(width, height, title) {
                    Some(handle) => {
                        // First frame right away, so the window shows before
                        // the script reaches its own update loop.
                        gateway.update(handle);
                        Ok(Value::Int(handle))
                    }
                    None => Err(RuntimeError::NativeInitFailed),
                }
            }
            "set_background" => {
                const SIG: &str = "(context: handle, r: int/float, g: int/float, b: int/float)";
                match values.as_slice() {
                    [ctx, r, g, b] => {
                        match (want_handle(ctx), want_int(r), want_int(g), want_int(b)) {
                            (Some(ctx), Some(r), Some(g), Some(b)) => {
                                gateway.set_background(ctx, r, g, b);
                                Ok(Value::Null)
                            }
                            _ => Err(sig(SIG)),
                        }
                    }
                    _ => Err(sig(SIG)),
                }
            }
            "set_title" => gateway_str_op(gateway, op, values, || {
                sig("(context: handle, title: string)")
            }),
            "set_icon" => gateway_str_op(gateway, op, values, || {
                sig("(context: handle, icon_path: string)")
            }),
            "set_size" => gateway_pair_op(gateway, op, values, || {
                sig("(context: handle, width: int/float, height: int/float)")
            }),
            "set_position" => gateway_pair_op(gateway, op, values, || {
                sig("(context: handle, x: int/float, y: int/float)")
            }),
            "set_min_size" => gateway_pair_op(gateway, op, values, || {
                sig("(context: handle, min_width: int/float, min_height: int/float)")
            }),
            "set_max_size" => gateway_pair_op(gateway, op, values, || {
                sig("(context: handle, max_width: int/float, max_height: int/float)")
            }),
            "set_fullscreen" => gateway_flag_op(gateway, op, values, || {
                sig("(context: handle, fullscreen: bool/int)")
            }),
            "set_border" => gateway_flag_op(gateway, op, values, || {
                sig("(context: handle, bordered: bool/int)")
            }),
            "set_always_on_top" => gateway_flag_op(gateway, op, values, || {
                sig("(context: handle, on_top: bool/int)")
            }),
            "set_resizable" => gateway_flag_op(gateway, op, values, || {
                sig("(context: handle, resizable: bool/int)")
            }),
            "set_opacity" => match values.as_slice() {
                [ctx, opacity] => match (want_handle(ctx), want_float(opacity)) {
                    (Some(ctx), Some(opacity)) => {
                        gateway.set_opacity(ctx, opacity);
                        Ok(Value::Null)
                    }
                    _ => Err(sig("(context: handle, opacity: float 0.0-1.0)")),
                },
                _ => Err(sig("(context: handle, opacity: float 0.0-1.0)")),
            },
            "set_frame_rate" => match values.as_slice() {
                [ctx, fps] => match (want_handle(ctx), want_int(fps)) {
                    (Some(ctx), Some(fps)) => {
                        gateway.set_frame_rate(ctx, fps);
                        Ok(Value::Null)
                    }
                    _ => Err(sig("(context: handle, fps: int/float)")),
                },
                _ => Err(sig("(context: handle, fps: int/float)")),
            },
            "get_mouse_button_state" => match values.as_slice() {
                [ctx, button] => match (want_handle(ctx), want_int(button)) {
                    (Some(ctx), Some(button)) => {
                        Ok(Value::Int(gateway.mouse_button_state(ctx, button)))
                    }
                    _ => Err(sig("(context: handle, button: int/float)")),
                },
                _ => Err(sig("(context: handle, button: int/float)")),
            },
            "get_key_state" => match values.as_slice() {
                [ctx, key] => match (want_handle(ctx), want_str(key)) {
                    (Some(ctx), Some(key)) => Ok(Value::Int(gateway.key_state(ctx, key))),
                    _ => Err(sig("(context: handle, key: string)")),
                },
                _ => Err(sig("(context: handle, key: string)")),
            },
            // Handle-only operations.
            _ => {
                let ctx = match values.as_slice() {
                    [ctx] => want_handle(ctx),
                    _ => None,
                }
                .ok_or_else(|| sig("(context: handle)"))?;
                match op {
                    "update" => {
                        gateway.update(ctx);
                        Ok(Value::Null)
                    }
                    "is_running" => Ok(Value::Bool(gateway.is_running(ctx))),
                    "destroy" => {
                        gateway.destroy(ctx);
                        Ok(Value::Null)
                    }
                    "hide" => {
                        gateway.hide(ctx);
                        Ok(Value::Null)
                    }
                    "show" => {
                        gateway.show(ctx);
                        Ok(Value::Null)
                    }
                    "get_mouse_position" => {
                        let (x, y) = gateway.mouse_position(ctx);
                        Ok(Value::Tuple(Rc::new(vec![Value::Int(x), Value::Int(y)])))
                    }
                    "get_delta_time" => Ok(Value::Float(gateway.delta_time(ctx))),
                    _ => Err(RuntimeError::UndefinedFunction {
                        name: name.to_string(),
                    }),
                }
            }
        }
    }
}

fn finish_call(flow: Flow) -> Value {
    match flow {
        Flow::Return(value) | Flow::Normal(value) => value,
        Flow::Break | Flow::Continue => Value::Null,
    }
}

fn identifier_target<'e>(
    target: &'e Expression,
    what: &str,
) -> Result<&'e str, RuntimeError> {
    match target {
        Expression::Identifier(name) => Ok(name),
        _ => Err(RuntimeError::InvalidStatement {
            message: format!("{what} target must be an identifier"),
        }),
    }
}

fn attribute_of(value: &Value, attribute: &str) -> Result<Value, RuntimeError> {
    let obj = match value {
        Value::Object(obj) => obj.borrow(),
        _ => {
            return Err(RuntimeError::TypeMismatch {
                message: format!(
                    "Cannot access attribute '{attribute}' on non-object or non-tuple"
                ),
            })
        }
    };
    if attribute == "__class__" {
        return match &obj.class_name {
            Some(class_name) => Ok(Value::Str(class_name.clone())),
            None => Err(RuntimeError::UnknownAttribute {
                attribute: attribute.to_string(),
            }),
        };
    }
    obj.fields
        .get(attribute)
        .cloned()
        .ok_or_else(|| RuntimeError::UnknownAttribute {
            attribute: attribute.to_string(),
        })
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn type_error(op: BinaryOperator, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        message: format!(
            "Type error in operation '{}' with values {left} ({}) and {right} ({})",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ),
    }
}

fn overflow(op: BinaryOperator) -> RuntimeError {
    RuntimeError::IntegerOverflow {
        operation: op.symbol(),
    }
}

/// Integer division rounding toward negative infinity. `None` on overflow
/// (`i64::MIN / -1`).
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    Some(if a % b != 0 && (a < 0) != (b < 0) {
        q - 1
    } else {
        q
    })
}

/// Modulo taking the sign of the divisor. `None` on overflow.
fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    Some(if r != 0 && (r < 0) != (b < 0) {
        r + b
    } else {
        r
    })
}

fn floor_mod_f(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(v) => Some(*v),
        _ => None,
    }
}

pub(crate) fn apply_binary(
    left: &Value,
    op: BinaryOperator,
    right: &Value,
) -> Result<Value, RuntimeError> {
    use BinaryOperator::*;
    match op {
        Eq => return Ok(Value::Bool(left.is_identical(right))),
        NotEq => return Ok(Value::Bool(!left.is_identical(right))),
        _ => {}
    }
    if matches!(left, Value::Null) || matches!(right, Value::Null) {
        return Err(RuntimeError::TypeMismatch {
            message: format!(
                "Cannot perform operation '{}' with null value",
                op.symbol()
            ),
        });
    }
    match op {
        Add => match (left, right) {
            (Value::Int(a), Value::Int(b)) => {
                a.checked_add(*b).map(Value::Int).ok_or_else(|| overflow(op))
            }
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            (Value::Tuple(a), Value::Tuple(b)) => {
                let mut items = a.as_ref().clone();
                items.extend(b.iter().cloned());
                Ok(Value::Tuple(Rc::new(items)))
            }
            _ => match (as_f64(left), as_f64(right)) {
                (Some(a), Some(b)) => Ok(Value::Float(a + b)),
                _ => Err(type_error(op, left, right)),
            },
        },
        Sub | Mul => match (left, right) {
            (Value::Int(a), Value::Int(b)) => {
                let result = if matches!(op, Sub) {
                    a.checked_sub(*b)
                } else {
                    a.checked_mul(*b)
                };
                result.map(Value::Int).ok_or_else(|| overflow(op))
            }
            _ => match (as_f64(left), as_f64(right)) {
                (Some(a), Some(b)) => Ok(Value::Float(if matches!(op, Sub) {
                    a - b
                } else {
                    a * b
                })),
                _ => Err(type_error(op, left, right)),
            },
        },
        Div => {
            if matches!(right, Value::Int(0)) || matches!(right, Value::Float(v) if *v == 0.0) {
                return Err(RuntimeError::DivisionByZero {
                    operation: "Division",
                });
            }
            match (left, right) {
                (Value::Int(a), Value::Int(b)) => floor_div(*a, *b)
                    .map(Value::Int)
                    .ok_or_else(|| overflow(op)),
                _ => match (as_f64(left), as_f64(right)) {
                    (Some(a), Some(b)) => Ok(Value::Float(a / b)),
                    _ => Err(type_error(op, left, right)),
                },
            }
        }
        Mod => {
            if matches!(right, Value::Int(0)) || matches!(right, Value::Float(v) if *v == 0.0) {
                return Err(RuntimeError::DivisionByZero {
                    operation: "Modulus",
                });
            }
            match (left, right) {
                (Value::Int(a), Value::Int(b)) => floor_mod(*a, *b)
                    .map(Value::Int)
                    .ok_or_else(|| overflow(op)),
                _ => match (as_f64(left), as_f64(right)) {
                    (Some(a), Some(b)) => Ok(Value::Float(floor_mod_f(a, b))),
                    _ => Err(type_error(op, left, right)),
                },
            }
        }
        Less | Greater | LessEq | GreaterEq => {
            let ordering = match (left, right) {
                (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                _ => match (as_f64(left), as_f64(right)) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => return Err(type_error(op, left, right)),
                },
            };
            let ordering = ordering.ok_or_else(|| type_error(op, left, right))?;
            Ok(Value::Bool(match op {
                Less => ordering.is_lt(),
                Greater => ordering.is_gt(),
                LessEq => ordering.is_le(),
                _ => ordering.is_ge(),
            }))
        }
        Eq | NotEq => unreachable!("handled above"),
    }
}

/// Setter taking a handle plus one string.
fn gateway_str_op(
    gateway: &mut dyn crate::native::RenderGateway,
    op: &str,
    values: Vec<Value>,
    sig: impl Fn() -> RuntimeError,
) -> Result<Value, RuntimeError> {
    match values.as_slice() {
        [ctx, text] => match (want_handle(ctx), want_str(text)) {
            (Some(ctx), Some(text)) => {
                match op {
                    "set_title" => gateway.set_title(ctx, text),
                    _ => gateway.set_icon(ctx, text),
                }
                Ok(Value::Null)
            }
            _ => Err(sig()),
        },
        _ => Err(sig()),
    }
}

/// Setter taking a handle plus two numbers.
fn gateway_pair_op(
    gateway: &mut dyn crate::native::RenderGateway,
    op: &str,
    values: Vec<Value>,
    sig: impl Fn() -> RuntimeError,
) -> Result<Value, RuntimeError> {
    match values.as_slice() {
        [ctx, a, b] => match (want_handle(ctx), want_int(a), want_int(b)) {
            (Some(ctx), Some(a), Some(b)) => {
                match op {
                    "set_size" => gateway.set_size(ctx, a, b),
                    "set_position" => gateway.set_position(ctx, a, b),
                    "set_min_size" => gateway.set_min_size(ctx, a, b),
                    _ => gateway.set_max_size(ctx, a, b),
                }
                Ok(Value::Null)
            }
            _ => Err(sig()),
        },
        _ => Err(sig()),
    }
}

/// Setter taking a handle plus a boolean-ish flag.
fn gateway_flag_op(
    gateway: &mut dyn crate::native::RenderGateway,
    op: &str,
    values: Vec<Value>,
    sig: impl Fn() -> RuntimeError,
) -> Result<Value, RuntimeError> {
    match values.as_slice() {
        [ctx, flag] => match (want_handle(ctx), want_flag(flag)) {
            (Some(ctx), Some(flag)) => {
                match op {
                    "set_fullscreen" => gateway.set_fullscreen(ctx, flag),
                    "set_border" => gateway.set_border(ctx, flag),
                    "set_always_on_top" => gateway.set_always_on_top(ctx, flag),
                    _ => gateway.set_resizable(ctx, flag),
                }
                Ok(Value::Null)
            }
            _ => Err(sig()),
        },
        _ => Err(sig()),
    }
}

fn want_handle(value: &Value) -> Option<i64> {
    match value {
        Value::Int(n) => Some(*n),
        _ => None,
    }
}

fn want_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(n) => Some(*n),
        Value::Float(v) => Some(*v as i64),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn want_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Int(n) => Some(*n != 0),
        _ => None,
    }
}

fn want_float(value: &Value) -> Option<f64> {
    as_f64(value)
}

fn want_str(value: &Value) -> Option<&str> {
    match value {
        Value::Str(s) => Some(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn int(n: i64) -> Value {
        Value::Int(n)
    }

    #[test]
    fn division_floors_toward_negative_infinity() {
        assert_eq!(apply_binary(&int(7), BinaryOperator::Div, &int(2)), Ok(int(3)));
        assert_eq!(
            apply_binary(&int(-7), BinaryOperator::Div, &int(2)),
            Ok(int(-4))
        );
        assert_eq!(
            apply_binary(&int(7), BinaryOperator::Div, &int(-2)),
            Ok(int(-4))
        );
    }

    #[test]
    fn modulo_takes_sign_of_divisor() {
        assert_eq!(apply_binary(&int(-7), BinaryOperator::Mod, &int(3)), Ok(int(2)));
        assert_eq!(
            apply_binary(&int(7), BinaryOperator::Mod, &int(-3)),
            Ok(int(-2))
        );
        assert_eq!(
            apply_binary(&Value::Float(-7.5), BinaryOperator::Mod, &Value::Float(2.0)),
            Ok(Value::Float(0.5))
        );
    }

    #[test]
    fn mixed_arithmetic_promotes_to_float() {
        assert_eq!(
            apply_binary(&int(1), BinaryOperator::Add, &Value::Float(0.5)),
            Ok(Value::Float(1.5))
        );
        assert_eq!(
            apply_binary(&int(1), BinaryOperator::Div, &Value::Float(2.0)),
            Ok(Value::Float(0.5))
        );
    }

    #[test]
    fn zero_divisors_are_rejected() {
        assert_eq!(
            apply_binary(&int(1), BinaryOperator::Div, &int(0)),
            Err(RuntimeError::DivisionByZero {
                operation: "Division"
            })
        );
        assert_eq!(
            apply_binary(&int(1), BinaryOperator::Mod, &Value::Float(0.0)),
            Err(RuntimeError::DivisionByZero {
                operation: "Modulus"
            })
        );
    }

    #[test]
    fn integer_overflow_is_an_error_not_a_panic() {
        assert_eq!(
            apply_binary(&int(i64::MAX), BinaryOperator::Add, &int(1)),
            Err(RuntimeError::IntegerOverflow { operation: "+" })
        );
        assert_eq!(
            apply_binary(&int(i64::MIN), BinaryOperator::Sub, &int(1)),
            Err(RuntimeError::IntegerOverflow { operation: "-" })
        );
        assert_eq!(
            apply_binary(&int(i64::MAX), BinaryOperator::Mul, &int(2)),
            Err(RuntimeError::IntegerOverflow { operation: "*" })
        );
        assert_eq!(
            apply_binary(&int(i64::MIN), BinaryOperator::Div, &int(-1)),
            Err(RuntimeError::IntegerOverflow { operation: "/" })
        );
        assert_eq!(
            apply_binary(&int(i64::MIN), BinaryOperator::Mod, &int(-1)),
            Err(RuntimeError::IntegerOverflow { operation: "%" })
        );
    }

    #[test]
    fn null_operands_fail_everything_but_identity() {
        assert_eq!(
            apply_binary(&Value::Null, BinaryOperator::Eq, &Value::Null),
            Ok(Value::Bool(true))
        );
        assert!(apply_binary(&Value::Null, BinaryOperator::Add, &int(1)).is_err());
    }

    #[test]
    fn strings_concatenate_and_order_lexicographically() {
        assert_eq!(
            apply_binary(
                &Value::Str("ab".into()),
                BinaryOperator::Add,
                &Value::Str("cd".into())
            ),
            Ok(Value::Str("abcd".into()))
        );
        assert_eq!(
            apply_binary(
                &Value::Str("abc".into()),
                BinaryOperator::Less,
                &Value::Str("abd".into())
            ),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn booleans_are_not_ordered() {
        assert!(apply_binary(&Value::Bool(true), BinaryOperator::Less, &Value::Bool(false)).is_err());
        assert!(apply_binary(&Value::Bool(true), BinaryOperator::Less, &int(2)).is_err());
    }

    #[test]
    fn tuple_concatenation_builds_a_fresh_tuple() {
        let a = Value::Tuple(Rc::new(vec![int(1)]));
        let b = Value::Tuple(Rc::new(vec![int(2)]));
        let sum = apply_binary(&a, BinaryOperator::Add, &b).expect("tuple + tuple");
        assert_eq!(sum.to_string(), "(1, 2)");
        assert!(!sum.is_identical(&a));
    }
}
