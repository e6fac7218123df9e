use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::TypeName;

pub type ObjectRef = Rc<RefCell<ObjectData>>;

/// A mutable field mapping. Class instances carry their class name; the
/// anonymous mappings created by dotted assignment stay untagged.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct ObjectData {
    pub class_name: Option<String>,
    pub fields: BTreeMap<String, Value>,
}

impl ObjectData {
    pub fn instance(class_name: &str) -> ObjectRef {
        Rc::new(RefCell::new(ObjectData {
            class_name: Some(class_name.to_string()),
            fields: BTreeMap::new(),
        }))
    }

    pub fn untagged() -> ObjectRef {
        Rc::new(RefCell::new(ObjectData::default()))
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Tuple(Rc<Vec<Value>>),
    Object(ObjectRef),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Tuple(_) => "tuple",
            Value::Object(_) => "object",
        }
    }

    /// `==`/`!=` semantics: identity for reference values, plain equality
    /// for scalars of the same kind, never true across kinds.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Strict kind check for `let` annotations. Null always passes.
    pub fn matches(&self, annotation: TypeName) -> bool {
        matches!(
            (self, annotation),
            (Value::Null, _)
                | (Value::Int(_), TypeName::Int)
                | (Value::Float(_), TypeName::Float)
                | (Value::Bool(_), TypeName::Bool)
                | (Value::Str(_), TypeName::Str)
        )
    }
}

/// Whole floats keep one decimal place so `4.0 / 2.0` prints `2.0`, not `2`.
fn format_float(value: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        write!(f, "{value:.1}")
    } else {
        write!(f, "{value}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(v) => format_float(*v, f),
            Value::Bool(true) => f.write_str("true"),
            Value::Bool(false) => f.write_str("false"),
            Value::Str(s) => f.write_str(s),
            Value::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Value::Object(obj) => {
                let obj = obj.borrow();
                if let Some(class_name) = &obj.class_name {
                    write!(f, "{class_name} ")?;
                }
                f.write_str("{")?;
                for (i, (key, value)) in obj.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scalar_identity_is_value_identity() {
        assert!(Value::Int(1).is_identical(&Value::Int(1)));
        assert!(Value::Str("a".into()).is_identical(&Value::Str("a".into())));
        assert!(!Value::Int(1).is_identical(&Value::Float(1.0)));
        assert!(!Value::Bool(true).is_identical(&Value::Int(1)));
    }

    #[test]
    fn reference_identity_for_objects_and_tuples() {
        let a = ObjectData::instance("Point");
        let b = ObjectData::instance("Point");
        assert!(Value::Object(a.clone()).is_identical(&Value::Object(a.clone())));
        assert!(!Value::Object(a).is_identical(&Value::Object(b)));

        let t = Rc::new(vec![Value::Int(1)]);
        assert!(Value::Tuple(t.clone()).is_identical(&Value::Tuple(t.clone())));
        assert!(!Value::Tuple(t).is_identical(&Value::Tuple(Rc::new(vec![Value::Int(1)]))));
    }

    #[test]
    fn renders_like_the_language() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(
            Value::Tuple(Rc::new(vec![Value::Int(3), Value::Int(4)])).to_string(),
            "(3, 4)"
        );
        let obj = ObjectData::instance("Point");
        obj.borrow_mut()
            .fields
            .insert("x".to_string(), Value::Int(1));
        assert_eq!(Value::Object(obj).to_string(), "Point {x: 1}");
    }

    #[test]
    fn annotation_matching_is_strict() {
        assert!(Value::Int(1).matches(TypeName::Int));
        assert!(!Value::Bool(true).matches(TypeName::Int));
        assert!(!Value::Int(1).matches(TypeName::Float));
        assert!(Value::Null.matches(TypeName::Str));
    }
}
