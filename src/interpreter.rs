//! Fault-tolerant tree-walking interpreter.
//!
//! A program runs to the end no matter what: the first runtime error per run
//! is printed as an `Error:` line and recorded, later ones are swallowed, and
//! the failed expression or statement yields null. Output goes to a generic
//! [`Write`] sink and console input comes from a [`BufRead`], so the whole
//! thing runs under test without touching real stdio.

mod error;
mod runtime;
mod value;

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::time::SystemTime;

use crate::ast::{Param, Program, Stmt};
use crate::native::RenderGateway;
use runtime::Flow;

pub use error::RuntimeError;
pub use value::{ObjectData, ObjectRef, Value};

/// A user-defined function or method body, cloned out of the AST at
/// definition time.
#[derive(Debug, Clone)]
pub(crate) struct Function {
    pub(crate) params: Vec<Param>,
    pub(crate) body: Vec<Stmt>,
}

/// Snapshot of the first runtime error of a run.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub message: String,
    pub timestamp: SystemTime,
    pub detail: Option<String>,
    pub line: Option<usize>,
}

pub struct Interpreter<W: Write> {
    pub(crate) variables: HashMap<String, Value>,
    pub(crate) functions: HashMap<String, Function>,
    pub(crate) classes: HashMap<String, HashMap<String, Function>>,
    pub(crate) gateway: Option<Box<dyn RenderGateway>>,
    pub(crate) input: Box<dyn BufRead>,
    pub(crate) out: W,
    pub(crate) debug_mode: bool,
    progress: u32,
    last_error: Option<ErrorReport>,
    pub(crate) error_logged: bool,
    pub(crate) current_line: Option<usize>,
}

impl<W: Write> Interpreter<W> {
    pub fn new(out: W) -> Self {
        Self::with_input(out, Box::new(BufReader::new(io::stdin())))
    }

    pub fn with_input(out: W, input: Box<dyn BufRead>) -> Self {
        let mut variables = HashMap::new();
        // Reserved slot written by ocl.get_set_input.
        variables.insert("input_value".to_string(), Value::Str(String::new()));
        Self {
            variables,
            functions: HashMap::new(),
            classes: HashMap::new(),
            gateway: None,
            input,
            out,
            debug_mode: false,
            progress: 0,
            last_error: None,
            error_logged: false,
            current_line: None,
        }
    }

    pub fn set_gateway(&mut self, gateway: Box<dyn RenderGateway>) {
        self.gateway = Some(gateway);
    }

    pub fn set_debug_mode(&mut self, debug_mode: bool) {
        self.debug_mode = debug_mode;
    }

    /// Bumps the monotone progress counter; visible only in debug mode.
    pub fn mark_progress(&mut self, reason: &str) {
        self.progress += 1;
        if self.debug_mode {
            let _ = writeln!(self.out, "Progress {}: {reason}", self.progress);
        }
    }

    pub fn progress(&self) -> u32 {
        self.progress
    }

    pub fn last_error(&self) -> Option<&ErrorReport> {
        self.last_error.as_ref()
    }

    /// Hands the output sink back, for callers that captured into a buffer.
    pub fn into_output(self) -> W {
        self.out
    }

    /// Records and prints an error, first-per-run only.
    pub(crate) fn log_error(&mut self, err: &RuntimeError) {
        if self.error_logged {
            return;
        }
        let message = err.to_string();
        let _ = writeln!(self.out, "Error: {message}");
        self.last_error = Some(ErrorReport {
            message,
            timestamp: SystemTime::now(),
            detail: self.debug_mode.then(|| format!("{err:?}")),
            line: self.current_line,
        });
        self.error_logged = true;
    }

    /// Executes a whole program. The result is null unless a top-level
    /// `return` ends the run early with a value.
    pub fn run(&mut self, program: &Program) -> Value {
        self.error_logged = false;
        for stmt in &program.statements {
            self.current_line = Some(stmt.line);
            match self.exec_statement(&stmt.statement) {
                Ok(Flow::Normal(_)) => {}
                Ok(Flow::Break) | Ok(Flow::Continue) => {
                    // Stray loop control at the top level ends the run quietly.
                    self.current_line = None;
                    return Value::Null;
                }
                Ok(Flow::Return(value)) => {
                    self.current_line = None;
                    return value;
                }
                Err(err) => self.log_error(&err),
            }
        }
        self.current_line = None;
        Value::Null
    }
}
