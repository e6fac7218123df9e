//! OCL: a small scripting language with a fault-tolerant interpreter and a
//! pluggable 2D-rendering gateway.
//!
//! The pipeline is [`lexer`] → [`parser`] → [`interpreter`]. Parsing recovers
//! from bad statements instead of stopping, and the interpreter logs runtime
//! errors and keeps going, so a broken script still runs as far as it can.

pub mod ast;
#[cfg(test)]
mod harness;
pub mod interpreter;
pub mod lexer;
pub mod native;
pub mod parser;
pub mod token;
