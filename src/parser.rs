//! Recursive-descent parser with panic-mode recovery.
//!
//! A failed statement is recorded and the parser resynchronizes on the next
//! `;` or `}`, so one bad statement never hides the rest of the program.

use thiserror::Error;

use crate::ast::{
    BinaryOperator, Expression, FunctionDef, Param, Program, Statement, Stmt, TypeName,
};
use crate::lexer::{tokenize, LexError};
use crate::native;
use crate::token::{Token, TokenKind};

const HINT_IF: &str = " Did you forget a colon after the 'if' condition?";
const HINT_WHILE: &str = " Did you forget a colon after the 'while' condition?";
const HINT_DEFINE: &str = " Did you forget parentheses or a colon in the function definition?";
const HINT_CLASS: &str = " Did you forget a colon or brace in the class definition?";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Line {line}, column {column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// Outcome of a parse: the statements that survived, plus every error the
/// parser recovered from, in source order.
#[derive(Debug, PartialEq)]
pub struct Parsed {
    pub program: Program,
    pub errors: Vec<ParseError>,
}

/// Lexes and parses `source`. A lex error aborts the whole parse; parse
/// errors are collected per statement instead.
pub fn parse(source: &str) -> Result<Parsed, LexError> {
    Ok(parse_tokens(&tokenize(source)?))
}

pub fn parse_tokens(tokens: &[Token<'_>]) -> Parsed {
    let mut parser = Parser { tokens, pos: 0 };
    parser.program()
}

struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
}

impl<'t, 'a> Parser<'t, 'a> {
    fn current(&self) -> Option<&'t Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn kind(&self) -> Option<TokenKind> {
        self.current().map(|token| token.kind)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    /// Position of the current token, or of the end of input.
    fn here(&self) -> (usize, usize) {
        match self.current().or_else(|| self.tokens.last()) {
            Some(token) => (token.line, token.column),
            None => (1, 1),
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let (line, column) = self.here();
        ParseError {
            line,
            column,
            message: message.into(),
        }
    }

    fn eat(&mut self, kind: TokenKind, label: &str) -> Result<(), ParseError> {
        self.eat_hinted(kind, label, "")
    }

    /// Like `eat`, with a targeted hint appended to the error message.
    fn eat_hinted(
        &mut self,
        kind: TokenKind,
        label: &str,
        hint: &str,
    ) -> Result<(), ParseError> {
        if self.kind() == Some(kind) {
            self.advance();
            Ok(())
        } else {
            let got = self.current().map_or("EOF", |token| token.text);
            Err(self.error(format!("Expected '{label}', got '{got}'.{hint}")))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        match self.current() {
            Some(token) if token.kind == TokenKind::Identifier => {
                let name = token.text.to_string();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(format!("Expected {what}"))),
        }
    }

    fn program(&mut self) -> Parsed {
        let mut statements = Vec::new();
        let mut errors = Vec::new();
        while let Some(token) = self.current() {
            let line = token.line;
            match self.statement() {
                Ok(statement) => {
                    statements.push(Stmt { statement, line });
                    if self.kind() == Some(TokenKind::Semicolon) {
                        self.advance();
                    }
                }
                Err(err) => {
                    errors.push(err);
                    self.recover();
                }
            }
        }
        Parsed {
            program: Program { statements },
            errors,
        }
    }

    /// Skip to the next statement boundary. The resync token itself is
    /// consumed so recovery always makes progress.
    fn recover(&mut self) {
        while let Some(kind) = self.kind() {
            self.advance();
            if matches!(kind, TokenKind::Semicolon | TokenKind::RBrace) {
                break;
            }
        }
    }

    fn statement(&mut self) -> Result<Statement, ParseError> {
        match self.kind() {
            Some(TokenKind::Let) => self.declaration(),
            Some(TokenKind::Print) => {
                self.advance();
                Ok(Statement::Print(self.expression()?))
            }
            Some(TokenKind::If) => self.if_statement(),
            Some(TokenKind::While) => self.while_statement(),
            Some(TokenKind::Define) => Ok(Statement::Define(self.function_definition()?)),
            Some(TokenKind::Class) => self.class_definition(),
            Some(TokenKind::Ocl) => Ok(Statement::Expr(self.ocl_call()?)),
            Some(TokenKind::Return) => {
                self.advance();
                let value = match self.kind() {
                    Some(TokenKind::Semicolon) | None => None,
                    _ => Some(self.expression()?),
                };
                Ok(Statement::Return(value))
            }
            Some(TokenKind::Break) => {
                self.advance();
                Ok(Statement::Break)
            }
            Some(TokenKind::Continue) => {
                self.advance();
                Ok(Statement::Continue)
            }
            Some(TokenKind::Identifier) => self.assignment_or_call(),
            _ => {
                let got = self.current().map_or("EOF", |token| token.text);
                Err(self.error(format!("Unexpected token: {got}")))
            }
        }
    }

    fn declaration(&mut self) -> Result<Statement, ParseError> {
        self.advance();
        let name = self.expect_identifier("variable name")?;
        let annotation = if self.kind() == Some(TokenKind::Colon) {
            self.advance();
            // Any single token is accepted here; only the four type keywords
            // carry a checkable annotation.
            let annotation = self.type_annotation();
            self.advance();
            annotation
        } else {
            None
        };
        self.eat(TokenKind::Assign, "=")?;
        let value = self.expression()?;
        Ok(Statement::Let {
            name,
            annotation,
            value,
        })
    }

    fn type_annotation(&self) -> Option<TypeName> {
        match self.kind() {
            Some(TokenKind::IntType) => Some(TypeName::Int),
            Some(TokenKind::FloatType) => Some(TypeName::Float),
            Some(TokenKind::BoolType) => Some(TypeName::Bool),
            Some(TokenKind::StringType) => Some(TypeName::Str),
            _ => None,
        }
    }

    fn assignment_or_call(&mut self) -> Result<Statement, ParseError> {
        let target = self.expression()?;
        let aug_op = match self.kind() {
            Some(TokenKind::Assign) => {
                self.advance();
                let value = self.expression()?;
                return Ok(Statement::Assign { target, value });
            }
            Some(TokenKind::PlusEq) => Some(BinaryOperator::Add),
            Some(TokenKind::MinusEq) => Some(BinaryOperator::Sub),
            Some(TokenKind::StarEq) => Some(BinaryOperator::Mul),
            Some(TokenKind::SlashEq) => Some(BinaryOperator::Div),
            _ => None,
        };
        match aug_op {
            Some(op) => {
                self.advance();
                let value = self.expression()?;
                Ok(Statement::AugAssign { target, op, value })
            }
            None => Ok(Statement::Expr(target)),
        }
    }

    fn if_statement(&mut self) -> Result<Statement, ParseError> {
        self.advance();
        let condition = self.expression()?;
        self.eat_hinted(TokenKind::Colon, ":", HINT_IF)?;
        self.eat(TokenKind::LBrace, "{")?;
        let then_body = self.block()?;
        let mut elif_branches = Vec::new();
        while self.kind() == Some(TokenKind::Elif) {
            self.advance();
            let elif_condition = self.expression()?;
            self.eat_hinted(TokenKind::Colon, ":", HINT_IF)?;
            self.eat(TokenKind::LBrace, "{")?;
            elif_branches.push((elif_condition, self.block()?));
        }
        let else_body = if self.kind() == Some(TokenKind::Else) {
            self.advance();
            self.eat(TokenKind::Colon, ":")?;
            self.eat(TokenKind::LBrace, "{")?;
            self.block()?
        } else {
            Vec::new()
        };
        Ok(Statement::If {
            condition,
            then_body,
            elif_branches,
            else_body,
        })
    }

    fn while_statement(&mut self) -> Result<Statement, ParseError> {
        self.advance();
        let condition = self.expression()?;
        self.eat_hinted(TokenKind::Colon, ":", HINT_WHILE)?;
        self.eat(TokenKind::LBrace, "{")?;
        let body = self.block()?;
        Ok(Statement::While { condition, body })
    }

    fn function_definition(&mut self) -> Result<FunctionDef, ParseError> {
        self.advance();
        let name = self.expect_identifier("function name")?;
        self.eat_hinted(TokenKind::LParen, "(", HINT_DEFINE)?;
        let mut params = Vec::new();
        if self.kind() != Some(TokenKind::RParen) {
            loop {
                let param_name = self.expect_identifier("parameter name")?;
                let annotation = if self.kind() == Some(TokenKind::Colon) {
                    self.advance();
                    let annotation = self.type_annotation();
                    self.advance();
                    annotation
                } else {
                    None
                };
                params.push(Param {
                    name: param_name,
                    annotation,
                });
                if self.kind() == Some(TokenKind::RParen) {
                    break;
                }
                self.eat(TokenKind::Comma, ",")?;
            }
        }
        self.eat(TokenKind::RParen, ")")?;
        self.eat_hinted(TokenKind::Colon, ":", HINT_DEFINE)?;
        self.eat(TokenKind::LBrace, "{")?;
        let body = self.block()?;
        Ok(FunctionDef { name, params, body })
    }

    fn class_definition(&mut self) -> Result<Statement, ParseError> {
        self.advance();
        let name = self.expect_identifier("class name")?;
        self.eat_hinted(TokenKind::Colon, ":", HINT_CLASS)?;
        self.eat_hinted(TokenKind::LBrace, "{", HINT_CLASS)?;
        let mut methods = Vec::new();
        while self.current().is_some() && self.kind() != Some(TokenKind::RBrace) {
            if self.kind() == Some(TokenKind::Define) {
                methods.push(self.function_definition()?);
                if self.kind() == Some(TokenKind::Semicolon) {
                    self.advance();
                }
            } else {
                return Err(self.error("Expected method definition in class"));
            }
        }
        self.eat(TokenKind::RBrace, "}")?;
        Ok(Statement::ClassDef { name, methods })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();
        while self.current().is_some() && self.kind() != Some(TokenKind::RBrace) {
            let line = self.here().0;
            let statement = self.statement()?;
            statements.push(Stmt { statement, line });
            while self.kind() == Some(TokenKind::Semicolon) {
                self.advance();
            }
        }
        self.eat(TokenKind::RBrace, "}")?;
        Ok(statements)
    }

    /// `ocl.<name>(...)`: names are validated against the fixed catalogue at
    /// parse time and stored lower-cased with the `ocl.` prefix.
    fn ocl_call(&mut self) -> Result<Expression, ParseError> {
        self.eat(TokenKind::Ocl, "ocl")?;
        self.eat(TokenKind::Dot, ".")?;
        let name = match self.current() {
            Some(token) if token.kind == TokenKind::Identifier => token.text.to_ascii_lowercase(),
            _ => return Err(self.error("Unknown ocl command")),
        };
        if name == "classes" {
            self.advance();
            self.eat(TokenKind::LParen, "(")?;
            let class_name = match self.current() {
                Some(token) if token.kind == TokenKind::StringLiteral => {
                    token.text[1..token.text.len() - 1].to_string()
                }
                _ => return Err(self.error("Expected class name as string literal")),
            };
            self.advance();
            self.eat(TokenKind::RParen, ")")?;
            return Ok(Expression::Call {
                name: "ocl.classes".to_string(),
                args: vec![Expression::Str(class_name)],
            });
        }
        let known = matches!(name.as_str(), "get_input" | "get_set_input")
            || name
                .strip_prefix("get_ocl2dra.")
                .is_some_and(|op| native::GATEWAY_OPS.contains(&op));
        if !known {
            return Err(self.error("Unknown ocl command"));
        }
        self.advance();
        let args = self.paren_args()?;
        Ok(Expression::Call {
            name: format!("ocl.{name}"),
            args,
        })
    }

    fn paren_args(&mut self) -> Result<Vec<Expression>, ParseError> {
        self.eat(TokenKind::LParen, "(")?;
        let mut args = Vec::new();
        if self.kind() != Some(TokenKind::RParen) {
            loop {
                args.push(self.expression()?);
                if self.kind() == Some(TokenKind::RParen) {
                    break;
                }
                self.eat(TokenKind::Comma, ",")?;
            }
        }
        self.eat(TokenKind::RParen, ")")?;
        Ok(args)
    }

    fn expression(&mut self) -> Result<Expression, ParseError> {
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.arithmetic()?;
        loop {
            let op = match self.kind() {
                Some(TokenKind::EqEq) => BinaryOperator::Eq,
                Some(TokenKind::NotEq) => BinaryOperator::NotEq,
                Some(TokenKind::Less) => BinaryOperator::Less,
                Some(TokenKind::Greater) => BinaryOperator::Greater,
                Some(TokenKind::LessEq) => BinaryOperator::LessEq,
                Some(TokenKind::GreaterEq) => BinaryOperator::GreaterEq,
                _ => break,
            };
            self.advance();
            let right = self.arithmetic()?;
            left = Expression::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn arithmetic(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.term()?;
        loop {
            let op = match self.kind() {
                Some(TokenKind::Plus) => BinaryOperator::Add,
                Some(TokenKind::Minus) => BinaryOperator::Sub,
                _ => break,
            };
            self.advance();
            let right = self.term()?;
            left = Expression::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.factor()?;
        loop {
            let op = match self.kind() {
                Some(TokenKind::Star) => BinaryOperator::Mul,
                Some(TokenKind::Slash) => BinaryOperator::Div,
                Some(TokenKind::Percent) => BinaryOperator::Mod,
                _ => break,
            };
            self.advance();
            let right = self.factor()?;
            left = Expression::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expression, ParseError> {
        if self.kind() == Some(TokenKind::LParen) {
            self.advance();
            let expr = self.expression()?;
            self.eat(TokenKind::RParen, ")")?;
            return Ok(expr);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expression, ParseError> {
        match self.kind() {
            Some(TokenKind::Number) => {
                let text = self.current().map_or("", |token| token.text);
                let literal = if text.contains('.') {
                    text.parse::<f64>().ok().map(Expression::Float)
                } else {
                    text.parse::<i64>().ok().map(Expression::Int)
                };
                let literal = literal
                    .ok_or_else(|| self.error(format!("Invalid number literal: {text}")))?;
                self.advance();
                Ok(literal)
            }
            Some(TokenKind::StringLiteral) => {
                let text = self.current().map_or("\"\"", |token| token.text);
                let value = text[1..text.len() - 1].to_string();
                self.advance();
                Ok(Expression::Str(value))
            }
            Some(TokenKind::True) => {
                self.advance();
                Ok(Expression::Bool(true))
            }
            Some(TokenKind::False) => {
                self.advance();
                Ok(Expression::Bool(false))
            }
            Some(TokenKind::Null) => {
                self.advance();
                Ok(Expression::Null)
            }
            Some(TokenKind::Ocl) => self.ocl_call(),
            Some(TokenKind::Identifier) => self.identifier_led(),
            _ => {
                let got = self.current().map_or("EOF", |token| token.text);
                Err(self.error(format!("Unexpected token in primary: {got}")))
            }
        }
    }

    fn identifier_led(&mut self) -> Result<Expression, ParseError> {
        let name = self
            .current()
            .map_or(String::new(), |token| token.text.to_string());
        self.advance();
        match self.kind() {
            Some(TokenKind::Dot) => {
                // `name` itself may already be dotted; an explicit `.` only
                // appears before a method call or keyword-adjacent attribute.
                self.advance();
                let member = match self.current() {
                    Some(token) if token.kind == TokenKind::Identifier => token.text.to_string(),
                    _ => return Err(self.error("Expected identifier after dot")),
                };
                self.advance();
                if self.kind() == Some(TokenKind::LParen) {
                    let args = self.paren_args()?;
                    Ok(Expression::MethodCall {
                        receiver: Box::new(Expression::Identifier(name)),
                        method: member,
                        args,
                    })
                } else {
                    Ok(Expression::Attribute {
                        object: Box::new(Expression::Identifier(name)),
                        name: member,
                    })
                }
            }
            Some(TokenKind::LBracket) => {
                self.advance();
                let index = self.expression()?;
                self.eat(TokenKind::RBracket, "]")?;
                Ok(Expression::Index {
                    base: Box::new(Expression::Identifier(name)),
                    index: Box::new(index),
                })
            }
            Some(TokenKind::LParen) => {
                let args = self.paren_args()?;
                Ok(Expression::Call { name, args })
            }
            _ => Ok(Expression::Identifier(name)),
        }
    }
}
