use thiserror::Error;

use crate::token::{Token, TokenKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Invalid token at line {line}, column {column}: '{fragment}'")]
    InvalidToken {
        line: usize,
        column: usize,
        fragment: String,
    },
}

pub type LexResult<T> = Result<T, LexError>;

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("let", TokenKind::Let),
    ("print", TokenKind::Print),
    ("if", TokenKind::If),
    ("elif", TokenKind::Elif),
    ("else", TokenKind::Else),
    ("while", TokenKind::While),
    ("define", TokenKind::Define),
    ("return", TokenKind::Return),
    ("class", TokenKind::Class),
    ("break", TokenKind::Break),
    ("continue", TokenKind::Continue),
    ("true", TokenKind::True),
    ("false", TokenKind::False),
    ("null", TokenKind::Null),
    ("int", TokenKind::IntType),
    ("float", TokenKind::FloatType),
    ("bool", TokenKind::BoolType),
    ("string", TokenKind::StringType),
    ("ocl", TokenKind::Ocl),
];

pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
    line_start: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            line_start: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn column(&self, start: usize) -> usize {
        start - self.line_start + 1
    }

    fn invalid_token(&self, start: usize, line: usize) -> LexError {
        let fragment: String = self.source[start..].chars().take(10).collect();
        LexError::InvalidToken {
            line,
            column: self.column(start),
            fragment,
        }
    }

    fn token(&self, kind: TokenKind, start: usize, line: usize, column: usize) -> Token<'a> {
        Token::new(kind, &self.source[start..self.pos], line, column)
    }

    fn next_token(&mut self) -> LexResult<Option<Token<'a>>> {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') => self.advance(),
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('\n') => {
                    self.advance();
                    self.line += 1;
                    self.line_start = self.pos;
                }
                Some('\r') => self.advance(),
                _ => break,
            }
        }

        let start = self.pos;
        let line = self.line;
        let column = self.column(start);
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(None),
        };

        let token = match c {
            c if c.is_ascii_alphabetic() || c == '_' => self.read_word(start, line, column),
            c if c.is_ascii_digit() => self.read_number(start, line, column)?,
            '"' => self.read_string(start, line, column)?,
            _ => self.read_operator(start, line, column)?,
        };
        Ok(Some(token))
    }

    /// Ordered choice: keywords (case-insensitive, whole word) win over the
    /// general identifier pattern. Only non-keyword words may continue with
    /// embedded dots, so `ocl.x` lexes as `ocl` `.` `x` while `pos.0` is a
    /// single dotted identifier.
    fn read_word(&mut self, start: usize, line: usize, column: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let word = &self.source[start..self.pos];
        for (keyword, kind) in KEYWORDS {
            if word.eq_ignore_ascii_case(keyword) {
                return self.token(*kind, start, line, column);
            }
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                self.advance();
            } else {
                break;
            }
        }
        self.token(TokenKind::Identifier, start, line, column)
    }

    fn read_number(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        // Word-boundary check: a digit run glued to a letter matches no
        // token pattern at all.
        if self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(self.invalid_token(start, line));
        }
        Ok(self.token(TokenKind::Number, start, line, column))
    }

    fn read_string(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        self.advance(); // opening quote
        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    return Ok(self.token(TokenKind::StringLiteral, start, line, column));
                }
                // No escapes; newlines are allowed inside literals and do
                // not advance the line counter.
                Some(_) => self.advance(),
                None => return Err(self.invalid_token(start, line)),
            }
        }
    }

    fn read_operator(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        let two = [self.peek(), self.peek_at(1)];
        let double = match two {
            [Some('+'), Some('=')] => Some(TokenKind::PlusEq),
            [Some('-'), Some('=')] => Some(TokenKind::MinusEq),
            [Some('*'), Some('=')] => Some(TokenKind::StarEq),
            [Some('/'), Some('=')] => Some(TokenKind::SlashEq),
            [Some('='), Some('=')] => Some(TokenKind::EqEq),
            [Some('!'), Some('=')] => Some(TokenKind::NotEq),
            [Some('<'), Some('=')] => Some(TokenKind::LessEq),
            [Some('>'), Some('=')] => Some(TokenKind::GreaterEq),
            _ => None,
        };
        if let Some(kind) = double {
            self.advance();
            self.advance();
            return Ok(self.token(kind, start, line, column));
        }

        let single = match self.peek() {
            Some('+') => Some(TokenKind::Plus),
            Some('-') => Some(TokenKind::Minus),
            Some('*') => Some(TokenKind::Star),
            Some('/') => Some(TokenKind::Slash),
            Some('%') => Some(TokenKind::Percent),
            Some('<') => Some(TokenKind::Less),
            Some('>') => Some(TokenKind::Greater),
            Some('=') => Some(TokenKind::Assign),
            Some(';') => Some(TokenKind::Semicolon),
            Some(':') => Some(TokenKind::Colon),
            Some('(') => Some(TokenKind::LParen),
            Some(')') => Some(TokenKind::RParen),
            Some('{') => Some(TokenKind::LBrace),
            Some('}') => Some(TokenKind::RBrace),
            Some(',') => Some(TokenKind::Comma),
            Some('.') => Some(TokenKind::Dot),
            Some('[') => Some(TokenKind::LBracket),
            Some(']') => Some(TokenKind::RBracket),
            _ => None,
        };
        match single {
            Some(kind) => {
                self.advance();
                Ok(self.token(kind, start, line, column))
            }
            None => Err(self.invalid_token(start, line)),
        }
    }
}

pub fn tokenize(source: &str) -> LexResult<Vec<Token<'_>>> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}
