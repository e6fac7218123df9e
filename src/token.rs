/// Token kinds produced by the lexer.
///
/// Keyword matching is case-insensitive; everything else is case-sensitive.
/// Payload-free by design: the token's source text is kept on [`Token`], and
/// the parser interprets it (number parsing, quote stripping) when building
/// the AST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords
    Let,
    Print,
    If,
    Elif,
    Else,
    While,
    Define,
    Return,
    Class,
    Break,
    Continue,
    True,
    False,
    Null,
    IntType,
    FloatType,
    BoolType,
    StringType,
    Ocl,

    // Literals and names. Identifiers may contain embedded `.`; dotted
    // access is a lexical concept in this language, not an operator chain.
    Number,
    StringLiteral,
    Identifier,

    // Operators
    EqEq,      // ==
    NotEq,     // !=
    LessEq,    // <=
    GreaterEq, // >=
    Less,      // <
    Greater,   // >
    Plus,      // +
    Minus,     // -
    Star,      // *
    Slash,     // /
    Percent,   // %

    // Augmented assignment
    PlusEq,  // +=
    MinusEq, // -=
    StarEq,  // *=
    SlashEq, // /=

    Assign, // =

    // Punctuation
    Semicolon,
    Colon,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub line: usize,
    pub column: usize,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, text: &'a str, line: usize, column: usize) -> Self {
        Self {
            kind,
            text,
            line,
            column,
        }
    }
}
