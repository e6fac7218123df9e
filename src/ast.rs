//! Syntax tree built by the parser and walked by the interpreter.

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    /// A possibly-dotted name (`x`, `player.pos.0`). Dotted names are kept
    /// whole and resolved segment by segment at evaluation time.
    Identifier(String),
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Index {
        base: Box<Expression>,
        index: Box<Expression>,
    },
    Attribute {
        object: Box<Expression>,
        name: String,
    },
    MethodCall {
        receiver: Box<Expression>,
        method: String,
        args: Vec<Expression>,
    },
    /// Function call by (possibly qualified) name. `ocl.*` names and
    /// `obj.method` names are disambiguated by the interpreter.
    Call {
        name: String,
        args: Vec<Expression>,
    },
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Eq => "==",
            BinaryOperator::NotEq => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::Greater => ">",
            BinaryOperator::LessEq => "<=",
            BinaryOperator::GreaterEq => ">=",
        }
    }
}

/// Runtime-checkable type annotation on `let` and parameters.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TypeName {
    Int,
    Float,
    Bool,
    Str,
}

impl TypeName {
    pub fn name(self) -> &'static str {
        match self {
            TypeName::Int => "int",
            TypeName::Float => "float",
            TypeName::Bool => "bool",
            TypeName::Str => "string",
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Param {
    pub name: String,
    pub annotation: Option<TypeName>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Statement {
    Let {
        name: String,
        annotation: Option<TypeName>,
        value: Expression,
    },
    Assign {
        target: Expression,
        value: Expression,
    },
    AugAssign {
        target: Expression,
        op: BinaryOperator,
        value: Expression,
    },
    Print(Expression),
    If {
        condition: Expression,
        then_body: Vec<Stmt>,
        elif_branches: Vec<(Expression, Vec<Stmt>)>,
        else_body: Vec<Stmt>,
    },
    While {
        condition: Expression,
        body: Vec<Stmt>,
    },
    Define(FunctionDef),
    ClassDef {
        name: String,
        methods: Vec<FunctionDef>,
    },
    Return(Option<Expression>),
    Break,
    Continue,
    Expr(Expression),
}

/// A statement together with the source line of its first token, used for
/// error-log attribution.
#[derive(Debug, PartialEq, Clone)]
pub struct Stmt {
    pub statement: Statement,
    pub line: usize,
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}
