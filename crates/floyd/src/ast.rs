//! The untyped AST produced by the parser (spec.md §4.1, stage "Parser").
//!
//! Shaped after the teacher's `expressions::Expr`/`Node<F>` split: a flat
//! expression enum carrying boxed children, and a statement enum generic
//! enough to hold both top-level and function-body statements.

use crate::span::Span;

/// Surface-syntax type expression, as written by the programmer. Resolved
/// into a `TypeId` during pass-2 (see `resolve.rs`).
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// A bare name: a primitive (`int`, `bool`, ...) or a struct name.
    Name(String),
    Vector(Box<TypeExpr>),
    Dict(Box<TypeExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    NotEq,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Ident(String),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryMinus(Box<Expr>),
    Cond {
        test: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        member: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    VectorLit(Vec<Expr>),
    DictLit(Vec<(Expr, Expr)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub span: Span,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Return(Expr),
    Bind {
        mutable: bool,
        type_expr: Option<TypeExpr>,
        name: String,
        expr: Expr,
    },
    Assign {
        name: String,
        expr: Expr,
    },
    If {
        test: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
    },
    For {
        var: String,
        start: Expr,
        end: Expr,
        body: Vec<Stmt>,
    },
    Block(Vec<Stmt>),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub type_expr: TypeExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDef {
    pub span: Span,
    pub name: String,
    pub params: Vec<Param>,
    pub ret: TypeExpr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub span: Span,
    pub name: String,
    pub members: Vec<Param>,
}

/// The whole parsed translation unit: struct and function definitions plus
/// top-level (global) statements, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub structs: Vec<StructDef>,
    pub functions: Vec<FuncDef>,
    pub globals: Vec<Stmt>,
}
