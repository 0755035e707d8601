//! The typed AST produced by pass-3 (spec.md §4.2 "Semantic analyser").
//! Mirrors `ast.rs`'s shape, but every expression carries its resolved
//! `TypeId`, identifiers have become `VarAddr`s, and `Call` has split into
//! `Call` (function invocation) and `Construct` (struct/primitive
//! construction) — the two productions the untyped parser deliberately left
//! merged, since `NAME(args…)` is lexically identical for both and only the
//! analyser knows which `NAME` denotes.

use crate::ast::{BinOp, Literal};
use crate::span::Span;
use crate::symbol::VarAddr;
use crate::typeid::TypeId;

#[derive(Debug, Clone)]
pub struct TExpr {
    pub span: Span,
    pub ty: TypeId,
    pub kind: TExprKind,
}

#[derive(Debug, Clone)]
pub enum TExprKind {
    Literal(Literal),
    /// A folded compile-time constant, substituted in place of an
    /// expression whose value the analyser could prove statically
    /// (spec.md §4.2 "constant folding").
    Const(Literal),
    Var(VarAddr),
    Binary {
        op: BinOp,
        left: Box<TExpr>,
        right: Box<TExpr>,
    },
    UnaryMinus(Box<TExpr>),
    Cond {
        test: Box<TExpr>,
        then_branch: Box<TExpr>,
        else_branch: Box<TExpr>,
    },
    /// A call to a user-defined or host function. `param_types` is the
    /// callee's declared signature, parallel to `args`; the generator
    /// lowers any position typed `Dynamic` with the 2-slot-per-dynamic-arg
    /// convention (spec.md §4.2/§4.3/§9).
    Call {
        function: VarAddr,
        args: Vec<TExpr>,
        param_types: Vec<TypeId>,
    },
    /// Struct or primitive construction, e.g. `pixel("red")` or `string(3)`.
    Construct {
        ty: TypeId,
        args: Vec<TExpr>,
    },
    Member {
        object: Box<TExpr>,
        member_index: u16,
    },
    Index {
        object: Box<TExpr>,
        index: Box<TExpr>,
    },
    VectorLit(Vec<TExpr>),
    DictLit(Vec<(String, TExpr)>),
}

#[derive(Debug, Clone)]
pub struct TStmt {
    pub span: Span,
    pub kind: TStmtKind,
}

#[derive(Debug, Clone)]
pub enum TStmtKind {
    Return(TExpr),
    /// A `bind` statement's initializer runs once, when control reaches it;
    /// the frame slot itself was already allocated at function-entry time,
    /// so this only carries the store.
    Bind { addr: VarAddr, expr: TExpr },
    Assign { addr: VarAddr, expr: TExpr },
    If {
        test: TExpr,
        then_body: Vec<TStmt>,
        else_body: Vec<TStmt>,
    },
    While {
        test: TExpr,
        body: Vec<TStmt>,
    },
    For {
        addr: VarAddr,
        start: TExpr,
        end: TExpr,
        body: Vec<TStmt>,
    },
    Block(Vec<TStmt>),
    Expr(TExpr),
}

#[derive(Debug, Clone)]
pub struct TFuncDef {
    pub name: String,
    /// How many of `locals`'s leading entries are parameters; the rest are
    /// body locals/temporaries, all sharing one flat frame (spec.md §4.4).
    pub param_count: usize,
    pub ret: TypeId,
    /// Every symbol in this function's frame, in declaration order
    /// (arguments first, then locals) — the frame layout spec.md §3
    /// describes.
    pub locals: Vec<TypeId>,
    pub body: Vec<TStmt>,
    /// Non-zero host function id, per spec.md §4.3 "function definitions".
    /// Zero means a Floyd-defined function with a body to execute.
    pub host_function_id: u32,
}

#[derive(Debug, Clone, Default)]
pub struct TProgram {
    pub global_types: Vec<TypeId>,
    /// Parallel to `global_types`; the source name each global slot was
    /// declared under, so an embedder can look one up by name after a run
    /// (spec.md §3 "Symbols").
    pub global_names: Vec<String>,
    pub globals: Vec<TStmt>,
    pub functions: Vec<TFuncDef>,
    /// `(global slot index, function-table index)` pairs: globals holding a
    /// named function's value, initialized directly to `Value::Function`
    /// rather than via a `Bind` statement (function names are bindings too,
    /// spec.md §4.2, but they're implicit — there's no source-level
    /// initializer expression to run).
    pub function_globals: Vec<(u16, u32)>,
    /// Names of host functions referenced by this program, indexed by
    /// `host_function_id - 1`; used to bind the integer dispatch id back to
    /// a name the embedder's `HostFunctions` impl recognizes.
    pub host_function_names: Vec<String>,
}
