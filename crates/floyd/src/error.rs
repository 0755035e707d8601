//! The two error families described in spec.md §7: compile errors (carry a
//! source span, returned by `compile`) and runtime errors (carry the
//! offending opcode index, surfaced by the VM). The two are never conflated.

use crate::span::Span;

/// Errors raised while turning source text into a `BcProgram`.
///
/// Grounded on the teacher's `ParseError`/`exceptions::ExcType` split: a
/// small closed set of variants, each carrying just enough structured data
/// for an embedder to render its own message.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum CompileError {
    #[error("parse error at {span:?}: {message}")]
    Parse { message: String, span: Span },

    #[error("type error at {span:?}: {message}")]
    Type { message: String, span: Span },

    #[error("undefined name '{name}' at {span:?}")]
    UndefinedName { name: String, span: Span },

    #[error("wrong number of arguments at {span:?}: expected {expected}, got {got}")]
    Arity { expected: usize, got: usize, span: Span },

    #[error("cannot rebind immutable '{name}' at {span:?}")]
    ImmutableRebind { name: String, span: Span },

    #[error("division by a literal zero at {span:?}")]
    DivByZeroConst { span: Span },
}

impl CompileError {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Self::Parse { span, .. }
            | Self::Type { span, .. }
            | Self::UndefinedName { span, .. }
            | Self::Arity { span, .. }
            | Self::ImmutableRebind { span, .. }
            | Self::DivByZeroConst { span } => *span,
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

/// Errors raised while executing a compiled `BcProgram`.
///
/// Each variant carries the bytecode offset of the opcode that raised it, so
/// an embedder can map it back through the `Code`'s location table if it
/// wants a traceback; the core itself never attempts recovery.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum RuntimeError {
    #[error("division by zero at instruction {pc}")]
    DivideByZero { pc: usize },

    #[error("lookup index {index} out of bounds (len {len}) at instruction {pc}")]
    LookupOutOfBounds { index: i64, len: usize, pc: usize },

    #[error("dict has no key '{key}' at instruction {pc}")]
    DictKeyMissing { key: String, pc: usize },

    #[error("string index {index} out of bounds (len {len}) at instruction {pc}")]
    StringIndexOutOfBounds { index: i64, len: usize, pc: usize },

    #[error("json value has unexpected shape at instruction {pc}: {message}")]
    JsonTypeMismatch { message: String, pc: usize },

    #[error("host function {id} failed: {message}")]
    HostFunctionError { id: u32, message: String },
}

impl RuntimeError {
    /// Returns the bytecode offset that raised this error, when one is known.
    ///
    /// `HostFunctionError` has no single opcode to blame since it's raised
    /// from inside the host's own code, not a VM dispatch arm.
    #[must_use]
    pub fn pc(&self) -> Option<usize> {
        match self {
            Self::DivideByZero { pc }
            | Self::LookupOutOfBounds { pc, .. }
            | Self::DictKeyMissing { pc, .. }
            | Self::StringIndexOutOfBounds { pc, .. }
            | Self::JsonTypeMismatch { pc, .. } => Some(*pc),
            Self::HostFunctionError { .. } => None,
        }
    }
}

pub type RunResult<T> = Result<T, RuntimeError>;
