//! Floyd: a small, statically-typed, value-oriented scripting language.
//!
//! This crate is the execution core: lexing and parsing, semantic analysis,
//! bytecode generation, and the register-based virtual machine that runs the
//! result. File I/O, argument parsing, and the concrete host-function
//! library all live with the embedder (see `floyd-cli`).

mod analyser;
mod ast;
mod bytecode;
mod error;
mod heap;
mod host_signatures;
mod interp;
mod lexer;
mod parser;
mod resolve;
mod run;
mod span;
mod symbol;
mod typed_ast;
mod typeid;
mod value;

pub use bytecode::{BcProgram, Opcode};
pub use error::{CompileError, CompileResult, RunResult, RuntimeError};
pub use heap::{Heap, HeapData, HeapId};
pub use interp::{ArgValues, HostFunctions, Interpreter, NoHostFunctions};
pub use run::{call_function, compile, find_global, interpreter_to_json, new_interpreter, run_main, RunOptions};
pub use span::Span;
pub use typeid::{StructDefs, StructShape, TypeId};
pub use value::Value;
