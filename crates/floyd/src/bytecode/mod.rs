//! The compiled bytecode artifact: opcode set, compiled program shape, and
//! the generator that lowers the typed AST into it (spec.md §4.3).

mod generator;
mod instr;
mod program;

pub use generator::generate;
pub use instr::{Arithmetic, Comparison, Opcode, Reg};
pub use program::{BcProgram, FrameLayout, FunctionDef};
