//! The bytecode interpreter (spec.md §4.4 "Execution", §6 "Host function
//! library"). `vm::Interpreter` owns the heap and globals for one program
//! run; `host` is the embedder-facing seam, `frame` the stack-frame
//! lifecycle helpers the VM calls into on every function entry/exit.

mod frame;
mod host;
mod vm;

pub use host::{ArgValues, HostFunctions, NoHostFunctions};
pub use vm::Interpreter;
