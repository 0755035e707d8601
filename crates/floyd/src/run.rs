//! The embedder-facing API: source text in, a runnable `BcProgram` out, then
//! an `Interpreter` to drive it (spec.md §1 "Embedding", §4 "Compiler
//! pipeline"). Deliberately simple — one-shot compile, one-shot interpreter
//! construction, ordinary function calls — with no pause/resume machinery,
//! since nothing in this core's surface calls a host function that needs to
//! suspend execution mid-call.

use crate::analyser;
use crate::bytecode::{self, BcProgram};
use crate::error::{CompileResult, RunResult, RuntimeError};
use crate::interp::{HostFunctions, Interpreter, NoHostFunctions};
use crate::parser;
use crate::resolve;
use crate::value::Value;

/// Compiles Floyd source into a program ready to run. Runs the full
/// pipeline: lex/parse, resolve named types, analyse (type-check, fold
/// constants, resolve names), generate bytecode.
pub fn compile(source: &str) -> CompileResult<BcProgram> {
    let program = parser::parse(source)?;
    let structs = resolve::build_struct_defs(&program)?;
    let typed = analyser::analyse(&program)?;
    Ok(bytecode::generate(&typed, structs))
}

/// Options for constructing an `Interpreter`. Currently only lets the
/// embedder supply a `HostFunctions` impl; `Default` wires up
/// `NoHostFunctions` for programs that call none.
pub struct RunOptions {
    pub host: Box<dyn HostFunctions>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            host: Box::new(NoHostFunctions),
        }
    }
}

/// Builds an `Interpreter` for `program`, running its globals' initializers
/// as part of construction (spec.md §4.4 "globals are initialized once,
/// before `main` runs").
pub fn new_interpreter(program: BcProgram, options: RunOptions) -> RunResult<Interpreter> {
    Interpreter::new(program, options.host)
}

/// Calls a named top-level function with the given arguments.
///
/// # Errors
/// Returns `RuntimeError::HostFunctionError` (the catch-all id 0) if no
/// function named `name` exists — this is a caller/embedder error, not a
/// Floyd-level runtime fault, so it doesn't warrant its own variant.
pub fn call_function(interp: &mut Interpreter, name: &str, args: Vec<Value>) -> RunResult<Value> {
    let (index, _) = interp.program().find_function(name).ok_or_else(|| RuntimeError::HostFunctionError {
        id: 0,
        message: format!("no function named '{name}'"),
    })?;
    interp.call_function_index(index, args)
}

/// Calls the program's `main` function with no arguments, the common
/// embedding entry point (spec.md §8 "running a program").
pub fn run_main(interp: &mut Interpreter) -> RunResult<Value> {
    call_function(interp, "main", Vec::new())
}

/// Looks up a global `bind`'s current value by its source name.
#[must_use]
pub fn find_global<'a>(interp: &'a Interpreter, name: &str) -> Option<&'a Value> {
    let index = interp.program().find_global(name)?;
    Some(interp.global_value(index))
}

/// Debug snapshot of an interpreter (spec.md §6 "`interpreter_to_json`"):
/// program summary plus the currently open call stack. Synchronous calls
/// unwind before returning control to the embedder, so this reflects live
/// state only while inspected from inside a host function; after an error
/// propagates back out, the call stack it shows is already empty.
#[must_use]
pub fn interpreter_to_json(interp: &Interpreter) -> serde_json::Value {
    interp.to_json()
}
