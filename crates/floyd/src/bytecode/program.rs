//! The compiled artifact (spec.md §3 "Program", §6 "Bytecode on-disk
//! layout"): a deduplicated type table, the globals frame + its init code,
//! and one `FunctionDef` per function (Floyd-defined or host).

use crate::bytecode::instr::Opcode;
use crate::typeid::{StructDefs, TypeId, TypeTable};

/// Per-frame layout: every slot's type, in declaration order, plus the
/// precomputed bit for whether each slot holds a ref-counted `ext` payload
/// (spec.md §3 "Stack frame", §4.5 "`ext_bits`").
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct FrameLayout {
    pub slot_types: Vec<TypeId>,
    pub ext_bits: Vec<bool>,
}

impl FrameLayout {
    #[must_use]
    pub fn from_slot_types(slot_types: Vec<TypeId>) -> Self {
        let ext_bits = slot_types.iter().map(TypeId::is_ext).collect();
        Self { slot_types, ext_bits }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slot_types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slot_types.is_empty()
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub param_count: usize,
    pub ret: TypeId,
    pub frame: FrameLayout,
    pub code: Vec<Opcode>,
    /// Non-zero for a host function; `code` is empty in that case and the
    /// VM dispatches to the embedder's `HostFunctions` table instead of
    /// executing a frame (spec.md §4.4 "Host calls").
    pub host_function_id: u32,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct BcProgram {
    pub types: TypeTable,
    pub structs: StructDefs,
    /// Deduplicated string literal pool; `LoadConstString`/`BuildDict` keys
    /// refer into this by index.
    pub strings: Vec<String>,
    pub globals: FrameLayout,
    /// Parallel to `globals.slot_types`; lets `find_global` resolve a name to
    /// a slot index without the core carrying a general symbol table.
    pub global_names: Vec<String>,
    pub globals_code: Vec<Opcode>,
    pub functions: Vec<FunctionDef>,
    /// Names of host functions this program calls, indexed by
    /// `host_function_id - 1` (spec.md §1 "host-function dispatch table
    /// keyed by integer function ID").
    pub host_function_names: Vec<String>,
}

impl BcProgram {
    #[must_use]
    pub fn find_function(&self, name: &str) -> Option<(u32, &FunctionDef)> {
        self.functions
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
            .map(|(i, f)| (u32::try_from(i).expect("function table overflow"), f))
    }

    #[must_use]
    pub fn find_global(&self, name: &str) -> Option<u16> {
        self.global_names
            .iter()
            .position(|n| n == name)
            .map(|i| u16::try_from(i).expect("globals frame overflow"))
    }
}
