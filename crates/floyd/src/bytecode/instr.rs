//! The instruction set (spec.md §4.3 "Opcode set (minimum)").
//!
//! spec.md describes a fixed 64-bit encoding (`opcode:u8, instr_type:u16,
//! reg1/reg2/reg3:(i16,i16)`), but the listed opcodes don't uniformly need
//! three register operands plus a jump offset plus a type-table index in
//! that shape — `branch_zero` wants an offset, `construct_value` wants a
//! type-table index, `lookup_element` wants a parent type tag. Packing all
//! of those into one fixed 64-bit word only matters if the bytecode crosses
//! a process/ABI boundary raw; this core never does (the on-disk format
//! below round-trips through `postcard`, not raw memory), so each opcode
//! gets exactly the typed fields it needs. See DESIGN.md for this call.

use crate::typeid::TypeId;

/// A resolved variable address, spec.md §4.4 "Variable addressing":
/// `parent_steps = -1` means the globals frame, `0` the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Reg {
    pub parent_steps: i16,
    pub index: u16,
}

impl Reg {
    #[must_use]
    pub fn local(index: u16) -> Self {
        Self {
            parent_steps: 0,
            index,
        }
    }

    #[must_use]
    pub fn global(index: u16) -> Self {
        Self {
            parent_steps: -1,
            index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arithmetic {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Opcode {
    /// Loads a known-at-compile-time literal into `dst` (spec.md §4.4
    /// "Open frame ... push its compile-time constant").
    LoadConstInt { dst: Reg, value: i64 },
    LoadConstFloat { dst: Reg, value: f64 },
    LoadConstBool { dst: Reg, value: bool },
    /// `value` indexes the program's deduplicated string pool.
    LoadConstString { dst: Reg, value: u32 },
    /// `ty_index` indexes the program's deduplicated type table; used for
    /// the companion typeid slot a `dynamic`-typed argument needs ahead of
    /// its value slot (spec.md §4.2/§4.3/§9 "2-slot dynamic argument
    /// convention").
    LoadConstTypeId { dst: Reg, ty_index: u16 },
    /// Initializes a global slot holding a function value directly, since a
    /// named function binding has no source-level initializer expression to
    /// run (spec.md §4.2 "functions are ordinary global bindings").
    LoadConstFunction { dst: Reg, func_index: u32 },

    /// Type-generic copy; RC-bumps the source and RC-drops the previous
    /// occupant of `dst` when `dst`'s declared type is ext (spec.md §4.5).
    StoreResolve { dst: Reg, src: Reg },

    Return { src: Reg },

    /// Temporary-stack opcodes named in spec.md §4.3; this generator always
    /// materializes call/construct argument lists into pre-allocated,
    /// contiguous frame slots instead, so these are never emitted today —
    /// kept so the dispatch loop matches the opcode set spec.md names.
    Push { src: Reg },
    PopN { count: u16 },

    BranchZero { test: Reg, offset: i32 },
    Jump { offset: i32 },

    ResolveMember { dst: Reg, object: Reg, member_index: u16 },
    LookupElement { dst: Reg, object: Reg, index: Reg },

    /// `reg2 = callee`; `reg2+1 ..= reg2+arg_count` hold the arguments
    /// (spec.md §4.4 "Calling convention").
    Call { dst: Reg, callee: Reg, arg_count: u16 },

    ConstructValue { dst: Reg, ty: TypeId, args: Reg, arg_count: u16 },

    Comparison { op: Comparison, dst: Reg, left: Reg, right: Reg },
    LogicalEqual { dst: Reg, left: Reg, right: Reg },
    LogicalNotEqual { dst: Reg, left: Reg, right: Reg },
    LogicalAnd { dst: Reg, left: Reg, right: Reg },
    LogicalOr { dst: Reg, left: Reg, right: Reg },

    Arithmetic { op: Arithmetic, dst: Reg, left: Reg, right: Reg },
    /// Not named explicitly in spec.md's opcode list, but required to lower
    /// unary minus; implemented as its own opcode rather than synthesizing
    /// a `0 - x` subtraction so float negation doesn't need a fake zero
    /// register.
    Negate { dst: Reg, src: Reg },

    /// Vector/dict literal construction: `dst = [elements[0], elements[1],
    /// ...]` read from `start .. start+count` contiguous registers.
    BuildVector { dst: Reg, start: Reg, count: u16 },
    /// `keys` indexes a contiguous run of string-pool ids, parallel to
    /// `start .. start+count` value registers.
    BuildDict { dst: Reg, keys: Vec<u32>, start: Reg, count: u16 },
}
