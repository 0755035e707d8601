//! Symbol tables and scopes built during semantic analysis (spec.md §4.2,
//! §4.4 "Stack frame layout"). A function's runtime frame is flat — one
//! back-pointer slot plus all of its symbols in declaration order — so
//! nested blocks (`if`/`while`/`for` bodies) only matter for *name
//! resolution and shadowing* during analysis; every local a function
//! declares, at any block depth, lives in that one function's frame and is
//! addressed with `parent_steps = 0`. `parent_steps = -1` addresses the
//! globals frame instead (spec.md §4.4 "Variable addressing").

use crate::typeid::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    ImmutableArg,
    ImmutableLocal,
    MutableLocal,
}

impl SymbolKind {
    #[must_use]
    pub fn is_mutable(self) -> bool {
        matches!(self, Self::MutableLocal)
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub value_type: TypeId,
    pub kind: SymbolKind,
}

/// Resolved address of a variable reference (spec.md §4.4): how many
/// enclosing frames to walk outward, and its slot index in that frame.
/// `parent_steps == -1` means "the globals frame" rather than a local one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarAddr {
    pub parent_steps: i16,
    pub index: u16,
}

impl VarAddr {
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

/// Name resolution for one function body: a flat symbol list (the eventual
/// frame layout, arguments first) plus a stack of lexical blocks that only
/// records which names are visible and at which slot, for shadowing.
#[derive(Debug, Default)]
pub struct FunctionScope {
    symbols: Vec<Symbol>,
    blocks: Vec<Vec<(String, u16)>>,
}

impl FunctionScope {
    #[must_use]
    pub fn new() -> Self {
        let mut scope = Self::default();
        scope.blocks.push(Vec::new()); // the function's top-level block
        scope
    }

    pub fn push_block(&mut self) {
        self.blocks.push(Vec::new());
    }

    pub fn pop_block(&mut self) {
        self.blocks.pop().expect("pop_block without matching push_block");
    }

    /// Declares a new local in the innermost block, returning its frame slot.
    pub fn declare(&mut self, name: String, value_type: TypeId, kind: SymbolKind) -> VarAddr {
        let index = u16::try_from(self.symbols.len()).expect("frame overflow (> 65535 locals)");
        self.symbols.push(Symbol {
            name: name.clone(),
            value_type,
            kind,
        });
        self.blocks
            .last_mut()
            .expect("at least one block is always open")
            .push((name, index));
        VarAddr::local(index)
    }

    /// Resolves a name against this function's visible blocks, innermost
    /// first, per spec.md §4.2 "lookup walks outward".
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<(VarAddr, &Symbol)> {
        for block in self.blocks.iter().rev() {
            if let Some(&(_, index)) = block.iter().rev().find(|(n, _)| n == name) {
                return Some((VarAddr::local(index), &self.symbols[index as usize]));
            }
        }
        None
    }

    /// All symbols in declaration order: the function's eventual frame
    /// layout (spec.md §4.4 "slots 1..N hold the frame's symbols").
    #[must_use]
    pub fn into_symbols(self) -> Vec<Symbol> {
        self.symbols
    }

    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }
}

/// The globals frame: every top-level `bind` statement gets a slot here,
/// resolved with `parent_steps = -1` from any function body.
#[derive(Debug, Default)]
pub struct GlobalScope {
    symbols: Vec<Symbol>,
}

impl GlobalScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: String, value_type: TypeId, kind: SymbolKind) -> VarAddr {
        let index = u16::try_from(self.symbols.len()).expect("globals frame overflow");
        self.symbols.push(Symbol {
            name,
            value_type,
            kind,
        });
        VarAddr::global(index)
    }

    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<(VarAddr, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .rev()
            .find(|(_, s)| s.name == name)
            .map(|(i, s)| (VarAddr::global(u16::try_from(i).expect("globals overflow")), s))
    }

    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }
}
