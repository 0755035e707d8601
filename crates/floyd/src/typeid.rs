//! The `typeid` sum type (spec.md §3) and the deduplicated type table that
//! bytecode instructions index into (spec.md §4.3, §6).

use std::collections::HashMap;

/// A Floyd type. Value-comparable and hashable, per spec.md §3.
///
/// Struct types are nominal: two `Struct` values are equal iff their names
/// match (structs are declared once, globally, so the name alone is a stable
/// identity). Vector, dict and function types are structural: they compare
/// equal whenever their shapes recursively match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TypeId {
    Undefined,
    Dynamic,
    Void,
    Bool,
    Int,
    Float,
    String,
    JsonValue,
    Typeid,
    Struct(String),
    Vector(Box<TypeId>),
    Dict(Box<TypeId>),
    Function {
        ret: Box<TypeId>,
        args: Vec<TypeId>,
        is_pure: bool,
    },
    UnresolvedName(String),
}

impl TypeId {
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// Whether a value of this type is stored as an `ext` (reference-counted
    /// heap) payload rather than inline, per spec.md §4.5.
    #[must_use]
    pub fn is_ext(&self) -> bool {
        matches!(
            self,
            Self::String
                | Self::JsonValue
                | Self::Typeid
                | Self::Struct(_)
                | Self::Vector(_)
                | Self::Dict(_)
                | Self::Function { .. }
        )
    }

    #[must_use]
    pub fn vector(element: TypeId) -> Self {
        Self::Vector(Box::new(element))
    }

    #[must_use]
    pub fn dict(value_type: TypeId) -> Self {
        Self::Dict(Box::new(value_type))
    }
}

/// A struct type's declared shape: members in declaration order.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StructShape {
    pub name: String,
    pub members: Vec<(String, TypeId)>,
}

impl StructShape {
    #[must_use]
    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|(n, _)| n == name)
    }

    #[must_use]
    pub fn member_type(&self, index: usize) -> Option<&TypeId> {
        self.members.get(index).map(|(_, t)| t)
    }
}

/// Global table of struct definitions, built during pass-2 (spec.md §4.1/4.2:
/// "resolve named types"). Consulted by the analyser and generator whenever a
/// `TypeId::Struct(name)` needs its member shape.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct StructDefs {
    by_name: HashMap<String, StructShape>,
}

impl StructDefs {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StructShape> {
        self.by_name.get(name)
    }

    pub fn insert(&mut self, shape: StructShape) {
        self.by_name.insert(shape.name.clone(), shape);
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}

/// Deduplicated table of types referenced by a compiled program, addressed
/// by 16-bit index (spec.md §3, §6 "Bytecode on-disk layout").
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TypeTable {
    types: Vec<TypeId>,
    index_of: HashMap<TypeId, u16>,
}

impl TypeTable {
    pub fn intern(&mut self, ty: TypeId) -> u16 {
        if let Some(&idx) = self.index_of.get(&ty) {
            return idx;
        }
        let idx = u16::try_from(self.types.len()).expect("type table overflow (> 65535 distinct types)");
        self.index_of.insert(ty.clone(), idx);
        self.types.push(ty);
        idx
    }

    #[must_use]
    pub fn get(&self, index: u16) -> &TypeId {
        &self.types[index as usize]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
