//! The runtime value representation (spec.md §3 "Value", §4.5 "inline vs
//! ext storage"). Small values (bool, int, float) live inline in a frame
//! slot; everything else is a ref-counted `Ref(HeapId)` into `Heap`.
//!
//! `Clone` is intentionally not derived: cloning a `Ref` without bumping its
//! refcount is a leak/use-after-free waiting to happen, so every copy must
//! go through `clone_with_heap`.

use std::fmt;

use crate::heap::{Heap, HeapData, HeapId};
use crate::typeid::TypeId;

#[derive(Debug)]
pub enum Value {
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    Ref(HeapId),
}

impl Value {
    #[must_use]
    pub fn clone_with_heap(&self, heap: &mut Heap) -> Self {
        match self {
            Self::Ref(id) => {
                heap.inc_ref(*id);
                Self::Ref(*id)
            }
            Self::Undefined => Self::Undefined,
            Self::Bool(b) => Self::Bool(*b),
            Self::Int(v) => Self::Int(*v),
            Self::Float(v) => Self::Float(*v),
        }
    }

    pub fn drop_with_heap(self, heap: &mut Heap) {
        if let Self::Ref(id) = self {
            heap.dec_ref(id);
        }
    }

    #[must_use]
    pub fn type_of(&self, heap: &Heap) -> TypeId {
        match self {
            Self::Undefined => TypeId::Undefined,
            Self::Bool(_) => TypeId::Bool,
            Self::Int(_) => TypeId::Int,
            Self::Float(_) => TypeId::Float,
            Self::Ref(id) => match heap.get(*id) {
                HeapData::String(_) => TypeId::String,
                HeapData::Json(_) => TypeId::JsonValue,
                HeapData::Typeid(_) => TypeId::Typeid,
                HeapData::Struct { type_name, .. } => TypeId::Struct(type_name.clone()),
                HeapData::Vector { element_type, .. } => TypeId::vector(element_type.clone()),
                HeapData::Dict { value_type, .. } => TypeId::dict(value_type.clone()),
                HeapData::Function(_) => TypeId::Function {
                    ret: Box::new(TypeId::Dynamic),
                    args: Vec::new(),
                    is_pure: false,
                },
            },
        }
    }

    #[must_use]
    pub fn eq_with_heap(&self, other: &Self, heap: &Heap) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Ref(a), Self::Ref(b)) => {
                if a == b {
                    return true;
                }
                match (heap.get(*a), heap.get(*b)) {
                    (HeapData::String(s1), HeapData::String(s2)) => s1 == s2,
                    (HeapData::Json(j1), HeapData::Json(j2)) => j1 == j2,
                    (HeapData::Typeid(t1), HeapData::Typeid(t2)) => t1 == t2,
                    (
                        HeapData::Struct { type_name: n1, members: m1 },
                        HeapData::Struct { type_name: n2, members: m2 },
                    ) => n1 == n2 && m1.iter().zip(m2).all(|(x, y)| x.eq_with_heap(y, heap)),
                    (HeapData::Vector { items: i1, .. }, HeapData::Vector { items: i2, .. }) => {
                        i1.len() == i2.len() && i1.iter().zip(i2).all(|(x, y)| x.eq_with_heap(y, heap))
                    }
                    (HeapData::Dict { entries: e1, .. }, HeapData::Dict { entries: e2, .. }) => {
                        e1.len() == e2.len()
                            && e1.iter().all(|(k, v)| {
                                e2.iter().any(|(k2, v2)| k == k2 && v.eq_with_heap(v2, heap))
                            })
                    }
                    (HeapData::Function(a), HeapData::Function(b)) => a == b,
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// String conversion for the host `to_string`/`print` surface
    /// (spec.md §6 "host function library").
    #[must_use]
    pub fn display_with_heap(&self, heap: &Heap) -> String {
        match self {
            Self::Undefined => "<undefined>".to_owned(),
            Self::Bool(b) => b.to_string(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => {
                let s = v.to_string();
                if s.contains('.') || s.contains('e') {
                    s
                } else {
                    format!("{s}.0")
                }
            }
            Self::Ref(id) => match heap.get(*id) {
                HeapData::String(s) => s.clone(),
                HeapData::Json(j) => j.to_string(),
                HeapData::Typeid(t) => format!("{t:?}"),
                HeapData::Struct { type_name, members } => {
                    let parts = members.iter().map(|m| m.display_with_heap(heap)).collect::<Vec<_>>();
                    format!("{type_name}({})", parts.join(", "))
                }
                HeapData::Vector { items, .. } => {
                    let parts = items.iter().map(|m| m.display_with_heap(heap)).collect::<Vec<_>>();
                    format!("[{}]", parts.join(", "))
                }
                HeapData::Dict { entries, .. } => {
                    let parts = entries
                        .iter()
                        .map(|(k, v)| format!("\"{k}\": {}", v.display_with_heap(heap)))
                        .collect::<Vec<_>>();
                    format!("{{{}}}", parts.join(", "))
                }
                HeapData::Function(idx) => format!("<function #{idx}>"),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "<undefined>"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Ref(id) => write!(f, "<ref #{id}>"),
        }
    }
}
