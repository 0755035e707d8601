//! The fixed set of host function signatures the analyser knows about, so
//! `print(x)`/`size(x)`/`update(...)` type-check even though their bodies
//! live outside the core (spec.md §1 "Out of scope: the library of host
//! functions"). Concrete behavior is supplied by the embedder's
//! `HostFunctions` impl at run time; the core only needs enough of a
//! signature to check call sites and to mark `Dynamic` parameters for the
//! 2-slot-per-dynamic-arg convention (spec.md §4.2/§9).
//!
//! This table is deliberately small — just the functions spec.md names as
//! examples (`print`, `update`, `size`) plus the couple of others
//! `original_source/FloydSpeak`'s standard library exposes most often.
//! Embedders may still register host functions under other names; those
//! fail to resolve at compile time today, which is a narrower surface than
//! the original's fully dynamic host registry (see DESIGN.md).

use crate::typeid::TypeId;

pub struct HostSig {
    pub name: &'static str,
    pub ret: TypeId,
    pub params: &'static [TypeId],
}

pub fn lookup(name: &str) -> Option<HostSig> {
    match name {
        "print" => Some(HostSig {
            name: "print",
            ret: TypeId::Void,
            params: &[TypeId::Dynamic],
        }),
        "size" => Some(HostSig {
            name: "size",
            ret: TypeId::Int,
            params: &[TypeId::Dynamic],
        }),
        "update" => Some(HostSig {
            name: "update",
            ret: TypeId::Dynamic,
            params: &[TypeId::Dynamic, TypeId::String, TypeId::Dynamic],
        }),
        "to_pretty_string_json" => Some(HostSig {
            name: "to_pretty_string_json",
            ret: TypeId::String,
            params: &[TypeId::JsonValue],
        }),
        "to_string" => Some(HostSig {
            name: "to_string",
            ret: TypeId::String,
            params: &[TypeId::Dynamic],
        }),
        _ => None,
    }
}
