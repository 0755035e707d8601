//! Pass-2: name resolution (spec.md §4.1 "resolve named types"). Walks the
//! untyped AST once to turn every `TypeExpr` into a `TypeId` and to build the
//! global `StructDefs` table the analyser and generator both consult.
//! Function names are *not* resolved here: globals and functions share one
//! namespace that only the analyser (which also sees call sites) can
//! disambiguate against local shadowing, so pass-2 only handles types.

use std::collections::HashSet;

use crate::ast::{Program, TypeExpr};
use crate::error::{CompileError, CompileResult};
use crate::typeid::{StructDefs, StructShape, TypeId};

const PRIMITIVE_NAMES: &[&str] = &["int", "float", "bool", "string", "json", "typeid", "void"];

pub fn resolve_type_expr(expr: &TypeExpr, structs: &StructDefs) -> TypeId {
    match expr {
        TypeExpr::Name(name) => resolve_name(name, structs),
        TypeExpr::Vector(inner) => TypeId::vector(resolve_type_expr(inner, structs)),
        TypeExpr::Dict(inner) => TypeId::dict(resolve_type_expr(inner, structs)),
    }
}

fn resolve_name(name: &str, structs: &StructDefs) -> TypeId {
    match name {
        "int" => TypeId::Int,
        "float" => TypeId::Float,
        "bool" => TypeId::Bool,
        "string" => TypeId::String,
        "json" => TypeId::JsonValue,
        "typeid" => TypeId::Typeid,
        "void" => TypeId::Void,
        // `dynamic` has no user-facing surface syntax (spec.md §9 Open
        // Questions): it only ever appears on host function signatures in
        // `host_signatures.rs`, never as something a Floyd program can
        // write as a parameter or return type.
        _ if structs.contains(name) => TypeId::Struct(name.to_owned()),
        _ => TypeId::UnresolvedName(name.to_owned()),
    }
}

/// Builds the global struct table and checks for duplicate struct names.
/// Member types are resolved eagerly; a struct referencing another struct
/// that hasn't been registered yet is fine since every struct name is known
/// up front, before any member type is resolved.
pub fn build_struct_defs(program: &Program) -> CompileResult<StructDefs> {
    let mut defs = StructDefs::default();
    let mut seen = HashSet::new();
    for s in &program.structs {
        if !seen.insert(s.name.clone()) {
            return Err(CompileError::Type {
                message: format!("duplicate struct definition '{}'", s.name),
                span: s.span,
            });
        }
        defs.insert(StructShape {
            name: s.name.clone(),
            members: Vec::new(),
        });
    }
    for s in &program.structs {
        let members = s
            .members
            .iter()
            .map(|p| (p.name.clone(), resolve_type_expr(&p.type_expr, &defs)))
            .collect::<Vec<_>>();
        for (name, ty) in &members {
            if matches!(ty, TypeId::UnresolvedName(_)) {
                return Err(CompileError::UndefinedName {
                    name: name.clone(),
                    span: s.span,
                });
            }
        }
        defs.insert(StructShape {
            name: s.name.clone(),
            members,
        });
    }
    Ok(defs)
}

/// Whether `name` denotes a type (primitive or struct) rather than a
/// function — used by the analyser to disambiguate `NAME(args)` between
/// `construct_value` and `call` (spec.md §4.2).
#[must_use]
pub fn is_type_name(name: &str, structs: &StructDefs) -> bool {
    PRIMITIVE_NAMES.contains(&name) || structs.contains(name)
}
