//! Type traversal.
//!
//! A small visitor over `TypeData` plus the queries the constraint system
//! and resolver need most: which inference variables a type mentions and
//! whether it still mentions declared type parameters.

use crate::intern::TypeInterner;
use crate::types::{TypeData, TypeId, TypeParamId, TypeVarId};
use rustc_hash::FxHashSet;

// =============================================================================
// Type Visitor Trait
// =============================================================================

/// Pre-order structural traversal. `enter` returns `false` to skip the
/// children of a node.
pub trait TypeVisitor {
    fn enter(&mut self, ty: TypeId, data: &TypeData) -> bool;
}

pub fn walk_type<V: TypeVisitor>(db: &TypeInterner, ty: TypeId, visitor: &mut V) {
    let Some(data) = db.lookup(ty) else {
        return;
    };
    if !visitor.enter(ty, &data) {
        return;
    }
    match &data {
        TypeData::Class { args, .. } => {
            for &arg in args {
                walk_type(db, arg, visitor);
            }
        }
        TypeData::Nullable(inner) => walk_type(db, *inner, visitor),
        TypeData::Function(function) => {
            if let Some(receiver) = function.receiver {
                walk_type(db, receiver, visitor);
            }
            for &param in &function.params {
                walk_type(db, param, visitor);
            }
            walk_type(db, function.ret, visitor);
        }
        TypeData::Intersection(members) => {
            for &member in members {
                walk_type(db, member, visitor);
            }
        }
        TypeData::Error
        | TypeData::Nothing
        | TypeData::Param(_)
        | TypeData::Var(_)
        | TypeData::IntegerLiteral(_) => {}
    }
}

// =============================================================================
// Convenience queries
// =============================================================================

struct VarCollector<'a> {
    seen: FxHashSet<TypeVarId>,
    out: &'a mut Vec<TypeVarId>,
}

impl TypeVisitor for VarCollector<'_> {
    fn enter(&mut self, _ty: TypeId, data: &TypeData) -> bool {
        if let TypeData::Var(var) = data
            && self.seen.insert(*var)
        {
            self.out.push(*var);
        }
        true
    }
}

/// Inference variables mentioned by `ty`, in first-occurrence order.
pub fn collect_type_vars(db: &TypeInterner, ty: TypeId) -> Vec<TypeVarId> {
    let mut out = Vec::new();
    let mut collector = VarCollector {
        seen: FxHashSet::default(),
        out: &mut out,
    };
    walk_type(db, ty, &mut collector);
    out
}

struct Finder<F: FnMut(&TypeData) -> bool> {
    predicate: F,
    found: bool,
}

impl<F: FnMut(&TypeData) -> bool> TypeVisitor for Finder<F> {
    fn enter(&mut self, _ty: TypeId, data: &TypeData) -> bool {
        if self.found {
            return false;
        }
        if (self.predicate)(data) {
            self.found = true;
            return false;
        }
        true
    }
}

fn any_node(db: &TypeInterner, ty: TypeId, predicate: impl FnMut(&TypeData) -> bool) -> bool {
    let mut finder = Finder {
        predicate,
        found: false,
    };
    walk_type(db, ty, &mut finder);
    finder.found
}

pub fn contains_type_vars(db: &TypeInterner, ty: TypeId) -> bool {
    any_node(db, ty, |data| matches!(data, TypeData::Var(_)))
}

pub fn contains_type_var(db: &TypeInterner, ty: TypeId, var: TypeVarId) -> bool {
    any_node(db, ty, |data| matches!(data, TypeData::Var(v) if *v == var))
}

pub fn contains_type_param(db: &TypeInterner, ty: TypeId, param: TypeParamId) -> bool {
    any_node(db, ty, |data| matches!(data, TypeData::Param(p) if *p == param))
}

pub fn contains_error(db: &TypeInterner, ty: TypeId) -> bool {
    any_node(db, ty, |data| matches!(data, TypeData::Error))
}
