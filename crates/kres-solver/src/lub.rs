//! Least upper bounds and intersections.
//!
//! `common_supertype` computes the type a variable is fixed to from its
//! lower bounds: nullability is factored out, integer literal types are
//! adapted to the integral types around them, and class types meet at
//! their most specific common supertypes (covariant arguments combined
//! recursively). Several incomparable common supertypes yield their
//! intersection.

use crate::instantiate::{TypeSubstitution, instantiate_type};
use crate::intern::TypeInterner;
use crate::subtype::{is_subtype, supertype_as};
use crate::types::*;
use kres_common::limits::MAX_COMMON_SUPERTYPE_DEPTH;
use smallvec::SmallVec;
use std::collections::VecDeque;

pub fn common_supertype(db: &TypeInterner, types: &[TypeId]) -> TypeId {
    common_supertype_inner(db, types, 0)
}

fn common_supertype_inner(db: &TypeInterner, types: &[TypeId], depth: u32) -> TypeId {
    if types.iter().any(|ty| ty.is_error()) {
        return TypeId::ERROR;
    }

    let mut nullable = false;
    let mut stripped: Vec<TypeId> = Vec::with_capacity(types.len());
    for &ty in types {
        let ty = match db.lookup(ty) {
            Some(TypeData::Nullable(inner)) => {
                nullable = true;
                inner
            }
            _ => ty,
        };
        if ty != TypeId::NOTHING && !stripped.contains(&ty) {
            stripped.push(ty);
        }
    }
    let wrap = |ty: TypeId| if nullable { db.make_nullable(ty) } else { ty };

    if stripped.is_empty() {
        return if nullable {
            TypeId::NULLABLE_NOTHING
        } else {
            TypeId::NOTHING
        };
    }
    if depth > MAX_COMMON_SUPERTYPE_DEPTH {
        return wrap(TypeId::ANY);
    }

    let stripped = adapt_integer_literals(db, &stripped);
    if stripped.len() == 1 {
        return wrap(stripped[0]);
    }

    // One of the types is already a supertype of all others.
    if let Some(&top) = stripped
        .iter()
        .find(|&&candidate| stripped.iter().all(|&ty| is_subtype(db, ty, candidate)))
    {
        return wrap(top);
    }

    if stripped
        .iter()
        .all(|&ty| matches!(db.lookup(ty), Some(TypeData::Class { .. })))
    {
        return wrap(common_class_supertype(db, &stripped, depth));
    }

    wrap(TypeId::ANY)
}

/// Replaces integer literal types with the integral type they adapt to:
/// an integral type already among `types` that contains every literal,
/// otherwise the literal default (`Int`, or `Long` out of range).
fn adapt_integer_literals(db: &TypeInterner, types: &[TypeId]) -> Vec<TypeId> {
    let literals: SmallVec<[i64; 4]> = types
        .iter()
        .filter_map(|&ty| match db.lookup(ty) {
            Some(TypeData::IntegerLiteral(value)) => Some(value),
            _ => None,
        })
        .collect();
    if literals.is_empty() {
        return types.to_vec();
    }

    let fits_all = |candidate: TypeId| literals.iter().all(|&v| integral_type_contains(candidate, v));
    let adapted = INTEGRAL_TYPES
        .iter()
        .copied()
        .find(|&integral| types.contains(&integral) && fits_all(integral))
        .unwrap_or_else(|| {
            if fits_all(TypeId::INT) {
                TypeId::INT
            } else {
                TypeId::LONG
            }
        });

    let mut out = Vec::with_capacity(types.len());
    for &ty in types {
        let ty = match db.lookup(ty) {
            Some(TypeData::IntegerLiteral(_)) => adapted,
            _ => ty,
        };
        if !out.contains(&ty) {
            out.push(ty);
        }
    }
    out
}

/// Supertype closure of a class type, breadth-first (nearest first),
/// with class arguments substituted.
fn supertype_closure(db: &TypeInterner, ty: TypeId) -> Vec<TypeId> {
    let mut out = Vec::new();
    let mut queue = VecDeque::from([ty]);
    while let Some(current) = queue.pop_front() {
        if out.contains(&current) {
            continue;
        }
        out.push(current);
        let Some(TypeData::Class { class, args }) = db.lookup(current) else {
            continue;
        };
        let Some(info) = db.class_info(class) else {
            continue;
        };
        let params: Vec<TypeParamId> = info.type_params.iter().map(|p| p.id).collect();
        let subst = TypeSubstitution::from_params(&params, &args);
        for &supertype in &info.supertypes {
            queue.push_back(instantiate_type(db, supertype, &subst));
        }
    }
    if !out.contains(&TypeId::ANY) {
        out.push(TypeId::ANY);
    }
    out
}

fn common_class_supertype(db: &TypeInterner, types: &[TypeId], depth: u32) -> TypeId {
    let mut common: Vec<TypeId> = Vec::new();
    for candidate in supertype_closure(db, types[0]) {
        let Some(class) = db.class_of(candidate) else {
            continue;
        };
        let Some(info) = db.class_info(class) else {
            continue;
        };
        let per_type: Option<Vec<TypeList>> = types
            .iter()
            .map(|&ty| supertype_as(db, ty, class))
            .collect();
        let Some(per_type) = per_type else {
            continue;
        };

        let mut args = TypeList::new();
        let mut representable = true;
        for (index, param) in info.type_params.iter().enumerate() {
            let column: Vec<TypeId> = per_type.iter().map(|args| args[index]).collect();
            let first = column[0];
            if column.iter().all(|&arg| arg == first) {
                args.push(first);
                continue;
            }
            match param.variance {
                Variance::Out => args.push(common_supertype_inner(db, &column, depth + 1)),
                // Without projections there is no common instantiation.
                Variance::In | Variance::Invariant => {
                    representable = false;
                    break;
                }
            }
        }
        if representable {
            let ty = db.class_type(class, args);
            if !common.contains(&ty) {
                common.push(ty);
            }
        }
    }

    // Keep only the most specific common supertypes.
    let minimal: TypeList = common
        .iter()
        .copied()
        .filter(|&candidate| {
            !common
                .iter()
                .any(|&other| other != candidate && is_subtype(db, other, candidate))
        })
        .collect();
    match minimal.len() {
        0 => TypeId::ANY,
        1 => minimal[0],
        _ => intersection(db, &minimal),
    }
}

/// Simplifying intersection: flattens, drops `Any?`, drops members that are
/// supertypes of other members, and factors nullability (`A? & B` is `A & B`;
/// `A? & B?` is `(A & B)?`).
pub fn intersection(db: &TypeInterner, members: &[TypeId]) -> TypeId {
    let mut flat: Vec<TypeId> = Vec::with_capacity(members.len());
    for &member in members {
        let expanded: TypeList = match db.lookup(member) {
            Some(TypeData::Intersection(inner)) => inner,
            _ => smallvec::smallvec![member],
        };
        for ty in expanded {
            if !flat.contains(&ty) {
                flat.push(ty);
            }
        }
    }
    if flat.iter().any(|ty| ty.is_error()) {
        return TypeId::ERROR;
    }
    flat.retain(|&ty| ty != TypeId::NULLABLE_ANY);
    if flat.is_empty() {
        return TypeId::NULLABLE_ANY;
    }
    if flat.contains(&TypeId::NOTHING) {
        return TypeId::NOTHING;
    }

    let all_nullable = flat.iter().all(|&ty| db.is_marked_nullable(ty));
    let stripped: Vec<TypeId> = flat
        .iter()
        .map(|&ty| match db.lookup(ty) {
            Some(TypeData::Nullable(inner)) => inner,
            _ => ty,
        })
        .collect();

    let mut kept = TypeList::new();
    for (index, &candidate) in stripped.iter().enumerate() {
        let redundant = stripped.iter().enumerate().any(|(other_index, &other)| {
            other_index != index
                && is_subtype(db, other, candidate)
                && (!is_subtype(db, candidate, other) || other_index < index)
        });
        if !redundant && !kept.contains(&candidate) {
            kept.push(candidate);
        }
    }

    let result = db.intersection_raw(kept);
    if all_nullable {
        db.make_nullable(result)
    } else {
        result
    }
}

/// Whether no value (other than `null`, when every bound is nullable) can
/// inhabit all of `types`: two unrelated classes, or a final class and an
/// interface it does not implement.
pub fn is_empty_intersection(db: &TypeInterner, types: &[TypeId]) -> bool {
    if types.iter().any(|ty| ty.is_error()) {
        return false;
    }
    if types.iter().all(|&ty| db.is_marked_nullable(ty)) {
        return false;
    }
    let classes: Vec<(TypeId, ClassId)> = types
        .iter()
        .filter_map(|&ty| {
            let base = match db.lookup(ty)? {
                TypeData::Nullable(inner) => inner,
                TypeData::IntegerLiteral(value) => integer_literal_default(value),
                _ => ty,
            };
            db.class_of(base).map(|class| (base, class))
        })
        .collect();

    for (i, &(a, a_class)) in classes.iter().enumerate() {
        for &(b, b_class) in &classes[i + 1..] {
            if a_class == b_class {
                continue;
            }
            let related = supertype_as(db, a, b_class).is_some() || supertype_as(db, b, a_class).is_some();
            if related {
                continue;
            }
            let (Some(a_info), Some(b_info)) = (db.class_info(a_class), db.class_info(b_class)) else {
                continue;
            };
            let a_interface = a_info.kind == ClassKind::Interface;
            let b_interface = b_info.kind == ClassKind::Interface;
            let disjoint = match (a_interface, b_interface) {
                (false, false) => true,
                (false, true) => a_info.is_final,
                (true, false) => b_info.is_final,
                (true, true) => false,
            };
            if disjoint {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
#[path = "../tests/lub_tests.rs"]
mod tests;
