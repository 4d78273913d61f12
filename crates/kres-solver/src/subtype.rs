//! Subtype relation.
//!
//! Rules, in order of precedence:
//! - `ERROR` is compatible in both directions
//! - `Nothing` is the bottom, `Any?` the top
//! - `T <: U?` iff `T <: U` (or `T` is nullable and `T! <: U`)
//! - Intersections: `A & B <: U` if any member is, `T <: A & B` if all are
//! - Integer literal types are subtypes of every integral type containing the value
//! - Class types walk the supertype graph, then compare arguments by declared variance
//! - Function types: parameters contravariant, return covariant, with the
//!   extension receiver treated as the first parameter
//! - Type parameters are subtypes of their upper bounds; inference
//!   variables are only related to themselves

use crate::instantiate::{TypeSubstitution, instantiate_type};
use crate::intern::TypeInterner;
use crate::types::*;
use kres_common::limits::MAX_SUBTYPE_DEPTH;

/// Whether `sub <: sup`.
pub fn is_subtype(db: &TypeInterner, sub: TypeId, sup: TypeId) -> bool {
    SubtypeChecker::new(db).check(sub, sup)
}

/// Mutual subtyping.
pub fn is_equal(db: &TypeInterner, a: TypeId, b: TypeId) -> bool {
    a == b || (is_subtype(db, a, b) && is_subtype(db, b, a))
}

/// Arguments of `target` as seen from `ty`'s supertype graph, e.g.
/// `supertype_as(MutableList<Int>, Iterable) == [Int]`.
///
/// Returns `None` when `target` is not a supertype of `ty`.
pub fn supertype_as(db: &TypeInterner, ty: TypeId, target: ClassId) -> Option<TypeList> {
    supertype_as_inner(db, ty, target, 0)
}

fn supertype_as_inner(db: &TypeInterner, ty: TypeId, target: ClassId, depth: u32) -> Option<TypeList> {
    if depth > MAX_SUBTYPE_DEPTH {
        return None;
    }
    match db.lookup(ty)? {
        TypeData::Class { class, args } => {
            if class == target {
                return Some(args);
            }
            if target == ClassId::ANY {
                return Some(TypeList::new());
            }
            let info = db.class_info(class)?;
            let params: Vec<TypeParamId> = info.type_params.iter().map(|p| p.id).collect();
            let subst = TypeSubstitution::from_params(&params, &args);
            info.supertypes.iter().find_map(|&supertype| {
                let supertype = instantiate_type(db, supertype, &subst);
                supertype_as_inner(db, supertype, target, depth + 1)
            })
        }
        TypeData::IntegerLiteral(value) => {
            supertype_as_inner(db, integer_literal_default(value), target, depth + 1)
        }
        TypeData::Intersection(members) => members
            .iter()
            .find_map(|&member| supertype_as_inner(db, member, target, depth + 1)),
        TypeData::Param(param) => db
            .type_param_bounds(param)
            .into_iter()
            .find_map(|bound| supertype_as_inner(db, bound, target, depth + 1)),
        TypeData::Function(_) if target == ClassId::ANY => Some(TypeList::new()),
        _ => None,
    }
}

pub struct SubtypeChecker<'a> {
    db: &'a TypeInterner,
    depth: u32,
}

impl<'a> SubtypeChecker<'a> {
    pub fn new(db: &'a TypeInterner) -> Self {
        SubtypeChecker { db, depth: 0 }
    }

    pub fn check(&mut self, sub: TypeId, sup: TypeId) -> bool {
        if sub == sup || sub.is_error() || sup.is_error() || sup == TypeId::NULLABLE_ANY {
            return true;
        }
        if self.depth >= MAX_SUBTYPE_DEPTH {
            return false;
        }
        self.depth += 1;
        let result = self.check_inner(sub, sup);
        self.depth -= 1;
        result
    }

    fn check_inner(&mut self, sub: TypeId, sup: TypeId) -> bool {
        let db = self.db;
        let (Some(sub_data), Some(sup_data)) = (db.lookup(sub), db.lookup(sup)) else {
            return true;
        };

        if matches!(sub_data, TypeData::Nothing) {
            return true;
        }
        if sub == TypeId::NULLABLE_NOTHING {
            return db.accepts_null(sup);
        }
        if let TypeData::Intersection(members) = &sup_data {
            return members.iter().all(|&member| self.check(sub, member));
        }

        match (&sub_data, &sup_data) {
            (TypeData::Nullable(inner), TypeData::Nullable(sup_inner)) => {
                return self.check(*inner, *sup_inner);
            }
            (TypeData::Nullable(_), _) => return false,
            (_, TypeData::Nullable(sup_inner)) => {
                if self.check(sub, *sup_inner) {
                    return true;
                }
            }
            _ => {}
        }

        match sub_data {
            TypeData::Intersection(members) => members.iter().any(|&member| self.check(member, sup)),
            TypeData::Var(_) => false,
            TypeData::Param(param) => db
                .type_param_bounds(param)
                .into_iter()
                .any(|bound| self.check(bound, sup)),
            TypeData::IntegerLiteral(value) => {
                let target = match sup_data {
                    TypeData::Nullable(inner) => inner,
                    _ => sup,
                };
                if integral_type_contains(target, value) {
                    return true;
                }
                self.check(integer_literal_default(value), sup)
            }
            TypeData::Class { .. } => self.check_class(sub, sup, &sup_data),
            TypeData::Function(function) => match sup_data {
                TypeData::Function(sup_function) => self.check_function(&function, &sup_function),
                TypeData::Class { .. } | TypeData::Nullable(_) => {
                    sup == TypeId::ANY || sup == TypeId::NULLABLE_ANY
                }
                _ => false,
            },
            TypeData::Error | TypeData::Nothing => true,
            TypeData::Nullable(_) => false,
        }
    }

    fn check_class(&mut self, sub: TypeId, sup: TypeId, sup_data: &TypeData) -> bool {
        let TypeData::Class {
            class: target,
            args: sup_args,
        } = sup_data
        else {
            return false;
        };
        let Some(sub_args) = supertype_as(self.db, sub, *target) else {
            return false;
        };
        let Some(info) = self.db.class_info(*target) else {
            return sub == sup;
        };
        info.type_params
            .iter()
            .zip(sub_args.iter().zip(sup_args.iter()))
            .all(|(param, (&a, &b))| match param.variance {
                Variance::Out => self.check(a, b),
                Variance::In => self.check(b, a),
                Variance::Invariant => a == b || (self.check(a, b) && self.check(b, a)),
            })
    }

    fn check_function(&mut self, sub: &FunctionType, sup: &FunctionType) -> bool {
        let sub_params = sub.flat_params();
        let sup_params = sup.flat_params();
        if sub_params.len() != sup_params.len() {
            return false;
        }
        sub_params
            .iter()
            .zip(sup_params.iter())
            .all(|(&a, &b)| self.check(b, a))
            && self.check(sub.ret, sup.ret)
    }
}

#[cfg(test)]
#[path = "../tests/subtype_tests.rs"]
mod tests;
