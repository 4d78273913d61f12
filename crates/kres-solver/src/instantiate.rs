//! Generic type instantiation and substitution.
//!
//! `TypeSubstitution` maps declared type parameters and inference variables
//! to types; `instantiate_type` rebuilds a type with the mapping applied.
//! Unmapped parameters and variables are left in place.

use crate::intern::TypeInterner;
use crate::lub::intersection;
use crate::types::*;
use rustc_hash::FxHashMap;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeSubstitution {
    params: FxHashMap<TypeParamId, TypeId>,
    vars: FxHashMap<TypeVarId, TypeId>,
}

impl TypeSubstitution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `params[i]` to `args[i]`; extra entries on either side are ignored.
    pub fn from_params(params: &[TypeParamId], args: &[TypeId]) -> Self {
        let mut subst = Self::new();
        for (&param, &arg) in params.iter().zip(args) {
            subst.insert_param(param, arg);
        }
        subst
    }

    pub fn insert_param(&mut self, param: TypeParamId, ty: TypeId) {
        self.params.insert(param, ty);
    }

    pub fn insert_var(&mut self, var: TypeVarId, ty: TypeId) {
        self.vars.insert(var, ty);
    }

    pub fn get_param(&self, param: TypeParamId) -> Option<TypeId> {
        self.params.get(&param).copied()
    }

    pub fn get_var(&self, var: TypeVarId) -> Option<TypeId> {
        self.vars.get(&var).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.vars.is_empty()
    }

    /// Parameter mappings sorted by parameter id.
    pub fn param_entries(&self) -> Vec<(TypeParamId, TypeId)> {
        let mut entries: Vec<_> = self.params.iter().map(|(&p, &t)| (p, t)).collect();
        entries.sort_unstable_by_key(|&(param, _)| param);
        entries
    }

    /// Variable mappings sorted by variable id.
    pub fn var_entries(&self) -> Vec<(TypeVarId, TypeId)> {
        let mut entries: Vec<_> = self.vars.iter().map(|(&v, &t)| (v, t)).collect();
        entries.sort_unstable_by_key(|&(var, _)| var);
        entries
    }
}

/// Apply `subst` to `ty`.
pub fn instantiate_type(db: &TypeInterner, ty: TypeId, subst: &TypeSubstitution) -> TypeId {
    if subst.is_empty() {
        return ty;
    }
    let Some(data) = db.lookup(ty) else {
        return ty;
    };
    match data {
        TypeData::Param(param) => subst.get_param(param).unwrap_or(ty),
        TypeData::Var(var) => subst.get_var(var).unwrap_or(ty),
        TypeData::Class { class, args } => {
            if args.is_empty() {
                return ty;
            }
            let new_args: TypeList = args
                .iter()
                .map(|&arg| instantiate_type(db, arg, subst))
                .collect();
            if new_args == args {
                ty
            } else {
                db.class_type(class, new_args)
            }
        }
        TypeData::Nullable(inner) => {
            let new_inner = instantiate_type(db, inner, subst);
            if new_inner == inner {
                ty
            } else {
                db.make_nullable(new_inner)
            }
        }
        TypeData::Function(function) => {
            let receiver = function
                .receiver
                .map(|receiver| instantiate_type(db, receiver, subst));
            let params: TypeList = function
                .params
                .iter()
                .map(|&param| instantiate_type(db, param, subst))
                .collect();
            let ret = instantiate_type(db, function.ret, subst);
            db.function_type(receiver, params, ret)
        }
        TypeData::Intersection(members) => {
            let new_members: TypeList = members
                .iter()
                .map(|&member| instantiate_type(db, member, subst))
                .collect();
            if new_members == members {
                ty
            } else {
                intersection(db, &new_members)
            }
        }
        TypeData::Error | TypeData::Nothing | TypeData::IntegerLiteral(_) => ty,
    }
}
