//! Constraint system for call-site type inference using Union-Find.
//!
//! Each call candidate gets its own `ConstraintSystem`. Declared type
//! parameters become inference variables; receiver, argument and
//! expected-type relations become subtype constraints on them.
//!
//! Key features:
//! - Structural decomposition (class arguments by variance, function
//!   parameters contravariantly, nullability)
//! - Incorporation: every new bound is checked against every opposite bound
//!   of the same variable (`L <: T` and `T <: U` imply `L <: U`)
//! - Variables proven equal are merged with `ena`'s Union-Find
//! - Foreign variables (owned by an enclosing system) are recorded but
//!   never fixed
//! - `fork()` is copy-on-write: bound lists are `Rc`-shared
//!
//! Fixation lives in `infer_resolve`.

use crate::format::TypeFormatter;
use crate::instantiate::{TypeSubstitution, instantiate_type};
use crate::intern::TypeInterner;
use crate::lub::is_empty_intersection;
use crate::subtype::{is_subtype, supertype_as};
use crate::types::*;
use crate::visitor::{collect_type_vars, contains_type_vars};
use ena::unify::{InPlaceUnificationTable, NoError, UnifyKey, UnifyValue};
use kres_common::limits::{MAX_CONSTRAINT_RECURSION_DEPTH, MAX_INCORPORATION_STEPS};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Union-Find key of a variable inside one system.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct VarKey(pub(crate) u32);

/// Wrapper for the fixed type to implement UnifyValue (avoiding orphan rule)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct FixedType(pub(crate) Option<TypeId>);

impl UnifyKey for VarKey {
    type Value = FixedType;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        VarKey(u)
    }

    fn tag() -> &'static str {
        "VarKey"
    }
}

impl UnifyValue for FixedType {
    type Error = NoError;

    fn unify_values(a: &Self, b: &Self) -> Result<Self, Self::Error> {
        match (a.0, b.0) {
            (None, None) => Ok(FixedType(None)),
            (Some(t), None) | (None, Some(t)) => Ok(FixedType(Some(t))),
            (Some(a), Some(_)) => Ok(FixedType(Some(a))),
        }
    }
}

// =============================================================================
// Constraints
// =============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// `ty <: var`
    Lower,
    /// `var <: ty`
    Upper,
    /// `var == ty`
    Equal,
}

/// Where a constraint came from; carried into diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintPosition {
    Receiver,
    Argument { index: u32 },
    ExpectedType,
    DeclaredUpperBound { param: TypeParamId },
    LambdaReturn { argument: u32 },
    CallableReference { argument: u32 },
    Injected,
    Fixation,
    Incorporation,
}

impl ConstraintPosition {
    pub fn argument_index(self) -> Option<u32> {
        match self {
            ConstraintPosition::Argument { index } => Some(index),
            ConstraintPosition::LambdaReturn { argument }
            | ConstraintPosition::CallableReference { argument } => Some(argument),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub ty: TypeId,
    pub position: ConstraintPosition,
}

impl Constraint {
    pub fn is_derived(&self) -> bool {
        matches!(
            self.position,
            ConstraintPosition::Incorporation | ConstraintPosition::Fixation
        )
    }
}

/// Bounds of one variable (or one class of variables proven equal).
#[derive(Clone, Debug, Default)]
pub struct VariableConstraints {
    constraints: Vec<Constraint>,
}

impl VariableConstraints {
    pub fn all(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn lower(&self) -> impl Iterator<Item = &Constraint> + '_ {
        self.of_kind(ConstraintKind::Lower)
    }

    pub fn upper(&self) -> impl Iterator<Item = &Constraint> + '_ {
        self.of_kind(ConstraintKind::Upper)
    }

    pub fn equal(&self) -> impl Iterator<Item = &Constraint> + '_ {
        self.of_kind(ConstraintKind::Equal)
    }

    fn of_kind(&self, kind: ConstraintKind) -> impl Iterator<Item = &Constraint> + '_ {
        self.constraints.iter().filter(move |c| c.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub(crate) fn push_fixation(&mut self, ty: TypeId) {
        self.constraints.push(Constraint {
            kind: ConstraintKind::Equal,
            ty,
            position: ConstraintPosition::Fixation,
        });
    }

    fn contains(&self, kind: ConstraintKind, ty: TypeId) -> bool {
        self.constraints.iter().any(|c| c.kind == kind && c.ty == ty)
    }
}

/// Constraint system error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstraintError {
    /// `lower <: upper` was required and is false.
    Contradiction {
        var: Option<TypeVarId>,
        lower: TypeId,
        upper: TypeId,
        position: ConstraintPosition,
    },
    /// The proper upper bounds of a variable cannot be inhabited together.
    EmptyIntersection { var: TypeVarId, bounds: Vec<TypeId> },
    /// A variable had no usable bound at fixation.
    NotEnoughInformation { var: TypeVarId },
    /// Incorporation kept producing derived constraints.
    IncorporationLimit,
}

impl ConstraintError {
    pub fn var(&self) -> Option<TypeVarId> {
        match self {
            ConstraintError::Contradiction { var, .. } => *var,
            ConstraintError::EmptyIntersection { var, .. }
            | ConstraintError::NotEnoughInformation { var } => Some(*var),
            ConstraintError::IncorporationLimit => None,
        }
    }
}

/// Provenance of a constraint being added. Derived constraints are recorded
/// with the `Incorporation` position, but errors they produce blame the
/// position of the constraint that triggered them.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Origin {
    pub(crate) position: ConstraintPosition,
    pub(crate) derived: bool,
    pub(crate) var: Option<TypeVarId>,
}

impl Origin {
    fn direct(position: ConstraintPosition) -> Self {
        Origin {
            position,
            derived: false,
            var: None,
        }
    }

    fn derive(self, var: TypeVarId) -> Self {
        Origin {
            derived: true,
            var: Some(var),
            ..self
        }
    }

    fn recorded_position(self) -> ConstraintPosition {
        if self.derived && !matches!(self.position, ConstraintPosition::Fixation) {
            ConstraintPosition::Incorporation
        } else {
            self.position
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct VarEntry {
    pub(crate) var: TypeVarId,
    pub(crate) foreign: bool,
}

// =============================================================================
// Constraint System
// =============================================================================

#[derive(Clone)]
pub struct ConstraintSystem {
    pub(crate) table: InPlaceUnificationTable<VarKey>,
    /// Registration order; index == `VarKey` index.
    pub(crate) entries: Vec<VarEntry>,
    pub(crate) index: FxHashMap<TypeVarId, VarKey>,
    /// Bounds per key; only root keys carry bounds.
    pub(crate) bounds: Vec<Rc<VariableConstraints>>,
    pub(crate) fixed: Rc<FxHashMap<TypeVarId, TypeId>>,
    pub(crate) fixation_order: Vec<TypeVarId>,
    pub(crate) errors: Vec<ConstraintError>,
    steps: u32,
}

impl fmt::Debug for ConstraintSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintSystem")
            .field("variables", &self.entries)
            .field("fixation_order", &self.fixation_order)
            .field("errors", &self.errors)
            .finish()
    }
}

impl Default for ConstraintSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintSystem {
    pub fn new() -> Self {
        ConstraintSystem {
            table: InPlaceUnificationTable::new(),
            entries: Vec::new(),
            index: FxHashMap::default(),
            bounds: Vec::new(),
            fixed: Rc::new(FxHashMap::default()),
            fixation_order: Vec::new(),
            errors: Vec::new(),
            steps: 0,
        }
    }

    /// Independent copy. Bound lists stay shared until either side writes.
    pub fn fork(&self) -> ConstraintSystem {
        self.clone()
    }

    // =========================================================================
    // Variables
    // =========================================================================

    /// Registers `var` as owned by this system (a foreign registration of
    /// the same variable is upgraded).
    pub fn register_variable(&mut self, var: TypeVarId) {
        match self.index.get(&var) {
            Some(&key) => self.entries[key.0 as usize].foreign = false,
            None => {
                self.push_entry(var, false);
            }
        }
    }

    pub fn register_foreign_variable(&mut self, var: TypeVarId) {
        if !self.index.contains_key(&var) {
            self.push_entry(var, true);
        }
    }

    fn push_entry(&mut self, var: TypeVarId, foreign: bool) -> VarKey {
        let key = self.table.new_key(FixedType(None));
        debug_assert_eq!(key.0 as usize, self.entries.len());
        self.entries.push(VarEntry { var, foreign });
        self.bounds.push(Rc::new(VariableConstraints::default()));
        self.index.insert(var, key);
        if let Some(&ty) = self.fixed.get(&var) {
            self.table.union_value(key, FixedType(Some(ty)));
        }
        key
    }

    pub fn knows(&self, var: TypeVarId) -> bool {
        self.index.contains_key(&var)
    }

    pub fn owns(&self, var: TypeVarId) -> bool {
        self.index
            .get(&var)
            .is_some_and(|key| !self.entries[key.0 as usize].foreign)
    }

    pub fn is_foreign(&self, var: TypeVarId) -> bool {
        self.index
            .get(&var)
            .is_some_and(|key| self.entries[key.0 as usize].foreign)
    }

    /// Owned variables in registration order.
    pub fn owned_variables(&self) -> Vec<TypeVarId> {
        self.entries
            .iter()
            .filter(|entry| !entry.foreign)
            .map(|entry| entry.var)
            .collect()
    }

    pub fn foreign_variables(&self) -> Vec<TypeVarId> {
        self.entries
            .iter()
            .filter(|entry| entry.foreign)
            .map(|entry| entry.var)
            .collect()
    }

    pub(crate) fn key_of(&mut self, var: TypeVarId) -> VarKey {
        match self.index.get(&var) {
            Some(&key) => key,
            None => self.push_entry(var, true),
        }
    }

    pub(crate) fn root_key(&mut self, var: TypeVarId) -> VarKey {
        let key = self.key_of(var);
        self.table.find(key)
    }

    /// Representative of the class of variables proven equal to `var`.
    pub fn representative(&mut self, var: TypeVarId) -> TypeVarId {
        let root = self.root_key(var);
        self.entries[root.0 as usize].var
    }

    /// All variables merged with `var`, including itself, in registration order.
    pub fn equivalence_class(&mut self, var: TypeVarId) -> Vec<TypeVarId> {
        let root = self.root_key(var);
        let mut members = Vec::new();
        for index in 0..self.entries.len() {
            if self.table.find(VarKey(index as u32)) == root {
                members.push(self.entries[index].var);
            }
        }
        members
    }

    pub fn is_fixed(&self, var: TypeVarId) -> bool {
        self.fixed.contains_key(&var)
    }

    pub fn fixed_type(&self, var: TypeVarId) -> Option<TypeId> {
        self.fixed.get(&var).copied()
    }

    /// Bounds of `var`'s equivalence class.
    pub fn constraints_of(&mut self, var: TypeVarId) -> &VariableConstraints {
        let root = self.root_key(var);
        &self.bounds[root.0 as usize]
    }

    pub fn errors(&self) -> &[ConstraintError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn fixation_order(&self) -> &[TypeVarId] {
        &self.fixation_order
    }

    pub(crate) fn record_error(&mut self, error: ConstraintError) {
        if !self.errors.contains(&error) {
            trace!(?error, "constraint error recorded");
            self.errors.push(error);
        }
    }

    // =========================================================================
    // Substitution
    // =========================================================================

    /// Fixed variables mapped to their types.
    pub fn current_substitution(&self) -> TypeSubstitution {
        let mut subst = TypeSubstitution::new();
        for (&var, &ty) in self.fixed.iter() {
            subst.insert_var(var, ty);
        }
        subst
    }

    /// Applies the current substitution.
    pub fn substitute(&self, db: &TypeInterner, ty: TypeId) -> TypeId {
        if self.fixed.is_empty() {
            return ty;
        }
        instantiate_type(db, ty, &self.current_substitution())
    }

    /// Whether `ty` mentions no unfixed variable.
    pub fn is_proper(&self, db: &TypeInterner, ty: TypeId) -> bool {
        !contains_type_vars(db, self.substitute(db, ty))
    }

    /// Unfixed variables mentioned by `ty`, in first-occurrence order.
    pub fn unfixed_vars_in(&self, db: &TypeInterner, ty: TypeId) -> Vec<TypeVarId> {
        collect_type_vars(db, self.substitute(db, ty))
    }

    // =========================================================================
    // Adding constraints
    // =========================================================================

    /// Requires `lower <: upper`.
    pub fn add_subtype_constraint(
        &mut self,
        db: &TypeInterner,
        lower: TypeId,
        upper: TypeId,
        position: ConstraintPosition,
    ) {
        self.constrain(db, lower, upper, Origin::direct(position), 0);
    }

    /// Requires `a == b`.
    pub fn add_equality_constraint(
        &mut self,
        db: &TypeInterner,
        a: TypeId,
        b: TypeId,
        position: ConstraintPosition,
    ) {
        self.equate(db, a, b, Origin::direct(position), 0);
    }

    pub(crate) fn contradiction(&mut self, lower: TypeId, upper: TypeId, origin: Origin) {
        self.record_error(ConstraintError::Contradiction {
            var: origin.var,
            lower,
            upper,
            position: origin.position,
        });
    }

    pub(crate) fn constrain(
        &mut self,
        db: &TypeInterner,
        lower: TypeId,
        upper: TypeId,
        origin: Origin,
        depth: u32,
    ) {
        let lower = self.substitute(db, lower);
        let upper = self.substitute(db, upper);
        if lower == upper || lower.is_error() || upper.is_error() || upper == TypeId::NULLABLE_ANY {
            return;
        }
        if depth > MAX_CONSTRAINT_RECURSION_DEPTH {
            self.contradiction(lower, upper, origin);
            return;
        }
        let (Some(lower_data), Some(upper_data)) = (db.lookup(lower), db.lookup(upper)) else {
            return;
        };

        match (&lower_data, &upper_data) {
            (_, TypeData::Var(var)) => {
                self.add_bound(db, *var, ConstraintKind::Lower, lower, origin, depth);
                if let TypeData::Var(lower_var) = &lower_data {
                    self.add_bound(db, *lower_var, ConstraintKind::Upper, upper, origin, depth);
                }
            }
            (TypeData::Var(var), _) => {
                self.add_bound(db, *var, ConstraintKind::Upper, upper, origin, depth);
            }
            (TypeData::Nothing, _) => {}
            (_, TypeData::Intersection(members)) => {
                for &member in members {
                    self.constrain(db, lower, member, origin, depth + 1);
                }
            }
            (TypeData::Nullable(inner), TypeData::Nullable(upper_inner)) => {
                self.constrain(db, *inner, *upper_inner, origin, depth + 1);
            }
            (TypeData::Nullable(inner), _) => {
                if db.accepts_null(upper) {
                    self.constrain(db, *inner, upper, origin, depth + 1);
                } else {
                    self.contradiction(lower, upper, origin);
                }
            }
            (_, TypeData::Nullable(upper_inner)) => {
                if !contains_type_vars(db, upper) && is_subtype(db, lower, upper) {
                    return;
                }
                self.constrain(db, lower, *upper_inner, origin, depth + 1);
            }
            _ if !contains_type_vars(db, lower) && !contains_type_vars(db, upper) => {
                if !is_subtype(db, lower, upper) {
                    self.contradiction(lower, upper, origin);
                }
            }
            (TypeData::Intersection(members), _) => {
                let target = db.class_of(upper);
                let reaching = members.iter().copied().find(|&member| {
                    target.is_some_and(|class| supertype_as(db, member, class).is_some())
                });
                let variable = members
                    .iter()
                    .copied()
                    .find(|&member| matches!(db.lookup(member), Some(TypeData::Var(_))));
                match reaching.or(variable) {
                    Some(member) => self.constrain(db, member, upper, origin, depth + 1),
                    None => self.contradiction(lower, upper, origin),
                }
            }
            (TypeData::IntegerLiteral(value), _) => {
                self.constrain(db, integer_literal_default(*value), upper, origin, depth + 1);
            }
            (TypeData::Param(param), _) => {
                let target = db.class_of(upper);
                let bound = db.type_param_bounds(*param).into_iter().find(|&bound| {
                    target.is_some_and(|class| supertype_as(db, bound, class).is_some())
                });
                match bound {
                    Some(bound) => self.constrain(db, bound, upper, origin, depth + 1),
                    None => self.contradiction(lower, upper, origin),
                }
            }
            (TypeData::Class { .. }, TypeData::Class { class, args }) => {
                let Some(lower_args) = supertype_as(db, lower, *class) else {
                    self.contradiction(lower, upper, origin);
                    return;
                };
                let Some(info) = db.class_info(*class) else {
                    return;
                };
                for (param, (&a, &b)) in info
                    .type_params
                    .iter()
                    .zip(lower_args.iter().zip(args.iter()))
                {
                    match param.variance {
                        Variance::Out => self.constrain(db, a, b, origin, depth + 1),
                        Variance::In => self.constrain(db, b, a, origin, depth + 1),
                        Variance::Invariant => self.equate(db, a, b, origin, depth + 1),
                    }
                }
            }
            (TypeData::Function(sub), TypeData::Function(sup)) => {
                let sub_params = sub.flat_params();
                let sup_params = sup.flat_params();
                if sub_params.len() != sup_params.len() {
                    self.contradiction(lower, upper, origin);
                    return;
                }
                for (&a, &b) in sub_params.iter().zip(sup_params.iter()) {
                    self.constrain(db, b, a, origin, depth + 1);
                }
                self.constrain(db, sub.ret, sup.ret, origin, depth + 1);
            }
            _ => self.contradiction(lower, upper, origin),
        }
    }

    pub(crate) fn equate(&mut self, db: &TypeInterner, a: TypeId, b: TypeId, origin: Origin, depth: u32) {
        let a = self.substitute(db, a);
        let b = self.substitute(db, b);
        if a == b || a.is_error() || b.is_error() {
            return;
        }
        match (db.lookup(a), db.lookup(b)) {
            (Some(TypeData::Var(var)), _) => {
                self.add_bound(db, var, ConstraintKind::Equal, b, origin, depth);
            }
            (_, Some(TypeData::Var(var))) => {
                self.add_bound(db, var, ConstraintKind::Equal, a, origin, depth);
            }
            _ => {
                self.constrain(db, a, b, origin, depth + 1);
                self.constrain(db, b, a, origin, depth + 1);
            }
        }
    }

    /// Records a bound on `var` and incorporates it against the existing
    /// opposite bounds.
    pub(crate) fn add_bound(
        &mut self,
        db: &TypeInterner,
        var: TypeVarId,
        kind: ConstraintKind,
        ty: TypeId,
        origin: Origin,
        depth: u32,
    ) {
        let root = self.root_key(var);
        let root_var = self.entries[root.0 as usize].var;

        if let Some(fixed) = self.fixed_type(root_var) {
            match kind {
                ConstraintKind::Lower => self.constrain(db, ty, fixed, origin, depth + 1),
                ConstraintKind::Upper => self.constrain(db, fixed, ty, origin, depth + 1),
                ConstraintKind::Equal => self.equate(db, fixed, ty, origin, depth + 1),
            }
            return;
        }

        if let Some(TypeData::Var(other)) = db.lookup(ty) {
            if self.root_key(other) == root {
                return;
            }
            if kind == ConstraintKind::Equal {
                self.unify_variables(db, root_var, other, origin, depth);
                return;
            }
        }

        let slot = root.0 as usize;
        if self.bounds[slot].contains(kind, ty) {
            return;
        }
        self.steps += 1;
        if self.steps > MAX_INCORPORATION_STEPS {
            self.record_error(ConstraintError::IncorporationLimit);
            return;
        }

        let constraint = Constraint {
            kind,
            ty,
            position: origin.recorded_position(),
        };
        trace!(
            var = root_var.0,
            kind = ?kind,
            ty = %TypeFormatter::new(db).format(ty),
            position = ?constraint.position,
            "bound added"
        );
        let existing: Vec<Constraint> = self.bounds[slot].constraints.clone();
        Rc::make_mut(&mut self.bounds[slot]).constraints.push(constraint);

        let derived = origin.derive(root_var);
        for other in existing {
            match (kind, other.kind) {
                (ConstraintKind::Lower, ConstraintKind::Upper)
                | (ConstraintKind::Lower, ConstraintKind::Equal) => {
                    self.constrain(db, ty, other.ty, derived, depth + 1);
                }
                (ConstraintKind::Upper, ConstraintKind::Lower)
                | (ConstraintKind::Equal, ConstraintKind::Lower) => {
                    self.constrain(db, other.ty, ty, derived, depth + 1);
                }
                (ConstraintKind::Upper, ConstraintKind::Equal) => {
                    self.constrain(db, other.ty, ty, derived, depth + 1);
                }
                (ConstraintKind::Equal, ConstraintKind::Upper) => {
                    self.constrain(db, ty, other.ty, derived, depth + 1);
                }
                (ConstraintKind::Equal, ConstraintKind::Equal) => {
                    self.equate(db, ty, other.ty, derived, depth + 1);
                }
                (ConstraintKind::Lower, ConstraintKind::Lower)
                | (ConstraintKind::Upper, ConstraintKind::Upper) => {}
            }
        }

        if kind == ConstraintKind::Upper {
            self.check_upper_bounds(db, root_var);
        }
    }

    /// Merges the classes of two variables proven equal; the merged class
    /// re-incorporates both bound sets.
    fn unify_variables(
        &mut self,
        db: &TypeInterner,
        a: TypeVarId,
        b: TypeVarId,
        origin: Origin,
        depth: u32,
    ) {
        let ra = self.root_key(a);
        let rb = self.root_key(b);
        if ra == rb {
            return;
        }
        let b_var = self.entries[rb.0 as usize].var;
        if let Some(fixed) = self.fixed_type(b_var) {
            let a_ty = db.var_type(a);
            self.equate(db, a_ty, fixed, origin, depth + 1);
            return;
        }
        trace!(a = a.0, b = b.0, "variables unified");

        let a_bounds = std::mem::take(&mut self.bounds[ra.0 as usize]);
        let b_bounds = std::mem::take(&mut self.bounds[rb.0 as usize]);
        self.table.union(ra, rb);
        let root = self.table.find(ra);
        let root_var = self.entries[root.0 as usize].var;

        for constraint in a_bounds.all().iter().chain(b_bounds.all()) {
            let replay = Origin {
                position: constraint.position,
                derived: false,
                var: origin.var,
            };
            self.add_bound(db, root_var, constraint.kind, constraint.ty, replay, depth + 1);
        }
    }

    /// Records `EmptyIntersection` once the proper upper bounds of a
    /// variable can no longer be inhabited together.
    fn check_upper_bounds(&mut self, db: &TypeInterner, var: TypeVarId) {
        let uppers: Vec<TypeId> = self
            .constraints_of(var)
            .upper()
            .map(|c| c.ty)
            .collect();
        let proper: Vec<TypeId> = uppers
            .into_iter()
            .map(|ty| self.substitute(db, ty))
            .filter(|&ty| !contains_type_vars(db, ty))
            .collect();
        if proper.len() < 2 {
            return;
        }
        let reported = self
            .errors
            .iter()
            .any(|error| matches!(error, ConstraintError::EmptyIntersection { var: v, .. } if *v == var));
        if !reported && is_empty_intersection(db, &proper) {
            self.record_error(ConstraintError::EmptyIntersection { var, bounds: proper });
        }
    }

    // =========================================================================
    // Combining systems
    // =========================================================================

    /// Merges a nested call's partially completed system into this one.
    ///
    /// The nested system's variables must not be owned by this system; its
    /// constraints on variables this system already knows are replayed
    /// through incorporation.
    pub fn absorb(&mut self, db: &TypeInterner, mut other: ConstraintSystem) {
        for entry in &other.entries {
            assert!(
                entry.foreign || !self.owns(entry.var),
                "absorbed system shares owned variable {:?}",
                entry.var
            );
        }

        let entries = other.entries.clone();
        for entry in &entries {
            if entry.foreign {
                self.register_foreign_variable(entry.var);
            } else {
                self.register_variable(entry.var);
            }
        }

        // Fixed values of the nested system stay fixed.
        let other_fixed: Vec<(TypeVarId, TypeId)> = other.current_substitution().var_entries();
        for &(var, ty) in &other_fixed {
            if !self.is_fixed(var) && !self.is_foreign(var) {
                self.assign_fixed(var, ty);
            }
        }
        for var in &other.fixation_order {
            if !self.fixation_order.contains(var) {
                self.fixation_order.push(*var);
            }
        }

        let origin = Origin::direct(ConstraintPosition::Injected);
        for entry in &entries {
            let representative = other.representative(entry.var);
            if representative != entry.var {
                let ty = db.var_type(representative);
                self.add_bound(db, entry.var, ConstraintKind::Equal, ty, origin, 0);
            }
        }
        for entry in &entries {
            if other.representative(entry.var) != entry.var {
                continue;
            }
            let constraints: Vec<Constraint> = other.constraints_of(entry.var).all().to_vec();
            for constraint in constraints {
                let replay = Origin::direct(constraint.position);
                self.add_bound(db, entry.var, constraint.kind, constraint.ty, replay, 0);
            }
        }

        for error in other.errors {
            self.record_error(error);
        }
    }

    /// Copies the constraints of `other` on variables in `shared` whose
    /// types mention only shared variables and proper types. Returns the
    /// number of constraints injected.
    pub fn inject_from(
        &mut self,
        db: &TypeInterner,
        other: &mut ConstraintSystem,
        shared: &FxHashSet<TypeVarId>,
    ) -> usize {
        let mut injected = 0;
        let origin = Origin::direct(ConstraintPosition::Injected);
        let entries = other.entries.clone();
        for entry in entries {
            if !shared.contains(&entry.var) {
                continue;
            }
            let constraints: Vec<Constraint> = other.constraints_of(entry.var).all().to_vec();
            for constraint in constraints {
                let ty = other.substitute(db, constraint.ty);
                let mentions_only_shared = collect_type_vars(db, ty)
                    .iter()
                    .all(|var| shared.contains(var));
                if !mentions_only_shared {
                    continue;
                }
                self.add_bound(db, entry.var, constraint.kind, ty, origin, 0);
                injected += 1;
            }
        }
        trace!(injected, "constraints injected");
        injected
    }

    pub(crate) fn assign_fixed(&mut self, var: TypeVarId, ty: TypeId) {
        let root = self.root_key(var);
        self.table.union_value(root, FixedType(Some(ty)));
        let members = self.equivalence_class(var);
        let fixed = Rc::make_mut(&mut self.fixed);
        for member in members {
            fixed.insert(member, ty);
        }
    }
}

#[cfg(test)]
#[path = "../tests/infer_tests.rs"]
mod tests;
