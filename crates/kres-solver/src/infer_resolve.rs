//! Variable fixation.
//!
//! A variable is fixed to one concrete type computed from its proper
//! bounds, after which the choice is propagated to every bound that still
//! mentions it. Order matters: values flow from lower bounds to variables,
//! so a variable is ready once the variables in its direct lower (and
//! equality) bounds are fixed.

use crate::format::TypeFormatter;
use crate::infer::{
    Constraint, ConstraintError, ConstraintKind, ConstraintPosition, ConstraintSystem, Origin,
};
use crate::intern::TypeInterner;
use crate::lub::{common_supertype, intersection, is_empty_intersection};
use crate::subtype::is_subtype;
use crate::types::*;
use crate::visitor::collect_type_vars;
use fixedbitset::FixedBitSet;
use rustc_hash::FxHashSet;
use std::rc::Rc;
use tracing::debug;

/// Readiness of an unfixed variable; lower sorts first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Readiness {
    /// No unfixed dependency, at least one proper bound.
    Ready,
    /// Unfixed dependencies, but some proper bound.
    HasProperBound,
    /// Dependencies only.
    Blocked,
    /// No bounds at all.
    Unconstrained,
}

impl ConstraintSystem {
    /// Owned, unfixed class representatives in registration order. A class
    /// containing a foreign variable is never fixed here.
    pub fn unfixed_variables(&mut self) -> Vec<TypeVarId> {
        let mut seen = FixedBitSet::with_capacity(self.entries.len());
        let mut foreign_roots = FixedBitSet::with_capacity(self.entries.len());
        for index in 0..self.entries.len() {
            if self.entries[index].foreign {
                let root = self.root_key(self.entries[index].var);
                foreign_roots.insert(root.0 as usize);
            }
        }
        let mut out = Vec::new();
        for index in 0..self.entries.len() {
            let var = self.entries[index].var;
            let root = self.root_key(var).0 as usize;
            if seen.contains(root) || foreign_roots.contains(root) {
                continue;
            }
            seen.insert(root);
            if !self.is_fixed(var) {
                out.push(self.entries[root].var);
            }
        }
        out
    }

    fn readiness(&mut self, db: &TypeInterner, var: TypeVarId) -> Readiness {
        let constraints: Vec<Constraint> = self.constraints_of(var).all().to_vec();
        if constraints.is_empty() {
            return Readiness::Unconstrained;
        }
        let class: FxHashSet<TypeVarId> = self.equivalence_class(var).into_iter().collect();
        let mut has_proper = false;
        let mut blocked = false;
        for constraint in &constraints {
            let vars: Vec<TypeVarId> = self
                .unfixed_vars_in(db, constraint.ty)
                .into_iter()
                .filter(|v| !class.contains(v))
                .collect();
            if vars.is_empty() {
                if constraint.kind != ConstraintKind::Upper
                    || !matches!(constraint.position, ConstraintPosition::DeclaredUpperBound { .. })
                {
                    has_proper = true;
                }
                continue;
            }
            let direct = !constraint.is_derived();
            if direct && constraint.kind != ConstraintKind::Upper {
                blocked = true;
            }
        }
        match (blocked, has_proper) {
            (false, true) => Readiness::Ready,
            (true, true) => Readiness::HasProperBound,
            _ => Readiness::Blocked,
        }
    }

    /// Next variable to fix, optionally restricted to a subset (the input
    /// types of a postponed argument). Ties go to registration order.
    pub fn next_variable_to_fix(
        &mut self,
        db: &TypeInterner,
        restrict_to: Option<&FxHashSet<TypeVarId>>,
    ) -> Option<TypeVarId> {
        let candidates = self.unfixed_variables();
        let mut best: Option<(Readiness, TypeVarId)> = None;
        for var in candidates {
            if let Some(restrict) = restrict_to {
                let class = self.equivalence_class(var);
                if !class.iter().any(|member| restrict.contains(member)) {
                    continue;
                }
            }
            let readiness = self.readiness(db, var);
            if best.is_none_or(|(current, _)| readiness < current) {
                best = Some((readiness, var));
            }
        }
        best.map(|(_, var)| var)
    }

    /// Fixes `var` and propagates the result into the remaining bounds.
    ///
    /// # Panics
    ///
    /// Panics if `var` is not owned by this system or is already fixed.
    pub fn fix_variable(&mut self, db: &TypeInterner, var: TypeVarId) -> TypeId {
        assert!(self.owns(var), "fixing variable {var:?} not owned by this system");
        assert!(!self.is_fixed(var), "type variable {var:?} fixed twice");

        let result = self.fixation_result(db, var);
        let constraints: Vec<Constraint> = self.constraints_of(var).all().to_vec();
        self.assign_fixed(var, result);
        self.fixation_order.push(var);
        debug!(
            var = var.0,
            name = %db.resolve_atom(db.type_var_name(var)),
            result = %TypeFormatter::new(db).format(result),
            "type variable fixed"
        );

        let root = self.root_key(var).0 as usize;
        Rc::make_mut(&mut self.bounds[root]).push_fixation(result);

        for constraint in constraints {
            let origin = Origin {
                position: constraint.position,
                derived: true,
                var: Some(var),
            };
            match constraint.kind {
                ConstraintKind::Lower => self.constrain(db, constraint.ty, result, origin, 0),
                ConstraintKind::Upper => self.constrain(db, result, constraint.ty, origin, 0),
                ConstraintKind::Equal => self.equate(db, constraint.ty, result, origin, 0),
            }
        }
        result
    }

    /// Fixes every remaining owned variable.
    pub fn fix_all(&mut self, db: &TypeInterner) {
        while let Some(var) = self.next_variable_to_fix(db, None) {
            self.fix_variable(db, var);
        }
    }

    /// Result type of fixing `var`:
    /// 1. a proper equality bound
    /// 2. the least upper bound of the proper lower bounds, adapting integer
    ///    literals to the proper upper bounds
    /// 3. the intersection of the proper upper bounds (`EmptyIntersection`
    ///    when uninhabitable)
    /// 4. `ERROR` with `NotEnoughInformation`
    fn fixation_result(&mut self, db: &TypeInterner, var: TypeVarId) -> TypeId {
        let constraints: Vec<Constraint> = self.constraints_of(var).all().to_vec();
        let mut equal = Vec::new();
        let mut lower = Vec::new();
        let mut upper = Vec::new();
        let mut declared_only = true;
        for constraint in &constraints {
            let ty = self.substitute(db, constraint.ty);
            if !collect_type_vars(db, ty).is_empty() {
                continue;
            }
            match constraint.kind {
                ConstraintKind::Equal => equal.push(ty),
                ConstraintKind::Lower => lower.push(ty),
                ConstraintKind::Upper => {
                    if ty == TypeId::NULLABLE_ANY {
                        continue;
                    }
                    if !matches!(constraint.position, ConstraintPosition::DeclaredUpperBound { .. }) {
                        declared_only = false;
                    }
                    if !upper.contains(&ty) {
                        upper.push(ty);
                    }
                }
            }
        }

        if let Some(&ty) = equal.first() {
            return ty;
        }

        if upper.len() >= 2 && is_empty_intersection(db, &upper) {
            self.record_error(ConstraintError::EmptyIntersection {
                var,
                bounds: upper,
            });
            return TypeId::ERROR;
        }

        if !lower.is_empty() {
            if let Some(adapted) = adapt_literals_to_uppers(db, &lower, &upper) {
                return adapted;
            }
            return common_supertype(db, &lower);
        }

        if !upper.is_empty() && !declared_only {
            return intersection(db, &upper);
        }

        self.record_error(ConstraintError::NotEnoughInformation { var });
        TypeId::ERROR
    }
}

/// When every lower bound is an integer literal type, picks `Int` if it
/// satisfies the upper bounds, else the narrowest integral type that holds
/// every literal and satisfies them.
fn adapt_literals_to_uppers(db: &TypeInterner, lower: &[TypeId], upper: &[TypeId]) -> Option<TypeId> {
    let mut values = Vec::with_capacity(lower.len());
    for &ty in lower {
        match db.lookup(ty)? {
            TypeData::IntegerLiteral(value) => values.push(value),
            _ => return None,
        }
    }
    if upper.is_empty() {
        return None;
    }
    let fits = |candidate: TypeId| {
        values.iter().all(|&v| integral_type_contains(candidate, v))
            && upper.iter().all(|&bound| is_subtype(db, candidate, bound))
    };
    if fits(TypeId::INT) {
        return Some(TypeId::INT);
    }
    INTEGRAL_TYPES.iter().copied().find(|&candidate| fits(candidate))
}

#[cfg(test)]
#[path = "../tests/fixation_tests.rs"]
mod tests;
