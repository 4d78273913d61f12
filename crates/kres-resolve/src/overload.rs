//! Most-specific candidate selection.
//!
//! `X` is at least as specific as `Y` when every argument's declared
//! parameter type in `X` is a subtype of the corresponding one in `Y`, with
//! `Y`'s own type parameters replaced by fresh variables. A candidate wins
//! when it is at least as specific as every other and strictly more
//! specific than, or tie-broken against, each of them.

use crate::applicability::CheckedCandidate;
use crate::declarations::DeclId;
use kres_solver::{
    ConstraintPosition, ConstraintSystem, TypeId, TypeInterner, TypeSubstitution, instantiate_type,
};
use tracing::{debug, trace};

pub(crate) enum Disambiguation {
    Unique(Box<CheckedCandidate>),
    Ambiguous(Vec<DeclId>),
}

/// Picks the most specific of several applicable candidates.
pub(crate) fn choose_most_specific(
    db: &TypeInterner,
    mut applicable: Vec<CheckedCandidate>,
) -> Disambiguation {
    if applicable.len() <= 1 {
        return match applicable.pop() {
            Some(only) => Disambiguation::Unique(Box::new(only)),
            None => Disambiguation::Ambiguous(Vec::new()),
        };
    }

    // Fewer literal coercions first.
    let fewest = applicable.iter().map(|c| c.coercions).min().unwrap_or(0);
    applicable.retain(|c| c.coercions == fewest);

    let n = applicable.len();
    let mut not_less = vec![vec![true; n]; n];
    for i in 0..n {
        for j in 0..n {
            if i != j {
                not_less[i][j] = is_not_less_specific(db, &applicable[i], &applicable[j]);
            }
        }
    }
    let beats = |i: usize, j: usize| {
        not_less[i][j] && (!not_less[j][i] || tie_key(&applicable[i]) < tie_key(&applicable[j]))
    };

    let winners: Vec<usize> = (0..n)
        .filter(|&i| (0..n).all(|j| i == j || beats(i, j)))
        .collect();
    // Maximal candidates: nobody beats them.
    let mut maximal: Vec<usize> = (0..n)
        .filter(|&i| (0..n).all(|j| i == j || !beats(j, i)))
        .collect();
    trace!(candidates = n, winners = winners.len(), "specificity compared");
    if let [winner] = winners[..] {
        return Disambiguation::Unique(Box::new(applicable.swap_remove(winner)));
    }

    if let Some(fewest) = maximal
        .iter()
        .map(|&i| applicable[i].candidate.implicit_receivers)
        .min()
    {
        maximal.retain(|&i| applicable[i].candidate.implicit_receivers == fewest);
    }
    if let [winner] = maximal[..] {
        return Disambiguation::Unique(Box::new(applicable.swap_remove(winner)));
    }

    let mut candidates: Vec<DeclId> = if maximal.is_empty() {
        applicable.iter().map(CheckedCandidate::declaration).collect()
    } else {
        maximal.iter().map(|&i| applicable[i].declaration()).collect()
    };
    candidates.sort();
    candidates.dedup();
    debug!(candidates = candidates.len(), "overload ambiguity");
    Disambiguation::Ambiguous(candidates)
}

/// Lower is preferred: non-vararg, non-generic, non-extension, nearer.
fn tie_key(candidate: &CheckedCandidate) -> (bool, bool, bool, u32) {
    let descriptor = candidate.descriptor();
    (
        candidate.vararg_used,
        descriptor.is_generic(),
        candidate.candidate.is_extension(),
        candidate.candidate.level,
    )
}

/// Whether `x` is at least as specific as `y` for the call's arguments.
fn is_not_less_specific(db: &TypeInterner, x: &CheckedCandidate, y: &CheckedCandidate) -> bool {
    let mut system = ConstraintSystem::new();
    let mut substitution = TypeSubstitution::new();
    let y_descriptor = y.descriptor();
    for param in &y_descriptor.type_params {
        let var = db.fresh_type_var(Some(param.id));
        system.register_variable(var);
        substitution.insert_param(param.id, db.var_type(var));
    }
    for param in &y_descriptor.type_params {
        let Some(var_ty) = substitution.get_param(param.id) else {
            continue;
        };
        for &bound in &param.upper_bounds {
            let bound = instantiate_type(db, bound, &substitution);
            system.add_subtype_constraint(
                db,
                var_ty,
                bound,
                ConstraintPosition::DeclaredUpperBound { param: param.id },
            );
        }
    }
    let for_y = |ty: TypeId| instantiate_type(db, ty, &substitution);

    if let (Some(x_receiver), Some(y_receiver)) = (
        x.descriptor().extension_receiver,
        y_descriptor.extension_receiver,
    ) {
        system.add_subtype_constraint(db, x_receiver, for_y(y_receiver), ConstraintPosition::Receiver);
    }

    for (index, (x_param, y_param)) in x
        .declared_parameter_types
        .iter()
        .zip(&y.declared_parameter_types)
        .enumerate()
    {
        if let (Some(x_param), Some(y_param)) = (x_param, y_param) {
            system.add_subtype_constraint(
                db,
                *x_param,
                for_y(*y_param),
                ConstraintPosition::Argument {
                    index: index as u32,
                },
            );
        }
    }
    !system.has_errors()
}

#[cfg(test)]
#[path = "../tests/overload_tests.rs"]
mod tests;
