//! Completion of the chosen candidate.
//!
//! Completion drives the winner's constraint system to a solution:
//!
//! ```text
//! ShapeChecked -> ConstraintsSeeded -> LambdaBodiesResolved -> Fixed -> Completed
//! ```
//!
//! Each loop iteration either analyzes one postponed argument whose input
//! types are known, fixes one variable those inputs depend on, or fixes the
//! next ready variable. Only postponed analyses count against
//! `max_completion_iterations`. In partial mode (the call is an argument of another
//! call) variables reachable from the return type stay unfixed and the
//! system is handed to the enclosing call.

use crate::applicability::{ArgumentInfo, ArgumentKind, CheckedCandidate};
use crate::collector::{CandidateKind, ExplicitReceiver};
use crate::config::SafeCallNullability;
use crate::declarations::CallableKind;
use crate::diagnostics::{ClassifierContext, Diagnostic, classify_completion_error};
use crate::expr::ExprId;
use crate::flow::{FlowFact, FlowSubject};
use crate::resolver::{CallSite, ExprContext, ResolutionSession};
use crate::results::{ExprResolution, ResolvedArgument, ResolvedCall, ResolvedCallKind};
use kres_common::Span;
use kres_solver::{
    ConstraintError, ConstraintPosition, ConstraintSystem, INTEGRAL_TYPES, TypeData, TypeId,
    TypeInterner, TypeVarId, integer_literal_default, integral_type_contains, is_subtype,
};
use rustc_hash::FxHashSet;
use std::rc::Rc;
use tracing::{debug, trace};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CompletionMode {
    /// Fix every variable.
    Full,
    /// Leave the variables the result type depends on to the enclosing call.
    Partial,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CompletionState {
    ShapeChecked,
    ConstraintsSeeded,
    LambdaBodiesResolved,
    Fixed,
    Completed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompletionError {
    Constraint(ConstraintError),
    /// The iteration bound ran out.
    RecursionInInference,
    ResultTypeMismatch { expected: TypeId, actual: TypeId },
    /// An integer literal argument does not fit the integral type its
    /// parameter was inferred to.
    LiteralOutOfRange { argument: u32, expected: TypeId, actual: TypeId },
}

/// Builder inference in progress for a lambda with receiver. Completed
/// calls inside the lambda that mention `vars` leave a copy of their system
/// here; the outer call injects their constraints after the lambda.
#[derive(Debug, Default)]
pub(crate) struct BuilderSession {
    pub(crate) vars: FxHashSet<TypeVarId>,
    pub(crate) contributions: Vec<ConstraintSystem>,
    /// Expressions resolved while the session was active.
    pub(crate) touched: Vec<ExprId>,
}

fn advance(state: &mut CompletionState, next: CompletionState) {
    if next > *state {
        trace!(from = ?*state, to = ?next, "completion state");
        *state = next;
    }
}

impl ResolutionSession<'_> {
    pub(crate) fn complete_call(
        &mut self,
        mut checked: CheckedCandidate,
        site: &CallSite,
        explicit: Option<&ExplicitReceiver>,
        arguments: &[ArgumentInfo],
        ctx: &ExprContext,
    ) -> ExprResolution {
        let db = self.db;
        let mut state = CompletionState::ShapeChecked;
        let mut errors: Vec<CompletionError> = Vec::new();

        self.seed_expected_type(&mut checked, site, explicit, ctx);
        advance(&mut state, CompletionState::ConstraintsSeeded);

        // Each fixation removes a variable, so only re-entries into
        // postponed arguments count against the bound.
        let mut rounds = 0;
        loop {
            let next = match self.ready_postponed(&checked) {
                Some(index) => Some(index),
                None if !checked.postponed.is_empty() => {
                    let inputs = self.postponed_inputs(&checked.system, &checked.postponed[0]);
                    if let Some(var) = checked.system.next_variable_to_fix(db, Some(&inputs)) {
                        checked.system.fix_variable(db, var);
                        continue;
                    }
                    // The inputs depend only on variables this call cannot fix.
                    Some(0)
                }
                None => None,
            };
            if let Some(index) = next {
                if rounds >= self.options.max_completion_iterations {
                    errors.push(CompletionError::RecursionInInference);
                    break;
                }
                rounds += 1;
                let postponed = checked.postponed.remove(index);
                self.analyze_postponed(&mut checked, postponed, arguments, ctx);
                advance(&mut state, CompletionState::LambdaBodiesResolved);
                continue;
            }

            let restrict = match ctx.mode {
                CompletionMode::Partial if !checked.system.has_errors() => {
                    Some(partially_fixable(&mut checked.system, db, checked.return_type))
                }
                _ => None,
            };
            match checked.system.next_variable_to_fix(db, restrict.as_ref()) {
                Some(var) => {
                    checked.system.fix_variable(db, var);
                }
                None => break,
            }
        }
        advance(&mut state, CompletionState::Fixed);

        let complete = checked.system.unfixed_variables().is_empty();
        for error in checked.system.errors() {
            let expected_type = matches!(
                error,
                ConstraintError::Contradiction {
                    position: ConstraintPosition::ExpectedType,
                    ..
                }
            );
            if !expected_type {
                errors.push(CompletionError::Constraint(error.clone()));
            }
        }

        let return_type = checked.system.substitute(db, checked.return_type);
        let result = self.safe_call_type(return_type, site, explicit);
        if complete {
            self.check_literal_arguments(&checked, arguments, &mut errors);
            if ctx.mode == CompletionMode::Full
                && ctx.check_expected
                && let Some(expected) = ctx.expected.ty()
                && !expected.is_error()
                && !result.is_error()
                && !is_subtype(db, result, expected)
            {
                errors.push(CompletionError::ResultTypeMismatch {
                    expected,
                    actual: result,
                });
            }
            advance(&mut state, CompletionState::Completed);
        }

        let spans: Vec<Span> = arguments.iter().map(|arg| arg.span).collect();
        let classifier = ClassifierContext {
            db,
            call_span: site.span,
            argument_spans: &spans,
            declaration: checked.declaration(),
        };
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        for error in &errors {
            let diagnostic = classify_completion_error(&classifier, error);
            if !diagnostics.contains(&diagnostic) {
                diagnostics.push(diagnostic);
            }
        }
        for warning in &checked.warnings {
            diagnostics.push(Diagnostic::new(warning.clone(), site.span));
        }
        self.report_all(&diagnostics);

        let call = self.resolved_call(&checked, site, arguments, result);
        if complete {
            self.contribute_to_builders(&checked.system);
            self.finalize_nested(&checked);
        }
        debug!(
            declaration = checked.declaration().0,
            complete,
            state = ?state,
            rounds,
            errors = errors.len(),
            "call completed"
        );

        let mut resolution = ExprResolution {
            call: Some(call),
            diagnostics,
            candidates: vec![checked.declaration()],
            ..ExprResolution::of_type(result)
        };
        self.apply_value_smart_cast(&mut resolution, &checked, ctx);
        if site.safe
            && let Some(subject) = explicit.and_then(|receiver| receiver.subject)
        {
            self.flow_facts.push(FlowFact::NonNullWhenResultNonNull {
                subject,
                call: site.expr,
            });
        }
        if !complete {
            resolution.pending = checked.nested.clone();
            resolution.partial = Some(checked.system);
        }
        resolution
    }

    /// Adds `result <: expected` when it does not contradict the arguments.
    fn seed_expected_type(
        &self,
        checked: &mut CheckedCandidate,
        site: &CallSite,
        explicit: Option<&ExplicitReceiver>,
        ctx: &ExprContext,
    ) {
        let db = self.db;
        if ctx.mode == CompletionMode::Partial {
            return;
        }
        let Some(expected) = ctx.expected.ty().filter(|ty| !ty.is_error()) else {
            return;
        };
        let result = self.safe_call_type(checked.return_type, site, explicit);
        let mut trial = checked.system.fork();
        trial.add_subtype_constraint(db, result, expected, ConstraintPosition::ExpectedType);
        if trial.errors().len() == checked.system.errors().len() {
            checked.system = trial;
        } else {
            trace!("expected type constraint dropped");
        }
    }

    pub(crate) fn safe_call_type(
        &self,
        ty: TypeId,
        site: &CallSite,
        explicit: Option<&ExplicitReceiver>,
    ) -> TypeId {
        let Some(receiver) = explicit.filter(|_| site.safe) else {
            return ty;
        };
        let nullable = match self.options.safe_call_nullability {
            SafeCallNullability::Always => true,
            SafeCallNullability::WhenReceiverNullable => self.db.may_be_null(receiver.ty),
        };
        if nullable { self.db.make_nullable(ty) } else { ty }
    }

    /// Literal arguments whose parameter type became a too narrow integral
    /// type only after fixation.
    fn check_literal_arguments(
        &self,
        checked: &CheckedCandidate,
        arguments: &[ArgumentInfo],
        errors: &mut Vec<CompletionError>,
    ) {
        let db = self.db;
        for (index, info) in arguments.iter().enumerate() {
            let argument = index as u32;
            let ArgumentKind::Expression(resolution) = &info.kind else {
                continue;
            };
            let Some(TypeData::IntegerLiteral(value)) = db.lookup(resolution.ty) else {
                continue;
            };
            let Some(Some(parameter)) = checked.parameter_types.get(index) else {
                continue;
            };
            let target = db.make_non_null(checked.system.substitute(db, *parameter));
            if !INTEGRAL_TYPES.contains(&target) || integral_type_contains(target, value) {
                continue;
            }
            let already_reported = errors.iter().any(|error| {
                matches!(
                    error,
                    CompletionError::Constraint(ConstraintError::Contradiction { position, .. })
                        if position.argument_index() == Some(argument)
                )
            });
            if !already_reported {
                errors.push(CompletionError::LiteralOutOfRange {
                    argument,
                    expected: target,
                    actual: integer_literal_default(value),
                });
            }
        }
    }

    fn resolved_call(
        &self,
        checked: &CheckedCandidate,
        site: &CallSite,
        arguments: &[ArgumentInfo],
        result: TypeId,
    ) -> ResolvedCall {
        let db = self.db;
        let system = &checked.system;
        let descriptor = checked.descriptor();
        let kind = match &checked.candidate.kind {
            CandidateKind::Invoke { variable, .. } => ResolvedCallKind::Invoke {
                variable: variable.id,
            },
            CandidateKind::Direct => match descriptor.kind {
                CallableKind::Function => ResolvedCallKind::Function,
                CallableKind::Constructor => ResolvedCallKind::Constructor,
                CallableKind::Property => ResolvedCallKind::Property,
                CallableKind::LocalVariable => ResolvedCallKind::Variable,
            },
        };

        let mut resolved_arguments = Vec::new();
        for (argument, parameter) in checked.mapping.mapped() {
            let Some(Some(expected)) = checked.parameter_types.get(argument as usize) else {
                continue;
            };
            let expected = system.substitute(db, *expected);
            let ty = match arguments.get(argument as usize).map(|info| &info.kind) {
                Some(ArgumentKind::Expression(resolution)) => {
                    match db.lookup(resolution.ty) {
                        Some(TypeData::IntegerLiteral(value)) => {
                            let target = db.make_non_null(expected);
                            if integral_type_contains(target, value) {
                                target
                            } else {
                                integer_literal_default(value)
                            }
                        }
                        _ => system.substitute(db, resolution.ty),
                    }
                }
                _ => expected,
            };
            resolved_arguments.push(ResolvedArgument {
                argument,
                parameter,
                vararg: descriptor.value_params[parameter as usize].vararg,
                ty,
            });
        }

        ResolvedCall {
            declaration: descriptor.id,
            name: site.name,
            kind,
            explicit_receiver_kind: checked.candidate.explicit_receiver_kind,
            dispatch_receiver: checked.dispatch_type.map(|ty| system.substitute(db, ty)),
            extension_receiver: checked.extension_type.map(|ty| system.substitute(db, ty)),
            type_arguments: checked
                .type_arguments
                .iter()
                .map(|&(param, ty)| (param, system.substitute(db, ty)))
                .collect(),
            arguments: resolved_arguments,
            result_type: result,
            warnings: checked.warnings.clone(),
        }
    }

    /// Hands the completed system to every builder session whose variables
    /// it mentions.
    fn contribute_to_builders(&mut self, system: &ConstraintSystem) {
        if self.builder_stack.is_empty() {
            return;
        }
        let foreign = system.foreign_variables();
        for session in &mut self.builder_stack {
            if foreign.iter().any(|var| session.vars.contains(var)) {
                session.contributions.push(system.fork());
            }
        }
    }

    /// Rewrites cached results of nested partial calls and analyzed
    /// postponed arguments with the final substitution.
    fn finalize_nested(&mut self, checked: &CheckedCandidate) {
        for &expr in &checked.nested {
            if let Some(cached) = self.cache.get(expr) {
                let resolution = cached.finalized(self.db, &checked.system);
                self.cache.insert(expr, Rc::new(resolution));
            }
        }
    }

    /// Smart cast of a plain value reference (`x`, not `a.x`).
    fn apply_value_smart_cast(
        &self,
        resolution: &mut ExprResolution,
        checked: &CheckedCandidate,
        ctx: &ExprContext,
    ) {
        let descriptor = checked.descriptor();
        let plain = matches!(checked.candidate.kind, CandidateKind::Direct)
            && descriptor.is_value()
            && checked.candidate.dispatch_receiver.is_none()
            && checked.candidate.extension_receiver.is_none();
        if !plain {
            return;
        }
        let subject = FlowSubject::Variable(descriptor.id);
        let narrowed = ctx.flow.smart_cast_type(self.db, subject, resolution.ty);
        if descriptor.has_stable_value() {
            resolution.subject = Some(subject);
            if let Some(ty) = narrowed {
                resolution.ty = ty;
            }
        } else {
            resolution.unstable_smart_cast = narrowed;
        }
    }
}

/// Owned unfixed variables a partial completion may fix: those the return
/// type neither mentions nor reaches through bounds.
fn partially_fixable(
    system: &mut ConstraintSystem,
    db: &TypeInterner,
    return_type: TypeId,
) -> FxHashSet<TypeVarId> {
    let mut protected: FxHashSet<TypeVarId> = FxHashSet::default();
    let mut stack = system.unfixed_vars_in(db, return_type);
    while let Some(var) = stack.pop() {
        if protected.contains(&var) {
            continue;
        }
        protected.extend(system.equivalence_class(var));
        let bounds: Vec<TypeId> = system
            .constraints_of(var)
            .all()
            .iter()
            .map(|constraint| constraint.ty)
            .collect();
        for ty in bounds {
            stack.extend(system.unfixed_vars_in(db, ty));
        }
    }

    let mut fixable = FxHashSet::default();
    for var in system.unfixed_variables() {
        for member in system.equivalence_class(var) {
            if !protected.contains(&member) {
                fixable.insert(member);
            }
        }
    }
    fixable
}

#[cfg(test)]
#[path = "../tests/completion_tests.rs"]
mod tests;
