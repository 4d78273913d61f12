//! Applicability checking.
//!
//! Checking a candidate builds its constraint system: fresh type variables
//! for the declaration's type parameters, their declared bounds, the
//! receiver constraints and one constraint per mapped value argument.
//! Lambda and callable-reference arguments only get a shape check here;
//! their bodies are analyzed during completion.
//!
//! A candidate is applicable when no check recorded a reason. Nothing is
//! reported from here: reasons stay on the candidate and the classifier
//! turns the ones of the closest failing candidates into diagnostics.

use crate::argument_mapping::{ArgumentMapping, MappingError, map_arguments};
use crate::collector::{Candidate, ExplicitReceiver};
use crate::declarations::{CallableDescriptor, DeclFlags, DeclId, Visibility, member_substitution};
use crate::diagnostics::DiagnosticKind;
use crate::expr::{ExprId, LambdaParam};
use crate::resolver::{CallSite, ExprContext, ResolutionSession};
use crate::results::ExprResolution;
use crate::tower::ScopeTower;
use kres_common::{Atom, Span};
use kres_solver::{
    ClassId, ConstraintError, ConstraintPosition, ConstraintSystem, INTEGRAL_TYPES, TypeData,
    TypeId, TypeList, TypeParamId, TypeSubstitution, instantiate_type, integer_literal_default,
    is_subtype, supertype_as,
};
use std::rc::Rc;
use tracing::trace;

/// Why a candidate cannot be called.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InapplicabilityReason {
    ArgumentMapping(MappingError),
    WrongNumberOfTypeArguments { expected: u32, actual: u32 },
    Invisible,
    /// `implicit` mismatches are never reported: the candidate was simply
    /// not meant for that receiver.
    ReceiverTypeMismatch { expected: TypeId, actual: TypeId, implicit: bool },
    UnsafeCall { receiver_type: TypeId },
    OperatorModifierRequired,
    UnstableSmartCast { ty: TypeId },
    /// Lambda arity does not match the expected function type.
    LambdaShapeMismatch { argument: u32, expected: TypeId, actual: TypeId },
    Constraint(ConstraintError),
}

impl InapplicabilityReason {
    /// How close a candidate failing for this reason is to being
    /// applicable; higher is closer.
    pub fn closeness(&self) -> u8 {
        match self {
            InapplicabilityReason::UnstableSmartCast { .. } => 7,
            InapplicabilityReason::UnsafeCall { .. } => 6,
            InapplicabilityReason::Constraint(_) | InapplicabilityReason::LambdaShapeMismatch { .. } => 5,
            InapplicabilityReason::Invisible | InapplicabilityReason::OperatorModifierRequired => 4,
            InapplicabilityReason::WrongNumberOfTypeArguments { .. } => 3,
            InapplicabilityReason::ArgumentMapping(_) => 2,
            InapplicabilityReason::ReceiverTypeMismatch { .. } => 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplicabilityStatus {
    Success,
    /// Applicable after converting integer literals to a non-default
    /// integral type.
    ApplicableWithCoercions { coercions: u32 },
    Inapplicable(InapplicabilityReason),
}

// =============================================================================
// Checked candidates
// =============================================================================

/// A call argument after the argument pre-pass.
#[derive(Clone, Debug)]
pub(crate) struct ArgumentInfo {
    pub(crate) expr: ExprId,
    pub(crate) spread: bool,
    pub(crate) span: Span,
    pub(crate) kind: ArgumentKind,
}

#[derive(Clone, Debug)]
pub(crate) enum ArgumentKind {
    /// Resolved in partial mode.
    Expression(Rc<ExprResolution>),
    Lambda {
        params: Option<Vec<LambdaParam>>,
        body: ExprId,
    },
    CallableRef {
        receiver_type: Option<TypeId>,
        name: Atom,
    },
}

/// Lambda or callable reference awaiting completion.
#[derive(Copy, Clone, Debug)]
pub(crate) struct PostponedArgument {
    pub(crate) argument: u32,
    pub(crate) expr: ExprId,
    /// Parameter type with the candidate's variables.
    pub(crate) expected: TypeId,
}

#[derive(Clone, Debug)]
pub(crate) struct CheckedCandidate {
    pub(crate) candidate: Candidate,
    pub(crate) system: ConstraintSystem,
    /// Class type parameters of a member's owner, from the dispatch receiver.
    pub(crate) class_substitution: TypeSubstitution,
    /// `class_substitution` plus the declaration's type parameters.
    pub(crate) substitution: TypeSubstitution,
    pub(crate) type_arguments: Vec<(TypeParamId, TypeId)>,
    pub(crate) mapping: ArgumentMapping,
    /// Expected type of each argument, `None` when unmapped.
    pub(crate) parameter_types: Vec<Option<TypeId>>,
    /// Same, with the declaration's own type parameters left in place.
    pub(crate) declared_parameter_types: Vec<Option<TypeId>>,
    pub(crate) dispatch_type: Option<TypeId>,
    pub(crate) extension_type: Option<TypeId>,
    pub(crate) return_type: TypeId,
    pub(crate) postponed: Vec<PostponedArgument>,
    /// Expressions whose cached results follow this system's variables.
    pub(crate) nested: Vec<ExprId>,
    pub(crate) reasons: Vec<InapplicabilityReason>,
    pub(crate) warnings: Vec<DiagnosticKind>,
    pub(crate) coercions: u32,
    pub(crate) vararg_used: bool,
}

impl CheckedCandidate {
    fn new(candidate: Candidate, mapping: ArgumentMapping, arguments: usize) -> Self {
        CheckedCandidate {
            candidate,
            system: ConstraintSystem::new(),
            class_substitution: TypeSubstitution::new(),
            substitution: TypeSubstitution::new(),
            type_arguments: Vec::new(),
            mapping,
            parameter_types: vec![None; arguments],
            declared_parameter_types: vec![None; arguments],
            dispatch_type: None,
            extension_type: None,
            return_type: TypeId::ERROR,
            postponed: Vec::new(),
            nested: Vec::new(),
            reasons: Vec::new(),
            warnings: Vec::new(),
            coercions: 0,
            vararg_used: false,
        }
    }

    pub(crate) fn descriptor(&self) -> &Rc<CallableDescriptor> {
        &self.candidate.descriptor
    }

    pub(crate) fn declaration(&self) -> DeclId {
        self.candidate.descriptor.id
    }

    pub(crate) fn is_applicable(&self) -> bool {
        self.reasons.is_empty()
    }

    pub(crate) fn status(&self) -> ApplicabilityStatus {
        match self.reasons.iter().min_by_key(|reason| reason.closeness()) {
            Some(reason) => ApplicabilityStatus::Inapplicable(reason.clone()),
            None if self.coercions > 0 => ApplicabilityStatus::ApplicableWithCoercions {
                coercions: self.coercions,
            },
            None => ApplicabilityStatus::Success,
        }
    }

    /// Closeness of the worst reason; applicable candidates rank highest.
    pub(crate) fn closeness(&self) -> u8 {
        self.reasons
            .iter()
            .map(InapplicabilityReason::closeness)
            .min()
            .unwrap_or(u8::MAX)
    }

    pub(crate) fn excluded_from_diagnostics(&self) -> bool {
        self.reasons.iter().any(|reason| {
            matches!(
                reason,
                InapplicabilityReason::ReceiverTypeMismatch { implicit: true, .. }
            )
        })
    }
}

// =============================================================================
// Checks
// =============================================================================

impl ResolutionSession<'_> {
    pub(crate) fn check_candidate(
        &self,
        candidate: Candidate,
        site: &CallSite,
        explicit: Option<&ExplicitReceiver>,
        arguments: &[ArgumentInfo],
        ctx: &ExprContext,
    ) -> CheckedCandidate {
        let descriptor = candidate.descriptor.clone();
        let mapping = map_arguments(&site.args, &descriptor.value_params);
        let mut checked = CheckedCandidate::new(candidate, mapping, arguments.len());

        for error in &checked.mapping.errors {
            checked
                .reasons
                .push(InapplicabilityReason::ArgumentMapping(error.clone()));
        }
        checked.vararg_used = checked
            .mapping
            .mapped()
            .any(|(_, parameter)| descriptor.value_params[parameter as usize].vararg);

        if !site.type_args.is_empty() && site.type_args.len() != descriptor.type_params.len() {
            checked
                .reasons
                .push(InapplicabilityReason::WrongNumberOfTypeArguments {
                    expected: descriptor.type_params.len() as u32,
                    actual: site.type_args.len() as u32,
                });
        }
        if !self.is_visible(&descriptor, &ctx.tower) {
            checked.reasons.push(InapplicabilityReason::Invisible);
        }
        if site.operator && !descriptor.flags.contains(DeclFlags::OPERATOR) {
            checked
                .reasons
                .push(InapplicabilityReason::OperatorModifierRequired);
        }

        self.instantiate(&mut checked, site);
        self.check_receivers(&mut checked, explicit, site);
        self.check_arguments(&mut checked, arguments);

        for error in checked.system.errors() {
            checked
                .reasons
                .push(InapplicabilityReason::Constraint(error.clone()));
        }
        trace!(
            declaration = checked.declaration().0,
            level = checked.candidate.level,
            status = ?checked.status(),
            "candidate checked"
        );
        checked
    }

    fn is_visible(&self, descriptor: &CallableDescriptor, tower: &ScopeTower) -> bool {
        match descriptor.visibility {
            Visibility::Public => true,
            Visibility::Internal { module } => module == self.module,
            Visibility::Private { owner } => tower.enclosing_classes().contains(&owner),
            Visibility::Protected { owner } => tower
                .enclosing_classes()
                .into_iter()
                .any(|class| class == owner || self.is_subclass(class, owner)),
        }
    }

    fn is_subclass(&self, class: ClassId, owner: ClassId) -> bool {
        let db = self.db;
        let ty = db.class_type(class, db.class_param_types(class).into_iter().collect());
        supertype_as(db, ty, owner).is_some()
    }

    /// Type variables for the type parameters (or the explicit type
    /// arguments) and the declared upper bounds.
    fn instantiate(&self, checked: &mut CheckedCandidate, site: &CallSite) {
        let db = self.db;
        let descriptor = checked.descriptor().clone();
        if descriptor.is_member()
            && let (Some(owner), Some(dispatch)) = (descriptor.owner, &checked.candidate.dispatch_receiver)
        {
            checked.class_substitution = member_substitution(db, dispatch.ty, owner);
        }

        let mut substitution = checked.class_substitution.clone();
        let explicit = site.type_args.len() == descriptor.type_params.len();
        for (index, param) in descriptor.type_params.iter().enumerate() {
            let ty = if explicit {
                site.type_args[index]
            } else {
                let var = db.fresh_type_var(Some(param.id));
                checked.system.register_variable(var);
                db.var_type(var)
            };
            substitution.insert_param(param.id, ty);
            checked.type_arguments.push((param.id, ty));
        }
        for param in &descriptor.type_params {
            let Some(ty) = substitution.get_param(param.id) else {
                continue;
            };
            for &bound in &param.upper_bounds {
                let bound = instantiate_type(db, bound, &substitution);
                checked.system.add_subtype_constraint(
                    db,
                    ty,
                    bound,
                    ConstraintPosition::DeclaredUpperBound { param: param.id },
                );
            }
        }
        checked.return_type = instantiate_type(db, descriptor.return_type, &substitution);
        checked.substitution = substitution;
    }

    fn check_receivers(
        &self,
        checked: &mut CheckedCandidate,
        explicit: Option<&ExplicitReceiver>,
        site: &CallSite,
    ) {
        let db = self.db;
        let descriptor = checked.descriptor().clone();

        if let Some(dispatch) = checked.candidate.dispatch_receiver.clone() {
            checked.dispatch_type = Some(dispatch.ty);
            if !dispatch.is_implicit()
                && !site.safe
                && db.may_be_null(dispatch.ty)
                && let Some(receiver) = explicit
            {
                match receiver.unstable_smart_cast.filter(|&cast| !db.may_be_null(cast)) {
                    Some(cast) => self.note_unstable_smart_cast(checked, cast),
                    None => checked.reasons.push(InapplicabilityReason::UnsafeCall {
                        receiver_type: dispatch.ty,
                    }),
                }
            }
        }
        if let Some(cast) = checked.candidate.unstable_smart_cast {
            self.note_unstable_smart_cast(checked, cast);
        }

        let (Some(receiver), Some(declared)) =
            (checked.candidate.extension_receiver.clone(), descriptor.extension_receiver)
        else {
            return;
        };
        let expected = instantiate_type(db, declared, &checked.substitution);
        checked.extension_type = Some(receiver.ty);
        let errors_before = checked.system.errors().len();
        let accepts = |system: &ConstraintSystem, actual: TypeId| {
            let mut trial = system.fork();
            trial.add_subtype_constraint(db, actual, expected, ConstraintPosition::Receiver);
            (trial.errors().len() == errors_before).then_some(trial)
        };

        if let Some(trial) = accepts(&checked.system, receiver.ty) {
            checked.system = trial;
            return;
        }
        if receiver.is_implicit() {
            checked.reasons.push(InapplicabilityReason::ReceiverTypeMismatch {
                expected,
                actual: receiver.ty,
                implicit: true,
            });
            return;
        }
        if let Some(cast) = explicit.and_then(|receiver| receiver.unstable_smart_cast)
            && let Some(trial) = accepts(&checked.system, cast)
        {
            checked.system = trial;
            checked.extension_type = Some(cast);
            self.note_unstable_smart_cast(checked, cast);
            return;
        }
        let nullable_only = !site.safe
            && db.may_be_null(receiver.ty)
            && accepts(&checked.system, db.make_non_null(receiver.ty)).is_some();
        checked.reasons.push(if nullable_only {
            InapplicabilityReason::UnsafeCall {
                receiver_type: receiver.ty,
            }
        } else {
            InapplicabilityReason::ReceiverTypeMismatch {
                expected,
                actual: receiver.ty,
                implicit: false,
            }
        });
    }

    fn note_unstable_smart_cast(&self, checked: &mut CheckedCandidate, ty: TypeId) {
        if self.options.unstable_smart_cast_is_error {
            checked
                .reasons
                .push(InapplicabilityReason::UnstableSmartCast { ty });
        } else if !checked.warnings.contains(&DiagnosticKind::UnstableSmartCast { ty }) {
            checked.warnings.push(DiagnosticKind::UnstableSmartCast { ty });
        }
    }

    fn check_arguments(&self, checked: &mut CheckedCandidate, arguments: &[ArgumentInfo]) {
        let db = self.db;
        let descriptor = checked.descriptor().clone();
        let mapped: Vec<(u32, u32)> = checked.mapping.mapped().collect();
        for (argument, parameter) in mapped {
            let Some(info) = arguments.get(argument as usize) else {
                continue;
            };
            let param = &descriptor.value_params[parameter as usize];
            let as_array = param.vararg && info.spread;
            let element = instantiate_type(db, param.ty, &checked.substitution);
            let declared = instantiate_type(db, param.ty, &checked.class_substitution);
            let (expected, declared) = if as_array {
                (db.array_type(element), db.array_type(declared))
            } else {
                (element, declared)
            };
            checked.parameter_types[argument as usize] = Some(expected);
            checked.declared_parameter_types[argument as usize] = Some(declared);

            match &info.kind {
                ArgumentKind::Expression(resolution) => {
                    self.check_value_argument(checked, argument, info.expr, resolution, expected);
                }
                ArgumentKind::Lambda { params, .. } => {
                    self.check_lambda_shape(checked, argument, info.expr, params.as_deref(), expected);
                }
                ArgumentKind::CallableRef { .. } => checked.postponed.push(PostponedArgument {
                    argument,
                    expr: info.expr,
                    expected,
                }),
            }
        }
    }

    fn check_value_argument(
        &self,
        checked: &mut CheckedCandidate,
        argument: u32,
        expr: ExprId,
        resolution: &ExprResolution,
        expected: TypeId,
    ) {
        let db = self.db;
        if resolution.ty.is_error() {
            return;
        }
        if let Some(partial) = &resolution.partial {
            checked.system.absorb(db, partial.fork());
            checked.nested.push(expr);
            checked.nested.extend(resolution.pending.iter().copied());
        }
        if let Some(TypeData::IntegerLiteral(value)) = db.lookup(resolution.ty)
            && checked.system.is_proper(db, expected)
        {
            let target = db.make_non_null(expected);
            if INTEGRAL_TYPES.contains(&target) && target != integer_literal_default(value) {
                checked.coercions += 1;
            }
        }
        checked.system.add_subtype_constraint(
            db,
            resolution.ty,
            expected,
            ConstraintPosition::Argument { index: argument },
        );
    }

    fn check_lambda_shape(
        &self,
        checked: &mut CheckedCandidate,
        argument: u32,
        expr: ExprId,
        params: Option<&[LambdaParam]>,
        expected: TypeId,
    ) {
        let db = self.db;
        let target = db.make_non_null(checked.system.substitute(db, expected));
        match db.lookup(target) {
            Some(TypeData::Function(function)) => {
                let arity = function.params.len();
                let fits = match params {
                    Some(params) => params.len() == arity,
                    None => arity <= 1,
                };
                if !fits {
                    checked.reasons.push(InapplicabilityReason::LambdaShapeMismatch {
                        argument,
                        expected: target,
                        actual: self.lambda_shape_type(params),
                    });
                    return;
                }
                if let Some(params) = params {
                    for (param, &ty) in params.iter().zip(function.params.iter()) {
                        if let Some(declared) = param.declared_type {
                            checked.system.add_subtype_constraint(
                                db,
                                ty,
                                declared,
                                ConstraintPosition::Argument { index: argument },
                            );
                        }
                    }
                }
            }
            Some(TypeData::Var(_)) => {}
            _ => {
                let actual = self.lambda_shape_type(params);
                if !is_subtype(db, actual, target) {
                    checked.reasons.push(InapplicabilityReason::LambdaShapeMismatch {
                        argument,
                        expected: target,
                        actual,
                    });
                    return;
                }
            }
        }
        checked.postponed.push(PostponedArgument {
            argument,
            expr,
            expected,
        });
    }

    /// Function type a lambda is known to have before its analysis.
    pub(crate) fn lambda_shape_type(&self, params: Option<&[LambdaParam]>) -> TypeId {
        let params: TypeList = params
            .unwrap_or_default()
            .iter()
            .map(|param| param.declared_type.unwrap_or(TypeId::NOTHING))
            .collect();
        self.db.function_type(None, params, TypeId::NULLABLE_ANY)
    }
}

#[cfg(test)]
#[path = "../tests/applicability_tests.rs"]
mod tests;
