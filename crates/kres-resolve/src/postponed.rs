//! Postponed arguments: lambdas and callable references.
//!
//! A postponed argument is analyzed once the input types of its expected
//! function type (receiver and parameters) are known. A lambda body is
//! resolved in a tower extended with the lambda's receiver and parameters;
//! its type then constrains the expected return type. A callable reference
//! is resolved against its expected function type by trying each candidate
//! on a fork of the call's system.
//!
//! Builder inference: a lambda with receiver passed to a `BUILDER_INFERENCE`
//! declaration is analyzed while its receiver type still mentions the
//! call's variables. Calls inside the body see those variables as foreign
//! and hand their completed systems back through a `BuilderSession`.

use crate::applicability::{ArgumentInfo, ArgumentKind, CheckedCandidate, PostponedArgument};
use crate::collector::{
    CallShape, CandidateCollector, CandidateKind, ExplicitReceiver, ExplicitReceiverKind,
};
use crate::completion::{BuilderSession, CompletionMode};
use crate::declarations::{CallableDescriptor, DeclFlags, DeclId, member_substitution};
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::expr::{Expr, ExprId, LambdaParam, Literal};
use crate::flow::DataFlowInfo;
use crate::resolver::{ExprContext, ResolutionSession};
use crate::results::{ExpectedType, ExprResolution, ResolvedCall, ResolvedCallKind};
use crate::tower::{ImplicitReceiver, LocalScope, ReceiverKind, ScopeTower, TowerLevel};
use kres_common::Atom;
use kres_solver::visitor::contains_type_vars;
use kres_solver::{
    ConstraintPosition, ConstraintSystem, FunctionType, TypeData, TypeId, TypeList, TypeParamId,
    TypeSubstitution, TypeVarId, instantiate_type,
};
use rustc_hash::FxHashSet;
use std::rc::Rc;
use tracing::{debug, trace};

/// Declaration a callable reference may denote.
struct ReferenceCandidate {
    descriptor: Rc<CallableDescriptor>,
    class_substitution: TypeSubstitution,
    /// Receiver passed as the first parameter (`Type::member`).
    unbound_receiver: Option<TypeId>,
}

enum ReferenceOutcome {
    Resolved {
        system: ConstraintSystem,
        resolution: ExprResolution,
    },
    Failed {
        kind: DiagnosticKind,
        candidates: Vec<DeclId>,
    },
}

impl ResolutionSession<'_> {
    // =========================================================================
    // Scheduling
    // =========================================================================

    fn expected_function(&self, system: &ConstraintSystem, expected: TypeId) -> Option<FunctionType> {
        let db = self.db;
        match db.lookup(db.make_non_null(system.substitute(db, expected))) {
            Some(TypeData::Function(function)) => Some(function),
            _ => None,
        }
    }

    pub(crate) fn is_builder_argument(&self, checked: &CheckedCandidate, function: &FunctionType) -> bool {
        self.options.builder_inference
            && checked.descriptor().flags.contains(DeclFlags::BUILDER_INFERENCE)
            && function
                .receiver
                .is_some_and(|receiver| !checked.system.is_proper(self.db, receiver))
    }

    /// First postponed argument whose input types are proper.
    pub(crate) fn ready_postponed(&self, checked: &CheckedCandidate) -> Option<usize> {
        let db = self.db;
        checked.postponed.iter().position(|postponed| {
            let Some(function) = self.expected_function(&checked.system, postponed.expected) else {
                return true;
            };
            let params_ready = function
                .params
                .iter()
                .all(|&ty| checked.system.is_proper(db, ty));
            let receiver_ready = function
                .receiver
                .is_none_or(|receiver| checked.system.is_proper(db, receiver));
            params_ready && (receiver_ready || self.is_builder_argument(checked, &function))
        })
    }

    /// Unfixed variables in the input types of `postponed`.
    pub(crate) fn postponed_inputs(
        &self,
        system: &ConstraintSystem,
        postponed: &PostponedArgument,
    ) -> FxHashSet<TypeVarId> {
        let db = self.db;
        let mut inputs = FxHashSet::default();
        match self.expected_function(system, postponed.expected) {
            Some(function) => {
                for ty in function.flat_params() {
                    inputs.extend(system.unfixed_vars_in(db, ty));
                }
            }
            None => inputs.extend(system.unfixed_vars_in(db, postponed.expected)),
        }
        inputs
    }

    pub(crate) fn analyze_postponed(
        &mut self,
        checked: &mut CheckedCandidate,
        postponed: PostponedArgument,
        arguments: &[ArgumentInfo],
        ctx: &ExprContext,
    ) {
        let Some(info) = arguments.get(postponed.argument as usize) else {
            return;
        };
        match &info.kind {
            ArgumentKind::Lambda { params, body } => {
                self.analyze_lambda_argument(checked, postponed, params.as_deref(), *body, ctx);
            }
            ArgumentKind::CallableRef {
                receiver_type,
                name,
            } => self.resolve_reference_argument(checked, postponed, *receiver_type, *name, ctx),
            ArgumentKind::Expression(_) => return,
        }
        checked.nested.push(postponed.expr);
    }

    // =========================================================================
    // Lambdas
    // =========================================================================

    fn analyze_lambda_argument(
        &mut self,
        checked: &mut CheckedCandidate,
        postponed: PostponedArgument,
        params: Option<&[LambdaParam]>,
        body: ExprId,
        ctx: &ExprContext,
    ) {
        let db = self.db;
        let argument = postponed.argument;
        let Some(function) = self.expected_function(&checked.system, postponed.expected) else {
            // Against a type variable or `Any`: the lambda types itself.
            let param_types = declared_param_types(params);
            let (_, lambda_ty) = self.analyze_lambda(params, body, &param_types, None, None, ctx);
            self.store(postponed.expr, ExprResolution::of_type(lambda_ty));
            checked.system.add_subtype_constraint(
                db,
                lambda_ty,
                postponed.expected,
                ConstraintPosition::Argument { index: argument },
            );
            return;
        };

        let builder = self.is_builder_argument(checked, &function);
        if builder {
            let vars = function
                .receiver
                .map(|receiver| checked.system.unfixed_vars_in(db, receiver))
                .unwrap_or_default();
            debug!(argument, variables = vars.len(), "builder inference started");
            self.builder_stack.push(BuilderSession {
                vars: vars.into_iter().collect(),
                ..BuilderSession::default()
            });
        }

        let (body_ty, lambda_ty) = self.analyze_lambda(
            params,
            body,
            &function.params,
            function.receiver,
            Some(function.ret),
            ctx,
        );
        self.store(postponed.expr, ExprResolution::of_type(lambda_ty));

        if builder && let Some(session) = self.builder_stack.pop() {
            let mut injected = 0;
            for mut contribution in session.contributions {
                injected += checked.system.inject_from(db, &mut contribution, &session.vars);
            }
            checked.nested.extend(session.touched);
            debug!(argument, injected, "builder inference finished");
        }

        if function.ret != TypeId::UNIT && !body_ty.is_error() {
            checked.system.add_subtype_constraint(
                db,
                body_ty,
                function.ret,
                ConstraintPosition::LambdaReturn { argument },
            );
        }
    }

    /// Resolves a lambda body. Returns the body type and the lambda's
    /// function type; `declared_return` replaces the body type in the latter.
    fn analyze_lambda(
        &mut self,
        params: Option<&[LambdaParam]>,
        body: ExprId,
        param_types: &[TypeId],
        receiver: Option<TypeId>,
        declared_return: Option<TypeId>,
        ctx: &ExprContext,
    ) -> (TypeId, TypeId) {
        let db = self.db;
        let mut tower = ctx.tower.clone();
        if let Some(receiver) = receiver {
            let id = self.fresh_receiver_id();
            tower = tower.push_level(TowerLevel::receiver(ImplicitReceiver::new(
                id,
                receiver,
                ReceiverKind::Extension,
            )));
        }

        let mut scope = LocalScope::new();
        let mut lambda_params = TypeList::new();
        match params {
            Some(params) => {
                for (index, param) in params.iter().enumerate() {
                    let ty = param
                        .declared_type
                        .or_else(|| param_types.get(index).copied())
                        .unwrap_or(TypeId::ERROR);
                    let id = self.fresh_decl_id();
                    scope.add(Rc::new(CallableDescriptor::local(id, param.name, ty)));
                    lambda_params.push(ty);
                }
            }
            None => {
                if let [ty] = param_types {
                    let id = self.fresh_decl_id();
                    scope.add(Rc::new(CallableDescriptor::local(id, self.names.it, *ty)));
                    lambda_params.push(*ty);
                }
            }
        }
        if !scope.is_empty() {
            tower = tower.push_level(TowerLevel::local(scope));
        }

        let expected_return = declared_return
            .filter(|&ret| ret != TypeId::UNIT && !contains_type_vars(db, ret))
            .map_or(ExpectedType::NoExpectation, ExpectedType::Type);
        let body_ctx = ExprContext {
            tower,
            flow: ctx.flow.clone(),
            expected: expected_return,
            mode: CompletionMode::Full,
            check_expected: false,
        };
        let mut body_ty = self.resolve_expr(body, &body_ctx).ty;
        // An integer literal result stays adaptable until the return
        // variable is fixed.
        if declared_return.is_some_and(|ret| contains_type_vars(db, ret))
            && let Some(value) = self.result_int_literal(body)
        {
            body_ty = db.integer_literal(value);
        }
        let ret = declared_return.unwrap_or(body_ty);
        trace!(params = lambda_params.len(), "lambda analyzed");
        (body_ty, db.function_type(receiver, lambda_params, ret))
    }

    /// Value of an `Int` literal that produces the body's result.
    fn result_int_literal(&self, body: ExprId) -> Option<i64> {
        let mut expr = body;
        loop {
            match self.arena.get(expr)? {
                Expr::Block(statements) => expr = *statements.last()?,
                Expr::Literal(Literal::Int(value)) => return Some(*value),
                _ => return None,
            }
        }
    }

    pub(crate) fn resolve_standalone_lambda(
        &mut self,
        params: Option<&[LambdaParam]>,
        body: ExprId,
        ctx: &ExprContext,
    ) -> ExprResolution {
        let db = self.db;
        let expected = ctx
            .expected
            .ty()
            .and_then(|ty| match db.lookup(db.make_non_null(ty)) {
                Some(TypeData::Function(function)) => Some(function),
                _ => None,
            })
            .filter(|function| match params {
                Some(params) => params.len() == function.params.len(),
                None => function.params.len() <= 1,
            });
        let (_, lambda_ty) = match expected {
            Some(function) => self.analyze_lambda(
                params,
                body,
                &function.params,
                function.receiver,
                Some(function.ret),
                ctx,
            ),
            None => {
                let param_types = declared_param_types(params);
                self.analyze_lambda(params, body, &param_types, None, None, ctx)
            }
        };
        ExprResolution::of_type(lambda_ty)
    }

    // =========================================================================
    // Callable references
    // =========================================================================

    fn resolve_reference_argument(
        &mut self,
        checked: &mut CheckedCandidate,
        postponed: PostponedArgument,
        receiver_type: Option<TypeId>,
        name: Atom,
        ctx: &ExprContext,
    ) {
        let position = ConstraintPosition::CallableReference {
            argument: postponed.argument,
        };
        let outcome = self.match_reference(
            postponed.expr,
            &checked.system,
            receiver_type,
            name,
            Some(postponed.expected),
            position,
            &ctx.tower,
            &ctx.flow,
        );
        let resolution = match outcome {
            ReferenceOutcome::Resolved { system, resolution } => {
                checked.system = system;
                resolution
            }
            ReferenceOutcome::Failed { kind, candidates } => {
                let diagnostic = Diagnostic::new(kind, self.arena.span(postponed.expr));
                self.diagnostics.report(diagnostic.clone());
                ExprResolution::error(vec![diagnostic], candidates)
            }
        };
        self.store(postponed.expr, resolution);
    }

    pub(crate) fn resolve_standalone_reference(
        &mut self,
        expr: ExprId,
        receiver_type: Option<TypeId>,
        name: Atom,
        ctx: &ExprContext,
    ) -> ExprResolution {
        let base = ConstraintSystem::new();
        let outcome = self.match_reference(
            expr,
            &base,
            receiver_type,
            name,
            ctx.expected.ty(),
            ConstraintPosition::ExpectedType,
            &ctx.tower,
            &ctx.flow,
        );
        match outcome {
            ReferenceOutcome::Resolved {
                mut system,
                resolution,
            } => {
                system.fix_all(self.db);
                resolution.finalized(self.db, &system)
            }
            ReferenceOutcome::Failed { kind, candidates } => {
                let span = self.arena.span(expr);
                self.error_node(kind, span, candidates)
            }
        }
    }

    /// Resolves a reference against `expected`. Candidate groups are tried
    /// by priority; within the first group with a match, the match must be
    /// unique.
    #[allow(clippy::too_many_arguments)]
    fn match_reference(
        &self,
        expr: ExprId,
        base: &ConstraintSystem,
        receiver_type: Option<TypeId>,
        name: Atom,
        expected: Option<TypeId>,
        position: ConstraintPosition,
        tower: &ScopeTower,
        flow: &DataFlowInfo,
    ) -> ReferenceOutcome {
        let db = self.db;
        let groups = self.reference_groups(expr, receiver_type, name, tower, flow);
        let mut all: Vec<DeclId> = groups.iter().flatten().map(|c| c.descriptor.id).collect();
        all.sort();
        all.dedup();
        if all.is_empty() {
            return ReferenceOutcome::Failed {
                kind: DiagnosticKind::UnresolvedReference { name },
                candidates: Vec::new(),
            };
        }

        let arity = expected
            .and_then(|expected| self.expected_function(base, expected))
            .map(|function| function.flat_params().len());
        for group in &groups {
            let mut matches = Vec::new();
            for candidate in group {
                let mut system = base.fork();
                let (ty, type_arguments) = self.reference_type(&mut system, candidate);
                if let Some(arity) = arity
                    && let Some(TypeData::Function(function)) = db.lookup(ty)
                    && function.params.len() != arity
                {
                    continue;
                }
                if let Some(expected) = expected {
                    system.add_subtype_constraint(db, ty, expected, position);
                }
                if system.errors().len() == base.errors().len() {
                    matches.push((candidate, system, ty, type_arguments));
                }
            }
            match matches.len() {
                0 => continue,
                1 => {
                    let Some((candidate, system, ty, type_arguments)) = matches.pop() else {
                        continue;
                    };
                    trace!(declaration = candidate.descriptor.id.0, "callable reference resolved");
                    let call = ResolvedCall {
                        declaration: candidate.descriptor.id,
                        name,
                        kind: ResolvedCallKind::CallableReference,
                        explicit_receiver_kind: ExplicitReceiverKind::NoExplicitReceiver,
                        dispatch_receiver: None,
                        extension_receiver: None,
                        type_arguments,
                        arguments: Vec::new(),
                        result_type: ty,
                        warnings: Vec::new(),
                    };
                    return ReferenceOutcome::Resolved {
                        system,
                        resolution: ExprResolution {
                            call: Some(call),
                            candidates: vec![candidate.descriptor.id],
                            ..ExprResolution::of_type(ty)
                        },
                    };
                }
                _ => {
                    let mut candidates: Vec<DeclId> =
                        matches.iter().map(|(c, ..)| c.descriptor.id).collect();
                    candidates.sort();
                    return ReferenceOutcome::Failed {
                        kind: DiagnosticKind::OverloadAmbiguity {
                            candidates: candidates.clone(),
                        },
                        candidates,
                    };
                }
            }
        }
        ReferenceOutcome::Failed {
            kind: DiagnosticKind::NoneApplicable {
                candidates: all.clone(),
            },
            candidates: all,
        }
    }

    fn reference_groups(
        &self,
        expr: ExprId,
        receiver_type: Option<TypeId>,
        name: Atom,
        tower: &ScopeTower,
        flow: &DataFlowInfo,
    ) -> Vec<Vec<ReferenceCandidate>> {
        let db = self.db;
        let collector = CandidateCollector::new(db, self.provider, tower, flow);
        match receiver_type {
            // `Type::name`: members and extensions on `Type`, the receiver
            // becoming the first parameter.
            Some(receiver) => {
                let explicit = ExplicitReceiver {
                    expr,
                    ty: receiver,
                    safe: false,
                    subject: None,
                    unstable_smart_cast: None,
                };
                let mut groups = Vec::new();
                for shape in [CallShape::Function, CallShape::Value] {
                    for group in collector.collect(name, Some(&explicit), shape) {
                        let mut references = Vec::new();
                        for candidate in group.candidates {
                            if !matches!(candidate.kind, CandidateKind::Direct) {
                                continue;
                            }
                            let descriptor = candidate.descriptor;
                            match candidate.explicit_receiver_kind {
                                ExplicitReceiverKind::DispatchReceiver => {
                                    references.push(ReferenceCandidate {
                                        class_substitution: descriptor
                                            .owner
                                            .map(|owner| member_substitution(db, receiver, owner))
                                            .unwrap_or_default(),
                                        descriptor,
                                        unbound_receiver: Some(receiver),
                                    });
                                }
                                ExplicitReceiverKind::ExtensionReceiver => {
                                    let extension = descriptor.extension_receiver;
                                    references.push(ReferenceCandidate {
                                        descriptor,
                                        class_substitution: TypeSubstitution::new(),
                                        unbound_receiver: extension,
                                    });
                                }
                                _ => {}
                            }
                        }
                        groups.push(references);
                    }
                }
                groups
            }
            // `::name`: declarations needing no receiver, or bound to an
            // implicit one.
            None => {
                let mut groups = Vec::new();
                for shape in [CallShape::Function, CallShape::Value] {
                    for group in collector.collect(name, None, shape) {
                        let mut references = Vec::new();
                        for candidate in group.candidates {
                            if candidate.extension_receiver.is_some()
                                || !matches!(candidate.kind, CandidateKind::Direct)
                            {
                                continue;
                            }
                            let class_substitution = match (
                                candidate.descriptor.owner,
                                &candidate.dispatch_receiver,
                            ) {
                                (Some(owner), Some(dispatch)) if candidate.descriptor.is_member() => {
                                    member_substitution(db, dispatch.ty, owner)
                                }
                                _ => TypeSubstitution::new(),
                            };
                            references.push(ReferenceCandidate {
                                descriptor: candidate.descriptor,
                                class_substitution,
                                unbound_receiver: None,
                            });
                        }
                        groups.push(references);
                    }
                }
                groups
            }
        }
    }

    /// Function type of a reference, with fresh variables for the
    /// declaration's type parameters registered in `system`.
    fn reference_type(
        &self,
        system: &mut ConstraintSystem,
        candidate: &ReferenceCandidate,
    ) -> (TypeId, Vec<(TypeParamId, TypeId)>) {
        let db = self.db;
        let descriptor = &candidate.descriptor;
        let mut substitution = candidate.class_substitution.clone();
        let mut type_arguments = Vec::new();
        for param in &descriptor.type_params {
            let var = db.fresh_type_var(Some(param.id));
            system.register_variable(var);
            substitution.insert_param(param.id, db.var_type(var));
            type_arguments.push((param.id, db.var_type(var)));
        }
        for (param, &(_, ty)) in descriptor.type_params.iter().zip(&type_arguments) {
            for &bound in &param.upper_bounds {
                let bound = instantiate_type(db, bound, &substitution);
                system.add_subtype_constraint(
                    db,
                    ty,
                    bound,
                    ConstraintPosition::DeclaredUpperBound { param: param.id },
                );
            }
        }

        let mut params = TypeList::new();
        if let Some(receiver) = candidate.unbound_receiver {
            params.push(instantiate_type(db, receiver, &substitution));
        }
        for param in &descriptor.value_params {
            let ty = instantiate_type(db, param.ty, &substitution);
            params.push(if param.vararg { db.array_type(ty) } else { ty });
        }
        let ret = instantiate_type(db, descriptor.return_type, &substitution);
        (db.function_type(None, params, ret), type_arguments)
    }
}

fn declared_param_types(params: Option<&[LambdaParam]>) -> Vec<TypeId> {
    params
        .unwrap_or_default()
        .iter()
        .map(|param| param.declared_type.unwrap_or(TypeId::ERROR))
        .collect()
}

#[cfg(test)]
#[path = "../tests/postponed_tests.rs"]
mod tests;
