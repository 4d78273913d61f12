//! Expression resolution.
//!
//! `CallResolver` is the public entry point. Each call site gets a
//! `ResolutionSession` holding the per-site state: the shared result cache,
//! the diagnostic sink, emitted flow facts and the stack of active builder
//! inferences. Every sub-expression (receiver, argument, lambda body) is
//! resolved recursively through `resolve_expr`.
//!
//! The call pipeline for one call expression:
//!
//! 1. resolve the explicit receiver (complete, no expectation)
//! 2. resolve value arguments in partial mode; lambdas and callable
//!    references stay unresolved until completion
//! 3. collect candidate groups and check each group's candidates, stopping
//!    at the first group with an applicable candidate
//! 4. pick the most specific applicable candidate
//! 5. complete the winner's constraint system

use crate::applicability::{ArgumentInfo, ArgumentKind, CheckedCandidate};
use crate::argument_mapping::CallArgument;
use crate::cache::ResolutionCache;
use crate::collector::{CallShape, CandidateCollector, ExplicitReceiver};
use crate::completion::{BuilderSession, CompletionMode};
use crate::config::ResolverOptions;
use crate::declarations::{DeclId, DeclarationProvider};
use crate::diagnostics::{
    ClassifierContext, Diagnostic, DiagnosticCollector, DiagnosticKind, DiagnosticSink,
    classify_inapplicability,
};
use crate::expr::{Expr, ExprArena, ExprId, Literal};
use crate::flow::{DataFlowInfo, FlowFact, FlowSubject};
use crate::overload::{Disambiguation, choose_most_specific};
use crate::results::{CallSiteResult, ExpectedType, ExprResolution};
use crate::tower::{ReceiverId, ScopeTower};
use kres_common::limits::{STACK_GROWTH, STACK_RED_ZONE};
use kres_common::{Atom, Span};
use kres_solver::{TypeFormatter, TypeId, TypeInterner, integer_literal_default, integral_type_contains};
use std::rc::Rc;
use tracing::{debug, debug_span, trace};

/// Resolves call sites against a declaration provider.
pub struct CallResolver<'a> {
    db: &'a TypeInterner,
    provider: &'a dyn DeclarationProvider,
    options: ResolverOptions,
    module: Atom,
}

impl<'a> CallResolver<'a> {
    pub fn new(db: &'a TypeInterner, provider: &'a dyn DeclarationProvider) -> Self {
        CallResolver {
            db,
            provider,
            options: ResolverOptions::default(),
            module: Atom::NONE,
        }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// Module the resolved code belongs to, for `internal` visibility.
    pub fn in_module(mut self, module: Atom) -> Self {
        self.module = module;
        self
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolves `expr` with a fresh cache.
    pub fn resolve(
        &self,
        arena: &ExprArena,
        expr: ExprId,
        tower: &ScopeTower,
        flow: &DataFlowInfo,
        expected: ExpectedType,
    ) -> CallSiteResult {
        let mut cache = ResolutionCache::new();
        self.resolve_with_cache(arena, expr, tower, flow, expected, &mut cache)
    }

    /// Resolves `expr`, reusing and extending `cache`. Resolving an
    /// expression already in the cache returns the cached result.
    pub fn resolve_with_cache(
        &self,
        arena: &ExprArena,
        expr: ExprId,
        tower: &ScopeTower,
        flow: &DataFlowInfo,
        expected: ExpectedType,
        cache: &mut ResolutionCache,
    ) -> CallSiteResult {
        let _span = debug_span!("resolve_call_site", expr = expr.0).entered();
        let mut session = ResolutionSession::new(self, arena, cache);
        let ctx = ExprContext {
            tower: tower.clone(),
            flow: flow.clone(),
            expected,
            mode: CompletionMode::Full,
            check_expected: true,
        };
        let resolution = session.resolve_expr(expr, &ctx);
        session.report_all(&resolution.diagnostics);

        let diagnostics = session.diagnostics.into_diagnostics();
        debug!(
            ty = %TypeFormatter::new(self.db).format(resolution.ty),
            diagnostics = diagnostics.len(),
            "call site resolved"
        );
        CallSiteResult {
            resolution,
            flow_facts: session.flow_facts,
            diagnostics,
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// Context an expression is resolved in.
#[derive(Clone, Debug)]
pub(crate) struct ExprContext {
    pub(crate) tower: ScopeTower,
    pub(crate) flow: DataFlowInfo,
    pub(crate) expected: ExpectedType,
    pub(crate) mode: CompletionMode,
    /// Report a result that does not conform to `expected`. Off inside
    /// lambda bodies, where the enclosing call constrains the return type.
    pub(crate) check_expected: bool,
}

impl ExprContext {
    pub(crate) fn with_expected(&self, expected: ExpectedType, mode: CompletionMode) -> ExprContext {
        ExprContext {
            tower: self.tower.clone(),
            flow: self.flow.clone(),
            expected,
            mode,
            check_expected: self.check_expected,
        }
    }

    /// Explicit receivers and statements: complete, unconstrained.
    pub(crate) fn unconstrained(&self) -> ExprContext {
        self.with_expected(ExpectedType::NoExpectation, CompletionMode::Full)
    }

    /// Value arguments: partial, unconstrained.
    pub(crate) fn argument(&self) -> ExprContext {
        self.with_expected(ExpectedType::NoExpectation, CompletionMode::Partial)
    }
}

pub(crate) struct WellKnownNames {
    pub(crate) it: Atom,
    pub(crate) this: Atom,
}

/// One call expression as the pipeline sees it.
#[derive(Clone, Debug)]
pub(crate) struct CallSite {
    pub(crate) expr: ExprId,
    pub(crate) name: Atom,
    pub(crate) shape: CallShape,
    pub(crate) receiver: Option<ExprId>,
    pub(crate) safe: bool,
    pub(crate) type_args: Vec<TypeId>,
    pub(crate) args: Vec<CallArgument>,
    /// Operator syntax (`a + b`, `a < b`).
    pub(crate) operator: bool,
    pub(crate) span: Span,
}

pub(crate) struct ResolutionSession<'s> {
    pub(crate) db: &'s TypeInterner,
    pub(crate) provider: &'s dyn DeclarationProvider,
    pub(crate) options: &'s ResolverOptions,
    pub(crate) module: Atom,
    pub(crate) arena: &'s ExprArena,
    pub(crate) cache: &'s mut ResolutionCache,
    pub(crate) diagnostics: DiagnosticCollector,
    pub(crate) flow_facts: Vec<FlowFact>,
    pub(crate) builder_stack: Vec<BuilderSession>,
    pub(crate) names: WellKnownNames,
    depth: u32,
    next_synthetic: u32,
}

const SYNTHETIC_RECEIVER_BASE: u32 = 1 << 31;

impl<'s> ResolutionSession<'s> {
    fn new(
        resolver: &'s CallResolver<'_>,
        arena: &'s ExprArena,
        cache: &'s mut ResolutionCache,
    ) -> Self {
        let db = resolver.db;
        ResolutionSession {
            db,
            provider: resolver.provider,
            options: &resolver.options,
            module: resolver.module,
            arena,
            cache,
            diagnostics: DiagnosticCollector::new(resolver.options.report_warnings),
            flow_facts: Vec::new(),
            builder_stack: Vec::new(),
            names: WellKnownNames {
                it: db.intern_string("it"),
                this: db.intern_string("this"),
            },
            depth: 0,
            next_synthetic: 0,
        }
    }

    pub(crate) fn fresh_decl_id(&mut self) -> DeclId {
        self.next_synthetic += 1;
        DeclId::synthetic(self.next_synthetic)
    }

    pub(crate) fn fresh_receiver_id(&mut self) -> ReceiverId {
        self.next_synthetic += 1;
        ReceiverId(SYNTHETIC_RECEIVER_BASE | self.next_synthetic)
    }

    pub(crate) fn report_all(&mut self, diagnostics: &[Diagnostic]) {
        for diagnostic in diagnostics {
            self.diagnostics.report(diagnostic.clone());
        }
    }

    /// Caches `resolution` as the result of `expr`.
    pub(crate) fn store(&mut self, expr: ExprId, resolution: ExprResolution) -> Rc<ExprResolution> {
        let resolution = Rc::new(resolution);
        self.cache.insert(expr, resolution.clone());
        for session in &mut self.builder_stack {
            session.touched.push(expr);
        }
        resolution
    }

    /// Error node for `kind`, reported at `span`.
    pub(crate) fn error_node(
        &mut self,
        kind: DiagnosticKind,
        span: Span,
        candidates: Vec<DeclId>,
    ) -> ExprResolution {
        let diagnostic = Diagnostic::new(kind, span);
        self.diagnostics.report(diagnostic.clone());
        ExprResolution::error(vec![diagnostic], candidates)
    }

    pub(crate) fn resolve_expr(&mut self, expr: ExprId, ctx: &ExprContext) -> Rc<ExprResolution> {
        if let Some(cached) = self.cache.get(expr)
            && (!cached.is_partial() || ctx.mode == CompletionMode::Partial)
        {
            trace!(expr = expr.0, "resolution cache hit");
            return cached;
        }
        if self.depth >= self.options.max_resolution_depth {
            let span = self.arena.span(expr);
            let resolution = self.error_node(DiagnosticKind::RecursionInInference, span, Vec::new());
            return self.store(expr, resolution);
        }

        self.depth += 1;
        let resolution = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            self.resolve_uncached(expr, ctx)
        });
        self.depth -= 1;
        resolution
    }

    fn resolve_uncached(&mut self, expr: ExprId, ctx: &ExprContext) -> Rc<ExprResolution> {
        let arena = self.arena;
        let span = arena.span(expr);
        let Some(node) = arena.get(expr) else {
            return Rc::new(ExprResolution::of_type(TypeId::ERROR));
        };

        let resolution = match node {
            // Literals depend on the context's mode and are never cached.
            Expr::Literal(literal) => {
                return Rc::new(ExprResolution::of_type(self.literal_type(literal, ctx)));
            }
            Expr::This { label } => self.resolve_this(*label, span, ctx),
            Expr::NotNull(inner) => self.resolve_not_null(*inner, ctx),
            Expr::Block(statements) => self.resolve_block(statements, ctx),
            Expr::Lambda { params, body } => {
                self.resolve_standalone_lambda(params.as_deref(), *body, ctx)
            }
            Expr::CallableRef {
                receiver_type,
                name,
            } => self.resolve_standalone_reference(expr, *receiver_type, *name, ctx),
            Expr::Access {
                receiver,
                safe,
                name,
            } => {
                let site = CallSite {
                    expr,
                    name: *name,
                    shape: CallShape::Value,
                    receiver: *receiver,
                    safe: *safe,
                    type_args: Vec::new(),
                    args: Vec::new(),
                    operator: false,
                    span,
                };
                self.resolve_call(&site, ctx)
            }
            Expr::Call {
                receiver,
                safe,
                callee,
                type_args,
                args,
                trailing_lambda,
            } => {
                let mut call_args: Vec<CallArgument> = args
                    .iter()
                    .map(|arg| CallArgument {
                        name: arg.name,
                        spread: arg.spread,
                        expr: arg.value,
                        trailing: false,
                    })
                    .collect();
                if let Some(lambda) = trailing_lambda {
                    call_args.push(CallArgument {
                        name: None,
                        spread: false,
                        expr: *lambda,
                        trailing: true,
                    });
                }
                let site = CallSite {
                    expr,
                    name: *callee,
                    shape: CallShape::Function,
                    receiver: *receiver,
                    safe: *safe,
                    type_args: type_args.clone(),
                    args: call_args,
                    operator: false,
                    span,
                };
                self.resolve_call(&site, ctx)
            }
            Expr::Binary { op, lhs, rhs } => {
                let site = CallSite {
                    expr,
                    name: self.db.intern_string(op.operator_name()),
                    shape: CallShape::Function,
                    receiver: Some(*lhs),
                    safe: false,
                    type_args: Vec::new(),
                    args: vec![CallArgument {
                        name: None,
                        spread: false,
                        expr: *rhs,
                        trailing: false,
                    }],
                    operator: true,
                    span,
                };
                let mut resolution = self.resolve_call(&site, ctx);
                if op.is_comparison() && resolution.call.is_some() {
                    resolution.ty = TypeId::BOOLEAN;
                }
                resolution
            }
        };
        self.store(expr, resolution)
    }

    fn literal_type(&self, literal: &Literal, ctx: &ExprContext) -> TypeId {
        match *literal {
            Literal::Int(value) => match ctx.mode {
                CompletionMode::Partial => self.db.integer_literal(value),
                CompletionMode::Full => ctx
                    .expected
                    .ty()
                    .map(|expected| self.db.make_non_null(expected))
                    .filter(|&expected| integral_type_contains(expected, value))
                    .unwrap_or_else(|| integer_literal_default(value)),
            },
            Literal::Long(_) => TypeId::LONG,
            Literal::Double(_) => TypeId::DOUBLE,
            Literal::String(_) => TypeId::STRING,
            Literal::Bool(_) => TypeId::BOOLEAN,
            Literal::Char(_) => TypeId::CHAR,
            Literal::Null => TypeId::NULLABLE_NOTHING,
        }
    }

    fn resolve_this(&mut self, label: Option<Atom>, span: Span, ctx: &ExprContext) -> ExprResolution {
        let Some(receiver) = ctx.tower.find_receiver(label) else {
            let name = label.unwrap_or(self.names.this);
            return self.error_node(DiagnosticKind::UnresolvedReference { name }, span, Vec::new());
        };
        let subject = FlowSubject::Receiver(receiver.id);
        let ty = ctx
            .flow
            .smart_cast_type(self.db, subject, receiver.ty)
            .unwrap_or(receiver.ty);
        ExprResolution {
            subject: Some(subject),
            ..ExprResolution::of_type(ty)
        }
    }

    fn resolve_not_null(&mut self, inner: ExprId, ctx: &ExprContext) -> ExprResolution {
        let operand = self.resolve_expr(inner, &ctx.unconstrained());
        if operand.is_error() {
            return ExprResolution::error(Vec::new(), Vec::new());
        }
        if let Some(subject) = operand.subject {
            self.flow_facts.push(FlowFact::NonNull { subject });
        }
        ExprResolution {
            subject: operand.subject,
            ..ExprResolution::of_type(self.db.make_non_null(operand.ty))
        }
    }

    fn resolve_block(&mut self, statements: &[ExprId], ctx: &ExprContext) -> ExprResolution {
        let Some((&last, init)) = statements.split_last() else {
            return ExprResolution::of_type(TypeId::UNIT);
        };
        for &statement in init {
            self.resolve_expr(statement, &ctx.unconstrained());
        }
        let result = self.resolve_expr(last, &ctx.with_expected(ctx.expected, CompletionMode::Full));
        ExprResolution {
            subject: result.subject,
            unstable_smart_cast: result.unstable_smart_cast,
            ..ExprResolution::of_type(result.ty)
        }
    }

    // =========================================================================
    // Calls
    // =========================================================================

    pub(crate) fn resolve_call(&mut self, site: &CallSite, ctx: &ExprContext) -> ExprResolution {
        let db = self.db;
        let _span = debug_span!(
            "resolve_call",
            name = %db.resolve_atom(site.name),
            expr = site.expr.0,
            mode = ?ctx.mode
        )
        .entered();

        let explicit = match site.receiver {
            Some(receiver) => {
                let resolved = self.resolve_expr(receiver, &ctx.unconstrained());
                if resolved.is_error() {
                    // Already reported; no cascade.
                    return ExprResolution::error(Vec::new(), Vec::new());
                }
                Some(ExplicitReceiver {
                    expr: receiver,
                    ty: resolved.ty,
                    safe: site.safe,
                    subject: resolved.subject,
                    unstable_smart_cast: resolved.unstable_smart_cast,
                })
            }
            None => None,
        };

        let arguments = self.resolve_arguments(site, ctx);
        let groups = CandidateCollector::new(db, self.provider, &ctx.tower, &ctx.flow).collect(
            site.name,
            explicit.as_ref(),
            site.shape,
        );
        if groups.is_empty() {
            return self.error_node(
                DiagnosticKind::UnresolvedReference { name: site.name },
                site.span,
                Vec::new(),
            );
        }

        let mut failed = Vec::new();
        for (index, group) in groups.into_iter().enumerate() {
            let mut applicable = Vec::new();
            for candidate in group.candidates {
                let checked = self.check_candidate(candidate, site, explicit.as_ref(), &arguments, ctx);
                if checked.is_applicable() {
                    applicable.push(checked);
                } else {
                    failed.push(checked);
                }
            }
            if applicable.is_empty() {
                continue;
            }
            trace!(group = index, applicable = applicable.len(), "applicable candidates found");
            return match choose_most_specific(db, applicable) {
                Disambiguation::Unique(winner) => {
                    self.complete_call(*winner, site, explicit.as_ref(), &arguments, ctx)
                }
                Disambiguation::Ambiguous(candidates) => self.error_node(
                    DiagnosticKind::OverloadAmbiguity {
                        candidates: candidates.clone(),
                    },
                    site.span,
                    candidates,
                ),
            };
        }
        self.report_inapplicable(site, &arguments, failed)
    }

    fn resolve_arguments(&mut self, site: &CallSite, ctx: &ExprContext) -> Vec<ArgumentInfo> {
        let arena = self.arena;
        let mut arguments = Vec::with_capacity(site.args.len());
        for arg in &site.args {
            let kind = match arena.get(arg.expr) {
                Some(Expr::Lambda { params, body }) => ArgumentKind::Lambda {
                    params: params.clone(),
                    body: *body,
                },
                Some(Expr::CallableRef {
                    receiver_type,
                    name,
                }) => ArgumentKind::CallableRef {
                    receiver_type: *receiver_type,
                    name: *name,
                },
                _ => ArgumentKind::Expression(self.resolve_expr(arg.expr, &ctx.argument())),
            };
            arguments.push(ArgumentInfo {
                expr: arg.expr,
                spread: arg.spread,
                span: arena.span(arg.expr),
                kind,
            });
        }
        arguments
    }

    /// Error node for a call none of whose candidates applies. Only the
    /// candidates closest to applicability are reported; a candidate
    /// rejected for its implicit receiver's type is not reported at all.
    fn report_inapplicable(
        &mut self,
        site: &CallSite,
        arguments: &[ArgumentInfo],
        mut failed: Vec<CheckedCandidate>,
    ) -> ExprResolution {
        failed.retain(|checked| !checked.excluded_from_diagnostics());
        let Some(best) = failed.iter().map(CheckedCandidate::closeness).max() else {
            return self.error_node(
                DiagnosticKind::UnresolvedReference { name: site.name },
                site.span,
                Vec::new(),
            );
        };
        failed.retain(|checked| checked.closeness() == best);

        let mut candidates: Vec<DeclId> = failed.iter().map(CheckedCandidate::declaration).collect();
        candidates.sort();
        candidates.dedup();

        if let [checked] = failed.as_slice() {
            let spans: Vec<Span> = arguments.iter().map(|arg| arg.span).collect();
            let classifier = ClassifierContext {
                db: self.db,
                call_span: site.span,
                argument_spans: &spans,
                declaration: checked.declaration(),
            };
            let mut diagnostics: Vec<Diagnostic> = Vec::new();
            for reason in &checked.reasons {
                let diagnostic = classify_inapplicability(&classifier, reason);
                if !diagnostics.contains(&diagnostic) {
                    diagnostics.push(diagnostic);
                }
            }
            self.report_all(&diagnostics);
            return ExprResolution::error(diagnostics, candidates);
        }

        self.error_node(
            DiagnosticKind::NoneApplicable {
                candidates: candidates.clone(),
            },
            site.span,
            candidates,
        )
    }
}

#[cfg(test)]
#[path = "../tests/resolver_tests.rs"]
mod tests;
