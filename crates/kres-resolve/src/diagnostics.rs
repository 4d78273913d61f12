//! Diagnostic kinds and the classifier.
//!
//! Failures inside the engine are plain values: `InapplicabilityReason` per
//! candidate, `ConstraintError` per system, `CompletionError` per completed
//! call. This module is the one place that translates them into
//! `DiagnosticKind`s. Message text is up to the reporter, keyed on the
//! stable `code()`.

use crate::applicability::InapplicabilityReason;
use crate::argument_mapping::MappingErrorKind;
use crate::completion::CompletionError;
use crate::declarations::DeclId;
use kres_common::{Atom, DiagnosticCategory, Span, diagnostic_codes};
use kres_solver::visitor::contains_type_vars;
use kres_solver::{ConstraintError, ConstraintPosition, TypeId, TypeInterner, is_subtype};
use rustc_hash::FxHashSet;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    UnresolvedReference { name: Atom },
    OverloadAmbiguity { candidates: Vec<DeclId> },
    /// Several candidates failed equally close to applicability.
    NoneApplicable { candidates: Vec<DeclId> },
    ArgumentTypeMismatch { argument: u32, expected: TypeId, actual: TypeId },
    ArgumentNullabilityMismatch { argument: u32, expected: TypeId, actual: TypeId },
    ArgumentsMappingError { kind: MappingErrorKind },
    WrongNumberOfTypeArguments { expected: u32, actual: u32 },
    ConstraintContradiction { lower: TypeId, upper: TypeId },
    EmptyIntersection { type_parameter: Atom, bounds: Vec<TypeId> },
    NotEnoughInformationForTypeParameter { type_parameter: Atom },
    RecursionInInference,
    VisibilityError { declaration: DeclId },
    ReceiverTypeMismatch { expected: TypeId, actual: TypeId },
    UnsafeCallOnNullable { receiver_type: TypeId },
    ResultTypeMismatch { expected: TypeId, actual: TypeId },
    OperatorModifierRequired { declaration: DeclId },
    UnstableSmartCast { ty: TypeId },
}

impl DiagnosticKind {
    pub fn code(&self) -> u32 {
        use diagnostic_codes::*;
        match self {
            DiagnosticKind::UnresolvedReference { .. } => UNRESOLVED_REFERENCE,
            DiagnosticKind::OverloadAmbiguity { .. } => OVERLOAD_AMBIGUITY,
            DiagnosticKind::NoneApplicable { .. } => NONE_APPLICABLE,
            DiagnosticKind::ArgumentTypeMismatch { .. } => ARGUMENT_TYPE_MISMATCH,
            DiagnosticKind::ArgumentNullabilityMismatch { .. } => ARGUMENT_NULLABILITY_MISMATCH,
            DiagnosticKind::ArgumentsMappingError { .. } => ARGUMENTS_MAPPING_ERROR,
            DiagnosticKind::WrongNumberOfTypeArguments { .. } => WRONG_NUMBER_OF_TYPE_ARGUMENTS,
            DiagnosticKind::ConstraintContradiction { .. } => CONSTRAINT_CONTRADICTION,
            DiagnosticKind::EmptyIntersection { .. } => EMPTY_INTERSECTION,
            DiagnosticKind::NotEnoughInformationForTypeParameter { .. } => {
                NOT_ENOUGH_INFORMATION_FOR_TYPE_PARAMETER
            }
            DiagnosticKind::RecursionInInference => RECURSION_IN_INFERENCE,
            DiagnosticKind::VisibilityError { .. } => VISIBILITY_ERROR,
            DiagnosticKind::ReceiverTypeMismatch { .. } => RECEIVER_TYPE_MISMATCH,
            DiagnosticKind::UnsafeCallOnNullable { .. } => UNSAFE_CALL_ON_NULLABLE,
            DiagnosticKind::ResultTypeMismatch { .. } => RESULT_TYPE_MISMATCH,
            DiagnosticKind::OperatorModifierRequired { .. } => OPERATOR_MODIFIER_REQUIRED,
            DiagnosticKind::UnstableSmartCast { .. } => UNSTABLE_SMART_CAST,
        }
    }

    pub fn default_category(&self) -> DiagnosticCategory {
        match self {
            DiagnosticKind::UnstableSmartCast { .. } => DiagnosticCategory::Warning,
            _ => DiagnosticCategory::Error,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub span: Span,
    pub category: DiagnosticCategory,
    pub code: u32,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, span: Span) -> Self {
        Diagnostic {
            category: kind.default_category(),
            code: kind.code(),
            kind,
            span,
        }
    }

    pub fn with_category(mut self, category: DiagnosticCategory) -> Self {
        self.category = category;
        self
    }
}

/// Destination of classified diagnostics.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Sink that drops exact duplicates, keeping first-report order.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
    seen: FxHashSet<Diagnostic>,
    report_warnings: bool,
}

impl DiagnosticCollector {
    pub fn new(report_warnings: bool) -> Self {
        DiagnosticCollector {
            diagnostics: Vec::new(),
            seen: FxHashSet::default(),
            report_warnings,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl DiagnosticSink for DiagnosticCollector {
    fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.category == DiagnosticCategory::Warning && !self.report_warnings {
            return;
        }
        if self.seen.insert(diagnostic.clone()) {
            self.diagnostics.push(diagnostic);
        }
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Source positions of the call being classified.
pub struct ClassifierContext<'a> {
    pub db: &'a TypeInterner,
    pub call_span: Span,
    /// One span per argument, trailing lambda last.
    pub argument_spans: &'a [Span],
    pub declaration: DeclId,
}

impl ClassifierContext<'_> {
    fn argument_span(&self, argument: u32) -> Span {
        self.argument_spans
            .get(argument as usize)
            .copied()
            .unwrap_or(self.call_span)
    }

    /// `actual` fails `expected` only because it may be null.
    fn is_nullability_mismatch(&self, actual: TypeId, expected: TypeId) -> bool {
        let db = self.db;
        if !db.is_marked_nullable(actual) || db.accepts_null(expected) {
            return false;
        }
        contains_type_vars(db, expected) || is_subtype(db, db.make_non_null(actual), expected)
    }
}

pub fn classify_constraint_error(
    ctx: &ClassifierContext<'_>,
    error: &ConstraintError,
) -> Diagnostic {
    match error {
        ConstraintError::Contradiction {
            lower,
            upper,
            position,
            ..
        } => classify_contradiction(ctx, *lower, *upper, *position),
        ConstraintError::EmptyIntersection { var, bounds } => Diagnostic::new(
            DiagnosticKind::EmptyIntersection {
                type_parameter: ctx.db.type_var_name(*var),
                bounds: bounds.clone(),
            },
            ctx.call_span,
        ),
        ConstraintError::NotEnoughInformation { var } => Diagnostic::new(
            DiagnosticKind::NotEnoughInformationForTypeParameter {
                type_parameter: ctx.db.type_var_name(*var),
            },
            ctx.call_span,
        ),
        ConstraintError::IncorporationLimit => {
            Diagnostic::new(DiagnosticKind::RecursionInInference, ctx.call_span)
        }
    }
}

fn classify_contradiction(
    ctx: &ClassifierContext<'_>,
    lower: TypeId,
    upper: TypeId,
    position: ConstraintPosition,
) -> Diagnostic {
    match position {
        ConstraintPosition::Argument { index } => {
            let kind = if ctx.is_nullability_mismatch(lower, upper) {
                DiagnosticKind::ArgumentNullabilityMismatch {
                    argument: index,
                    expected: upper,
                    actual: lower,
                }
            } else {
                DiagnosticKind::ArgumentTypeMismatch {
                    argument: index,
                    expected: upper,
                    actual: lower,
                }
            };
            Diagnostic::new(kind, ctx.argument_span(index))
        }
        ConstraintPosition::LambdaReturn { argument }
        | ConstraintPosition::CallableReference { argument } => Diagnostic::new(
            DiagnosticKind::ArgumentTypeMismatch {
                argument,
                expected: upper,
                actual: lower,
            },
            ctx.argument_span(argument),
        ),
        ConstraintPosition::Receiver => {
            let kind = if ctx.is_nullability_mismatch(lower, upper) {
                DiagnosticKind::UnsafeCallOnNullable {
                    receiver_type: lower,
                }
            } else {
                DiagnosticKind::ReceiverTypeMismatch {
                    expected: upper,
                    actual: lower,
                }
            };
            Diagnostic::new(kind, ctx.call_span)
        }
        ConstraintPosition::ExpectedType => Diagnostic::new(
            DiagnosticKind::ResultTypeMismatch {
                expected: upper,
                actual: lower,
            },
            ctx.call_span,
        ),
        ConstraintPosition::DeclaredUpperBound { .. }
        | ConstraintPosition::Injected
        | ConstraintPosition::Fixation
        | ConstraintPosition::Incorporation => Diagnostic::new(
            DiagnosticKind::ConstraintContradiction { lower, upper },
            ctx.call_span,
        ),
    }
}

pub fn classify_inapplicability(
    ctx: &ClassifierContext<'_>,
    reason: &InapplicabilityReason,
) -> Diagnostic {
    match reason {
        InapplicabilityReason::ArgumentMapping(error) => {
            let span = error
                .argument
                .map_or(ctx.call_span, |argument| ctx.argument_span(argument));
            Diagnostic::new(
                DiagnosticKind::ArgumentsMappingError {
                    kind: error.kind.clone(),
                },
                span,
            )
        }
        InapplicabilityReason::WrongNumberOfTypeArguments { expected, actual } => Diagnostic::new(
            DiagnosticKind::WrongNumberOfTypeArguments {
                expected: *expected,
                actual: *actual,
            },
            ctx.call_span,
        ),
        InapplicabilityReason::Invisible => Diagnostic::new(
            DiagnosticKind::VisibilityError {
                declaration: ctx.declaration,
            },
            ctx.call_span,
        ),
        InapplicabilityReason::ReceiverTypeMismatch {
            expected, actual, ..
        } => Diagnostic::new(
            DiagnosticKind::ReceiverTypeMismatch {
                expected: *expected,
                actual: *actual,
            },
            ctx.call_span,
        ),
        InapplicabilityReason::UnsafeCall { receiver_type } => Diagnostic::new(
            DiagnosticKind::UnsafeCallOnNullable {
                receiver_type: *receiver_type,
            },
            ctx.call_span,
        ),
        InapplicabilityReason::OperatorModifierRequired => Diagnostic::new(
            DiagnosticKind::OperatorModifierRequired {
                declaration: ctx.declaration,
            },
            ctx.call_span,
        ),
        InapplicabilityReason::UnstableSmartCast { ty } => {
            Diagnostic::new(DiagnosticKind::UnstableSmartCast { ty: *ty }, ctx.call_span)
                .with_category(DiagnosticCategory::Error)
        }
        InapplicabilityReason::LambdaShapeMismatch {
            argument,
            expected,
            actual,
        } => Diagnostic::new(
            DiagnosticKind::ArgumentTypeMismatch {
                argument: *argument,
                expected: *expected,
                actual: *actual,
            },
            ctx.argument_span(*argument),
        ),
        InapplicabilityReason::Constraint(error) => classify_constraint_error(ctx, error),
    }
}

pub fn classify_completion_error(
    ctx: &ClassifierContext<'_>,
    error: &CompletionError,
) -> Diagnostic {
    match error {
        CompletionError::Constraint(error) => classify_constraint_error(ctx, error),
        CompletionError::RecursionInInference => {
            Diagnostic::new(DiagnosticKind::RecursionInInference, ctx.call_span)
        }
        CompletionError::ResultTypeMismatch { expected, actual } => Diagnostic::new(
            DiagnosticKind::ResultTypeMismatch {
                expected: *expected,
                actual: *actual,
            },
            ctx.call_span,
        ),
        CompletionError::LiteralOutOfRange {
            argument,
            expected,
            actual,
        } => Diagnostic::new(
            DiagnosticKind::ArgumentTypeMismatch {
                argument: *argument,
                expected: *expected,
                actual: *actual,
            },
            ctx.argument_span(*argument),
        ),
    }
}

#[cfg(test)]
#[path = "../tests/diagnostics_tests.rs"]
mod tests;
