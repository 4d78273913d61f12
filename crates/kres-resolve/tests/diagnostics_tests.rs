use super::*;
use crate::argument_mapping::MappingError;

fn context<'a>(db: &'a TypeInterner, argument_spans: &'a [Span]) -> ClassifierContext<'a> {
    ClassifierContext {
        db,
        call_span: Span::new(0, 20),
        argument_spans,
        declaration: DeclId(4),
    }
}

fn contradiction(lower: TypeId, upper: TypeId, position: ConstraintPosition) -> ConstraintError {
    ConstraintError::Contradiction {
        var: None,
        lower,
        upper,
        position,
    }
}

#[test]
fn test_codes_and_default_categories() {
    let unresolved = Diagnostic::new(DiagnosticKind::UnresolvedReference { name: Atom::NONE }, Span::dummy());
    assert_eq!(unresolved.code, diagnostic_codes::UNRESOLVED_REFERENCE);
    assert_eq!(unresolved.category, DiagnosticCategory::Error);

    let smart_cast = Diagnostic::new(DiagnosticKind::UnstableSmartCast { ty: TypeId::STRING }, Span::dummy());
    assert_eq!(smart_cast.code, diagnostic_codes::UNSTABLE_SMART_CAST);
    assert_eq!(smart_cast.category, DiagnosticCategory::Warning);
    assert_eq!(
        smart_cast.with_category(DiagnosticCategory::Error).category,
        DiagnosticCategory::Error
    );
}

#[test]
fn test_collector_drops_duplicates() {
    let mut sink = DiagnosticCollector::new(true);
    let diagnostic = Diagnostic::new(DiagnosticKind::RecursionInInference, Span::new(1, 2));

    sink.report(diagnostic.clone());
    sink.report(diagnostic.clone());
    sink.report(Diagnostic::new(DiagnosticKind::RecursionInInference, Span::new(3, 4)));

    assert_eq!(sink.len(), 2);
    assert_eq!(sink.diagnostics()[0], diagnostic);
}

#[test]
fn test_collector_suppresses_warnings_when_disabled() {
    let mut sink = DiagnosticCollector::new(false);
    sink.report(Diagnostic::new(DiagnosticKind::UnstableSmartCast { ty: TypeId::INT }, Span::dummy()));
    assert!(sink.is_empty());

    sink.report(
        Diagnostic::new(DiagnosticKind::UnstableSmartCast { ty: TypeId::INT }, Span::dummy())
            .with_category(DiagnosticCategory::Error),
    );
    assert_eq!(sink.into_diagnostics().len(), 1);
}

#[test]
fn test_argument_contradiction_with_nullable_actual() {
    let db = TypeInterner::new();
    let spans = [Span::new(2, 5), Span::new(7, 9)];
    let ctx = context(&db, &spans);
    let nullable = db.make_nullable(TypeId::STRING);

    let diagnostic = classify_constraint_error(
        &ctx,
        &contradiction(nullable, TypeId::STRING, ConstraintPosition::Argument { index: 1 }),
    );

    assert_eq!(
        diagnostic.kind,
        DiagnosticKind::ArgumentNullabilityMismatch {
            argument: 1,
            expected: TypeId::STRING,
            actual: nullable,
        }
    );
    assert_eq!(diagnostic.span, Span::new(7, 9));
}

#[test]
fn test_argument_contradiction_between_unrelated_types() {
    let db = TypeInterner::new();
    let spans = [Span::new(2, 5)];
    let ctx = context(&db, &spans);

    let diagnostic = classify_constraint_error(
        &ctx,
        &contradiction(TypeId::STRING, TypeId::INT, ConstraintPosition::Argument { index: 0 }),
    );

    assert_eq!(
        diagnostic.kind,
        DiagnosticKind::ArgumentTypeMismatch {
            argument: 0,
            expected: TypeId::INT,
            actual: TypeId::STRING,
        }
    );
    assert_eq!(diagnostic.code, diagnostic_codes::ARGUMENT_TYPE_MISMATCH);
}

#[test]
fn test_receiver_contradiction_on_nullable_is_unsafe_call() {
    let db = TypeInterner::new();
    let ctx = context(&db, &[]);
    let nullable = db.make_nullable(TypeId::STRING);

    let unsafe_call = classify_constraint_error(
        &ctx,
        &contradiction(nullable, TypeId::CHAR_SEQUENCE, ConstraintPosition::Receiver),
    );
    assert_eq!(
        unsafe_call.kind,
        DiagnosticKind::UnsafeCallOnNullable {
            receiver_type: nullable
        }
    );

    let mismatch = classify_constraint_error(
        &ctx,
        &contradiction(TypeId::INT, TypeId::STRING, ConstraintPosition::Receiver),
    );
    assert!(matches!(mismatch.kind, DiagnosticKind::ReceiverTypeMismatch { .. }));
}

#[test]
fn test_expected_type_and_internal_positions() {
    let db = TypeInterner::new();
    let ctx = context(&db, &[]);

    let result = classify_constraint_error(
        &ctx,
        &contradiction(TypeId::INT, TypeId::STRING, ConstraintPosition::ExpectedType),
    );
    assert!(matches!(result.kind, DiagnosticKind::ResultTypeMismatch { .. }));
    assert_eq!(result.span, ctx.call_span);

    let internal = classify_constraint_error(
        &ctx,
        &contradiction(TypeId::INT, TypeId::STRING, ConstraintPosition::Fixation),
    );
    assert_eq!(
        internal.kind,
        DiagnosticKind::ConstraintContradiction {
            lower: TypeId::INT,
            upper: TypeId::STRING,
        }
    );
}

#[test]
fn test_variable_errors_name_the_type_parameter() {
    let db = TypeInterner::new();
    let ctx = context(&db, &[]);
    let param = db.new_type_param("T");
    let var = db.fresh_type_var(Some(param));

    let empty = classify_constraint_error(
        &ctx,
        &ConstraintError::EmptyIntersection {
            var,
            bounds: vec![TypeId::INT, TypeId::STRING],
        },
    );
    assert_eq!(
        empty.kind,
        DiagnosticKind::EmptyIntersection {
            type_parameter: db.intern_string("T"),
            bounds: vec![TypeId::INT, TypeId::STRING],
        }
    );

    let unknown = classify_constraint_error(&ctx, &ConstraintError::NotEnoughInformation { var });
    assert_eq!(
        unknown.code,
        diagnostic_codes::NOT_ENOUGH_INFORMATION_FOR_TYPE_PARAMETER
    );

    let limit = classify_constraint_error(&ctx, &ConstraintError::IncorporationLimit);
    assert_eq!(limit.kind, DiagnosticKind::RecursionInInference);
}

#[test]
fn test_mapping_error_points_at_argument() {
    let db = TypeInterner::new();
    let spans = [Span::new(2, 3), Span::new(5, 6)];
    let ctx = context(&db, &spans);

    let extra = classify_inapplicability(
        &ctx,
        &InapplicabilityReason::ArgumentMapping(MappingError {
            kind: MappingErrorKind::TooManyArguments,
            argument: Some(1),
        }),
    );
    assert_eq!(extra.span, Span::new(5, 6));

    let missing = classify_inapplicability(
        &ctx,
        &InapplicabilityReason::ArgumentMapping(MappingError {
            kind: MappingErrorKind::NoValueForParameter { parameter: Atom::NONE },
            argument: None,
        }),
    );
    assert_eq!(missing.span, ctx.call_span);
}

#[test]
fn test_inapplicability_names_the_declaration() {
    let db = TypeInterner::new();
    let ctx = context(&db, &[]);

    let invisible = classify_inapplicability(&ctx, &InapplicabilityReason::Invisible);
    assert_eq!(invisible.kind, DiagnosticKind::VisibilityError { declaration: DeclId(4) });

    let operator = classify_inapplicability(&ctx, &InapplicabilityReason::OperatorModifierRequired);
    assert_eq!(
        operator.kind,
        DiagnosticKind::OperatorModifierRequired { declaration: DeclId(4) }
    );

    let smart_cast =
        classify_inapplicability(&ctx, &InapplicabilityReason::UnstableSmartCast { ty: TypeId::STRING });
    assert_eq!(smart_cast.category, DiagnosticCategory::Error);
}

#[test]
fn test_out_of_range_literal_is_argument_mismatch() {
    let db = TypeInterner::new();
    let spans = [Span::new(4, 14)];
    let ctx = context(&db, &spans);
    let literal = db.integer_literal(3_000_000_000);

    let diagnostic = classify_completion_error(
        &ctx,
        &CompletionError::LiteralOutOfRange {
            argument: 0,
            expected: TypeId::INT,
            actual: literal,
        },
    );

    assert_eq!(diagnostic.span, Span::new(4, 14));
    assert_eq!(diagnostic.code, diagnostic_codes::ARGUMENT_TYPE_MISMATCH);
}
