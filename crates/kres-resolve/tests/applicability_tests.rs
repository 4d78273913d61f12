use super::*;
use crate::argument_mapping::{MappingError, MappingErrorKind};
use crate::config::ResolverOptions;
use crate::declarations::{DeclFlags, DescriptorBuilder, SymbolTable, Visibility};
use crate::diagnostics::DiagnosticKind;
use crate::expr::{Argument, Expr, ExprArena};
use crate::flow::{DataFlowInfo, FlowSubject};
use crate::resolver::CallResolver;
use crate::results::{CallSiteResult, ExpectedType};
use crate::tower::{ImplicitReceiver, ImportScope, LocalScope, ReceiverId, ReceiverKind, TowerLevel};
use kres_common::{Atom, Span, diagnostic_codes};
use kres_solver::{ClassId, ClassKind, TypeInterner};

struct Fixture {
    db: TypeInterner,
    table: SymbolTable,
    arena: ExprArena,
}

impl Fixture {
    fn new() -> Self {
        Fixture {
            db: TypeInterner::new(),
            table: SymbolTable::new(),
            arena: ExprArena::new(),
        }
    }

    fn name(&self, s: &str) -> Atom {
        self.db.intern_string(s)
    }

    fn imports(&self) -> ScopeTower {
        ScopeTower::new().push_level(TowerLevel::imports(ImportScope::Star(vec![Atom::NONE])))
    }

    fn resolve(&self, expr: ExprId, tower: &ScopeTower) -> CallSiteResult {
        self.resolve_in(CallResolver::new(&self.db, &self.table), expr, tower, &DataFlowInfo::new())
    }

    fn resolve_in(
        &self,
        resolver: CallResolver<'_>,
        expr: ExprId,
        tower: &ScopeTower,
        flow: &DataFlowInfo,
    ) -> CallSiteResult {
        resolver.resolve(&self.arena, expr, tower, flow, ExpectedType::NoExpectation)
    }

    fn call1(&mut self, name: &str, arg: ExprId) -> ExprId {
        let callee = self.name(name);
        self.arena.call(callee, vec![Argument::positional(arg)], Span::new(0, 10))
    }
}

fn kinds(result: &CallSiteResult) -> Vec<DiagnosticKind> {
    result.diagnostics.iter().map(|d| d.kind.clone()).collect()
}

#[test]
fn test_closeness_order() {
    let unstable = InapplicabilityReason::UnstableSmartCast { ty: TypeId::STRING };
    let unsafe_call = InapplicabilityReason::UnsafeCall {
        receiver_type: TypeId::STRING,
    };
    let mapping = InapplicabilityReason::ArgumentMapping(MappingError {
        kind: MappingErrorKind::TooManyArguments,
        argument: Some(0),
    });
    let receiver = InapplicabilityReason::ReceiverTypeMismatch {
        expected: TypeId::INT,
        actual: TypeId::STRING,
        implicit: false,
    };

    assert!(unstable.closeness() > unsafe_call.closeness());
    assert!(unsafe_call.closeness() > InapplicabilityReason::Invisible.closeness());
    assert!(InapplicabilityReason::Invisible.closeness() > mapping.closeness());
    assert!(mapping.closeness() > receiver.closeness());
}

#[test]
fn test_argument_type_mismatch() {
    let mut fx = Fixture::new();
    let f = fx.table.add(DescriptorBuilder::function(fx.name("f")).param(fx.name("x"), TypeId::BYTE));
    let big = fx.arena.int(300, Span::new(2, 5));
    let call = fx.call1("f", big);

    let result = fx.resolve(call, &fx.imports());

    assert_eq!(result.diagnostics.len(), 1);
    let diagnostic = &result.diagnostics[0];
    assert!(matches!(
        diagnostic.kind,
        DiagnosticKind::ArgumentTypeMismatch {
            argument: 0,
            expected: TypeId::BYTE,
            ..
        }
    ));
    assert_eq!(diagnostic.span, Span::new(2, 5));
    assert_eq!(result.resolution.candidates, vec![f]);
}

#[test]
fn test_nullable_argument_for_non_null_parameter() {
    let mut fx = Fixture::new();
    let s = fx.name("s");
    fx.table.add(DescriptorBuilder::function(fx.name("f")).param(fx.name("x"), TypeId::STRING));
    let nullable = fx.db.make_nullable(TypeId::STRING);
    let tower = fx
        .imports()
        .push_level(TowerLevel::local(LocalScope::new().with(CallableDescriptor::local(DeclId(100), s, nullable))));
    let arg = fx.arena.name_ref(s, Span::new(2, 3));
    let call = fx.call1("f", arg);

    let result = fx.resolve(call, &tower);

    assert_eq!(
        kinds(&result),
        vec![DiagnosticKind::ArgumentNullabilityMismatch {
            argument: 0,
            expected: TypeId::STRING,
            actual: nullable,
        }]
    );
}

#[test]
fn test_mapping_failure_is_reported_at_argument() {
    let mut fx = Fixture::new();
    fx.table.add(DescriptorBuilder::function(fx.name("f")).param(fx.name("x"), TypeId::INT));
    let one = fx.arena.int(1, Span::new(2, 3));
    let two = fx.arena.int(2, Span::new(5, 6));
    let callee = fx.name("f");
    let call = fx.arena.call(
        callee,
        vec![Argument::positional(one), Argument::positional(two)],
        Span::new(0, 7),
    );

    let result = fx.resolve(call, &fx.imports());

    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(
        result.diagnostics[0].kind,
        DiagnosticKind::ArgumentsMappingError {
            kind: MappingErrorKind::TooManyArguments
        }
    );
    assert_eq!(result.diagnostics[0].span, Span::new(5, 6));
}

#[test]
fn test_closest_failures_are_reported() {
    let mut fx = Fixture::new();
    let x = fx.name("x");
    let y = fx.name("y");
    let unary = fx.table.add(DescriptorBuilder::function(fx.name("f")).param(x, TypeId::INT));
    fx.table
        .add(DescriptorBuilder::function(fx.name("f")).param(x, TypeId::INT).param(y, TypeId::INT));
    let long = fx.table.add(DescriptorBuilder::function(fx.name("f")).param(x, TypeId::LONG));
    let text = fx.name("text");
    let arg = fx.arena.string(text, Span::new(2, 8));
    let call = fx.call1("f", arg);

    let result = fx.resolve(call, &fx.imports());

    // The two-parameter overload also misses `y` and is not listed.
    assert_eq!(
        kinds(&result),
        vec![DiagnosticKind::NoneApplicable {
            candidates: vec![unary, long]
        }]
    );
}

#[test]
fn test_wrong_number_of_type_arguments() {
    let mut fx = Fixture::new();
    let t = fx.db.new_type_param("T");
    fx.table.add(
        DescriptorBuilder::function(fx.name("id"))
            .type_param(&fx.db, t)
            .param(fx.name("x"), fx.db.type_param(t))
            .returns(fx.db.type_param(t)),
    );
    let one = fx.arena.int(1, Span::dummy());
    let callee = fx.name("id");
    let call = fx.arena.alloc(
        Expr::Call {
            receiver: None,
            safe: false,
            callee,
            type_args: vec![TypeId::INT, TypeId::STRING],
            args: vec![Argument::positional(one)],
            trailing_lambda: None,
        },
        Span::dummy(),
    );

    let result = fx.resolve(call, &fx.imports());

    assert_eq!(
        kinds(&result),
        vec![DiagnosticKind::WrongNumberOfTypeArguments {
            expected: 1,
            actual: 2
        }]
    );
}

#[test]
fn test_explicit_type_argument_is_used() {
    let mut fx = Fixture::new();
    let t = fx.db.new_type_param("T");
    fx.table.add(
        DescriptorBuilder::function(fx.name("id"))
            .type_param(&fx.db, t)
            .param(fx.name("x"), fx.db.type_param(t))
            .returns(fx.db.type_param(t)),
    );
    let one = fx.arena.int(1, Span::dummy());
    let callee = fx.name("id");
    let call = fx.arena.alloc(
        Expr::Call {
            receiver: None,
            safe: false,
            callee,
            type_args: vec![TypeId::LONG],
            args: vec![Argument::positional(one)],
            trailing_lambda: None,
        },
        Span::dummy(),
    );

    let result = fx.resolve(call, &fx.imports());

    assert!(result.diagnostics.is_empty());
    assert_eq!(result.ty(), TypeId::LONG);
    let resolved = result.call().expect("resolved call");
    assert_eq!(resolved.type_argument(t), Some(TypeId::LONG));
    assert_eq!(resolved.arguments[0].ty, TypeId::LONG);
}

#[test]
fn test_internal_declaration_from_other_module() {
    let mut fx = Fixture::new();
    let module = fx.name("core");
    let hidden = fx.table.add(
        DescriptorBuilder::function(fx.name("helper"))
            .returns(TypeId::INT)
            .visibility(Visibility::Internal { module }),
    );
    let callee = fx.name("helper");
    let call = fx.arena.call(callee, Vec::new(), Span::dummy());
    let tower = fx.imports();

    let outside = fx.resolve_in(
        CallResolver::new(&fx.db, &fx.table).in_module(fx.name("app")),
        call,
        &tower,
        &DataFlowInfo::new(),
    );
    assert_eq!(
        kinds(&outside),
        vec![DiagnosticKind::VisibilityError { declaration: hidden }]
    );

    let inside = fx.resolve_in(
        CallResolver::new(&fx.db, &fx.table).in_module(module),
        call,
        &tower,
        &DataFlowInfo::new(),
    );
    assert_eq!(inside.ty(), TypeId::INT);
}

#[test]
fn test_private_member_needs_enclosing_class() {
    let mut fx = Fixture::new();
    let owner = fx.db.declare_class("Owner", ClassKind::Class, true, &[]);
    let secret = fx.table.add(
        DescriptorBuilder::function(fx.name("secret"))
            .returns(TypeId::INT)
            .visibility(Visibility::Private { owner }),
    );
    let callee = fx.name("secret");
    let call = fx.arena.call(callee, Vec::new(), Span::dummy());

    let result = fx.resolve(call, &fx.imports());
    assert_eq!(
        kinds(&result),
        vec![DiagnosticKind::VisibilityError { declaration: secret }]
    );

    let inside = fx.imports().push_level(TowerLevel::StaticScope(owner));
    assert_eq!(fx.resolve(call, &inside).ty(), TypeId::INT);
}

#[test]
fn test_operator_call_requires_modifier() {
    let mut fx = Fixture::new();
    let plus = fx.table.add(
        DescriptorBuilder::function(fx.name("plus"))
            .param(fx.name("other"), TypeId::INT)
            .returns(TypeId::INT)
            .member_of(ClassId::INT),
    );
    let lhs = fx.arena.int(1, Span::dummy());
    let rhs = fx.arena.int(2, Span::dummy());
    let sum = fx.arena.alloc(
        Expr::Binary {
            op: crate::expr::BinaryOp::Plus,
            lhs,
            rhs,
        },
        Span::dummy(),
    );

    let result = fx.resolve(sum, &fx.imports());

    assert_eq!(
        kinds(&result),
        vec![DiagnosticKind::OperatorModifierRequired { declaration: plus }]
    );
}

#[test]
fn test_extension_receiver_mismatch() {
    let mut fx = Fixture::new();
    let shout = fx.name("shout");
    fx.table
        .add(DescriptorBuilder::function(shout).extension(TypeId::INT).returns(TypeId::STRING));
    let text = fx.name("text");
    let receiver = fx.arena.string(text, Span::dummy());
    let call = fx.arena.method_call(receiver, shout, Vec::new(), None, Span::dummy());

    let result = fx.resolve(call, &fx.imports());

    assert!(matches!(
        result.diagnostics[0].kind,
        DiagnosticKind::ReceiverTypeMismatch {
            expected: TypeId::INT,
            actual: TypeId::STRING
        }
    ));
}

#[test]
fn test_implicit_receiver_mismatch_is_not_reported() {
    let mut fx = Fixture::new();
    let shout = fx.name("shout");
    fx.table
        .add(DescriptorBuilder::function(shout).extension(TypeId::INT).returns(TypeId::STRING));
    let tower = fx.imports().push_level(TowerLevel::receiver(ImplicitReceiver::new(
        ReceiverId(1),
        TypeId::STRING,
        ReceiverKind::Extension,
    )));
    let call = fx.arena.call(shout, Vec::new(), Span::dummy());

    let result = fx.resolve(call, &tower);

    assert_eq!(
        kinds(&result),
        vec![DiagnosticKind::UnresolvedReference { name: shout }]
    );
}

#[test]
fn test_nullable_extension_receiver_is_unsafe() {
    let mut fx = Fixture::new();
    let s = fx.name("s");
    let shout = fx.name("shout");
    fx.table
        .add(DescriptorBuilder::function(shout).extension(TypeId::STRING).returns(TypeId::STRING));
    let nullable = fx.db.make_nullable(TypeId::STRING);
    let tower = fx
        .imports()
        .push_level(TowerLevel::local(LocalScope::new().with(CallableDescriptor::local(DeclId(100), s, nullable))));
    let receiver = fx.arena.name_ref(s, Span::dummy());
    let call = fx.arena.method_call(receiver, shout, Vec::new(), None, Span::dummy());

    let result = fx.resolve(call, &tower);

    assert_eq!(
        kinds(&result),
        vec![DiagnosticKind::UnsafeCallOnNullable {
            receiver_type: nullable
        }]
    );
}

#[test]
fn test_unstable_smart_cast_warns_or_fails() {
    let mut fx = Fixture::new();
    let p = fx.name("p");
    let length = fx.name("length");
    let property = fx
        .table
        .add(DescriptorBuilder::property(p, TypeId::ANY).flags(DeclFlags::MUTABLE));
    fx.table
        .add(DescriptorBuilder::property(length, TypeId::INT).member_of(ClassId::STRING));
    let flow = DataFlowInfo::new().with_narrowing(FlowSubject::Variable(property), TypeId::STRING);
    let receiver = fx.arena.name_ref(p, Span::dummy());
    let access = fx.arena.access(receiver, length, false, Span::dummy());
    let tower = fx.imports();

    let warned = fx.resolve_in(CallResolver::new(&fx.db, &fx.table), access, &tower, &flow);
    assert_eq!(warned.ty(), TypeId::INT);
    assert!(!warned.has_errors());
    assert_eq!(
        warned.diagnostics.iter().map(|d| d.code).collect::<Vec<_>>(),
        vec![diagnostic_codes::UNSTABLE_SMART_CAST]
    );

    let strict = ResolverOptions {
        unstable_smart_cast_is_error: true,
        ..ResolverOptions::default()
    };
    let failed = fx.resolve_in(CallResolver::new(&fx.db, &fx.table).with_options(strict), access, &tower, &flow);
    assert!(failed.has_errors());
    assert_eq!(
        kinds(&failed),
        vec![DiagnosticKind::UnstableSmartCast { ty: TypeId::STRING }]
    );
}
