use super::*;
use crate::declarations::{CallableDescriptor, DeclFlags, DescriptorBuilder, SymbolTable};
use crate::expr::{Argument, BinaryOp};
use crate::tower::{ImplicitReceiver, ImportScope, LocalScope, ReceiverKind, TowerLevel};
use kres_common::diagnostic_codes;
use kres_solver::{ClassId, ClassKind};

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

    fn with_locals(&self, locals: Vec<CallableDescriptor>) -> ScopeTower {
        let scope = locals.into_iter().fold(LocalScope::new(), LocalScope::with);
        self.imports().push_level(TowerLevel::local(scope))
    }

    fn resolve(&self, expr: ExprId, tower: &ScopeTower, expected: ExpectedType) -> CallSiteResult {
        CallResolver::new(&self.db, &self.table).resolve(&self.arena, expr, tower, &DataFlowInfo::new(), expected)
    }

    fn resolve_with(
        &self,
        options: ResolverOptions,
        expr: ExprId,
        tower: &ScopeTower,
        flow: &DataFlowInfo,
    ) -> CallSiteResult {
        CallResolver::new(&self.db, &self.table).with_options(options).resolve(
            &self.arena,
            expr,
            tower,
            flow,
            ExpectedType::NoExpectation,
        )
    }
}

fn codes(result: &CallSiteResult) -> Vec<u32> {
    result.diagnostics.iter().map(|d| d.code).collect()
}

#[test]
fn test_integer_literal_follows_expected_type() {
    let mut fx = Fixture::new();
    let one = fx.arena.int(1, Span::dummy());
    let big = fx.arena.int(300, Span::dummy());
    let tower = fx.imports();

    assert_eq!(fx.resolve(one, &tower, ExpectedType::NoExpectation).ty(), TypeId::INT);
    assert_eq!(fx.resolve(one, &tower, ExpectedType::Type(TypeId::LONG)).ty(), TypeId::LONG);
    assert_eq!(
        fx.resolve(one, &tower, ExpectedType::Type(fx.db.make_nullable(TypeId::SHORT))).ty(),
        TypeId::SHORT
    );
    assert_eq!(fx.resolve(big, &tower, ExpectedType::Type(TypeId::BYTE)).ty(), TypeId::INT);
}

#[test]
fn test_other_literals() {
    let mut fx = Fixture::new();
    let text = fx.name("text");
    let string = fx.arena.string(text, Span::dummy());
    let null = fx.arena.null(Span::dummy());
    let tower = fx.imports();

    assert_eq!(fx.resolve(string, &tower, ExpectedType::NoExpectation).ty(), TypeId::STRING);
    assert_eq!(fx.resolve(null, &tower, ExpectedType::NoExpectation).ty(), TypeId::NULLABLE_NOTHING);
}

#[test]
fn test_unresolved_name() {
    let mut fx = Fixture::new();
    let missing = fx.name("missing");
    let call = fx.arena.call(missing, Vec::new(), Span::new(0, 9));

    let result = fx.resolve(call, &fx.imports(), ExpectedType::NoExpectation);

    assert_eq!(result.ty(), TypeId::ERROR);
    assert!(result.call().is_none());
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(
        result.diagnostics[0].kind,
        DiagnosticKind::UnresolvedReference { name: missing }
    );
    assert_eq!(result.diagnostics[0].span, Span::new(0, 9));
}

#[test]
fn test_receiver_error_does_not_cascade() {
    let mut fx = Fixture::new();
    let missing = fx.name("missing");
    let length = fx.name("length");
    let receiver = fx.arena.name_ref(missing, Span::dummy());
    let access = fx.arena.access(receiver, length, false, Span::dummy());

    let result = fx.resolve(access, &fx.imports(), ExpectedType::NoExpectation);

    assert_eq!(codes(&result), vec![diagnostic_codes::UNRESOLVED_REFERENCE]);
}

#[test]
fn test_this_resolves_to_nearest_receiver() {
    let mut fx = Fixture::new();
    let outer = fx.name("outer");
    let this = fx.arena.alloc(Expr::This { label: None }, Span::dummy());
    let labeled = fx.arena.alloc(Expr::This { label: Some(outer) }, Span::dummy());
    let tower = fx
        .imports()
        .push_level(TowerLevel::receiver(
            ImplicitReceiver::new(ReceiverId(1), TypeId::STRING, ReceiverKind::Extension).with_label(outer),
        ))
        .push_level(TowerLevel::receiver(ImplicitReceiver::new(
            ReceiverId(2),
            TypeId::INT,
            ReceiverKind::Extension,
        )));

    let nearest = fx.resolve(this, &tower, ExpectedType::NoExpectation);
    assert_eq!(nearest.ty(), TypeId::INT);
    assert_eq!(nearest.resolution.subject, Some(FlowSubject::Receiver(ReceiverId(2))));

    assert_eq!(fx.resolve(labeled, &tower, ExpectedType::NoExpectation).ty(), TypeId::STRING);
}

#[test]
fn test_this_without_receiver() {
    let mut fx = Fixture::new();
    let this = fx.arena.alloc(Expr::This { label: None }, Span::dummy());

    let result = fx.resolve(this, &fx.imports(), ExpectedType::NoExpectation);

    assert_eq!(
        result.diagnostics[0].kind,
        DiagnosticKind::UnresolvedReference { name: fx.name("this") }
    );
}

#[test]
fn test_not_null_assertion_emits_fact() {
    let mut fx = Fixture::new();
    let s = fx.name("s");
    let local = CallableDescriptor::local(DeclId(100), s, fx.db.make_nullable(TypeId::STRING));
    let tower = fx.with_locals(vec![local]);
    let reference = fx.arena.name_ref(s, Span::dummy());
    let asserted = fx.arena.alloc(Expr::NotNull(reference), Span::dummy());

    let result = fx.resolve(asserted, &tower, ExpectedType::NoExpectation);

    assert_eq!(result.ty(), TypeId::STRING);
    assert_eq!(
        result.flow_facts,
        vec![FlowFact::NonNull {
            subject: FlowSubject::Variable(DeclId(100))
        }]
    );
}

#[test]
fn test_block_takes_last_statement_type() {
    let mut fx = Fixture::new();
    let first = fx.arena.int(1, Span::dummy());
    let text = fx.name("text");
    let last = fx.arena.string(text, Span::dummy());
    let block = fx.arena.alloc(Expr::Block(vec![first, last]), Span::dummy());
    let empty = fx.arena.alloc(Expr::Block(Vec::new()), Span::dummy());
    let tower = fx.imports();

    assert_eq!(fx.resolve(block, &tower, ExpectedType::NoExpectation).ty(), TypeId::STRING);
    assert_eq!(fx.resolve(empty, &tower, ExpectedType::NoExpectation).ty(), TypeId::UNIT);
}

#[test]
fn test_binary_operator_calls_operator_member() {
    let mut fx = Fixture::new();
    let other = fx.name("other");
    fx.table.add(
        DescriptorBuilder::function(fx.name("plus"))
            .param(other, TypeId::INT)
            .returns(TypeId::INT)
            .member_of(ClassId::INT)
            .flags(DeclFlags::OPERATOR),
    );
    let compare = fx.table.add(
        DescriptorBuilder::function(fx.name("compareTo"))
            .param(other, TypeId::INT)
            .returns(TypeId::INT)
            .member_of(ClassId::INT)
            .flags(DeclFlags::OPERATOR),
    );
    let lhs = fx.arena.int(1, Span::dummy());
    let rhs = fx.arena.int(2, Span::dummy());
    let sum = fx.arena.alloc(
        Expr::Binary {
            op: BinaryOp::Plus,
            lhs,
            rhs,
        },
        Span::dummy(),
    );
    let less = fx.arena.alloc(
        Expr::Binary {
            op: BinaryOp::Less,
            lhs,
            rhs,
        },
        Span::dummy(),
    );
    let tower = fx.imports();

    let sum = fx.resolve(sum, &tower, ExpectedType::NoExpectation);
    assert_eq!(sum.ty(), TypeId::INT);
    assert!(sum.diagnostics.is_empty());

    let less = fx.resolve(less, &tower, ExpectedType::NoExpectation);
    assert_eq!(less.ty(), TypeId::BOOLEAN);
    assert_eq!(less.call().map(|c| c.declaration), Some(compare));
}

#[test]
fn test_safe_call_result_is_nullable() {
    let mut fx = Fixture::new();
    let s = fx.name("s");
    let length = fx.name("length");
    fx.table
        .add(DescriptorBuilder::property(length, TypeId::INT).member_of(ClassId::STRING));
    let tower = fx.with_locals(vec![CallableDescriptor::local(
        DeclId(100),
        s,
        fx.db.make_nullable(TypeId::STRING),
    )]);
    let receiver = fx.arena.name_ref(s, Span::dummy());
    let access = fx.arena.access(receiver, length, true, Span::dummy());

    let result = fx.resolve(access, &tower, ExpectedType::NoExpectation);

    assert_eq!(result.ty(), fx.db.make_nullable(TypeId::INT));
    assert!(!result.has_errors());
    assert_eq!(
        result.flow_facts,
        vec![FlowFact::NonNullWhenResultNonNull {
            subject: FlowSubject::Variable(DeclId(100)),
            call: access,
        }]
    );
}

#[test]
fn test_safe_call_nullability_option() {
    let mut fx = Fixture::new();
    let length = fx.name("length");
    fx.table
        .add(DescriptorBuilder::property(length, TypeId::INT).member_of(ClassId::STRING));
    let text = fx.name("text");
    let receiver = fx.arena.string(text, Span::dummy());
    let access = fx.arena.access(receiver, length, true, Span::dummy());
    let tower = fx.imports();
    let flow = DataFlowInfo::new();

    let default = fx.resolve_with(ResolverOptions::default(), access, &tower, &flow);
    assert_eq!(default.ty(), TypeId::INT);

    let always = ResolverOptions {
        safe_call_nullability: crate::config::SafeCallNullability::Always,
        ..ResolverOptions::default()
    };
    let result = fx.resolve_with(always, access, &tower, &flow);
    assert_eq!(result.ty(), fx.db.make_nullable(TypeId::INT));
}

#[test]
fn test_unsafe_call_on_nullable_receiver() {
    let mut fx = Fixture::new();
    let s = fx.name("s");
    let length = fx.name("length");
    fx.table
        .add(DescriptorBuilder::property(length, TypeId::INT).member_of(ClassId::STRING));
    let nullable = fx.db.make_nullable(TypeId::STRING);
    let tower = fx.with_locals(vec![CallableDescriptor::local(DeclId(100), s, nullable)]);
    let receiver = fx.arena.name_ref(s, Span::dummy());
    let access = fx.arena.access(receiver, length, false, Span::dummy());

    let result = fx.resolve(access, &tower, ExpectedType::NoExpectation);
    assert_eq!(
        result.diagnostics[0].kind,
        DiagnosticKind::UnsafeCallOnNullable {
            receiver_type: nullable
        }
    );

    // After `s != null` the same access is fine.
    let flow = DataFlowInfo::new().with_non_null(FlowSubject::Variable(DeclId(100)));
    let narrowed = fx.resolve_with(ResolverOptions::default(), access, &tower, &flow);
    assert_eq!(narrowed.ty(), TypeId::INT);
    assert!(narrowed.diagnostics.is_empty());
}

#[test]
fn test_resolution_depth_limit() {
    let mut fx = Fixture::new();
    let f = fx.name("f");
    let g = fx.name("g");
    fx.table
        .add(DescriptorBuilder::function(f).param(fx.name("x"), TypeId::INT));
    fx.table.add(DescriptorBuilder::function(g).returns(TypeId::INT));
    let inner = fx.arena.call(g, Vec::new(), Span::dummy());
    let outer = fx.arena.call(f, vec![Argument::positional(inner)], Span::dummy());
    let options = ResolverOptions {
        max_resolution_depth: 1,
        ..ResolverOptions::default()
    };

    let result = fx.resolve_with(options, outer, &fx.imports(), &DataFlowInfo::new());

    assert!(codes(&result).contains(&diagnostic_codes::RECURSION_IN_INFERENCE));
}

#[test]
fn test_invoke_on_function_typed_local() {
    let mut fx = Fixture::new();
    let f = fx.name("f");
    let function = fx.db.function_type(None, smallvec::smallvec![TypeId::INT], TypeId::STRING);
    let tower = fx.with_locals(vec![CallableDescriptor::local(DeclId(100), f, function)]);
    let one = fx.arena.int(1, Span::dummy());
    let call = fx.arena.call(f, vec![Argument::positional(one)], Span::dummy());

    let result = fx.resolve(call, &tower, ExpectedType::NoExpectation);

    assert_eq!(result.ty(), TypeId::STRING);
    let call = result.call().expect("resolved call");
    assert_eq!(
        call.kind,
        crate::results::ResolvedCallKind::Invoke {
            variable: DeclId(100)
        }
    );
}

#[test]
fn test_member_extension_of_outer_receiver_on_inner_receiver() {
    let mut fx = Fixture::new();
    let outer_class = fx.db.declare_class("Outer", ClassKind::Class, true, &[]);
    let inner_class = fx.db.declare_class("Inner", ClassKind::Class, true, &[]);
    let outer_ty = fx.db.class_type(outer_class, smallvec::smallvec![]);
    let inner_ty = fx.db.class_type(inner_class, smallvec::smallvec![]);
    let describe = fx.name("describe");
    let declaration = fx.table.add(
        DescriptorBuilder::function(describe)
            .extension(inner_ty)
            .returns(TypeId::STRING)
            .member_of(outer_class),
    );
    let tower = fx
        .imports()
        .push_level(TowerLevel::receiver(ImplicitReceiver::new(
            ReceiverId(1),
            outer_ty,
            ReceiverKind::Dispatch { class: outer_class },
        )))
        .push_level(TowerLevel::receiver(ImplicitReceiver::new(
            ReceiverId(2),
            inner_ty,
            ReceiverKind::Extension,
        )));
    let call = fx.arena.call(describe, Vec::new(), Span::dummy());

    let result = fx.resolve(call, &tower, ExpectedType::NoExpectation);

    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(result.ty(), TypeId::STRING);
    let resolved = result.call().expect("resolved call");
    assert_eq!(resolved.declaration, declaration);
    assert_eq!(resolved.dispatch_receiver, Some(outer_ty));
    assert_eq!(resolved.extension_receiver, Some(inner_ty));
}
