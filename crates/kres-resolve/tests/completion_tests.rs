use super::*;
use crate::cache::ResolutionCache;
use crate::config::ResolverOptions;
use crate::declarations::{CallableDescriptor, DeclFlags, DeclId, DescriptorBuilder, SymbolTable};
use crate::diagnostics::DiagnosticKind;
use crate::expr::{Argument, Expr, ExprArena};
use crate::flow::DataFlowInfo;
use crate::resolver::CallResolver;
use crate::results::{CallSiteResult, ExpectedType};
use crate::tower::{ImportScope, LocalScope, ScopeTower, TowerLevel};
use kres_common::{Atom, diagnostic_codes};
use kres_solver::{ClassId, TypeParamId};
use smallvec::smallvec;

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

    fn resolve(&self, expr: ExprId, expected: ExpectedType) -> CallSiteResult {
        CallResolver::new(&self.db, &self.table).resolve(
            &self.arena,
            expr,
            &self.imports(),
            &DataFlowInfo::new(),
            expected,
        )
    }

    fn resolve_with(&self, options: ResolverOptions, expr: ExprId) -> CallSiteResult {
        CallResolver::new(&self.db, &self.table).with_options(options).resolve(
            &self.arena,
            expr,
            &self.imports(),
            &DataFlowInfo::new(),
            ExpectedType::NoExpectation,
        )
    }

    /// `fun <T> name(x: T): T`
    fn identity(&mut self, name: &str, param: &str) -> (DeclId, TypeParamId) {
        let t = self.db.new_type_param(param);
        let ty = self.db.type_param(t);
        let id = self.table.add(
            DescriptorBuilder::function(self.name(name))
                .type_param(&self.db, t)
                .param(self.name("x"), ty)
                .returns(ty),
        );
        (id, t)
    }

    /// `fun <T> emptyList(): List<T>`
    fn empty_list(&mut self) -> TypeParamId {
        let t = self.db.new_type_param("T");
        let list = self.db.list_type(self.db.type_param(t));
        self.table.add(
            DescriptorBuilder::function(self.name("emptyList"))
                .type_param(&self.db, t)
                .returns(list),
        );
        t
    }

    /// `fun <E> buildList(builderAction: MutableList<E>.() -> Unit): List<E>`
    /// and `MutableList<E>.add(element: E): Boolean`.
    fn build_list(&mut self) -> ExprId {
        let e = self.db.new_type_param("E");
        let e_ty = self.db.type_param(e);
        let receiver = self.db.mutable_list_type(e_ty);
        let action = self.db.function_type(Some(receiver), smallvec![], TypeId::UNIT);
        self.table.add(
            DescriptorBuilder::function(self.name("buildList"))
                .type_param(&self.db, e)
                .param(self.name("builderAction"), action)
                .returns(self.db.list_type(e_ty))
                .flags(DeclFlags::BUILDER_INFERENCE),
        );
        let element = self.db.class_param_types(ClassId::MUTABLE_LIST)[0];
        self.table.add(
            DescriptorBuilder::function(self.name("add"))
                .param(self.name("element"), element)
                .returns(TypeId::BOOLEAN)
                .member_of(ClassId::MUTABLE_LIST),
        );

        let one = self.arena.int(1, Span::dummy());
        let add = self.name("add");
        let body = self.arena.call(add, vec![Argument::positional(one)], Span::dummy());
        let lambda = self.arena.lambda(None, body, Span::dummy());
        let callee = self.name("buildList");
        self.arena.alloc(
            Expr::Call {
                receiver: None,
                safe: false,
                callee,
                type_args: Vec::new(),
                args: Vec::new(),
                trailing_lambda: Some(lambda),
            },
            Span::dummy(),
        )
    }
}

fn codes(result: &CallSiteResult) -> Vec<u32> {
    result.diagnostics.iter().map(|d| d.code).collect()
}

#[test]
fn test_state_order() {
    assert!(CompletionState::ShapeChecked < CompletionState::ConstraintsSeeded);
    assert!(CompletionState::LambdaBodiesResolved < CompletionState::Fixed);
    assert!(CompletionState::Fixed < CompletionState::Completed);
}

#[test]
fn test_nested_generic_call_is_finished_by_outer_call() {
    let mut fx = Fixture::new();
    let (_, t) = fx.identity("bar", "T");
    let (_, u) = fx.identity("foo", "U");
    let one = fx.arena.int(1, Span::dummy());
    let bar = fx.name("bar");
    let foo = fx.name("foo");
    let inner = fx.arena.call(bar, vec![Argument::positional(one)], Span::dummy());
    let outer = fx.arena.call(foo, vec![Argument::positional(inner)], Span::dummy());
    let mut cache = ResolutionCache::new();

    let result = CallResolver::new(&fx.db, &fx.table).resolve_with_cache(
        &fx.arena,
        outer,
        &fx.imports(),
        &DataFlowInfo::new(),
        ExpectedType::NoExpectation,
        &mut cache,
    );

    assert!(result.diagnostics.is_empty());
    assert_eq!(result.ty(), TypeId::INT);
    assert_eq!(result.call().and_then(|c| c.type_argument(u)), Some(TypeId::INT));

    let nested = cache.get(inner).expect("nested call cached");
    assert!(!nested.is_partial());
    assert_eq!(nested.ty, TypeId::INT);
    assert_eq!(
        nested.call.as_ref().and_then(|c| c.type_argument(t)),
        Some(TypeId::INT)
    );
}

#[test]
fn test_expected_type_guides_literal() {
    let mut fx = Fixture::new();
    fx.identity("id", "T");
    let one = fx.arena.int(1, Span::dummy());
    let id = fx.name("id");
    let call = fx.arena.call(id, vec![Argument::positional(one)], Span::dummy());

    let result = fx.resolve(call, ExpectedType::Type(TypeId::LONG));

    assert!(result.diagnostics.is_empty());
    assert_eq!(result.ty(), TypeId::LONG);
    assert_eq!(result.call().map(|c| c.arguments[0].ty), Some(TypeId::LONG));
}

#[test]
fn test_contradicting_expected_type_is_dropped() {
    let mut fx = Fixture::new();
    fx.identity("id", "T");
    let one = fx.arena.int(1, Span::new(3, 4));
    let id = fx.name("id");
    let call = fx.arena.call(id, vec![Argument::positional(one)], Span::new(0, 5));

    let result = fx.resolve(call, ExpectedType::Type(TypeId::STRING));

    assert_eq!(result.ty(), TypeId::INT);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(
        result.diagnostics[0].kind,
        DiagnosticKind::ResultTypeMismatch {
            expected: TypeId::STRING,
            actual: TypeId::INT,
        }
    );
    assert_eq!(result.diagnostics[0].span, Span::new(0, 5));
}

#[test]
fn test_not_enough_information() {
    let mut fx = Fixture::new();
    fx.empty_list();
    let callee = fx.name("emptyList");
    let call = fx.arena.call(callee, Vec::new(), Span::dummy());

    let result = fx.resolve(call, ExpectedType::NoExpectation);

    assert_eq!(
        result.diagnostics[0].kind,
        DiagnosticKind::NotEnoughInformationForTypeParameter {
            type_parameter: fx.name("T")
        }
    );
    assert_eq!(result.ty(), fx.db.list_type(TypeId::ERROR));
}

#[test]
fn test_expected_type_infers_type_argument() {
    let mut fx = Fixture::new();
    let t = fx.empty_list();
    let callee = fx.name("emptyList");
    let call = fx.arena.call(callee, Vec::new(), Span::dummy());

    let result = fx.resolve(call, ExpectedType::Type(fx.db.list_type(TypeId::STRING)));

    assert!(result.diagnostics.is_empty());
    assert_eq!(result.ty(), fx.db.list_type(TypeId::STRING));
    assert_eq!(result.call().and_then(|c| c.type_argument(t)), Some(TypeId::STRING));
}

#[test]
fn test_empty_intersection_of_declared_bounds() {
    let mut fx = Fixture::new();
    let t = fx.db.new_type_param("T");
    fx.db.set_type_param_bounds(t, vec![TypeId::INT, TypeId::STRING]);
    fx.table.add(
        DescriptorBuilder::function(fx.name("pick"))
            .type_param(&fx.db, t)
            .returns(fx.db.type_param(t)),
    );
    let callee = fx.name("pick");
    let call = fx.arena.call(callee, Vec::new(), Span::dummy());

    let result = fx.resolve(call, ExpectedType::NoExpectation);

    assert!(result.diagnostics.iter().any(|d| d.kind
        == DiagnosticKind::EmptyIntersection {
            type_parameter: fx.name("T"),
            bounds: vec![TypeId::INT, TypeId::STRING],
        }));
}

/// `transform(1) { it.toString() }` with `fun <T, R> transform(x: T, f: (T) -> R): R`.
fn transform_call(fx: &mut Fixture) -> ExprId {
    fx.table.add(
        DescriptorBuilder::function(fx.name("toString"))
            .returns(TypeId::STRING)
            .member_of(ClassId::ANY),
    );
    let t = fx.db.new_type_param("T");
    let r = fx.db.new_type_param("R");
    let (t_ty, r_ty) = (fx.db.type_param(t), fx.db.type_param(r));
    fx.table.add(
        DescriptorBuilder::function(fx.name("transform"))
            .type_param(&fx.db, t)
            .type_param(&fx.db, r)
            .param(fx.name("x"), t_ty)
            .param(fx.name("f"), fx.db.function_type(None, smallvec![t_ty], r_ty))
            .returns(r_ty),
    );
    let one = fx.arena.int(1, Span::dummy());
    let it = fx.name("it");
    let to_string = fx.name("toString");
    let receiver = fx.arena.name_ref(it, Span::dummy());
    let body = fx.arena.method_call(receiver, to_string, Vec::new(), None, Span::dummy());
    let lambda = fx.arena.lambda(None, body, Span::dummy());
    let callee = fx.name("transform");
    fx.arena.alloc(
        Expr::Call {
            receiver: None,
            safe: false,
            callee,
            type_args: Vec::new(),
            args: vec![Argument::positional(one)],
            trailing_lambda: Some(lambda),
        },
        Span::dummy(),
    )
}

#[test]
fn test_iteration_limit() {
    let mut fx = Fixture::new();
    let call = transform_call(&mut fx);
    let options = ResolverOptions {
        max_completion_iterations: 0,
        ..ResolverOptions::default()
    };

    let result = fx.resolve_with(options, call);

    assert!(codes(&result).contains(&diagnostic_codes::RECURSION_IN_INFERENCE));
}

#[test]
fn test_iteration_limit_counts_postponed_analyses() {
    let mut fx = Fixture::new();
    let call = transform_call(&mut fx);
    let options = ResolverOptions {
        max_completion_iterations: 1,
        ..ResolverOptions::default()
    };

    let result = fx.resolve_with(options, call);

    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(result.ty(), TypeId::STRING);
}

#[test]
fn test_fixations_do_not_count_against_iteration_limit() {
    let mut fx = Fixture::new();
    fx.identity("id", "T");
    let one = fx.arena.int(1, Span::dummy());
    let id = fx.name("id");
    let call = fx.arena.call(id, vec![Argument::positional(one)], Span::dummy());
    let options = ResolverOptions {
        max_completion_iterations: 0,
        ..ResolverOptions::default()
    };

    let result = fx.resolve_with(options, call);

    assert!(result.diagnostics.is_empty());
    assert_eq!(result.ty(), TypeId::INT);
}

#[test]
fn test_many_absorbed_variables_complete() {
    let mut fx = Fixture::new();
    // fun <A, B> pairOf(a: A, b: B): Pair<A, B>
    let a = fx.db.new_type_param("A");
    let b = fx.db.new_type_param("B");
    let (a_ty, b_ty) = (fx.db.type_param(a), fx.db.type_param(b));
    fx.table.add(
        DescriptorBuilder::function(fx.name("pairOf"))
            .type_param(&fx.db, a)
            .type_param(&fx.db, b)
            .param(fx.name("a"), a_ty)
            .param(fx.name("b"), b_ty)
            .returns(fx.db.pair_type(a_ty, b_ty)),
    );
    // fun <K, V> mapOf(vararg pairs: Pair<K, V>): Pair<K, V>
    let k = fx.db.new_type_param("K");
    let v = fx.db.new_type_param("V");
    let pair = fx.db.pair_type(fx.db.type_param(k), fx.db.type_param(v));
    fx.table.add(
        DescriptorBuilder::function(fx.name("mapOf"))
            .type_param(&fx.db, k)
            .type_param(&fx.db, v)
            .vararg_param(fx.name("pairs"), pair)
            .returns(pair),
    );
    let pair_of = fx.name("pairOf");
    let text = fx.name("s");
    let args = (0..33)
        .map(|i| {
            let key = fx.arena.int(i, Span::dummy());
            let value = fx.arena.string(text, Span::dummy());
            let call = fx.arena.call(
                pair_of,
                vec![Argument::positional(key), Argument::positional(value)],
                Span::dummy(),
            );
            Argument::positional(call)
        })
        .collect();
    let map_of = fx.name("mapOf");
    let call = fx.arena.call(map_of, args, Span::dummy());

    let result = fx.resolve(call, ExpectedType::NoExpectation);

    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(result.ty(), fx.db.pair_type(TypeId::INT, TypeId::STRING));
}

#[test]
fn test_builder_inference_collects_calls_in_lambda() {
    let mut fx = Fixture::new();
    let call = fx.build_list();

    let result = fx.resolve(call, ExpectedType::NoExpectation);

    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(result.ty(), fx.db.list_type(TypeId::INT));
}

#[test]
fn test_builder_inference_disabled() {
    let mut fx = Fixture::new();
    let call = fx.build_list();
    let options = ResolverOptions {
        builder_inference: false,
        ..ResolverOptions::default()
    };

    let result = fx.resolve_with(options, call);

    assert!(codes(&result).contains(&diagnostic_codes::NOT_ENOUGH_INFORMATION_FOR_TYPE_PARAMETER));
}

#[test]
fn test_stable_value_smart_cast() {
    let mut fx = Fixture::new();
    let x = fx.name("x");
    let tower = fx
        .imports()
        .push_level(TowerLevel::local(LocalScope::new().with(CallableDescriptor::local(DeclId(100), x, TypeId::ANY))));
    let flow = DataFlowInfo::new().with_narrowing(FlowSubject::Variable(DeclId(100)), TypeId::STRING);
    let reference = fx.arena.name_ref(x, Span::dummy());

    let result = CallResolver::new(&fx.db, &fx.table).resolve(
        &fx.arena,
        reference,
        &tower,
        &flow,
        ExpectedType::NoExpectation,
    );

    assert_eq!(result.ty(), TypeId::STRING);
    assert_eq!(result.resolution.subject, Some(FlowSubject::Variable(DeclId(100))));
    assert_eq!(result.resolution.unstable_smart_cast, None);
}

#[test]
fn test_mutable_property_smart_cast_is_unstable() {
    let mut fx = Fixture::new();
    let p = fx.name("p");
    let property = fx
        .table
        .add(DescriptorBuilder::property(p, TypeId::ANY).flags(DeclFlags::MUTABLE));
    let flow = DataFlowInfo::new().with_narrowing(FlowSubject::Variable(property), TypeId::STRING);
    let reference = fx.arena.name_ref(p, Span::dummy());

    let result = CallResolver::new(&fx.db, &fx.table).resolve(
        &fx.arena,
        reference,
        &fx.imports(),
        &flow,
        ExpectedType::NoExpectation,
    );

    assert_eq!(result.ty(), TypeId::ANY);
    assert_eq!(result.resolution.subject, None);
    assert_eq!(result.resolution.unstable_smart_cast, Some(TypeId::STRING));
}
