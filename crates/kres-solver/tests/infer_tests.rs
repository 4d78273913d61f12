use super::*;
use smallvec::smallvec;

fn var(interner: &TypeInterner, name: &str) -> (TypeVarId, TypeId) {
    let param = interner.new_type_param(name);
    let var = interner.fresh_type_var(Some(param));
    (var, interner.var_type(var))
}

#[test]
fn test_subtype_constraint_records_lower_bound() {
    let interner = TypeInterner::new();
    let (t, t_ty) = var(&interner, "T");
    let mut system = ConstraintSystem::new();
    system.register_variable(t);

    system.add_subtype_constraint(&interner, TypeId::INT, t_ty, ConstraintPosition::Argument { index: 0 });

    let lower: Vec<_> = system.constraints_of(t).lower().cloned().collect();
    assert_eq!(
        lower,
        vec![Constraint {
            kind: ConstraintKind::Lower,
            ty: TypeId::INT,
            position: ConstraintPosition::Argument { index: 0 },
        }]
    );
    assert!(!system.has_errors());
}

#[test]
fn test_incorporation_detects_contradiction() {
    let interner = TypeInterner::new();
    let (t, t_ty) = var(&interner, "T");
    let param = interner.type_var_origin(t).expect("origin");
    let mut system = ConstraintSystem::new();
    system.register_variable(t);

    system.add_subtype_constraint(
        &interner,
        t_ty,
        TypeId::STRING,
        ConstraintPosition::DeclaredUpperBound { param },
    );
    system.add_subtype_constraint(&interner, TypeId::INT, t_ty, ConstraintPosition::Argument { index: 0 });

    assert_eq!(
        system.errors(),
        &[ConstraintError::Contradiction {
            var: Some(t),
            lower: TypeId::INT,
            upper: TypeId::STRING,
            position: ConstraintPosition::Argument { index: 0 },
        }]
    );
}

#[test]
fn test_incorporation_is_transitive() {
    let interner = TypeInterner::new();
    let (t, t_ty) = var(&interner, "T");
    let mut system = ConstraintSystem::new();
    system.register_variable(t);

    system.add_subtype_constraint(&interner, TypeId::INT, t_ty, ConstraintPosition::Argument { index: 0 });
    system.add_subtype_constraint(&interner, t_ty, TypeId::NUMBER, ConstraintPosition::ExpectedType);

    assert!(!system.has_errors());
    assert_eq!(system.constraints_of(t).upper().count(), 1);
}

#[test]
fn test_decomposition_follows_declared_variance() {
    let interner = TypeInterner::new();
    let (t, t_ty) = var(&interner, "T");
    let (u, u_ty) = var(&interner, "U");
    let (c, c_ty) = var(&interner, "C");
    let mut system = ConstraintSystem::new();
    for v in [t, u, c] {
        system.register_variable(v);
    }
    let position = ConstraintPosition::Argument { index: 0 };

    let list_int = interner.list_type(TypeId::INT);
    let iterable_t = interner.iterable_type(t_ty);
    system.add_subtype_constraint(&interner, list_int, iterable_t, position);

    let mutable_long = interner.mutable_list_type(TypeId::LONG);
    let mutable_u = interner.mutable_list_type(u_ty);
    system.add_subtype_constraint(&interner, mutable_long, mutable_u, position);

    let comparable_c = interner.comparable_type(c_ty);
    system.add_subtype_constraint(&interner, TypeId::STRING, comparable_c, position);

    assert_eq!(system.constraints_of(t).lower().map(|c| c.ty).collect::<Vec<_>>(), vec![TypeId::INT]);
    assert_eq!(system.constraints_of(u).equal().map(|c| c.ty).collect::<Vec<_>>(), vec![TypeId::LONG]);
    assert_eq!(system.constraints_of(c).upper().map(|c| c.ty).collect::<Vec<_>>(), vec![TypeId::STRING]);
}

#[test]
fn test_function_types_decompose_contravariantly() {
    let interner = TypeInterner::new();
    let (t, t_ty) = var(&interner, "T");
    let (r, r_ty) = var(&interner, "R");
    let mut system = ConstraintSystem::new();
    system.register_variable(t);
    system.register_variable(r);

    let concrete = interner.function_type(None, smallvec![TypeId::INT], TypeId::STRING);
    let generic = interner.function_type(None, smallvec![t_ty], r_ty);
    system.add_subtype_constraint(&interner, concrete, generic, ConstraintPosition::Argument { index: 0 });

    assert_eq!(system.constraints_of(t).upper().map(|c| c.ty).collect::<Vec<_>>(), vec![TypeId::INT]);
    assert_eq!(system.constraints_of(r).lower().map(|c| c.ty).collect::<Vec<_>>(), vec![TypeId::STRING]);
}

#[test]
fn test_nullable_lower_bound_against_non_null_upper() {
    let interner = TypeInterner::new();
    let (t, t_ty) = var(&interner, "T");
    let mut system = ConstraintSystem::new();
    system.register_variable(t);
    let nullable_t = interner.make_nullable(t_ty);
    let nullable_int = interner.make_nullable(TypeId::INT);

    // `Int? <: T?` constrains `T` from below with `Int`.
    system.add_subtype_constraint(&interner, nullable_int, nullable_t, ConstraintPosition::Receiver);
    assert_eq!(system.constraints_of(t).lower().map(|c| c.ty).collect::<Vec<_>>(), vec![TypeId::INT]);

    // `Int? <: String` can never hold.
    system.add_subtype_constraint(&interner, nullable_int, TypeId::STRING, ConstraintPosition::Receiver);
    assert!(matches!(system.errors(), [ConstraintError::Contradiction { .. }]));
}

#[test]
fn test_equal_variables_share_bounds() {
    let interner = TypeInterner::new();
    let (t, t_ty) = var(&interner, "T");
    let (u, u_ty) = var(&interner, "U");
    let mut system = ConstraintSystem::new();
    system.register_variable(t);
    system.register_variable(u);

    system.add_equality_constraint(&interner, t_ty, u_ty, ConstraintPosition::Argument { index: 0 });
    system.add_subtype_constraint(&interner, TypeId::INT, t_ty, ConstraintPosition::Argument { index: 1 });

    assert_eq!(system.representative(t), system.representative(u));
    assert_eq!(system.equivalence_class(u), vec![t, u]);
    assert_eq!(system.constraints_of(u).lower().map(|c| c.ty).collect::<Vec<_>>(), vec![TypeId::INT]);
}

#[test]
fn test_fork_does_not_leak_into_parent() {
    let interner = TypeInterner::new();
    let (t, t_ty) = var(&interner, "T");
    let mut system = ConstraintSystem::new();
    system.register_variable(t);
    system.add_subtype_constraint(&interner, TypeId::INT, t_ty, ConstraintPosition::Argument { index: 0 });

    let mut fork = system.fork();
    fork.add_subtype_constraint(&interner, TypeId::STRING, t_ty, ConstraintPosition::Argument { index: 1 });
    fork.fix_all(&interner);

    assert_eq!(system.constraints_of(t).all().len(), 1);
    assert!(!system.is_fixed(t));
    assert_eq!(fork.constraints_of(t).lower().count(), 2);
    assert!(fork.is_fixed(t));
}

#[test]
fn test_unknown_variables_become_foreign() {
    let interner = TypeInterner::new();
    let (t, _) = var(&interner, "T");
    let (e, e_ty) = var(&interner, "E");
    let mut system = ConstraintSystem::new();
    system.register_variable(t);

    system.add_subtype_constraint(&interner, TypeId::INT, e_ty, ConstraintPosition::Argument { index: 0 });

    assert!(system.is_foreign(e));
    assert!(!system.owns(e));
    assert_eq!(system.owned_variables(), vec![t]);
    assert_eq!(system.foreign_variables(), vec![e]);
}

#[test]
fn test_absorb_merges_nested_system() {
    let interner = TypeInterner::new();
    let (t, t_ty) = var(&interner, "T");
    let (u, u_ty) = var(&interner, "U");

    let mut inner = ConstraintSystem::new();
    inner.register_variable(u);
    let one = interner.integer_literal(1);
    inner.add_subtype_constraint(&interner, one, u_ty, ConstraintPosition::Argument { index: 0 });

    let mut outer = ConstraintSystem::new();
    outer.register_variable(t);
    outer.absorb(&interner, inner);
    let list_u = interner.list_type(u_ty);
    let list_t = interner.list_type(t_ty);
    outer.add_subtype_constraint(&interner, list_u, list_t, ConstraintPosition::Argument { index: 0 });

    assert!(outer.owns(u));
    assert_eq!(outer.owned_variables(), vec![t, u]);
    let t_lower: Vec<TypeId> = outer.constraints_of(t).lower().map(|c| c.ty).collect();
    assert!(t_lower.contains(&u_ty));
    assert!(t_lower.contains(&one));
}

#[test]
#[should_panic(expected = "absorbed system shares owned variable")]
fn test_absorb_rejects_shared_owned_variables() {
    let interner = TypeInterner::new();
    let (t, _) = var(&interner, "T");
    let mut inner = ConstraintSystem::new();
    inner.register_variable(t);
    let mut outer = ConstraintSystem::new();
    outer.register_variable(t);

    outer.absorb(&interner, inner);
}

#[test]
fn test_inject_from_copies_only_shared_constraints() {
    let interner = TypeInterner::new();
    let (e, e_ty) = var(&interner, "E");
    let (x, x_ty) = var(&interner, "X");

    let mut outer = ConstraintSystem::new();
    outer.register_variable(e);

    let mut inner = ConstraintSystem::new();
    inner.register_variable(x);
    inner.add_subtype_constraint(&interner, TypeId::INT, e_ty, ConstraintPosition::Argument { index: 0 });
    inner.add_subtype_constraint(&interner, x_ty, e_ty, ConstraintPosition::Argument { index: 1 });

    let shared: FxHashSet<TypeVarId> = [e].into_iter().collect();
    let injected = outer.inject_from(&interner, &mut inner, &shared);

    assert_eq!(injected, 1);
    let lower: Vec<_> = outer.constraints_of(e).lower().cloned().collect();
    assert_eq!(
        lower,
        vec![Constraint {
            kind: ConstraintKind::Lower,
            ty: TypeId::INT,
            position: ConstraintPosition::Injected,
        }]
    );
}
