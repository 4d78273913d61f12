//! Type interning for structural deduplication.
//!
//! This module implements the type interning engine that converts
//! `TypeData` structures into lightweight `TypeId` handles, and owns the
//! classifier table, type parameter metadata and inference variable counter.
//!
//! Benefits:
//! - O(1) type equality (just compare TypeId values)
//! - Memory efficient (each unique structure stored once)
//! - Nested systems can share one interner (variable ids never collide)

use crate::types::*;
use kres_common::{Atom, Interner};
use rustc_hash::FxHashMap;
use smallvec::smallvec;
use std::sync::{Arc, RwLock};

struct TypeStore {
    map: FxHashMap<TypeData, TypeId>,
    data: Vec<TypeData>,
}

impl TypeStore {
    fn intern(&mut self, data: TypeData) -> TypeId {
        if let Some(&id) = self.map.get(&data) {
            return id;
        }
        let id = TypeId(self.data.len() as u32);
        self.data.push(data.clone());
        self.map.insert(data, id);
        id
    }
}

#[derive(Clone, Debug)]
struct TypeParamInfo {
    name: Atom,
    upper_bounds: Vec<TypeId>,
}

#[derive(Clone, Debug)]
struct TypeVarInfo {
    name: Atom,
    origin: Option<TypeParamId>,
}

/// Type interning table.
/// Thread-safe via RwLock for concurrent access.
pub struct TypeInterner {
    names: Interner,
    types: RwLock<TypeStore>,
    classes: RwLock<Vec<Arc<ClassInfo>>>,
    type_params: RwLock<Vec<TypeParamInfo>>,
    type_vars: RwLock<Vec<TypeVarInfo>>,
}

impl TypeInterner {
    /// Creates an interner with the built-in classifiers registered and the
    /// well-known types interned at their fixed ids.
    pub fn new() -> Self {
        let interner = TypeInterner {
            names: Interner::new(),
            types: RwLock::new(TypeStore {
                map: FxHashMap::default(),
                data: Vec::new(),
            }),
            classes: RwLock::new(Vec::new()),
            type_params: RwLock::new(Vec::new()),
            type_vars: RwLock::new(Vec::new()),
        };
        interner.register_builtins();
        interner
    }

    fn register_builtins(&self) {
        use ClassKind::{Class, Interface, Object};
        use Variance::{In, Invariant, Out};

        let builtins: [(&str, ClassKind, bool, &[(&str, Variance)]); 20] = [
            ("Any", Class, false, &[]),
            ("Unit", Object, true, &[]),
            ("Number", Class, false, &[]),
            ("Int", Class, true, &[]),
            ("Long", Class, true, &[]),
            ("Short", Class, true, &[]),
            ("Byte", Class, true, &[]),
            ("Double", Class, true, &[]),
            ("Float", Class, true, &[]),
            ("Boolean", Class, true, &[]),
            ("Char", Class, true, &[]),
            ("CharSequence", Interface, false, &[]),
            ("String", Class, true, &[]),
            ("Comparable", Interface, false, &[("T", In)]),
            ("Iterable", Interface, false, &[("T", Out)]),
            ("Collection", Interface, false, &[("E", Out)]),
            ("List", Interface, false, &[("E", Out)]),
            ("MutableList", Interface, false, &[("E", Invariant)]),
            ("Array", Class, true, &[("T", Invariant)]),
            ("Pair", Class, true, &[("A", Out), ("B", Out)]),
        ];
        for (name, kind, is_final, params) in builtins {
            self.declare_class(name, kind, is_final, params);
        }

        // Well-known types, in `TypeId` constant order.
        {
            let mut store = self.types.write().expect("types lock poisoned");
            store.intern(TypeData::Error);
            store.intern(TypeData::Nothing);
            store.intern(TypeData::Nullable(TypeId::NOTHING));
            store.intern(class_data(ClassId::ANY));
            store.intern(TypeData::Nullable(TypeId::ANY));
            for class in [
                ClassId::UNIT,
                ClassId::BOOLEAN,
                ClassId::CHAR,
                ClassId::BYTE,
                ClassId::SHORT,
                ClassId::INT,
                ClassId::LONG,
                ClassId::FLOAT,
                ClassId::DOUBLE,
                ClassId::NUMBER,
                ClassId::STRING,
                ClassId::CHAR_SEQUENCE,
            ] {
                store.intern(class_data(class));
            }
            debug_assert_eq!(store.data.len() as u32, TypeId::WELL_KNOWN_COUNT);
        }

        for number in [
            TypeId::INT,
            TypeId::LONG,
            TypeId::SHORT,
            TypeId::BYTE,
            TypeId::DOUBLE,
            TypeId::FLOAT,
        ] {
            let comparable = self.comparable_type(number);
            let class = self.class_of(number).unwrap_or(ClassId::ANY);
            self.set_supertypes(class, vec![TypeId::NUMBER, comparable]);
        }
        for (class, ty) in [
            (ClassId::BOOLEAN, TypeId::BOOLEAN),
            (ClassId::CHAR, TypeId::CHAR),
        ] {
            let comparable = self.comparable_type(ty);
            self.set_supertypes(class, vec![comparable]);
        }
        let comparable_string = self.comparable_type(TypeId::STRING);
        self.set_supertypes(ClassId::STRING, vec![comparable_string, TypeId::CHAR_SEQUENCE]);

        for (class, parent) in [
            (ClassId::COLLECTION, ClassId::ITERABLE),
            (ClassId::LIST, ClassId::COLLECTION),
            (ClassId::MUTABLE_LIST, ClassId::LIST),
        ] {
            let param = self.class_param_types(class)[0];
            let parent_ty = self.class_type(parent, smallvec![param]);
            self.set_supertypes(class, vec![parent_ty]);
        }
    }

    // =========================================================================
    // Names
    // =========================================================================

    pub fn names(&self) -> &Interner {
        &self.names
    }

    pub fn intern_string(&self, s: &str) -> Atom {
        self.names.intern(s)
    }

    pub fn resolve_atom(&self, atom: Atom) -> Arc<str> {
        self.names.resolve(atom)
    }

    // =========================================================================
    // Core interning
    // =========================================================================

    /// Intern a type and return its TypeId.
    /// If the structure already exists, returns the existing TypeId.
    pub fn intern(&self, data: TypeData) -> TypeId {
        {
            let store = self.types.read().expect("types lock poisoned");
            if let Some(&id) = store.map.get(&data) {
                return id;
            }
        }
        let mut store = self.types.write().expect("types lock poisoned");
        store.intern(data)
    }

    /// Look up the structure for a given TypeId.
    pub fn lookup(&self, id: TypeId) -> Option<TypeData> {
        let store = self.types.read().expect("types lock poisoned");
        store.data.get(id.0 as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.types.read().expect("types lock poisoned").data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // Classifiers
    // =========================================================================

    /// Declares a classifier with the given type parameters. Supertypes
    /// default to none (implicitly `Any`) and can be set afterwards with
    /// [`TypeInterner::set_supertypes`], referring to
    /// [`TypeInterner::class_param_types`].
    pub fn declare_class(
        &self,
        name: &str,
        kind: ClassKind,
        is_final: bool,
        params: &[(&str, Variance)],
    ) -> ClassId {
        let type_params = params
            .iter()
            .map(|&(param_name, variance)| ClassTypeParam {
                id: self.new_type_param(param_name),
                variance,
            })
            .collect();
        let info = ClassInfo {
            name: self.intern_string(name),
            kind,
            is_final,
            type_params,
            supertypes: Vec::new(),
        };
        let mut classes = self.classes.write().expect("classes lock poisoned");
        let id = ClassId(classes.len() as u32);
        classes.push(Arc::new(info));
        id
    }

    pub fn set_supertypes(&self, class: ClassId, supertypes: Vec<TypeId>) {
        let mut classes = self.classes.write().expect("classes lock poisoned");
        if let Some(slot) = classes.get_mut(class.0 as usize) {
            let mut info = ClassInfo::clone(slot);
            info.supertypes = supertypes;
            *slot = Arc::new(info);
        }
    }

    pub fn class_info(&self, class: ClassId) -> Option<Arc<ClassInfo>> {
        let classes = self.classes.read().expect("classes lock poisoned");
        classes.get(class.0 as usize).cloned()
    }

    /// The class's own type parameters as `Param` types, in declaration order.
    pub fn class_param_types(&self, class: ClassId) -> Vec<TypeId> {
        self.class_info(class)
            .map(|info| {
                info.type_params
                    .iter()
                    .map(|param| self.type_param(param.id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Classifier of a (non-null) class type.
    pub fn class_of(&self, ty: TypeId) -> Option<ClassId> {
        match self.lookup(ty)? {
            TypeData::Class { class, .. } => Some(class),
            _ => None,
        }
    }

    // =========================================================================
    // Type parameters and inference variables
    // =========================================================================

    /// Creates a type parameter with the default `Any?` upper bound.
    pub fn new_type_param(&self, name: &str) -> TypeParamId {
        let name = self.intern_string(name);
        let mut params = self.type_params.write().expect("type_params lock poisoned");
        let id = TypeParamId(params.len() as u32);
        params.push(TypeParamInfo {
            name,
            upper_bounds: vec![TypeId::NULLABLE_ANY],
        });
        id
    }

    pub fn set_type_param_bounds(&self, param: TypeParamId, bounds: Vec<TypeId>) {
        let mut params = self.type_params.write().expect("type_params lock poisoned");
        if let Some(info) = params.get_mut(param.0 as usize) {
            info.upper_bounds = if bounds.is_empty() {
                vec![TypeId::NULLABLE_ANY]
            } else {
                bounds
            };
        }
    }

    pub fn type_param_bounds(&self, param: TypeParamId) -> Vec<TypeId> {
        let params = self.type_params.read().expect("type_params lock poisoned");
        params
            .get(param.0 as usize)
            .map(|info| info.upper_bounds.clone())
            .unwrap_or_else(|| vec![TypeId::NULLABLE_ANY])
    }

    pub fn type_param_name(&self, param: TypeParamId) -> Atom {
        let params = self.type_params.read().expect("type_params lock poisoned");
        params
            .get(param.0 as usize)
            .map(|info| info.name)
            .unwrap_or(Atom::NONE)
    }

    pub fn type_param(&self, param: TypeParamId) -> TypeId {
        self.intern(TypeData::Param(param))
    }

    /// Allocates a fresh inference variable. The counter is shared by every
    /// constraint system built over this interner.
    pub fn fresh_type_var(&self, origin: Option<TypeParamId>) -> TypeVarId {
        let name = origin
            .map(|param| self.type_param_name(param))
            .unwrap_or(Atom::NONE);
        let mut vars = self.type_vars.write().expect("type_vars lock poisoned");
        let id = TypeVarId(vars.len() as u32);
        vars.push(TypeVarInfo { name, origin });
        id
    }

    pub fn type_var_name(&self, var: TypeVarId) -> Atom {
        let vars = self.type_vars.read().expect("type_vars lock poisoned");
        vars.get(var.0 as usize)
            .map(|info| info.name)
            .unwrap_or(Atom::NONE)
    }

    pub fn type_var_origin(&self, var: TypeVarId) -> Option<TypeParamId> {
        let vars = self.type_vars.read().expect("type_vars lock poisoned");
        vars.get(var.0 as usize).and_then(|info| info.origin)
    }

    pub fn var_type(&self, var: TypeVarId) -> TypeId {
        self.intern(TypeData::Var(var))
    }

    // =========================================================================
    // Constructors
    // =========================================================================

    pub fn class_type(&self, class: ClassId, args: TypeList) -> TypeId {
        self.intern(TypeData::Class { class, args })
    }

    pub fn list_type(&self, element: TypeId) -> TypeId {
        self.class_type(ClassId::LIST, smallvec![element])
    }

    pub fn mutable_list_type(&self, element: TypeId) -> TypeId {
        self.class_type(ClassId::MUTABLE_LIST, smallvec![element])
    }

    pub fn array_type(&self, element: TypeId) -> TypeId {
        self.class_type(ClassId::ARRAY, smallvec![element])
    }

    pub fn comparable_type(&self, element: TypeId) -> TypeId {
        self.class_type(ClassId::COMPARABLE, smallvec![element])
    }

    pub fn iterable_type(&self, element: TypeId) -> TypeId {
        self.class_type(ClassId::ITERABLE, smallvec![element])
    }

    pub fn pair_type(&self, first: TypeId, second: TypeId) -> TypeId {
        self.class_type(ClassId::PAIR, smallvec![first, second])
    }

    pub fn function_type(&self, receiver: Option<TypeId>, params: TypeList, ret: TypeId) -> TypeId {
        self.intern(TypeData::Function(FunctionType {
            receiver,
            params,
            ret,
        }))
    }

    pub fn integer_literal(&self, value: i64) -> TypeId {
        self.intern(TypeData::IntegerLiteral(value))
    }

    /// `T?`, normalized: `T??` is `T?`, `ERROR?` is `ERROR`.
    pub fn make_nullable(&self, ty: TypeId) -> TypeId {
        match self.lookup(ty) {
            None | Some(TypeData::Error) | Some(TypeData::Nullable(_)) => ty,
            Some(TypeData::IntegerLiteral(value)) => {
                self.make_nullable(integer_literal_default(value))
            }
            Some(_) => self.intern(TypeData::Nullable(ty)),
        }
    }

    /// Strips nullability. Type parameters and variables, whose nullability
    /// is unknown, become definitely-non-null intersections (`T & Any`).
    pub fn make_non_null(&self, ty: TypeId) -> TypeId {
        match self.lookup(ty) {
            Some(TypeData::Nullable(inner)) => self.make_non_null(inner),
            Some(TypeData::Param(param)) => {
                let bounded = self
                    .type_param_bounds(param)
                    .into_iter()
                    .any(|bound| !self.may_be_null(bound));
                if bounded {
                    ty
                } else {
                    self.intersection_raw(smallvec![ty, TypeId::ANY])
                }
            }
            Some(TypeData::Var(_)) => self.intersection_raw(smallvec![ty, TypeId::ANY]),
            _ => ty,
        }
    }

    /// Whether the type is syntactically nullable (`T?`).
    pub fn is_marked_nullable(&self, ty: TypeId) -> bool {
        matches!(self.lookup(ty), Some(TypeData::Nullable(_)))
    }

    /// Whether `null` is definitely a value of this type.
    pub fn accepts_null(&self, ty: TypeId) -> bool {
        match self.lookup(ty) {
            Some(TypeData::Nullable(_)) | Some(TypeData::Error) => true,
            Some(TypeData::Intersection(members)) => {
                members.iter().all(|&member| self.accepts_null(member))
            }
            _ => false,
        }
    }

    /// Whether a value of this type may be `null`: nullable types, and type
    /// parameters whose bounds are all nullable.
    pub fn may_be_null(&self, ty: TypeId) -> bool {
        match self.lookup(ty) {
            Some(TypeData::Nullable(_)) => true,
            Some(TypeData::Param(param)) => self
                .type_param_bounds(param)
                .into_iter()
                .all(|bound| self.may_be_null(bound)),
            Some(TypeData::Intersection(members)) => {
                members.iter().all(|&member| self.may_be_null(member))
            }
            _ => false,
        }
    }

    /// Intersection without simplification beyond flattening, deduplication
    /// and a canonical member order.
    pub fn intersection_raw(&self, members: TypeList) -> TypeId {
        let mut flat = TypeList::new();
        for member in members {
            match self.lookup(member) {
                Some(TypeData::Intersection(inner)) => flat.extend(inner.iter().copied()),
                _ => flat.push(member),
            }
        }
        flat.sort_unstable();
        flat.dedup();
        match flat.len() {
            0 => TypeId::NULLABLE_ANY,
            1 => flat[0],
            _ => self.intern(TypeData::Intersection(flat)),
        }
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

fn class_data(class: ClassId) -> TypeData {
    TypeData::Class {
        class,
        args: TypeList::new(),
    }
}

#[cfg(test)]
#[path = "../tests/intern_tests.rs"]
mod tests;
