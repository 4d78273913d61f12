//! Declaration descriptors and the provider boundary.
//!
//! Declarations are built by the embedding compiler; the resolver only reads
//! them through `DeclarationProvider`. `SymbolTable` is an in-memory provider
//! for embedders without their own symbol storage.

use bitflags::bitflags;
use kres_common::Atom;
use kres_solver::{
    ClassId, FunctionType, TypeId, TypeInterner, TypeList, TypeParamId, TypeSubstitution, TypeData,
    instantiate_type, is_equal, supertype_as,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u32);

impl DeclId {
    const SYNTHETIC_BASE: u32 = 1 << 31;

    /// Ids of declarations the resolver synthesizes (lambda parameters).
    pub const fn synthetic(index: u32) -> Self {
        DeclId(Self::SYNTHETIC_BASE | index)
    }

    pub const fn is_synthetic(self) -> bool {
        self.0 & Self::SYNTHETIC_BASE != 0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CallableKind {
    Function,
    Property,
    Constructor,
    LocalVariable,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Internal { module: Atom },
    Private { owner: ClassId },
    Protected { owner: ClassId },
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DeclFlags: u16 {
        const OPERATOR = 1 << 0;
        const INFIX = 1 << 1;
        const MUTABLE = 1 << 2;
        /// Lambda arguments with a receiver contribute their calls' constraints
        /// back to this call.
        const BUILDER_INFERENCE = 1 << 3;
        /// Reads of this property always observe the same value.
        const HAS_STABLE_VALUE = 1 << 4;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeParameterDescriptor {
    pub id: TypeParamId,
    pub name: Atom,
    pub upper_bounds: Vec<TypeId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueParameter {
    pub name: Atom,
    pub ty: TypeId,
    pub has_default: bool,
    pub vararg: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallableDescriptor {
    pub id: DeclId,
    pub name: Atom,
    pub kind: CallableKind,
    pub type_params: Vec<TypeParameterDescriptor>,
    pub value_params: Vec<ValueParameter>,
    /// Class whose instance is the dispatch receiver of a member.
    pub dispatch_receiver: Option<ClassId>,
    pub extension_receiver: Option<TypeId>,
    /// Return type of a function, type of a property or variable.
    pub return_type: TypeId,
    pub visibility: Visibility,
    pub flags: DeclFlags,
    pub owner: Option<ClassId>,
}

impl CallableDescriptor {
    /// Immutable local variable or lambda parameter.
    pub fn local(id: DeclId, name: Atom, ty: TypeId) -> Self {
        CallableDescriptor {
            id,
            name,
            kind: CallableKind::LocalVariable,
            type_params: Vec::new(),
            value_params: Vec::new(),
            dispatch_receiver: None,
            extension_receiver: None,
            return_type: ty,
            visibility: Visibility::Public,
            flags: DeclFlags::empty(),
            owner: None,
        }
    }

    /// The `invoke` of a function-typed value. Parameters of the function
    /// type become positional value parameters, a receiver one first.
    pub fn synthetic_invoke(id: DeclId, name: Atom, function: &FunctionType) -> Self {
        let value_params = function
            .flat_params()
            .into_iter()
            .map(|ty| ValueParameter {
                name: Atom::NONE,
                ty,
                has_default: false,
                vararg: false,
            })
            .collect();
        CallableDescriptor {
            id,
            name,
            kind: CallableKind::Function,
            type_params: Vec::new(),
            value_params,
            dispatch_receiver: None,
            extension_receiver: None,
            return_type: function.ret,
            visibility: Visibility::Public,
            flags: DeclFlags::OPERATOR,
            owner: None,
        }
    }

    pub fn is_member(&self) -> bool {
        self.dispatch_receiver.is_some()
    }

    pub fn is_extension(&self) -> bool {
        self.extension_receiver.is_some()
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }

    pub fn is_value(&self) -> bool {
        matches!(self.kind, CallableKind::Property | CallableKind::LocalVariable)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, CallableKind::Function | CallableKind::Constructor)
    }

    /// Stable values can be smart cast.
    pub fn has_stable_value(&self) -> bool {
        match self.kind {
            CallableKind::LocalVariable => !self.flags.contains(DeclFlags::MUTABLE),
            CallableKind::Property => {
                self.flags.contains(DeclFlags::HAS_STABLE_VALUE)
                    && !self.flags.contains(DeclFlags::MUTABLE)
            }
            CallableKind::Function | CallableKind::Constructor => false,
        }
    }

    pub fn has_vararg(&self) -> bool {
        self.value_params.iter().any(|param| param.vararg)
    }
}

/// Read-only access to declarations.
pub trait DeclarationProvider {
    fn descriptor(&self, id: DeclId) -> Option<Rc<CallableDescriptor>>;

    /// Members declared directly in `class`, not inherited ones.
    fn declared_members(&self, class: ClassId, name: Atom) -> Vec<Rc<CallableDescriptor>>;

    fn top_level(&self, package: Atom, name: Atom) -> Vec<Rc<CallableDescriptor>>;

    /// Declarations reachable through the class name (companion members,
    /// nested constructors).
    fn statics(&self, class: ClassId, name: Atom) -> Vec<Rc<CallableDescriptor>>;
}

// =============================================================================
// Member lookup
// =============================================================================

/// Class types whose members are visible on a receiver of type `ty`.
pub fn receiver_classes(db: &TypeInterner, ty: TypeId) -> SmallVec<[TypeId; 2]> {
    let mut out = SmallVec::new();
    match db.lookup(ty) {
        Some(TypeData::Class { .. }) => out.push(ty),
        Some(TypeData::Nullable(inner)) => out.extend(receiver_classes(db, inner)),
        Some(TypeData::IntegerLiteral(value)) => {
            out.push(kres_solver::integer_literal_default(value));
        }
        Some(TypeData::Param(param)) => {
            for bound in db.type_param_bounds(param) {
                for class_ty in receiver_classes(db, bound) {
                    if !out.contains(&class_ty) {
                        out.push(class_ty);
                    }
                }
            }
        }
        Some(TypeData::Intersection(members)) => {
            for member in members {
                for class_ty in receiver_classes(db, member) {
                    if !out.contains(&class_ty) {
                        out.push(class_ty);
                    }
                }
            }
        }
        Some(TypeData::Function(_)) | Some(TypeData::Var(_)) => out.push(TypeId::ANY),
        Some(TypeData::Error | TypeData::Nothing) | None => {}
    }
    out
}

/// Members named `name` visible on `receiver`, nearest class first. A
/// member whose signature matches a nearer one is overridden and skipped.
pub fn lookup_members(
    db: &TypeInterner,
    provider: &dyn DeclarationProvider,
    receiver: TypeId,
    name: Atom,
) -> Vec<Rc<CallableDescriptor>> {
    let mut found: Vec<(Rc<CallableDescriptor>, TypeList)> = Vec::new();
    let mut visited: Vec<ClassId> = Vec::new();
    let mut queue: VecDeque<TypeId> = receiver_classes(db, receiver).into_iter().collect();
    queue.push_back(TypeId::ANY);

    while let Some(current) = queue.pop_front() {
        let Some(class) = db.class_of(current) else {
            continue;
        };
        if visited.contains(&class) {
            continue;
        }
        visited.push(class);
        let Some(info) = db.class_info(class) else {
            continue;
        };
        let params: Vec<TypeParamId> = info.type_params.iter().map(|p| p.id).collect();
        let args = match db.lookup(current) {
            Some(TypeData::Class { args, .. }) => args,
            _ => TypeList::new(),
        };
        let subst = TypeSubstitution::from_params(&params, &args);

        for descriptor in provider.declared_members(class, name) {
            let signature = member_signature(db, &descriptor, &subst);
            let overridden = found.iter().any(|(existing, existing_sig)| {
                existing.kind == descriptor.kind
                    && existing_sig.len() == signature.len()
                    && existing_sig
                        .iter()
                        .zip(signature.iter())
                        .all(|(&a, &b)| is_equal(db, a, b))
            });
            if !overridden {
                found.push((descriptor, signature));
            }
        }
        for &supertype in &info.supertypes {
            queue.push_back(instantiate_type(db, supertype, &subst));
        }
    }
    found.into_iter().map(|(descriptor, _)| descriptor).collect()
}

fn member_signature(
    db: &TypeInterner,
    descriptor: &CallableDescriptor,
    subst: &TypeSubstitution,
) -> TypeList {
    let mut signature = TypeList::new();
    if let Some(receiver) = descriptor.extension_receiver {
        signature.push(instantiate_type(db, receiver, subst));
    }
    for param in &descriptor.value_params {
        signature.push(instantiate_type(db, param.ty, subst));
    }
    signature
}

/// Substitution of `owner`'s class parameters as seen from `receiver`.
pub fn member_substitution(db: &TypeInterner, receiver: TypeId, owner: ClassId) -> TypeSubstitution {
    let Some(info) = db.class_info(owner) else {
        return TypeSubstitution::new();
    };
    if info.type_params.is_empty() {
        return TypeSubstitution::new();
    }
    let params: Vec<TypeParamId> = info.type_params.iter().map(|p| p.id).collect();
    let receiver = db.make_non_null(receiver);
    match supertype_as(db, receiver, owner) {
        Some(args) => TypeSubstitution::from_params(&params, &args),
        None => TypeSubstitution::new(),
    }
}

// =============================================================================
// SymbolTable
// =============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Placement {
    TopLevel { package: Atom },
    Member { class: ClassId },
    Static { class: ClassId },
}

/// Builder for descriptors stored in a `SymbolTable`.
#[derive(Clone, Debug)]
pub struct DescriptorBuilder {
    name: Atom,
    kind: CallableKind,
    type_params: Vec<TypeParameterDescriptor>,
    value_params: Vec<ValueParameter>,
    extension_receiver: Option<TypeId>,
    return_type: TypeId,
    visibility: Visibility,
    flags: DeclFlags,
    placement: Placement,
}

impl DescriptorBuilder {
    fn new(name: Atom, kind: CallableKind, return_type: TypeId) -> Self {
        DescriptorBuilder {
            name,
            kind,
            type_params: Vec::new(),
            value_params: Vec::new(),
            extension_receiver: None,
            return_type,
            visibility: Visibility::Public,
            flags: DeclFlags::empty(),
            placement: Placement::TopLevel {
                package: Atom::NONE,
            },
        }
    }

    pub fn function(name: Atom) -> Self {
        Self::new(name, CallableKind::Function, TypeId::UNIT)
    }

    /// A read-only property; see `flags` for `MUTABLE`.
    pub fn property(name: Atom, ty: TypeId) -> Self {
        Self::new(name, CallableKind::Property, ty).flags(DeclFlags::HAS_STABLE_VALUE)
    }

    pub fn variable(name: Atom, ty: TypeId) -> Self {
        Self::new(name, CallableKind::LocalVariable, ty)
    }

    /// Constructor of `class`, generic over the class's type parameters.
    pub fn constructor(db: &TypeInterner, class: ClassId) -> Self {
        let (name, params) = match db.class_info(class) {
            Some(info) => (info.name, info.type_params.iter().map(|p| p.id).collect()),
            None => (Atom::NONE, Vec::new()),
        };
        let result = db.class_type(class, db.class_param_types(class).into_iter().collect());
        let mut builder = Self::new(name, CallableKind::Constructor, result);
        for param in params {
            builder = builder.type_param(db, param);
        }
        builder
    }

    pub fn type_param(mut self, db: &TypeInterner, param: TypeParamId) -> Self {
        let upper_bounds = db
            .type_param_bounds(param)
            .into_iter()
            .filter(|&bound| bound != TypeId::NULLABLE_ANY)
            .collect();
        self.type_params.push(TypeParameterDescriptor {
            id: param,
            name: db.type_param_name(param),
            upper_bounds,
        });
        self
    }

    pub fn param(mut self, name: Atom, ty: TypeId) -> Self {
        self.value_params.push(ValueParameter {
            name,
            ty,
            has_default: false,
            vararg: false,
        });
        self
    }

    pub fn param_with_default(mut self, name: Atom, ty: TypeId) -> Self {
        self.value_params.push(ValueParameter {
            name,
            ty,
            has_default: true,
            vararg: false,
        });
        self
    }

    /// `vararg name: ty`; `ty` is the element type.
    pub fn vararg_param(mut self, name: Atom, ty: TypeId) -> Self {
        self.value_params.push(ValueParameter {
            name,
            ty,
            has_default: false,
            vararg: true,
        });
        self
    }

    pub fn returns(mut self, ty: TypeId) -> Self {
        self.return_type = ty;
        self
    }

    pub fn extension(mut self, receiver: TypeId) -> Self {
        self.extension_receiver = Some(receiver);
        self
    }

    pub fn member_of(mut self, class: ClassId) -> Self {
        self.placement = Placement::Member { class };
        self
    }

    pub fn static_in(mut self, class: ClassId) -> Self {
        self.placement = Placement::Static { class };
        self
    }

    pub fn in_package(mut self, package: Atom) -> Self {
        self.placement = Placement::TopLevel { package };
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn flags(mut self, flags: DeclFlags) -> Self {
        self.flags |= flags;
        self
    }
}

/// In-memory `DeclarationProvider`. Lookups return declarations in
/// insertion order.
#[derive(Default)]
pub struct SymbolTable {
    descriptors: Vec<Rc<CallableDescriptor>>,
    members: FxHashMap<(ClassId, Atom), Vec<DeclId>>,
    top_level: FxHashMap<(Atom, Atom), Vec<DeclId>>,
    statics: FxHashMap<(ClassId, Atom), Vec<DeclId>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    pub fn add(&mut self, builder: DescriptorBuilder) -> DeclId {
        let id = DeclId(self.descriptors.len() as u32);
        let (dispatch_receiver, owner) = match builder.placement {
            Placement::Member { class } => (Some(class), Some(class)),
            Placement::Static { class } => (None, Some(class)),
            Placement::TopLevel { .. } => (None, None),
        };
        let descriptor = CallableDescriptor {
            id,
            name: builder.name,
            kind: builder.kind,
            type_params: builder.type_params,
            value_params: builder.value_params,
            dispatch_receiver,
            extension_receiver: builder.extension_receiver,
            return_type: builder.return_type,
            visibility: builder.visibility,
            flags: builder.flags,
            owner,
        };
        let key_name = descriptor.name;
        self.descriptors.push(Rc::new(descriptor));
        match builder.placement {
            Placement::TopLevel { package } => {
                self.top_level.entry((package, key_name)).or_default().push(id);
            }
            Placement::Member { class } => {
                self.members.entry((class, key_name)).or_default().push(id);
            }
            Placement::Static { class } => {
                self.statics.entry((class, key_name)).or_default().push(id);
            }
        }
        id
    }

    pub fn get(&self, id: DeclId) -> Option<&Rc<CallableDescriptor>> {
        self.descriptors.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    fn resolve_ids(&self, ids: Option<&Vec<DeclId>>) -> Vec<Rc<CallableDescriptor>> {
        ids.map(|ids| {
            ids.iter()
                .filter_map(|id| self.descriptors.get(id.0 as usize).cloned())
                .collect()
        })
        .unwrap_or_default()
    }
}

impl DeclarationProvider for SymbolTable {
    fn descriptor(&self, id: DeclId) -> Option<Rc<CallableDescriptor>> {
        self.descriptors.get(id.0 as usize).cloned()
    }

    fn declared_members(&self, class: ClassId, name: Atom) -> Vec<Rc<CallableDescriptor>> {
        self.resolve_ids(self.members.get(&(class, name)))
    }

    fn top_level(&self, package: Atom, name: Atom) -> Vec<Rc<CallableDescriptor>> {
        self.resolve_ids(self.top_level.get(&(package, name)))
    }

    fn statics(&self, class: ClassId, name: Atom) -> Vec<Rc<CallableDescriptor>> {
        self.resolve_ids(self.statics.get(&(class, name)))
    }
}

#[cfg(test)]
#[path = "../tests/declarations_tests.rs"]
mod tests;
