//! Type representation.
//!
//! Types are interned: every structurally distinct `TypeData` is stored once
//! in the `TypeInterner` and referred to by a `TypeId`. Equality of two
//! `TypeId`s is structural equality of the types they denote.

use kres_common::Atom;
use kres_common::limits::TYPE_LIST_INLINE;
use smallvec::SmallVec;

/// Inline list of type handles (type arguments, parameter lists, intersection members).
pub type TypeList = SmallVec<[TypeId; TYPE_LIST_INLINE]>;

/// Interned type handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Sentinel type for failed resolutions. Compatible with everything so
    /// downstream analysis continues without cascading errors.
    pub const ERROR: TypeId = TypeId(0);
    pub const NOTHING: TypeId = TypeId(1);
    pub const NULLABLE_NOTHING: TypeId = TypeId(2);
    pub const ANY: TypeId = TypeId(3);
    pub const NULLABLE_ANY: TypeId = TypeId(4);
    pub const UNIT: TypeId = TypeId(5);
    pub const BOOLEAN: TypeId = TypeId(6);
    pub const CHAR: TypeId = TypeId(7);
    pub const BYTE: TypeId = TypeId(8);
    pub const SHORT: TypeId = TypeId(9);
    pub const INT: TypeId = TypeId(10);
    pub const LONG: TypeId = TypeId(11);
    pub const FLOAT: TypeId = TypeId(12);
    pub const DOUBLE: TypeId = TypeId(13);
    pub const NUMBER: TypeId = TypeId(14);
    pub const STRING: TypeId = TypeId(15);
    pub const CHAR_SEQUENCE: TypeId = TypeId(16);

    /// Number of well-known types interned at construction.
    pub(crate) const WELL_KNOWN_COUNT: u32 = 17;

    #[inline]
    pub fn is_error(self) -> bool {
        self == TypeId::ERROR
    }
}

/// Class (classifier) identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

impl ClassId {
    pub const ANY: ClassId = ClassId(0);
    pub const UNIT: ClassId = ClassId(1);
    pub const NUMBER: ClassId = ClassId(2);
    pub const INT: ClassId = ClassId(3);
    pub const LONG: ClassId = ClassId(4);
    pub const SHORT: ClassId = ClassId(5);
    pub const BYTE: ClassId = ClassId(6);
    pub const DOUBLE: ClassId = ClassId(7);
    pub const FLOAT: ClassId = ClassId(8);
    pub const BOOLEAN: ClassId = ClassId(9);
    pub const CHAR: ClassId = ClassId(10);
    pub const CHAR_SEQUENCE: ClassId = ClassId(11);
    pub const STRING: ClassId = ClassId(12);
    pub const COMPARABLE: ClassId = ClassId(13);
    pub const ITERABLE: ClassId = ClassId(14);
    pub const COLLECTION: ClassId = ClassId(15);
    pub const LIST: ClassId = ClassId(16);
    pub const MUTABLE_LIST: ClassId = ClassId(17);
    pub const ARRAY: ClassId = ClassId(18);
    pub const PAIR: ClassId = ClassId(19);
}

/// Declared type parameter (of a class or a callable declaration).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeParamId(pub u32);

/// Inference variable. Ids are unique per interner, so variables of a nested
/// call's system never collide with the enclosing call's variables.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVarId(pub u32);

/// Declaration-site variance of a class type parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Variance {
    Invariant,
    Out,
    In,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClassKind {
    Class,
    Interface,
    Object,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassTypeParam {
    pub id: TypeParamId,
    pub variance: Variance,
}

/// Classifier metadata needed for subtyping.
///
/// Supertypes are expressed in terms of the class's own type parameters
/// (`List<T>` has supertype `Collection<T>`).
#[derive(Clone, Debug)]
pub struct ClassInfo {
    pub name: Atom,
    pub kind: ClassKind,
    pub is_final: bool,
    pub type_params: Vec<ClassTypeParam>,
    pub supertypes: Vec<TypeId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionType {
    /// Receiver of an extension function type (`A.(B) -> C`).
    pub receiver: Option<TypeId>,
    pub params: TypeList,
    pub ret: TypeId,
}

impl FunctionType {
    /// Parameter list with the receiver (if any) prepended; `A.(B) -> C`
    /// and `(A, B) -> C` are interchangeable for subtyping.
    pub fn flat_params(&self) -> TypeList {
        let mut out = TypeList::new();
        if let Some(receiver) = self.receiver {
            out.push(receiver);
        }
        out.extend(self.params.iter().copied());
        out
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeData {
    Error,
    /// Bottom type; `Nothing?` is represented as `Nullable(NOTHING)`.
    Nothing,
    Class {
        class: ClassId,
        args: TypeList,
    },
    Nullable(TypeId),
    Param(TypeParamId),
    Var(TypeVarId),
    Function(FunctionType),
    Intersection(TypeList),
    /// Type of an integer literal before it is adapted to a concrete
    /// integral type.
    IntegerLiteral(i64),
}

/// Integral classes an integer literal can adapt to, narrowest first.
pub const INTEGRAL_TYPES: [TypeId; 4] = [TypeId::BYTE, TypeId::SHORT, TypeId::INT, TypeId::LONG];

/// Whether an integer literal value fits the given integral type.
pub fn integral_type_contains(ty: TypeId, value: i64) -> bool {
    match ty {
        TypeId::BYTE => i8::try_from(value).is_ok(),
        TypeId::SHORT => i16::try_from(value).is_ok(),
        TypeId::INT => i32::try_from(value).is_ok(),
        TypeId::LONG => true,
        _ => false,
    }
}

/// Type an integer literal takes when nothing else constrains it.
pub fn integer_literal_default(value: i64) -> TypeId {
    if i32::try_from(value).is_ok() {
        TypeId::INT
    } else {
        TypeId::LONG
    }
}
