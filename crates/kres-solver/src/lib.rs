//! Type representation and inference for the kres call-resolution engine.
//!
//! This crate provides:
//! - Interned types (`TypeId`, `TypeData`, `TypeInterner`)
//! - The subtype relation, least upper bounds and intersections
//! - Substitution of type parameters and inference variables
//! - The per-candidate `ConstraintSystem` and variable fixation

pub mod types;
pub use types::*;

mod intern;
pub use intern::TypeInterner;

pub mod visitor;

pub mod instantiate;
pub use instantiate::{TypeSubstitution, instantiate_type};

pub mod subtype;
pub use subtype::{is_equal, is_subtype, supertype_as};

pub mod lub;
pub use lub::{common_supertype, intersection, is_empty_intersection};

mod format;
pub use format::TypeFormatter;

pub mod infer;
pub use infer::{
    Constraint, ConstraintError, ConstraintKind, ConstraintPosition, ConstraintSystem,
    VariableConstraints,
};

mod infer_resolve;
