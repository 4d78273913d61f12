//! Resolution results.

use crate::collector::ExplicitReceiverKind;
use crate::declarations::DeclId;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::expr::ExprId;
use crate::flow::{FlowFact, FlowSubject};
use kres_common::Atom;
use kres_solver::{ConstraintSystem, TypeId, TypeInterner, TypeParamId};
use std::rc::Rc;

/// Contextual type of an expression. "No expectation" is a value of its
/// own, distinct from expecting `Any?`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExpectedType {
    #[default]
    NoExpectation,
    Type(TypeId),
}

impl ExpectedType {
    pub fn ty(self) -> Option<TypeId> {
        match self {
            ExpectedType::NoExpectation => None,
            ExpectedType::Type(ty) => Some(ty),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResolvedCallKind {
    Function,
    Constructor,
    Property,
    Variable,
    /// `invoke` on the function-typed `variable`.
    Invoke { variable: DeclId },
    CallableReference,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResolvedArgument {
    pub argument: u32,
    pub parameter: u32,
    /// Part of a vararg group.
    pub vararg: bool,
    pub ty: TypeId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedCall {
    pub declaration: DeclId,
    pub name: Atom,
    pub kind: ResolvedCallKind,
    pub explicit_receiver_kind: ExplicitReceiverKind,
    pub dispatch_receiver: Option<TypeId>,
    pub extension_receiver: Option<TypeId>,
    /// Type argument of each type parameter, in declaration order.
    pub type_arguments: Vec<(TypeParamId, TypeId)>,
    pub arguments: Vec<ResolvedArgument>,
    pub result_type: TypeId,
    pub warnings: Vec<DiagnosticKind>,
}

impl ResolvedCall {
    pub fn type_argument(&self, param: TypeParamId) -> Option<TypeId> {
        self.type_arguments
            .iter()
            .find(|(p, _)| *p == param)
            .map(|&(_, ty)| ty)
    }

    fn substituted(&self, db: &TypeInterner, system: &ConstraintSystem) -> ResolvedCall {
        let subst = |ty: TypeId| system.substitute(db, ty);
        ResolvedCall {
            dispatch_receiver: self.dispatch_receiver.map(subst),
            extension_receiver: self.extension_receiver.map(subst),
            type_arguments: self
                .type_arguments
                .iter()
                .map(|&(param, ty)| (param, subst(ty)))
                .collect(),
            arguments: self
                .arguments
                .iter()
                .map(|arg| ResolvedArgument {
                    ty: subst(arg.ty),
                    ..*arg
                })
                .collect(),
            result_type: subst(self.result_type),
            ..self.clone()
        }
    }
}

/// Cached result for one expression.
#[derive(Clone, Debug)]
pub struct ExprResolution {
    pub ty: TypeId,
    pub call: Option<ResolvedCall>,
    /// Diagnostics reported for this node itself.
    pub diagnostics: Vec<Diagnostic>,
    /// Candidates listed by an ambiguity or applicability failure.
    pub candidates: Vec<DeclId>,
    /// Stable flow subject denoted by the expression.
    pub subject: Option<FlowSubject>,
    /// Narrowed type the flow snapshot knows but cannot apply.
    pub unstable_smart_cast: Option<TypeId>,
    /// System of a call completed partially in argument position; the
    /// enclosing call absorbs it and finishes its variables.
    pub(crate) partial: Option<ConstraintSystem>,
    /// Expressions whose cached types mention `partial`'s variables.
    pub(crate) pending: Vec<ExprId>,
}

impl ExprResolution {
    pub fn of_type(ty: TypeId) -> Self {
        ExprResolution {
            ty,
            call: None,
            diagnostics: Vec::new(),
            candidates: Vec::new(),
            subject: None,
            unstable_smart_cast: None,
            partial: None,
            pending: Vec::new(),
        }
    }

    pub fn error(diagnostics: Vec<Diagnostic>, candidates: Vec<DeclId>) -> Self {
        ExprResolution {
            diagnostics,
            candidates,
            ..ExprResolution::of_type(TypeId::ERROR)
        }
    }

    pub fn is_error(&self) -> bool {
        self.ty.is_error() && self.call.is_none()
    }

    pub fn is_partial(&self) -> bool {
        self.partial.is_some()
    }

    /// Copy with the variables `system` has fixed substituted, no longer
    /// partial.
    pub(crate) fn finalized(&self, db: &TypeInterner, system: &ConstraintSystem) -> ExprResolution {
        ExprResolution {
            ty: system.substitute(db, self.ty),
            call: self.call.as_ref().map(|call| call.substituted(db, system)),
            partial: None,
            pending: Vec::new(),
            ..self.clone()
        }
    }
}

/// Output of resolving one top-level call site.
#[derive(Clone, Debug)]
pub struct CallSiteResult {
    pub resolution: Rc<ExprResolution>,
    pub flow_facts: Vec<FlowFact>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CallSiteResult {
    pub fn ty(&self) -> TypeId {
        self.resolution.ty
    }

    pub fn call(&self) -> Option<&ResolvedCall> {
        self.resolution.call.as_ref()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.category.is_error())
    }
}
