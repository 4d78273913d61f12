//! Candidate collection.
//!
//! Candidates come out in priority groups, highest priority first:
//!
//! - with an explicit receiver: its members, invokes of its function-typed
//!   members, then per tower level local extensions, member extensions of
//!   implicit receivers (both receivers supplied) and imported extensions
//! - without one: per tower level local declarations, members of each
//!   implicit receiver followed by extensions applicable to it, and imported
//!   top-level declarations
//!
//! Context receivers of one declaration form a single group, so equally
//! applicable candidates reached through two of them are ambiguous.

use crate::declarations::{
    CallableDescriptor, DeclarationProvider, lookup_members, member_substitution,
};
use crate::expr::ExprId;
use crate::flow::{DataFlowInfo, FlowSubject};
use crate::tower::{ImplicitReceiver, ImportScope, ScopeTower, TowerLevel};
use kres_common::Atom;
use kres_solver::{TypeData, TypeId, TypeInterner, instantiate_type};
use std::rc::Rc;
use tracing::trace;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExplicitReceiverKind {
    NoExplicitReceiver,
    DispatchReceiver,
    ExtensionReceiver,
    /// Explicit extension receiver plus implicit dispatch receiver.
    BothReceivers,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CallShape {
    /// `name(args)`: functions, constructors, `invoke` on values.
    Function,
    /// `name`: properties and variables.
    Value,
}

/// The explicit receiver of a call after its own resolution.
#[derive(Clone, Debug)]
pub struct ExplicitReceiver {
    pub expr: ExprId,
    /// Type as resolved, stable smart casts applied.
    pub ty: TypeId,
    pub safe: bool,
    pub subject: Option<FlowSubject>,
    /// Smart cast type that is not stable enough to apply.
    pub unstable_smart_cast: Option<TypeId>,
}

impl ExplicitReceiver {
    /// Type used for matching; `?.` strips nullability.
    pub fn matching_type(&self, db: &TypeInterner) -> TypeId {
        if self.safe {
            db.make_non_null(self.ty)
        } else {
            self.ty
        }
    }
}

#[derive(Clone, Debug)]
pub enum ReceiverSource {
    Explicit(ExprId),
    Implicit(Rc<ImplicitReceiver>),
}

#[derive(Clone, Debug)]
pub struct ReceiverValue {
    pub ty: TypeId,
    pub source: ReceiverSource,
}

impl ReceiverValue {
    pub fn is_implicit(&self) -> bool {
        matches!(self.source, ReceiverSource::Implicit(_))
    }
}

#[derive(Clone, Debug)]
pub enum CandidateKind {
    Direct,
    /// `value(args)` where `value` has a function type.
    Invoke {
        variable: Rc<CallableDescriptor>,
        function_type: TypeId,
    },
}

#[derive(Clone, Debug)]
pub struct Candidate {
    /// For invokes, the synthetic `invoke` descriptor.
    pub descriptor: Rc<CallableDescriptor>,
    pub kind: CandidateKind,
    pub explicit_receiver_kind: ExplicitReceiverKind,
    pub dispatch_receiver: Option<ReceiverValue>,
    pub extension_receiver: Option<ReceiverValue>,
    /// Tower distance of the level that produced the candidate.
    pub level: u32,
    pub implicit_receivers: u32,
    /// Member found only through an unstable smart cast of the explicit
    /// receiver.
    pub unstable_smart_cast: Option<TypeId>,
}

impl Candidate {
    fn direct(descriptor: Rc<CallableDescriptor>, level: u32) -> Self {
        Candidate {
            descriptor,
            kind: CandidateKind::Direct,
            explicit_receiver_kind: ExplicitReceiverKind::NoExplicitReceiver,
            dispatch_receiver: None,
            extension_receiver: None,
            level,
            implicit_receivers: 0,
            unstable_smart_cast: None,
        }
    }

    pub fn is_extension(&self) -> bool {
        self.extension_receiver.is_some()
    }
}

#[derive(Clone, Debug, Default)]
pub struct CandidateGroup {
    pub candidates: Vec<Candidate>,
}

impl CandidateGroup {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }
}

pub struct CandidateCollector<'a> {
    db: &'a TypeInterner,
    provider: &'a dyn DeclarationProvider,
    tower: &'a ScopeTower,
    flow: &'a DataFlowInfo,
    invoke_name: Atom,
}

impl<'a> CandidateCollector<'a> {
    pub fn new(
        db: &'a TypeInterner,
        provider: &'a dyn DeclarationProvider,
        tower: &'a ScopeTower,
        flow: &'a DataFlowInfo,
    ) -> Self {
        CandidateCollector {
            db,
            provider,
            tower,
            flow,
            invoke_name: db.intern_string("invoke"),
        }
    }

    /// Non-empty candidate groups by priority.
    pub fn collect(
        &self,
        name: Atom,
        explicit: Option<&ExplicitReceiver>,
        shape: CallShape,
    ) -> Vec<CandidateGroup> {
        let mut groups = match explicit {
            Some(receiver) => self.collect_with_receiver(name, receiver, shape),
            None => self.collect_without_receiver(name, shape),
        };
        groups.retain(|group| !group.is_empty());
        trace!(
            name = %self.db.resolve_atom(name),
            groups = groups.len(),
            candidates = groups.iter().map(CandidateGroup::len).sum::<usize>(),
            "collected candidates"
        );
        groups
    }

    fn collect_with_receiver(
        &self,
        name: Atom,
        receiver: &ExplicitReceiver,
        shape: CallShape,
    ) -> Vec<CandidateGroup> {
        let matching = receiver.matching_type(self.db);
        let explicit_value = ReceiverValue {
            ty: matching,
            source: ReceiverSource::Explicit(receiver.expr),
        };
        let mut groups = Vec::new();

        // Members, falling back to an unstable smart cast.
        let mut members = self.members_of(matching, name, shape, false);
        let mut unstable = None;
        if members.is_empty()
            && let Some(cast) = receiver.unstable_smart_cast
        {
            members = self.members_of(cast, name, shape, false);
            unstable = Some(cast);
        }
        let mut member_group = CandidateGroup::default();
        let mut invokes = CandidateGroup::default();
        for descriptor in members {
            let dispatch_ty = unstable.unwrap_or(matching);
            let value = ReceiverValue {
                ty: dispatch_ty,
                source: ReceiverSource::Explicit(receiver.expr),
            };
            if shape == CallShape::Function && descriptor.is_value() {
                let subst = descriptor
                    .owner
                    .map(|owner| member_substitution(self.db, dispatch_ty, owner));
                let value_ty = match &subst {
                    Some(subst) => instantiate_type(self.db, descriptor.return_type, subst),
                    None => descriptor.return_type,
                };
                if let Some(mut candidate) = self.invoke_candidate(descriptor, value_ty, 0) {
                    candidate.explicit_receiver_kind = ExplicitReceiverKind::DispatchReceiver;
                    candidate.dispatch_receiver = Some(value);
                    candidate.unstable_smart_cast = unstable;
                    invokes.candidates.push(candidate);
                }
                continue;
            }
            let mut candidate = Candidate::direct(descriptor, 0);
            candidate.explicit_receiver_kind = ExplicitReceiverKind::DispatchReceiver;
            candidate.dispatch_receiver = Some(value);
            candidate.unstable_smart_cast = unstable;
            member_group.candidates.push(candidate);
        }
        groups.push(member_group);
        groups.push(invokes);

        for (distance, level) in self.tower.levels() {
            let level_index = distance + 1;
            match level {
                TowerLevel::Local(scope) => {
                    let mut group = CandidateGroup::default();
                    for descriptor in scope.named(name) {
                        if descriptor.is_extension() && !descriptor.is_member() && fits_shape(descriptor, shape) {
                            let mut candidate = Candidate::direct(descriptor.clone(), level_index);
                            candidate.explicit_receiver_kind = ExplicitReceiverKind::ExtensionReceiver;
                            candidate.extension_receiver = Some(explicit_value.clone());
                            group.candidates.push(candidate);
                        }
                    }
                    groups.push(group);
                }
                TowerLevel::ImplicitReceiver(implicit) => {
                    let mut group = CandidateGroup::default();
                    self.push_member_extensions(&mut group, implicit, &explicit_value, name, shape, level_index);
                    groups.push(group);
                }
                TowerLevel::ContextReceivers(receivers) => {
                    let mut group = CandidateGroup::default();
                    for implicit in receivers.iter() {
                        self.push_member_extensions(&mut group, implicit, &explicit_value, name, shape, level_index);
                    }
                    groups.push(group);
                }
                TowerLevel::Imports(scope) => {
                    let mut group = CandidateGroup::default();
                    for descriptor in self.imported(scope, name) {
                        if descriptor.is_extension() && fits_shape(&descriptor, shape) {
                            let mut candidate = Candidate::direct(descriptor, level_index);
                            candidate.explicit_receiver_kind = ExplicitReceiverKind::ExtensionReceiver;
                            candidate.extension_receiver = Some(explicit_value.clone());
                            group.candidates.push(candidate);
                        }
                    }
                    groups.push(group);
                }
                TowerLevel::StaticScope(_) => {}
            }
        }
        groups
    }

    /// Extensions declared as members of `implicit`'s class, called on the
    /// explicit receiver.
    fn push_member_extensions(
        &self,
        group: &mut CandidateGroup,
        implicit: &Rc<ImplicitReceiver>,
        explicit_value: &ReceiverValue,
        name: Atom,
        shape: CallShape,
        level: u32,
    ) {
        let dispatch_ty = self.implicit_type(implicit);
        for descriptor in self.members_of(dispatch_ty, name, shape, true) {
            let mut candidate = Candidate::direct(descriptor, level);
            candidate.explicit_receiver_kind = ExplicitReceiverKind::BothReceivers;
            candidate.dispatch_receiver = Some(ReceiverValue {
                ty: dispatch_ty,
                source: ReceiverSource::Implicit(implicit.clone()),
            });
            candidate.extension_receiver = Some(explicit_value.clone());
            candidate.implicit_receivers = 1;
            group.candidates.push(candidate);
        }
    }

    fn collect_without_receiver(&self, name: Atom, shape: CallShape) -> Vec<CandidateGroup> {
        // Extensions visible from anywhere in the tower, nearest first.
        let mut extension_pool: Vec<(u32, Rc<CallableDescriptor>)> = Vec::new();
        for (distance, level) in self.tower.levels() {
            match level {
                TowerLevel::Local(scope) => {
                    for descriptor in scope.named(name) {
                        if descriptor.is_extension() && !descriptor.is_member() {
                            extension_pool.push((distance, descriptor.clone()));
                        }
                    }
                }
                TowerLevel::Imports(scope) => {
                    for descriptor in self.imported(scope, name) {
                        if descriptor.is_extension() {
                            extension_pool.push((distance, descriptor));
                        }
                    }
                }
                _ => {}
            }
        }
        extension_pool.retain(|(_, descriptor)| fits_shape(descriptor, shape));

        // Extensions declared in an implicit receiver's class apply to every
        // implicit receiver, that one included.
        let mut member_extensions: Vec<MemberExtension> = Vec::new();
        for (distance, level) in self.tower.levels() {
            let receivers = match level {
                TowerLevel::ImplicitReceiver(implicit) => std::slice::from_ref(implicit),
                TowerLevel::ContextReceivers(receivers) => &receivers[..],
                _ => continue,
            };
            for implicit in receivers {
                let dispatch_ty = self.implicit_type(implicit);
                for descriptor in self.members_of(dispatch_ty, name, shape, true) {
                    member_extensions.push(MemberExtension {
                        level: distance,
                        dispatch: ReceiverValue {
                            ty: dispatch_ty,
                            source: ReceiverSource::Implicit(implicit.clone()),
                        },
                        owner: implicit.clone(),
                        descriptor,
                    });
                }
            }
        }

        let mut groups = Vec::new();
        for (distance, level) in self.tower.levels() {
            match level {
                TowerLevel::Local(scope) => {
                    let mut group = CandidateGroup::default();
                    for descriptor in scope.named(name) {
                        if descriptor.is_extension() {
                            continue;
                        }
                        self.push_plain(&mut group, descriptor.clone(), shape, distance);
                    }
                    groups.push(group);
                }
                TowerLevel::ImplicitReceiver(implicit) => {
                    let receivers = std::slice::from_ref(implicit);
                    groups.push(self.implicit_members(receivers, name, shape, distance));
                    groups.push(self.implicit_extensions(receivers, &extension_pool, &member_extensions));
                }
                TowerLevel::ContextReceivers(receivers) => {
                    groups.push(self.implicit_members(receivers, name, shape, distance));
                    groups.push(self.implicit_extensions(receivers, &extension_pool, &member_extensions));
                }
                TowerLevel::Imports(scope) => {
                    let mut group = CandidateGroup::default();
                    for descriptor in self.imported(scope, name) {
                        if descriptor.is_extension() {
                            continue;
                        }
                        self.push_plain(&mut group, descriptor, shape, distance);
                    }
                    groups.push(group);
                }
                TowerLevel::StaticScope(class) => {
                    let mut group = CandidateGroup::default();
                    for descriptor in self.provider.statics(*class, name) {
                        if descriptor.is_extension() {
                            continue;
                        }
                        self.push_plain(&mut group, descriptor, shape, distance);
                    }
                    groups.push(group);
                }
            }
        }
        groups
    }

    /// A declaration needing no receiver: direct, or `invoke` on a value.
    fn push_plain(
        &self,
        group: &mut CandidateGroup,
        descriptor: Rc<CallableDescriptor>,
        shape: CallShape,
        level: u32,
    ) {
        if descriptor.is_member() {
            return;
        }
        match shape {
            CallShape::Value if descriptor.is_value() => {
                group.candidates.push(Candidate::direct(descriptor, level));
            }
            CallShape::Function if descriptor.is_callable() => {
                group.candidates.push(Candidate::direct(descriptor, level));
            }
            CallShape::Function if descriptor.is_value() => {
                let value_ty = descriptor.return_type;
                if let Some(candidate) = self.invoke_candidate(descriptor, value_ty, level) {
                    group.candidates.push(candidate);
                }
            }
            _ => {}
        }
    }

    fn implicit_members(
        &self,
        receivers: &[Rc<ImplicitReceiver>],
        name: Atom,
        shape: CallShape,
        level: u32,
    ) -> CandidateGroup {
        let mut group = CandidateGroup::default();
        for implicit in receivers {
            let ty = self.implicit_type(implicit);
            let value = ReceiverValue {
                ty,
                source: ReceiverSource::Implicit(implicit.clone()),
            };
            for descriptor in self.members_of(ty, name, shape, false) {
                if shape == CallShape::Function && descriptor.is_value() {
                    let subst = descriptor
                        .owner
                        .map(|owner| member_substitution(self.db, ty, owner));
                    let value_ty = match &subst {
                        Some(subst) => instantiate_type(self.db, descriptor.return_type, subst),
                        None => descriptor.return_type,
                    };
                    if let Some(mut candidate) = self.invoke_candidate(descriptor, value_ty, level) {
                        candidate.dispatch_receiver = Some(value.clone());
                        candidate.implicit_receivers = 1;
                        group.candidates.push(candidate);
                    }
                    continue;
                }
                let mut candidate = Candidate::direct(descriptor, level);
                candidate.dispatch_receiver = Some(value.clone());
                candidate.implicit_receivers = 1;
                group.candidates.push(candidate);
            }
        }
        group
    }

    fn implicit_extensions(
        &self,
        receivers: &[Rc<ImplicitReceiver>],
        pool: &[(u32, Rc<CallableDescriptor>)],
        member_extensions: &[MemberExtension],
    ) -> CandidateGroup {
        let mut group = CandidateGroup::default();
        for implicit in receivers {
            let ty = self.implicit_type(implicit);
            let value = ReceiverValue {
                ty,
                source: ReceiverSource::Implicit(implicit.clone()),
            };
            for (declared_at, descriptor) in pool {
                let mut candidate = Candidate::direct(descriptor.clone(), *declared_at);
                candidate.extension_receiver = Some(value.clone());
                candidate.implicit_receivers = 1;
                group.candidates.push(candidate);
            }
            for extension in member_extensions {
                let mut candidate = Candidate::direct(extension.descriptor.clone(), extension.level);
                candidate.dispatch_receiver = Some(extension.dispatch.clone());
                candidate.extension_receiver = Some(value.clone());
                candidate.implicit_receivers = if Rc::ptr_eq(&extension.owner, implicit) { 1 } else { 2 };
                group.candidates.push(candidate);
            }
        }
        group
    }

    /// Members of `receiver`; `extensions` selects member extensions instead
    /// of plain members.
    fn members_of(
        &self,
        receiver: TypeId,
        name: Atom,
        shape: CallShape,
        extensions: bool,
    ) -> Vec<Rc<CallableDescriptor>> {
        lookup_members(self.db, self.provider, receiver, name)
            .into_iter()
            .filter(|descriptor| descriptor.is_extension() == extensions)
            .filter(|descriptor| match shape {
                CallShape::Value => descriptor.is_value(),
                CallShape::Function => !extensions || descriptor.is_callable(),
            })
            .collect()
    }

    fn imported(&self, scope: &ImportScope, name: Atom) -> Vec<Rc<CallableDescriptor>> {
        match scope {
            ImportScope::Explicit(ids) => ids
                .iter()
                .filter_map(|&id| self.provider.descriptor(id))
                .filter(|descriptor| descriptor.name == name)
                .collect(),
            ImportScope::Star(packages) => packages
                .iter()
                .flat_map(|&package| self.provider.top_level(package, name))
                .collect(),
        }
    }

    fn implicit_type(&self, implicit: &ImplicitReceiver) -> TypeId {
        self.flow
            .smart_cast_type(self.db, FlowSubject::Receiver(implicit.id), implicit.ty)
            .unwrap_or(implicit.ty)
    }

    fn invoke_candidate(
        &self,
        variable: Rc<CallableDescriptor>,
        value_ty: TypeId,
        level: u32,
    ) -> Option<Candidate> {
        let Some(TypeData::Function(function)) = self.db.lookup(value_ty) else {
            return None;
        };
        let invoke = CallableDescriptor::synthetic_invoke(variable.id, self.invoke_name, &function);
        let mut candidate = Candidate::direct(Rc::new(invoke), level);
        candidate.kind = CandidateKind::Invoke {
            variable,
            function_type: value_ty,
        };
        Some(candidate)
    }
}

/// A member extension of one implicit receiver, waiting for the implicit
/// receiver it extends.
struct MemberExtension {
    level: u32,
    dispatch: ReceiverValue,
    owner: Rc<ImplicitReceiver>,
    descriptor: Rc<CallableDescriptor>,
}

fn fits_shape(descriptor: &CallableDescriptor, shape: CallShape) -> bool {
    match shape {
        CallShape::Value => descriptor.is_value(),
        CallShape::Function => descriptor.is_callable(),
    }
}

#[cfg(test)]
#[path = "../tests/collector_tests.rs"]
mod tests;
