//! Flow facts consumed and produced by call resolution.
//!
//! The flow subsystem owns fact propagation. Resolution reads an immutable
//! `DataFlowInfo` snapshot (narrowed types of stable subjects at the call
//! position) and emits `FlowFact`s for the snapshot at the next position.

use crate::declarations::DeclId;
use crate::expr::ExprId;
use crate::tower::ReceiverId;
use kres_solver::{TypeId, TypeInterner, intersection};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::rc::Rc;

/// Something the flow subsystem tracks: a variable or an implicit receiver.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FlowSubject {
    Variable(DeclId),
    Receiver(ReceiverId),
}

/// Snapshot of narrowing facts. Cloning shares the map.
#[derive(Clone, Debug, Default)]
pub struct DataFlowInfo {
    narrowings: Rc<FxHashMap<FlowSubject, SmallVec<[TypeId; 2]>>>,
}

impl DataFlowInfo {
    pub fn new() -> Self {
        DataFlowInfo::default()
    }

    /// New snapshot where `subject` is additionally known to be a `ty`.
    pub fn with_narrowing(&self, subject: FlowSubject, ty: TypeId) -> Self {
        let mut narrowings = (*self.narrowings).clone();
        let entry = narrowings.entry(subject).or_default();
        if !entry.contains(&ty) {
            entry.push(ty);
        }
        DataFlowInfo {
            narrowings: Rc::new(narrowings),
        }
    }

    /// New snapshot where `subject` is known non-null.
    pub fn with_non_null(&self, subject: FlowSubject) -> Self {
        self.with_narrowing(subject, TypeId::ANY)
    }

    pub fn narrowed_types(&self, subject: FlowSubject) -> &[TypeId] {
        self.narrowings
            .get(&subject)
            .map_or(&[], |types| types.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.narrowings.is_empty()
    }

    /// `declared` intersected with every narrowing of `subject`, or `None`
    /// when the snapshot narrows nothing.
    pub fn smart_cast_type(
        &self,
        db: &TypeInterner,
        subject: FlowSubject,
        declared: TypeId,
    ) -> Option<TypeId> {
        let narrowed = self.narrowed_types(subject);
        if narrowed.is_empty() {
            return None;
        }
        let mut members = Vec::with_capacity(narrowed.len() + 1);
        members.push(declared);
        members.extend_from_slice(narrowed);
        let ty = intersection(db, &members);
        (ty != declared).then_some(ty)
    }
}

/// Fact emitted by a successful resolution.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FlowFact {
    /// `subject!!` completed: the subject is non-null afterwards.
    NonNull { subject: FlowSubject },
    /// `subject?.call()`: when the call's result is non-null, so is the subject.
    NonNullWhenResultNonNull { subject: FlowSubject, call: ExprId },
}
