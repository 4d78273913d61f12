//! Scope towers.
//!
//! A tower is a persistent singly-linked stack of lookup levels, nearest
//! level first. Pushing a level returns a new tower sharing every existing
//! level with the old one; dropping the new tower restores the previous
//! scope. Towers are read-only during resolution and are shared freely
//! between recursive sub-resolutions.
//!
//! `ClassTowers` derives the towers used by the different parts of a class
//! declaration (header, constructor parameters, super-call, member bodies)
//! from one shared prefix.

use crate::declarations::{CallableDescriptor, DeclId};
use kres_common::Atom;
use kres_solver::{ClassId, TypeId};
use smallvec::SmallVec;
use std::rc::Rc;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReceiverId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReceiverKind {
    /// `this` of a class body.
    Dispatch { class: ClassId },
    /// Receiver of an enclosing extension function or lambda with receiver.
    Extension,
    /// One of a declaration's context receivers.
    Context,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImplicitReceiver {
    pub id: ReceiverId,
    pub ty: TypeId,
    pub label: Option<Atom>,
    pub kind: ReceiverKind,
}

impl ImplicitReceiver {
    pub fn new(id: ReceiverId, ty: TypeId, kind: ReceiverKind) -> Self {
        ImplicitReceiver {
            id,
            ty,
            label: None,
            kind,
        }
    }

    pub fn with_label(mut self, label: Atom) -> Self {
        self.label = Some(label);
        self
    }
}

/// Declarations of a block, function body or parameter list.
#[derive(Clone, Debug, Default)]
pub struct LocalScope {
    declarations: Vec<Rc<CallableDescriptor>>,
}

impl LocalScope {
    pub fn new() -> Self {
        LocalScope::default()
    }

    pub fn with(mut self, descriptor: CallableDescriptor) -> Self {
        self.declarations.push(Rc::new(descriptor));
        self
    }

    pub fn add(&mut self, descriptor: Rc<CallableDescriptor>) {
        self.declarations.push(descriptor);
    }

    pub fn named(&self, name: Atom) -> impl Iterator<Item = &Rc<CallableDescriptor>> + '_ {
        self.declarations.iter().filter(move |d| d.name == name)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportScope {
    /// `import pkg.name` entries.
    Explicit(Vec<DeclId>),
    /// `import pkg.*` and default imports.
    Star(Vec<Atom>),
}

#[derive(Clone, Debug)]
pub enum TowerLevel {
    Local(Rc<LocalScope>),
    ImplicitReceiver(Rc<ImplicitReceiver>),
    /// Context receivers of one declaration share a priority.
    ContextReceivers(Rc<[Rc<ImplicitReceiver>]>),
    Imports(Rc<ImportScope>),
    /// Declarations reachable through a class name.
    StaticScope(ClassId),
}

impl TowerLevel {
    pub fn local(scope: LocalScope) -> Self {
        TowerLevel::Local(Rc::new(scope))
    }

    pub fn receiver(receiver: ImplicitReceiver) -> Self {
        TowerLevel::ImplicitReceiver(Rc::new(receiver))
    }

    pub fn context_receivers(receivers: Vec<ImplicitReceiver>) -> Self {
        let receivers: Vec<Rc<ImplicitReceiver>> = receivers.into_iter().map(Rc::new).collect();
        TowerLevel::ContextReceivers(Rc::from(receivers))
    }

    pub fn imports(scope: ImportScope) -> Self {
        TowerLevel::Imports(Rc::new(scope))
    }

    fn is_instance_level(&self) -> bool {
        match self {
            TowerLevel::ImplicitReceiver(receiver) => {
                matches!(receiver.kind, ReceiverKind::Dispatch { .. })
            }
            _ => false,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TowerMode {
    #[default]
    Full,
    /// Instance receivers are invisible (class headers, constructor
    /// parameter defaults, super-call arguments).
    StaticOnly,
}

/// Implicit receivers of equal priority.
pub type ReceiverGroup = SmallVec<[Rc<ImplicitReceiver>; 1]>;

#[derive(Debug)]
struct TowerNode {
    level: TowerLevel,
    parent: Option<Rc<TowerNode>>,
    depth: u32,
}

#[derive(Clone, Debug, Default)]
pub struct ScopeTower {
    head: Option<Rc<TowerNode>>,
    mode: TowerMode,
}

impl ScopeTower {
    pub fn new() -> Self {
        ScopeTower::default()
    }

    pub fn push_level(&self, level: TowerLevel) -> ScopeTower {
        let depth = self.head.as_ref().map_or(1, |node| node.depth + 1);
        ScopeTower {
            head: Some(Rc::new(TowerNode {
                level,
                parent: self.head.clone(),
                depth,
            })),
            mode: self.mode,
        }
    }

    pub fn with_mode(&self, mode: TowerMode) -> ScopeTower {
        ScopeTower {
            head: self.head.clone(),
            mode,
        }
    }

    pub fn mode(&self) -> TowerMode {
        self.mode
    }

    /// Number of levels, including inactive ones.
    pub fn depth(&self) -> u32 {
        self.head.as_ref().map_or(0, |node| node.depth)
    }

    /// The tower without its nearest level.
    pub fn parent(&self) -> ScopeTower {
        ScopeTower {
            head: self.head.as_ref().and_then(|node| node.parent.clone()),
            mode: self.mode,
        }
    }

    /// Whether both towers start at the same level node.
    pub fn shares_head_with(&self, other: &ScopeTower) -> bool {
        match (&self.head, &other.head) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Active levels nearest-first, each with its distance from the top.
    pub fn levels(&self) -> TowerLevels<'_> {
        TowerLevels {
            node: self.head.as_deref(),
            mode: self.mode,
            distance: 0,
        }
    }

    /// Implicit receivers by shadowing priority, nearest first.
    pub fn implicit_receivers(&self) -> Vec<ReceiverGroup> {
        let mut groups = Vec::new();
        for (_, level) in self.levels() {
            match level {
                TowerLevel::ImplicitReceiver(receiver) => {
                    groups.push(smallvec::smallvec![receiver.clone()]);
                }
                TowerLevel::ContextReceivers(receivers) => {
                    groups.push(receivers.iter().cloned().collect());
                }
                _ => {}
            }
        }
        groups
    }

    /// Receiver denoted by `this` or `this@label`.
    pub fn find_receiver(&self, label: Option<Atom>) -> Option<Rc<ImplicitReceiver>> {
        self.implicit_receivers()
            .into_iter()
            .flatten()
            .find(|receiver| label.is_none() || receiver.label == label)
    }

    /// Classes whose bodies enclose the position (private/protected access).
    pub fn enclosing_classes(&self) -> Vec<ClassId> {
        let mut node = self.head.as_deref();
        let mut out = Vec::new();
        while let Some(current) = node {
            let class = match &current.level {
                TowerLevel::StaticScope(class) => Some(*class),
                TowerLevel::ImplicitReceiver(receiver) => match receiver.kind {
                    ReceiverKind::Dispatch { class } => Some(class),
                    _ => None,
                },
                _ => None,
            };
            if let Some(class) = class
                && !out.contains(&class)
            {
                out.push(class);
            }
            node = current.parent.as_deref();
        }
        out
    }
}

pub struct TowerLevels<'a> {
    node: Option<&'a TowerNode>,
    mode: TowerMode,
    distance: u32,
}

impl<'a> Iterator for TowerLevels<'a> {
    type Item = (u32, &'a TowerLevel);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.node {
            self.node = node.parent.as_deref();
            let distance = self.distance;
            self.distance += 1;
            if self.mode == TowerMode::StaticOnly && node.level.is_instance_level() {
                continue;
            }
            return Some((distance, &node.level));
        }
        None
    }
}

// =============================================================================
// Class towers
// =============================================================================

pub struct ClassContext {
    pub class: ClassId,
    pub this_type: TypeId,
    pub this_receiver: ReceiverId,
    pub constructor_params: LocalScope,
}

/// Towers for the parts of one class declaration.
pub struct ClassTowers {
    /// Supertype list and annotations: static members only.
    pub header: ScopeTower,
    /// Default values of constructor parameters.
    pub constructor_params: ScopeTower,
    /// Arguments of the super-constructor call.
    pub super_call: ScopeTower,
    /// Function and property bodies.
    pub member_body: ScopeTower,
    /// Property initializers and `init` blocks, which also see constructor
    /// parameters.
    pub initializer: ScopeTower,
}

impl ClassTowers {
    pub fn build(outer: &ScopeTower, context: ClassContext) -> Self {
        let statics = outer.push_level(TowerLevel::StaticScope(context.class));
        let params = Rc::new(context.constructor_params);

        let header = statics.with_mode(TowerMode::StaticOnly);
        let constructor_params = header.push_level(TowerLevel::Local(params.clone()));
        let super_call = constructor_params.clone();

        let this = ImplicitReceiver::new(
            context.this_receiver,
            context.this_type,
            ReceiverKind::Dispatch {
                class: context.class,
            },
        );
        let member_body = statics.push_level(TowerLevel::receiver(this));
        let initializer = member_body.push_level(TowerLevel::Local(params));

        ClassTowers {
            header,
            constructor_params,
            super_call,
            member_body,
            initializer,
        }
    }
}

#[cfg(test)]
#[path = "../tests/tower_tests.rs"]
mod tests;
