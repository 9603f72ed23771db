//! Content nodes: identifiers, classification, and internal state.
//!
//! Nodes come in two kinds. *Object* nodes are anonymous carriers of a value
//! and a set of named members; they stand for the instances of the model.
//! *Member* nodes hang off an object under a name and hold the actual
//! content: a scalar value, a single object reference, or collection or
//! dictionary entries. Only member nodes take part in the change-event
//! contract, so everything observable hangs off members.

use std::fmt;

use indexmap::IndexMap;
use slotmap::new_key_type;
use smallvec::SmallVec;

use crate::events::CallbackId;
use crate::index::Index;
use crate::listener::ListenerId;
use crate::value::NodeValue;

new_key_type! {
    /// Unique identifier for a content node.
    pub struct NodeId;
}

/// Structural classification of a content node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// A named member of an object node.
    Member,
    /// An anonymous object node: a graph root or a reference target.
    Object,
}

impl NodeKind {
    /// Whether nodes of this kind carry the change-event contract.
    ///
    /// Object nodes never do; registering an observer on one is an error
    /// rather than a silent no-op.
    pub fn supports_change_events(self) -> bool {
        matches!(self, NodeKind::Member)
    }
}

/// Classification of a single mutation, as reported in change events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    /// The member's whole content was replaced.
    ValueChange,
    /// An existing collection entry was replaced in place.
    CollectionUpdate,
    /// An entry was inserted into a collection.
    CollectionAdd,
    /// An entry was removed from a collection.
    CollectionRemove,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeKind::ValueChange => "value-change",
            ChangeKind::CollectionUpdate => "collection-update",
            ChangeKind::CollectionAdd => "collection-add",
            ChangeKind::CollectionRemove => "collection-remove",
        };
        write!(f, "{}", name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal node state
// ─────────────────────────────────────────────────────────────────────────────

/// The shape of a collection member's entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CollectionShape {
    List,
    Dictionary,
}

/// One slot of collection content: either a plain value or a reference.
#[derive(Clone, Debug)]
pub(crate) enum ItemSlot {
    Value(NodeValue),
    Reference(Option<NodeId>),
}

/// One entry of collection content, addressed by its index.
#[derive(Clone, Debug)]
pub(crate) struct ItemEntry {
    pub index: Index,
    pub slot: ItemSlot,
}

/// What a member node holds.
#[derive(Clone, Debug)]
pub(crate) enum MemberContent {
    /// A scalar value.
    Value(NodeValue),
    /// A single reference to an object node. `None` is a null reference.
    Reference(Option<NodeId>),
    /// Collection or dictionary entries. `holds_references` is fixed at
    /// construction: a collection holds either values or references, never
    /// a mix.
    Collection {
        shape: CollectionShape,
        holds_references: bool,
        entries: Vec<ItemEntry>,
    },
}

/// The two node flavors, with their kind-specific payload.
#[derive(Clone, Debug)]
pub(crate) enum NodeVariant {
    Object {
        value: NodeValue,
        /// Members in declaration order, looked up by name.
        members: IndexMap<String, NodeId>,
    },
    Member {
        name: String,
        content: MemberContent,
    },
}

/// An observer wired to one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NodeObserver {
    /// A change listener holding this node in its registration set.
    Listener(ListenerId),
    /// A direct callback subscription.
    Callback(CallbackId),
}

/// Arena slot for one node.
#[derive(Debug)]
pub(crate) struct NodeState {
    pub variant: NodeVariant,
    /// Owning object for member nodes. Objects have no parent; being the
    /// target of a reference does not confer ownership.
    pub parent: Option<NodeId>,
    /// Observers in subscription order. Two covers the common case of one
    /// listener plus one direct callback without spilling to the heap.
    pub observers: SmallVec<[NodeObserver; 2]>,
}

impl NodeState {
    pub fn kind(&self) -> NodeKind {
        match self.variant {
            NodeVariant::Object { .. } => NodeKind::Object,
            NodeVariant::Member { .. } => NodeKind::Member,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_members_support_change_events() {
        assert!(NodeKind::Member.supports_change_events());
        assert!(!NodeKind::Object.supports_change_events());
    }

    #[test]
    fn test_change_kind_display() {
        assert_eq!(ChangeKind::ValueChange.to_string(), "value-change");
        assert_eq!(ChangeKind::CollectionRemove.to_string(), "collection-remove");
    }
}
