//! The content node graph.
//!
//! [`NodeGraph`] is an arena owning every node, change listener, and
//! observer callback. Structure is built once through [`create_object`]
//! (root objects and reference targets) and the `add_*` member builders;
//! after that, all content changes flow through the mutation methods, each
//! of which runs the full Prepare/Changing/Finalize/Changed cycle on its
//! own call stack.
//!
//! [`create_object`]: NodeGraph::create_object

use indexmap::IndexMap;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::error::{GraphError, Result};
use crate::events::{
    CallbackAnchor, CallbackEntry, CallbackId, ChangeEvent, NodeEvent, SubscriptionHandle,
};
use crate::index::Index;
use crate::listener::{ListenerId, ListenerState};
use crate::node::{
    ChangeKind, CollectionShape, ItemEntry, ItemSlot, MemberContent, NodeId, NodeKind,
    NodeObserver, NodeState, NodeVariant,
};
use crate::path::NodePath;
use crate::value::NodeValue;

/// Counters describing the current graph population.
#[derive(Clone, Copy, Debug)]
pub struct GraphStats {
    /// Live nodes of both kinds.
    pub node_count: usize,
    /// Live member nodes.
    pub member_count: usize,
    /// Live change listeners.
    pub listener_count: usize,
    /// Nodes held in listener registration sets, summed over listeners.
    pub registration_count: usize,
    /// Stored observer callbacks, direct and relay.
    pub callback_count: usize,
}

/// The arena owning nodes, listeners, and observer callbacks.
///
/// All ids handed out by a graph are only meaningful against that graph;
/// generational keys make stale ids fail lookups instead of aliasing.
pub struct NodeGraph {
    pub(crate) nodes: SlotMap<NodeId, NodeState>,
    pub(crate) listeners: SlotMap<ListenerId, ListenerState>,
    pub(crate) callbacks: SlotMap<CallbackId, CallbackEntry>,
}

impl Default for NodeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeGraph {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            listeners: SlotMap::with_key(),
            callbacks: SlotMap::with_key(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Construction
    // ─────────────────────────────────────────────────────────────────────

    /// Creates an anonymous object node carrying `value`.
    ///
    /// The value identifies the object in change events and during
    /// index-less add resolution; it is fixed for the object's lifetime.
    pub fn create_object(&mut self, value: NodeValue) -> NodeId {
        self.nodes.insert(NodeState {
            variant: NodeVariant::Object {
                value,
                members: IndexMap::new(),
            },
            parent: None,
            observers: SmallVec::new(),
        })
    }

    /// Adds a scalar-valued member to an object.
    pub fn add_member(&mut self, object: NodeId, name: &str, value: NodeValue) -> Result<NodeId> {
        self.add_member_node(object, name, MemberContent::Value(value))
    }

    /// Adds a member holding a single object reference.
    pub fn add_reference(
        &mut self,
        object: NodeId,
        name: &str,
        target: Option<NodeId>,
    ) -> Result<NodeId> {
        self.check_reference_target(target)?;
        self.add_member_node(object, name, MemberContent::Reference(target))
    }

    /// Adds a member holding an ordered collection of plain values.
    pub fn add_collection(
        &mut self,
        object: NodeId,
        name: &str,
        values: impl IntoIterator<Item = NodeValue>,
    ) -> Result<NodeId> {
        let entries = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| ItemEntry {
                index: Index::Item(i),
                slot: ItemSlot::Value(value),
            })
            .collect();
        self.add_member_node(
            object,
            name,
            MemberContent::Collection {
                shape: CollectionShape::List,
                holds_references: false,
                entries,
            },
        )
    }

    /// Adds a member holding an ordered collection of object references.
    pub fn add_reference_collection(
        &mut self,
        object: NodeId,
        name: &str,
        targets: impl IntoIterator<Item = Option<NodeId>>,
    ) -> Result<NodeId> {
        let targets: Vec<Option<NodeId>> = targets.into_iter().collect();
        for &target in &targets {
            self.check_reference_target(target)?;
        }
        let entries = targets
            .into_iter()
            .enumerate()
            .map(|(i, target)| ItemEntry {
                index: Index::Item(i),
                slot: ItemSlot::Reference(target),
            })
            .collect();
        self.add_member_node(
            object,
            name,
            MemberContent::Collection {
                shape: CollectionShape::List,
                holds_references: true,
                entries,
            },
        )
    }

    /// Adds a member holding keyed plain values.
    pub fn add_dictionary(
        &mut self,
        object: NodeId,
        name: &str,
        entries: impl IntoIterator<Item = (String, NodeValue)>,
    ) -> Result<NodeId> {
        let mut built: Vec<ItemEntry> = Vec::new();
        for (key, value) in entries {
            let index = Index::Key(key);
            if built.iter().any(|e| e.index == index) {
                return Err(GraphError::DuplicateIndex(index, object));
            }
            built.push(ItemEntry {
                index,
                slot: ItemSlot::Value(value),
            });
        }
        self.add_member_node(
            object,
            name,
            MemberContent::Collection {
                shape: CollectionShape::Dictionary,
                holds_references: false,
                entries: built,
            },
        )
    }

    /// Adds a member holding keyed object references.
    pub fn add_reference_dictionary(
        &mut self,
        object: NodeId,
        name: &str,
        entries: impl IntoIterator<Item = (String, Option<NodeId>)>,
    ) -> Result<NodeId> {
        let mut built: Vec<ItemEntry> = Vec::new();
        for (key, target) in entries {
            self.check_reference_target(target)?;
            let index = Index::Key(key);
            if built.iter().any(|e| e.index == index) {
                return Err(GraphError::DuplicateIndex(index, object));
            }
            built.push(ItemEntry {
                index,
                slot: ItemSlot::Reference(target),
            });
        }
        self.add_member_node(
            object,
            name,
            MemberContent::Collection {
                shape: CollectionShape::Dictionary,
                holds_references: true,
                entries: built,
            },
        )
    }

    fn add_member_node(
        &mut self,
        object: NodeId,
        name: &str,
        content: MemberContent,
    ) -> Result<NodeId> {
        match self.nodes.get(object) {
            None => return Err(GraphError::UnknownNode(object)),
            Some(state) => match &state.variant {
                NodeVariant::Object { members, .. } => {
                    if members.contains_key(name) {
                        return Err(GraphError::DuplicateMember(object, name.to_string()));
                    }
                }
                NodeVariant::Member { .. } => return Err(GraphError::NotAnObject(object)),
            },
        }
        let member = self.nodes.insert(NodeState {
            variant: NodeVariant::Member {
                name: name.to_string(),
                content,
            },
            parent: Some(object),
            observers: SmallVec::new(),
        });
        if let Some(NodeVariant::Object { members, .. }) =
            self.nodes.get_mut(object).map(|s| &mut s.variant)
        {
            members.insert(name.to_string(), member);
        }
        Ok(member)
    }

    fn check_reference_target(&self, target: Option<NodeId>) -> Result<()> {
        if let Some(target) = target {
            match self.nodes.get(target) {
                None => return Err(GraphError::UnknownNode(target)),
                Some(state) if state.kind() != NodeKind::Object => {
                    return Err(GraphError::NotAnObject(target))
                }
                _ => {}
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    pub(crate) fn node(&self, id: NodeId) -> Option<&NodeState> {
        self.nodes.get(id)
    }

    /// Whether `node` is a live node of this graph.
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    /// The node's kind, or `None` for an unknown id.
    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.nodes.get(node).map(|s| s.kind())
    }

    pub fn is_member(&self, node: NodeId) -> bool {
        self.kind(node) == Some(NodeKind::Member)
    }

    /// Whether the node's content points at object nodes: a single
    /// reference, or a collection holding references.
    pub fn is_reference(&self, node: NodeId) -> bool {
        match self.nodes.get(node).map(|s| &s.variant) {
            Some(NodeVariant::Member { content, .. }) => match content {
                MemberContent::Reference(_) => true,
                MemberContent::Collection {
                    holds_references, ..
                } => *holds_references,
                MemberContent::Value(_) => false,
            },
            _ => false,
        }
    }

    /// The member's name, or `None` for objects and unknown ids.
    pub fn name(&self, node: NodeId) -> Option<&str> {
        match self.nodes.get(node).map(|s| &s.variant) {
            Some(NodeVariant::Member { name, .. }) => Some(name.as_str()),
            _ => None,
        }
    }

    /// The node's resolved value.
    ///
    /// Objects report their own value. Members resolve: references to their
    /// target object's value ([`NodeValue::Null`] for null references),
    /// collections to a [`NodeValue::List`] or [`NodeValue::Map`] of their
    /// entries' resolved values.
    pub fn value(&self, node: NodeId) -> Option<NodeValue> {
        let state = self.nodes.get(node)?;
        Some(match &state.variant {
            NodeVariant::Object { value, .. } => value.clone(),
            NodeVariant::Member { content, .. } => self.resolve_content(content),
        })
    }

    /// The named member of an object.
    pub fn member(&self, object: NodeId, name: &str) -> Option<NodeId> {
        match self.nodes.get(object).map(|s| &s.variant) {
            Some(NodeVariant::Object { members, .. }) => members.get(name).copied(),
            _ => None,
        }
    }

    /// All members of an object, in declaration order.
    pub fn members(&self, object: NodeId) -> Vec<NodeId> {
        match self.nodes.get(object).map(|s| &s.variant) {
            Some(NodeVariant::Object { members, .. }) => members.values().copied().collect(),
            _ => Vec::new(),
        }
    }

    /// The owning object of a member node. Objects have no parent.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node)?.parent
    }

    /// The target of a single-reference member, if set.
    pub fn target(&self, member: NodeId) -> Option<NodeId> {
        match self.nodes.get(member).map(|s| &s.variant) {
            Some(NodeVariant::Member {
                content: MemberContent::Reference(target),
                ..
            }) => *target,
            _ => None,
        }
    }

    /// Number of entries of a collection member; 0 for anything else.
    pub fn item_count(&self, member: NodeId) -> usize {
        match self.nodes.get(member).map(|s| &s.variant) {
            Some(NodeVariant::Member {
                content: MemberContent::Collection { entries, .. },
                ..
            }) => entries.len(),
            _ => 0,
        }
    }

    /// The indices of a collection member's entries, in entry order.
    pub fn item_indices(&self, member: NodeId) -> Vec<Index> {
        match self.nodes.get(member).map(|s| &s.variant) {
            Some(NodeVariant::Member {
                content: MemberContent::Collection { entries, .. },
                ..
            }) => entries.iter().map(|e| e.index.clone()).collect(),
            _ => Vec::new(),
        }
    }

    /// The object a reference entry points at. `None` for value entries,
    /// null references, and missing indices.
    pub fn item_target(&self, member: NodeId, index: &Index) -> Option<NodeId> {
        match &self.item_entry(member, index)?.slot {
            ItemSlot::Reference(target) => *target,
            ItemSlot::Value(_) => None,
        }
    }

    /// The resolved value of a collection entry.
    pub fn item_value(&self, member: NodeId, index: &Index) -> Option<NodeValue> {
        let entry = self.item_entry(member, index)?;
        Some(self.resolve_slot_value(&entry.slot))
    }

    /// The canonical path of a node: empty for objects (they are owned by
    /// nobody), the owner's path plus a member step for members.
    pub fn path(&self, node: NodeId) -> Option<NodePath> {
        let state = self.nodes.get(node)?;
        Some(match (&state.variant, state.parent) {
            (NodeVariant::Member { name, .. }, Some(parent)) => {
                NodePath::new(parent).push_member(name)
            }
            _ => NodePath::new(node),
        })
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.nodes.len(),
            member_count: self
                .nodes
                .values()
                .filter(|s| s.kind() == NodeKind::Member)
                .count(),
            listener_count: self.listeners.len(),
            registration_count: self.listeners.values().map(|l| l.registered.len()).sum(),
            callback_count: self.callbacks.len(),
        }
    }

    fn item_entry(&self, member: NodeId, index: &Index) -> Option<&ItemEntry> {
        match self.nodes.get(member).map(|s| &s.variant) {
            Some(NodeVariant::Member {
                content: MemberContent::Collection { entries, .. },
                ..
            }) => entries.iter().find(|e| e.index == *index),
            _ => None,
        }
    }

    fn member_content(&self, node: NodeId) -> Result<&MemberContent> {
        match self.nodes.get(node) {
            None => Err(GraphError::UnknownNode(node)),
            Some(state) => match &state.variant {
                NodeVariant::Member { content, .. } => Ok(content),
                NodeVariant::Object { .. } => Err(GraphError::NotAMember(node)),
            },
        }
    }

    fn member_content_mut(&mut self, node: NodeId) -> Option<&mut MemberContent> {
        match self.nodes.get_mut(node).map(|s| &mut s.variant) {
            Some(NodeVariant::Member { content, .. }) => Some(content),
            _ => None,
        }
    }

    fn resolve_content(&self, content: &MemberContent) -> NodeValue {
        match content {
            MemberContent::Value(value) => value.clone(),
            MemberContent::Reference(target) => self.resolve_target_value(*target),
            MemberContent::Collection { shape, entries, .. } => match shape {
                CollectionShape::List => NodeValue::List(
                    entries
                        .iter()
                        .map(|e| self.resolve_slot_value(&e.slot))
                        .collect(),
                ),
                CollectionShape::Dictionary => NodeValue::Map(
                    entries
                        .iter()
                        .map(|e| {
                            let key = match &e.index {
                                Index::Key(key) => key.clone(),
                                other => other.to_string(),
                            };
                            (key, self.resolve_slot_value(&e.slot))
                        })
                        .collect(),
                ),
            },
        }
    }

    pub(crate) fn resolve_target_value(&self, target: Option<NodeId>) -> NodeValue {
        match target.and_then(|t| self.nodes.get(t)).map(|s| &s.variant) {
            Some(NodeVariant::Object { value, .. }) => value.clone(),
            _ => NodeValue::Null,
        }
    }

    pub(crate) fn resolve_slot_value(&self, slot: &ItemSlot) -> NodeValue {
        match slot {
            ItemSlot::Value(value) => value.clone(),
            ItemSlot::Reference(target) => self.resolve_target_value(*target),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Direct observers
    // ─────────────────────────────────────────────────────────────────────

    /// Subscribes `callback` to one event kind of a member node.
    ///
    /// Object nodes do not carry change events; subscribing to one fails
    /// with [`GraphError::NotAMember`] instead of silently never firing.
    pub fn observe<F>(
        &mut self,
        node: NodeId,
        event: NodeEvent,
        callback: F,
    ) -> Result<SubscriptionHandle>
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        match self.kind(node) {
            None => return Err(GraphError::UnknownNode(node)),
            Some(kind) if !kind.supports_change_events() => {
                return Err(GraphError::NotAMember(node))
            }
            _ => {}
        }
        let id = self.callbacks.insert(CallbackEntry {
            anchor: CallbackAnchor::Node { node, event },
            callback: Box::new(callback),
        });
        if let Some(state) = self.nodes.get_mut(node) {
            state.observers.push(NodeObserver::Callback(id));
        }
        Ok(SubscriptionHandle { id })
    }

    /// Releases a subscription. Returns `false` when the handle was already
    /// released; releasing twice is harmless.
    pub fn unobserve(&mut self, handle: SubscriptionHandle) -> bool {
        let Some(entry) = self.callbacks.remove(handle.id) else {
            return false;
        };
        match entry.anchor {
            CallbackAnchor::Node { node, .. } => {
                if let Some(state) = self.nodes.get_mut(node) {
                    state
                        .observers
                        .retain(|observer| *observer != NodeObserver::Callback(handle.id));
                }
            }
            CallbackAnchor::ListenerChanging(listener) => {
                if let Some(state) = self.listeners.get_mut(listener) {
                    state.changing.retain(|id| *id != handle.id);
                }
            }
            CallbackAnchor::ListenerChanged(listener) => {
                if let Some(state) = self.listeners.get_mut(listener) {
                    state.changed.retain(|id| *id != handle.id);
                }
            }
        }
        true
    }

    // ─────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────

    /// Replaces the scalar value of a member.
    pub fn set_value(&mut self, member: NodeId, value: NodeValue) -> Result<()> {
        let old = match self.member_content(member)? {
            MemberContent::Value(value) => value.clone(),
            _ => return Err(GraphError::ContentMismatch(member, "a scalar value")),
        };
        let event = self.change_event(
            member,
            ChangeKind::ValueChange,
            Index::Empty,
            old,
            value.clone(),
        );
        self.commit(event, move |graph| {
            if let Some(MemberContent::Value(slot)) = graph.member_content_mut(member) {
                *slot = value;
            }
        });
        Ok(())
    }

    /// Retargets a single-reference member. `None` clears the reference.
    pub fn set_reference(&mut self, member: NodeId, target: Option<NodeId>) -> Result<()> {
        let old = match self.member_content(member)? {
            MemberContent::Reference(current) => *current,
            _ => return Err(GraphError::ContentMismatch(member, "a single reference")),
        };
        self.check_reference_target(target)?;
        let event = self.change_event(
            member,
            ChangeKind::ValueChange,
            Index::Empty,
            self.resolve_target_value(old),
            self.resolve_target_value(target),
        );
        self.commit(event, move |graph| {
            if let Some(MemberContent::Reference(slot)) = graph.member_content_mut(member) {
                *slot = target;
            }
        });
        Ok(())
    }

    /// Replaces every entry of a list-shaped value collection. Reported as
    /// one whole-value change, not a remove/add per entry.
    pub fn set_items(
        &mut self,
        member: NodeId,
        values: impl IntoIterator<Item = NodeValue>,
    ) -> Result<()> {
        match self.member_content(member)? {
            MemberContent::Collection {
                shape: CollectionShape::List,
                holds_references: false,
                ..
            } => {}
            MemberContent::Collection {
                shape: CollectionShape::List,
                ..
            } => return Err(GraphError::ContentMismatch(member, "a collection of values")),
            MemberContent::Collection { .. } => {
                return Err(GraphError::ContentMismatch(member, "a list-shaped collection"))
            }
            _ => return Err(GraphError::ContentMismatch(member, "collection content")),
        }
        let values: Vec<NodeValue> = values.into_iter().collect();
        let old = self.value(member).unwrap_or(NodeValue::Null);
        let new = NodeValue::List(values.clone());
        let event = self.change_event(member, ChangeKind::ValueChange, Index::Empty, old, new);
        self.commit(event, move |graph| {
            if let Some(MemberContent::Collection { entries, .. }) =
                graph.member_content_mut(member)
            {
                *entries = values
                    .into_iter()
                    .enumerate()
                    .map(|(i, value)| ItemEntry {
                        index: Index::Item(i),
                        slot: ItemSlot::Value(value),
                    })
                    .collect();
            }
        });
        Ok(())
    }

    /// Replaces every entry of a list-shaped reference collection.
    pub fn set_reference_items(
        &mut self,
        member: NodeId,
        targets: impl IntoIterator<Item = Option<NodeId>>,
    ) -> Result<()> {
        match self.member_content(member)? {
            MemberContent::Collection {
                shape: CollectionShape::List,
                holds_references: true,
                ..
            } => {}
            MemberContent::Collection {
                shape: CollectionShape::List,
                ..
            } => {
                return Err(GraphError::ContentMismatch(
                    member,
                    "a collection of references",
                ))
            }
            MemberContent::Collection { .. } => {
                return Err(GraphError::ContentMismatch(member, "a list-shaped collection"))
            }
            _ => return Err(GraphError::ContentMismatch(member, "collection content")),
        }
        let targets: Vec<Option<NodeId>> = targets.into_iter().collect();
        for &target in &targets {
            self.check_reference_target(target)?;
        }
        let old = self.value(member).unwrap_or(NodeValue::Null);
        let new = NodeValue::List(
            targets
                .iter()
                .map(|&target| self.resolve_target_value(target))
                .collect(),
        );
        let event = self.change_event(member, ChangeKind::ValueChange, Index::Empty, old, new);
        self.commit(event, move |graph| {
            if let Some(MemberContent::Collection { entries, .. }) =
                graph.member_content_mut(member)
            {
                *entries = targets
                    .into_iter()
                    .enumerate()
                    .map(|(i, target)| ItemEntry {
                        index: Index::Item(i),
                        slot: ItemSlot::Reference(target),
                    })
                    .collect();
            }
        });
        Ok(())
    }

    /// Replaces the value entry at an existing index.
    pub fn set_item(&mut self, member: NodeId, index: Index, value: NodeValue) -> Result<()> {
        match self.member_content(member)? {
            MemberContent::Collection {
                holds_references: false,
                entries,
                ..
            } => {
                if !entries.iter().any(|e| e.index == index) {
                    return Err(GraphError::UnknownIndex(index, member));
                }
            }
            MemberContent::Collection { .. } => {
                return Err(GraphError::ContentMismatch(member, "a collection of values"))
            }
            _ => return Err(GraphError::ContentMismatch(member, "collection content")),
        }
        let old = self.item_value(member, &index).unwrap_or(NodeValue::Null);
        let event = self.change_event(
            member,
            ChangeKind::CollectionUpdate,
            index.clone(),
            old,
            value.clone(),
        );
        self.commit(event, move |graph| {
            if let Some(MemberContent::Collection { entries, .. }) =
                graph.member_content_mut(member)
            {
                if let Some(entry) = entries.iter_mut().find(|e| e.index == index) {
                    entry.slot = ItemSlot::Value(value);
                }
            }
        });
        Ok(())
    }

    /// Retargets the reference entry at an existing index.
    pub fn set_item_reference(
        &mut self,
        member: NodeId,
        index: Index,
        target: Option<NodeId>,
    ) -> Result<()> {
        match self.member_content(member)? {
            MemberContent::Collection {
                holds_references: true,
                entries,
                ..
            } => {
                if !entries.iter().any(|e| e.index == index) {
                    return Err(GraphError::UnknownIndex(index, member));
                }
            }
            MemberContent::Collection { .. } => {
                return Err(GraphError::ContentMismatch(
                    member,
                    "a collection of references",
                ))
            }
            _ => return Err(GraphError::ContentMismatch(member, "collection content")),
        }
        self.check_reference_target(target)?;
        let old = self
            .item_target(member, &index)
            .map(|t| self.resolve_target_value(Some(t)))
            .unwrap_or(NodeValue::Null);
        let event = self.change_event(
            member,
            ChangeKind::CollectionUpdate,
            index.clone(),
            old,
            self.resolve_target_value(target),
        );
        self.commit(event, move |graph| {
            if let Some(MemberContent::Collection { entries, .. }) =
                graph.member_content_mut(member)
            {
                if let Some(entry) = entries.iter_mut().find(|e| e.index == index) {
                    entry.slot = ItemSlot::Reference(target);
                }
            }
        });
        Ok(())
    }

    /// Inserts a value entry and returns the index it landed at.
    ///
    /// With `index: None` a list appends (a dictionary rejects with
    /// [`GraphError::IndexRequired`]); the change event then reports an
    /// empty index, since the caller did not pick the position. An explicit
    /// list index shifts later entries up.
    pub fn add_item(
        &mut self,
        member: NodeId,
        index: Option<Index>,
        value: NodeValue,
    ) -> Result<Index> {
        let (shape, len) = match self.member_content(member)? {
            MemberContent::Collection {
                holds_references: false,
                shape,
                entries,
            } => (*shape, entries.len()),
            MemberContent::Collection { .. } => {
                return Err(GraphError::ContentMismatch(member, "a collection of values"))
            }
            _ => return Err(GraphError::ContentMismatch(member, "collection content")),
        };
        let (position, actual, reported) = self.resolve_add_index(member, shape, len, index)?;
        let event = self.change_event(
            member,
            ChangeKind::CollectionAdd,
            reported,
            NodeValue::Null,
            value.clone(),
        );
        let entry_index = actual.clone();
        self.commit(event, move |graph| {
            if let Some(MemberContent::Collection { shape, entries, .. }) =
                graph.member_content_mut(member)
            {
                entries.insert(
                    position,
                    ItemEntry {
                        index: entry_index,
                        slot: ItemSlot::Value(value),
                    },
                );
                if *shape == CollectionShape::List {
                    renumber(entries);
                }
            }
        });
        Ok(actual)
    }

    /// Inserts a reference entry and returns the index it landed at.
    pub fn add_item_reference(
        &mut self,
        member: NodeId,
        index: Option<Index>,
        target: Option<NodeId>,
    ) -> Result<Index> {
        let (shape, len) = match self.member_content(member)? {
            MemberContent::Collection {
                holds_references: true,
                shape,
                entries,
            } => (*shape, entries.len()),
            MemberContent::Collection { .. } => {
                return Err(GraphError::ContentMismatch(
                    member,
                    "a collection of references",
                ))
            }
            _ => return Err(GraphError::ContentMismatch(member, "collection content")),
        };
        self.check_reference_target(target)?;
        let (position, actual, reported) = self.resolve_add_index(member, shape, len, index)?;
        let event = self.change_event(
            member,
            ChangeKind::CollectionAdd,
            reported,
            NodeValue::Null,
            self.resolve_target_value(target),
        );
        let entry_index = actual.clone();
        self.commit(event, move |graph| {
            if let Some(MemberContent::Collection { shape, entries, .. }) =
                graph.member_content_mut(member)
            {
                entries.insert(
                    position,
                    ItemEntry {
                        index: entry_index,
                        slot: ItemSlot::Reference(target),
                    },
                );
                if *shape == CollectionShape::List {
                    renumber(entries);
                }
            }
        });
        Ok(actual)
    }

    /// Removes the entry at an index. List entries after it shift down.
    pub fn remove_item(&mut self, member: NodeId, index: Index) -> Result<()> {
        let position = match self.member_content(member)? {
            MemberContent::Collection { entries, .. } => {
                match entries.iter().position(|e| e.index == index) {
                    Some(position) => position,
                    None => return Err(GraphError::UnknownIndex(index, member)),
                }
            }
            _ => return Err(GraphError::ContentMismatch(member, "collection content")),
        };
        let old = self.item_value(member, &index).unwrap_or(NodeValue::Null);
        let event = self.change_event(
            member,
            ChangeKind::CollectionRemove,
            index,
            old,
            NodeValue::Null,
        );
        self.commit(event, move |graph| {
            if let Some(MemberContent::Collection { shape, entries, .. }) =
                graph.member_content_mut(member)
            {
                entries.remove(position);
                if *shape == CollectionShape::List {
                    renumber(entries);
                }
            }
        });
        Ok(())
    }

    fn resolve_add_index(
        &self,
        member: NodeId,
        shape: CollectionShape,
        len: usize,
        index: Option<Index>,
    ) -> Result<(usize, Index, Index)> {
        // an explicit empty index means the same as no index at all
        let index = match index {
            Some(Index::Empty) => None,
            other => other,
        };
        match (shape, index) {
            (CollectionShape::List, None) => Ok((len, Index::Item(len), Index::Empty)),
            (CollectionShape::List, Some(Index::Item(i))) => {
                if i > len {
                    return Err(GraphError::UnknownIndex(Index::Item(i), member));
                }
                Ok((i, Index::Item(i), Index::Item(i)))
            }
            (CollectionShape::List, Some(other)) => Err(GraphError::IndexMismatch(other, member)),
            (CollectionShape::Dictionary, None) => Err(GraphError::IndexRequired(member)),
            (CollectionShape::Dictionary, Some(Index::Key(key))) => {
                let index = Index::Key(key);
                if self.item_entry(member, &index).is_some() {
                    return Err(GraphError::DuplicateIndex(index, member));
                }
                Ok((len, index.clone(), index))
            }
            (CollectionShape::Dictionary, Some(other)) => {
                Err(GraphError::IndexMismatch(other, member))
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Event cycle
    // ─────────────────────────────────────────────────────────────────────

    /// Runs one mutation through the full event cycle. Prepare and Changing
    /// see the pre-mutation graph, Finalize and Changed the post-mutation
    /// one, all on the caller's stack.
    fn commit(&mut self, event: ChangeEvent, apply: impl FnOnce(&mut Self)) {
        self.fire_sync(NodeEvent::Prepare, &event);
        self.emit(NodeEvent::Changing, &event);
        apply(self);
        self.fire_sync(NodeEvent::Finalize, &event);
        self.emit(NodeEvent::Changed, &event);
    }

    /// Prepare/Finalize dispatch. Listeners rewrite subscription state here,
    /// so the observer list is snapshotted before iterating.
    fn fire_sync(&mut self, phase: NodeEvent, event: &ChangeEvent) {
        let Some(state) = self.nodes.get(event.node) else {
            return;
        };
        let observers = state.observers.clone();
        for observer in observers {
            match observer {
                NodeObserver::Listener(listener) => match phase {
                    NodeEvent::Prepare => self.listener_prepare(listener, event),
                    NodeEvent::Finalize => self.listener_finalize(listener, event),
                    _ => {}
                },
                NodeObserver::Callback(id) => self.dispatch_node_callback(id, phase, event),
            }
        }
    }

    /// Changing/Changed dispatch: direct callbacks plus listener relays.
    fn emit(&self, phase: NodeEvent, event: &ChangeEvent) {
        let Some(state) = self.nodes.get(event.node) else {
            return;
        };
        for observer in &state.observers {
            match *observer {
                NodeObserver::Listener(listener) => {
                    let Some(state) = self.listeners.get(listener) else {
                        continue;
                    };
                    let relays = match phase {
                        NodeEvent::Changing => &state.changing,
                        NodeEvent::Changed => &state.changed,
                        _ => continue,
                    };
                    for &id in relays {
                        if let Some(entry) = self.callbacks.get(id) {
                            (entry.callback)(event);
                        }
                    }
                }
                NodeObserver::Callback(id) => self.dispatch_node_callback(id, phase, event),
            }
        }
    }

    fn dispatch_node_callback(&self, id: CallbackId, phase: NodeEvent, event: &ChangeEvent) {
        if let Some(entry) = self.callbacks.get(id) {
            if let CallbackAnchor::Node {
                event: anchor_event,
                ..
            } = entry.anchor
            {
                if anchor_event == phase {
                    (entry.callback)(event);
                }
            }
        }
    }

    fn change_event(
        &self,
        node: NodeId,
        kind: ChangeKind,
        index: Index,
        old_value: NodeValue,
        new_value: NodeValue,
    ) -> ChangeEvent {
        let base = self.path(node).unwrap_or_else(|| NodePath::new(node));
        let path = if index.is_empty() {
            base
        } else {
            base.push_index(index.clone())
        };
        ChangeEvent {
            node,
            kind,
            index,
            old_value,
            new_value,
            path,
        }
    }
}

fn renumber(entries: &mut [ItemEntry]) {
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.index = Index::Item(i);
    }
}
