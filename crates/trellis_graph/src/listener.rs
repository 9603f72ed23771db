//! Change listeners: subscription sets that track reachability.
//!
//! A [`ChangeListener`] is bound to one root node for its lifetime. At
//! creation it registers every member node reachable from that root; from
//! then on, every mutation of a registered node re-syncs the affected part
//! of the set during the mutation's Prepare and Finalize phases. Outside an
//! in-flight mutation the set therefore equals exactly the member nodes
//! reachable from the root under the listener's filter.
//!
//! Changing and Changed events of every registered node are relayed
//! verbatim through the listener, so one subscription pair observes a whole
//! object graph. Relay callbacks receive only the [`ChangeEvent`]; without
//! a graph handle a handler cannot start a nested mutation, which keeps the
//! re-sync single-threaded through each cycle.

use rustc_hash::FxHashSet;
use slotmap::new_key_type;
use smallvec::SmallVec;

use crate::error::{GraphError, Result};
use crate::events::{CallbackAnchor, CallbackEntry, CallbackId, ChangeEvent, SubscriptionHandle};
use crate::graph::NodeGraph;
use crate::index::Index;
use crate::node::{ChangeKind, ItemSlot, MemberContent, NodeId, NodeObserver, NodeVariant};
use crate::path::NodePath;
use crate::value::NodeValue;
use crate::visitor::GraphVisitor;

new_key_type! {
    /// Unique identifier for a change listener.
    pub struct ListenerId;
}

/// Registration filter: decides whether a node reached through an owning
/// member joins the listener's registration set. Rejecting a node prunes
/// its whole subtree.
pub type RegistrationFilter = Box<dyn Fn(&NodeGraph, Option<NodeId>, NodeId) -> bool>;

/// Handle to a change listener created by
/// [`NodeGraph::create_listener`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangeListener {
    pub(crate) id: ListenerId,
}

impl ChangeListener {
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

/// Arena slot for one listener.
pub(crate) struct ListenerState {
    pub root: NodeId,
    pub filter: Option<RegistrationFilter>,
    /// Member nodes currently subscribed. Object nodes are walked for
    /// reachability but never registered; they carry no change events.
    pub registered: FxHashSet<NodeId>,
    pub changing: SmallVec<[CallbackId; 2]>,
    pub changed: SmallVec<[CallbackId; 2]>,
}

impl NodeGraph {
    /// Creates a listener over everything reachable from `root`.
    pub fn create_listener(&mut self, root: NodeId) -> Result<ChangeListener> {
        self.new_listener(root, None)
    }

    /// Creates a listener whose registration set is limited by `filter`.
    ///
    /// The filter sees the owning member and the candidate node, mirroring
    /// [`GraphVisitor::should_visit`]; it is consulted during the initial
    /// walk and during every re-sync, including for the target of a
    /// collection add.
    pub fn create_listener_with<F>(&mut self, root: NodeId, filter: F) -> Result<ChangeListener>
    where
        F: Fn(&NodeGraph, Option<NodeId>, NodeId) -> bool + 'static,
    {
        self.new_listener(root, Some(Box::new(filter)))
    }

    fn new_listener(
        &mut self,
        root: NodeId,
        filter: Option<RegistrationFilter>,
    ) -> Result<ChangeListener> {
        if !self.contains(root) {
            return Err(GraphError::UnknownNode(root));
        }
        let id = self.listeners.insert(ListenerState {
            root,
            filter,
            registered: FxHashSet::default(),
            changing: SmallVec::new(),
            changed: SmallVec::new(),
        });
        for node in self.reachable_for(id, root, None, false, None) {
            self.register_node(id, node);
        }
        let listener = ChangeListener { id };
        tracing::debug!(
            "created change listener {:?} over {:?}: {} nodes registered",
            id,
            root,
            self.registered_count(listener)
        );
        Ok(listener)
    }

    /// Subscribes to the Changing relay: one callback for the pre-mutation
    /// event of every registered node.
    pub fn on_changing<F>(&mut self, listener: ChangeListener, callback: F) -> Result<SubscriptionHandle>
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        if !self.listeners.contains_key(listener.id) {
            return Err(GraphError::ListenerDisposed);
        }
        let id = self.callbacks.insert(CallbackEntry {
            anchor: CallbackAnchor::ListenerChanging(listener.id),
            callback: Box::new(callback),
        });
        if let Some(state) = self.listeners.get_mut(listener.id) {
            state.changing.push(id);
        }
        Ok(SubscriptionHandle { id })
    }

    /// Subscribes to the Changed relay: one callback for the post-mutation
    /// event of every registered node.
    pub fn on_changed<F>(&mut self, listener: ChangeListener, callback: F) -> Result<SubscriptionHandle>
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        if !self.listeners.contains_key(listener.id) {
            return Err(GraphError::ListenerDisposed);
        }
        let id = self.callbacks.insert(CallbackEntry {
            anchor: CallbackAnchor::ListenerChanged(listener.id),
            callback: Box::new(callback),
        });
        if let Some(state) = self.listeners.get_mut(listener.id) {
            state.changed.push(id);
        }
        Ok(SubscriptionHandle { id })
    }

    /// Unsubscribes the listener from every registered node and drops its
    /// relay callbacks. Disposing twice is a lifecycle bug and fails with
    /// [`GraphError::ListenerDisposed`].
    pub fn dispose_listener(&mut self, listener: ChangeListener) -> Result<()> {
        let Some(state) = self.listeners.remove(listener.id) else {
            return Err(GraphError::ListenerDisposed);
        };
        for &node in &state.registered {
            if let Some(n) = self.nodes.get_mut(node) {
                n.observers
                    .retain(|observer| *observer != NodeObserver::Listener(listener.id));
            }
        }
        for &id in state.changing.iter().chain(state.changed.iter()) {
            self.callbacks.remove(id);
        }
        tracing::debug!(
            "disposed change listener {:?}: released {} registrations",
            listener.id,
            state.registered.len()
        );
        Ok(())
    }

    /// Whether `node` is currently in the listener's registration set.
    pub fn is_registered(&self, listener: ChangeListener, node: NodeId) -> bool {
        self.listeners
            .get(listener.id)
            .map_or(false, |l| l.registered.contains(&node))
    }

    pub fn registered_count(&self, listener: ChangeListener) -> usize {
        self.listeners.get(listener.id).map_or(0, |l| l.registered.len())
    }

    /// The registration set as a snapshot, in no particular order.
    pub fn registered_nodes(&self, listener: ChangeListener) -> Vec<NodeId> {
        self.listeners
            .get(listener.id)
            .map_or_else(Vec::new, |l| l.registered.iter().copied().collect())
    }

    /// The root the listener was created over.
    pub fn listener_root(&self, listener: ChangeListener) -> Option<NodeId> {
        self.listeners.get(listener.id).map(|l| l.root)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Re-sync during the mutation cycle
    // ─────────────────────────────────────────────────────────────────────

    /// Prepare phase: tear down registrations the mutation will orphan. The
    /// graph still shows the pre-mutation structure here.
    pub(crate) fn listener_prepare(&mut self, listener: ListenerId, event: &ChangeEvent) {
        match event.kind {
            ChangeKind::ValueChange | ChangeKind::CollectionUpdate => {
                // the changed node keeps its own registration; everything
                // below it is rebuilt against the new content at Finalize
                // TODO: narrow collection-update re-syncs to the entry at
                // the reported index
                for node in self.reachable_for(listener, event.node, None, true, None) {
                    self.unregister_node(listener, node);
                }
            }
            ChangeKind::CollectionRemove => {
                if !self.is_reference(event.node) {
                    return;
                }
                // slot presence decides the teardown, not the resolved
                // value: a real target may legitimately carry Null
                match self.item_target(event.node, &event.index) {
                    Some(removed) => {
                        for node in
                            self.reachable_for(listener, removed, Some(event.node), false, None)
                        {
                            self.unregister_node(listener, node);
                        }
                    }
                    None if self.item_value(event.node, &event.index).is_none() => {
                        tracing::warn!(
                            "collection remove at {} on {:?} does not resolve to an entry; subscriptions unchanged",
                            event.index,
                            event.node
                        )
                    }
                    // a slot without a target tears nothing down
                    None => {}
                }
            }
            ChangeKind::CollectionAdd => {}
        }
    }

    /// Finalize phase: register what the applied mutation made reachable.
    pub(crate) fn listener_finalize(&mut self, listener: ListenerId, event: &ChangeEvent) {
        match event.kind {
            ChangeKind::ValueChange | ChangeKind::CollectionUpdate => {
                for node in self.reachable_for(listener, event.node, None, true, None) {
                    self.register_node(listener, node);
                }
            }
            ChangeKind::CollectionAdd => {
                if !self.is_reference(event.node) {
                    return;
                }
                let added = if event.index.is_empty() {
                    // no index reported: locate the entry by value; with
                    // duplicate values the first match wins
                    self.find_item_by_value(event.node, &event.new_value)
                } else {
                    self.item_target(event.node, &event.index)
                        .map(|target| (event.index.clone(), target))
                };
                match added {
                    Some((index, target)) => {
                        // the walk is seeded at the collection's path plus
                        // the landed index, so its reported paths read C[1]
                        // instead of restarting at the target
                        let seed = self
                            .path(event.node)
                            .unwrap_or_else(|| NodePath::new(event.node))
                            .push_index(index);
                        for node in self.reachable_for(
                            listener,
                            target,
                            Some(event.node),
                            false,
                            Some(seed),
                        ) {
                            self.register_node(listener, node);
                        }
                    }
                    None if !event.index.is_empty()
                        && self.item_value(event.node, &event.index).is_none() =>
                    {
                        tracing::warn!(
                            "collection add at {} on {:?} does not resolve to an entry; subscriptions unchanged",
                            event.index,
                            event.node
                        )
                    }
                    // a null reference landed; nothing to register
                    None => {}
                }
            }
            ChangeKind::CollectionRemove => {}
        }
    }

    /// Member nodes a re-sync rooted at `root` covers, honoring the
    /// listener's filter. `skip_root` leaves the root itself out, keeping
    /// its own registration untouched. `seed` roots the walk's reported
    /// paths at an existing location in the tree.
    fn reachable_for(
        &self,
        listener: ListenerId,
        root: NodeId,
        owner: Option<NodeId>,
        skip_root: bool,
        seed: Option<NodePath>,
    ) -> Vec<NodeId> {
        struct Collect<'g> {
            filter: Option<&'g dyn Fn(&NodeGraph, Option<NodeId>, NodeId) -> bool>,
            suppress_root: bool,
            out: Vec<NodeId>,
        }
        impl GraphVisitor for Collect<'_> {
            fn visiting(&mut self, _graph: &NodeGraph, node: NodeId, _path: &NodePath) {
                self.out.push(node);
            }
            fn should_visit(
                &self,
                graph: &NodeGraph,
                owner: Option<NodeId>,
                candidate: NodeId,
            ) -> bool {
                self.filter.map_or(true, |f| f(graph, owner, candidate))
            }
            fn skip_root(&self) -> bool {
                self.suppress_root
            }
        }

        let filter = self.listeners.get(listener).and_then(|l| l.filter.as_deref());
        let mut collect = Collect {
            filter,
            suppress_root: skip_root,
            out: Vec::new(),
        };
        self.visit_with(root, owner, seed, &mut collect);
        collect.out
    }

    fn register_node(&mut self, listener: ListenerId, node: NodeId) -> bool {
        if !self.is_member(node) {
            return false;
        }
        let Some(state) = self.listeners.get_mut(listener) else {
            return false;
        };
        if !state.registered.insert(node) {
            // reached through a second path; the existing subscription holds
            return false;
        }
        if let Some(n) = self.nodes.get_mut(node) {
            n.observers.push(NodeObserver::Listener(listener));
        }
        tracing::trace!("listener {:?} registered node {:?}", listener, node);
        true
    }

    fn unregister_node(&mut self, listener: ListenerId, node: NodeId) -> bool {
        let Some(state) = self.listeners.get_mut(listener) else {
            return false;
        };
        if !state.registered.remove(&node) {
            return false;
        }
        if let Some(n) = self.nodes.get_mut(node) {
            n.observers
                .retain(|observer| *observer != NodeObserver::Listener(listener));
        }
        tracing::trace!("listener {:?} unregistered node {:?}", listener, node);
        true
    }

    /// First collection entry whose target resolves to `value`, as the
    /// entry's index and target.
    fn find_item_by_value(&self, member: NodeId, value: &NodeValue) -> Option<(Index, NodeId)> {
        let state = self.node(member)?;
        let NodeVariant::Member {
            content: MemberContent::Collection { entries, .. },
            ..
        } = &state.variant
        else {
            return None;
        };
        entries.iter().find_map(|entry| match &entry.slot {
            ItemSlot::Reference(Some(target))
                if self.resolve_target_value(Some(*target)) == *value =>
            {
                Some((entry.index.clone(), *target))
            }
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// root { hp: 10, M -> A { x: 1 }, C: refs [B0 { b0: 2 }, B1 { b1: 3 }] }
    struct Rig {
        graph: NodeGraph,
        root: NodeId,
        hp: NodeId,
        m: NodeId,
        a: NodeId,
        ax: NodeId,
        c: NodeId,
        b0: NodeId,
        b0m: NodeId,
        b1: NodeId,
        b1m: NodeId,
    }

    fn rig() -> Rig {
        let mut graph = NodeGraph::new();
        let root = graph.create_object(NodeValue::Str("ship".into()));
        let hp = graph.add_member(root, "hp", NodeValue::Int(10)).unwrap();
        let a = graph.create_object(NodeValue::Str("a".into()));
        let ax = graph.add_member(a, "x", NodeValue::Int(1)).unwrap();
        let m = graph.add_reference(root, "M", Some(a)).unwrap();
        let b0 = graph.create_object(NodeValue::Str("b0".into()));
        let b0m = graph.add_member(b0, "b0", NodeValue::Int(2)).unwrap();
        let b1 = graph.create_object(NodeValue::Str("b1".into()));
        let b1m = graph.add_member(b1, "b1", NodeValue::Int(3)).unwrap();
        let c = graph
            .add_reference_collection(root, "C", [Some(b0), Some(b1)])
            .unwrap();
        Rig { graph, root, hp, m, a, ax, c, b0, b0m, b1, b1m }
    }

    fn log_sink() -> (Rc<RefCell<Vec<String>>>, Rc<RefCell<Vec<String>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        (log.clone(), log)
    }

    #[test]
    fn test_creation_registers_reachable_members_only() {
        let mut r = rig();
        let listener = r.graph.create_listener(r.root).unwrap();

        for node in [r.hp, r.m, r.ax, r.c, r.b0m, r.b1m] {
            assert!(r.graph.is_registered(listener, node));
        }
        // object nodes are walked but never registered
        for node in [r.root, r.a, r.b0, r.b1] {
            assert!(!r.graph.is_registered(listener, node));
        }
        assert_eq!(r.graph.registered_count(listener), 6);
        assert_eq!(r.graph.listener_root(listener), Some(r.root));
    }

    #[test]
    fn test_listener_requires_live_root() {
        let mut graph = NodeGraph::new();
        assert!(matches!(
            graph.create_listener(NodeId::default()),
            Err(GraphError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_node_reachable_twice_registers_once_and_relays_once() {
        let mut graph = NodeGraph::new();
        let root = graph.create_object(NodeValue::Str("root".into()));
        let shared = graph.create_object(NodeValue::Str("shared".into()));
        let sx = graph.add_member(shared, "x", NodeValue::Int(1)).unwrap();
        graph.add_reference(root, "first", Some(shared)).unwrap();
        graph.add_reference(root, "second", Some(shared)).unwrap();

        let listener = graph.create_listener(root).unwrap();
        // first, second, and the shared x, subscribed exactly once
        assert_eq!(graph.registered_count(listener), 3);

        let (log, sink) = log_sink();
        graph
            .on_changed(listener, move |e| sink.borrow_mut().push(e.path.to_string()))
            .unwrap();
        graph.set_value(sx, NodeValue::Int(2)).unwrap();
        assert_eq!(*log.borrow(), vec!["x"]);
    }

    #[test]
    fn test_relays_fire_around_mutation_of_deep_member() {
        let mut r = rig();
        let listener = r.graph.create_listener(r.root).unwrap();

        let (log, sink) = log_sink();
        let changing = sink.clone();
        r.graph
            .on_changing(listener, move |e| {
                changing.borrow_mut().push(format!("changing {}", e.path))
            })
            .unwrap();
        r.graph
            .on_changed(listener, move |e| {
                sink.borrow_mut()
                    .push(format!("changed {} {:?}->{:?}", e.path, e.old_value, e.new_value))
            })
            .unwrap();

        // ax lives two reference hops below the listener root
        r.graph.set_value(r.ax, NodeValue::Int(5)).unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["changing x", "changed x Int(1)->Int(5)"]
        );
    }

    #[test]
    fn test_reference_retarget_swaps_registered_subtree() {
        let mut r = rig();
        let listener = r.graph.create_listener(r.root).unwrap();
        let d = r.graph.create_object(NodeValue::Str("d".into()));
        let dm = r.graph.add_member(d, "y", NodeValue::Int(9)).unwrap();

        let (log, sink) = log_sink();
        r.graph
            .on_changed(listener, move |e| sink.borrow_mut().push(e.path.to_string()))
            .unwrap();

        r.graph.set_reference(r.m, Some(d)).unwrap();

        // the retargeted member keeps its subscription, its old subtree is
        // dropped and the new one picked up
        assert!(r.graph.is_registered(listener, r.m));
        assert!(!r.graph.is_registered(listener, r.ax));
        assert!(r.graph.is_registered(listener, dm));

        r.graph.set_value(dm, NodeValue::Int(10)).unwrap();
        r.graph.set_value(r.ax, NodeValue::Int(99)).unwrap(); // no longer relayed
        assert_eq!(*log.borrow(), vec!["M", "y"]);
    }

    #[test]
    fn test_collection_remove_unregisters_removed_subtree() {
        let mut r = rig();
        let listener = r.graph.create_listener(r.root).unwrap();

        r.graph.remove_item(r.c, Index::Item(0)).unwrap();

        assert!(!r.graph.is_registered(listener, r.b0m));
        // the surviving entry shifted to index 0 but kept its registration,
        // and the collection node itself stays subscribed
        assert!(r.graph.is_registered(listener, r.b1m));
        assert!(r.graph.is_registered(listener, r.c));
        assert_eq!(r.graph.item_target(r.c, &Index::Item(0)), Some(r.b1));

        let (log, sink) = log_sink();
        r.graph
            .on_changed(listener, move |e| sink.borrow_mut().push(e.path.to_string()))
            .unwrap();
        r.graph.set_value(r.b0m, NodeValue::Int(77)).unwrap(); // orphaned
        r.graph.set_value(r.b1m, NodeValue::Int(42)).unwrap();
        assert_eq!(*log.borrow(), vec!["b1"]);
    }

    #[test]
    fn test_collection_add_with_explicit_index_registers_target() {
        let mut r = rig();
        let listener = r.graph.create_listener(r.root).unwrap();
        let d = r.graph.create_object(NodeValue::Str("d".into()));
        let dm = r.graph.add_member(d, "y", NodeValue::Int(9)).unwrap();

        let (log, sink) = log_sink();
        r.graph
            .on_changed(listener, move |e| {
                sink.borrow_mut().push(format!("{} at {}", e.path, e.index))
            })
            .unwrap();

        r.graph
            .add_item_reference(r.c, Some(Index::Item(1)), Some(d))
            .unwrap();
        assert!(r.graph.is_registered(listener, dm));
        assert_eq!(*log.borrow(), vec!["C[1] at 1"]);

        // the new subtree is live immediately
        r.graph.set_value(dm, NodeValue::Int(10)).unwrap();
        assert!(r.graph.is_registered(listener, dm));
    }

    #[test]
    fn test_collection_append_resolves_added_entry_by_value() {
        let mut r = rig();
        let listener = r.graph.create_listener(r.root).unwrap();
        let d = r.graph.create_object(NodeValue::Str("d".into()));
        let dm = r.graph.add_member(d, "y", NodeValue::Int(9)).unwrap();

        let landed = r.graph.add_item_reference(r.c, None, Some(d)).unwrap();
        assert_eq!(landed, Index::Item(2));
        // the event reported no index; the listener located the entry by
        // value and registered its subtree anyway
        assert!(r.graph.is_registered(listener, dm));
    }

    #[test]
    fn test_append_with_duplicate_value_registers_first_match() {
        let mut r = rig();
        let listener = r.graph.create_listener(r.root).unwrap();
        // same value as b0's object, different node
        let twin = r.graph.create_object(NodeValue::Str("b0".into()));
        let twin_m = r.graph.add_member(twin, "t", NodeValue::Int(4)).unwrap();

        r.graph.add_item_reference(r.c, None, Some(twin)).unwrap();

        // the value scan stops at the first entry carrying that value, so
        // the twin's subtree stays unregistered
        assert!(r.graph.is_registered(listener, r.b0m));
        assert!(!r.graph.is_registered(listener, twin_m));
    }

    #[test]
    fn test_add_of_null_valued_target_registers_subtree() {
        let mut r = rig();
        let listener = r.graph.create_listener(r.root).unwrap();
        let t = r.graph.create_object(NodeValue::Null);
        let tm = r.graph.add_member(t, "tm", NodeValue::Int(1)).unwrap();

        r.graph
            .add_item_reference(r.c, Some(Index::Item(2)), Some(t))
            .unwrap();

        // the target resolves to Null but the slot holds a real node
        assert!(r.graph.is_registered(listener, tm));
    }

    #[test]
    fn test_append_locates_null_valued_target_by_value() {
        let mut r = rig();
        let listener = r.graph.create_listener(r.root).unwrap();
        let t = r.graph.create_object(NodeValue::Null);
        let tm = r.graph.add_member(t, "tm", NodeValue::Int(1)).unwrap();

        let landed = r.graph.add_item_reference(r.c, None, Some(t)).unwrap();
        assert_eq!(landed, Index::Item(2));

        // the scan needle is Null here; only slots holding a target can
        // match, so the entry is still found
        assert!(r.graph.is_registered(listener, tm));
    }

    #[test]
    fn test_remove_of_null_valued_target_unregisters_subtree() {
        let mut r = rig();
        let t = r.graph.create_object(NodeValue::Null);
        let tm = r.graph.add_member(t, "tm", NodeValue::Int(1)).unwrap();
        r.graph
            .add_item_reference(r.c, Some(Index::Item(2)), Some(t))
            .unwrap();
        let listener = r.graph.create_listener(r.root).unwrap();
        assert!(r.graph.is_registered(listener, tm));

        let (log, sink) = log_sink();
        r.graph
            .on_changed(listener, move |e| sink.borrow_mut().push(e.path.to_string()))
            .unwrap();
        r.graph.remove_item(r.c, Index::Item(2)).unwrap();

        // the removed target's subtree leaves the set and stops relaying
        assert!(!r.graph.is_registered(listener, tm));
        r.graph.set_value(tm, NodeValue::Int(9)).unwrap();
        assert_eq!(*log.borrow(), vec!["C[2]"]);
    }

    #[test]
    fn test_whole_collection_replacement_resyncs_entries() {
        let mut r = rig();
        let listener = r.graph.create_listener(r.root).unwrap();
        let d = r.graph.create_object(NodeValue::Str("d".into()));
        let dm = r.graph.add_member(d, "y", NodeValue::Int(9)).unwrap();

        r.graph.set_reference_items(r.c, [Some(d)]).unwrap();

        assert!(r.graph.is_registered(listener, r.c));
        assert!(r.graph.is_registered(listener, dm));
        assert!(!r.graph.is_registered(listener, r.b0m));
        assert!(!r.graph.is_registered(listener, r.b1m));
    }

    #[test]
    fn test_filter_prunes_subtree_from_registration() {
        let mut r = rig();
        // refuse to cross the M reference
        let m = r.m;
        let listener = r
            .graph
            .create_listener_with(r.root, move |_, owner, _| owner != Some(m))
            .unwrap();

        assert!(!r.graph.is_registered(listener, r.ax));
        assert!(r.graph.is_registered(listener, r.hp));
        assert!(r.graph.is_registered(listener, r.c));
        // M itself was pruned too: the filter rejected it as a member child
        assert!(!r.graph.is_registered(listener, r.m));
    }

    #[test]
    fn test_filter_applies_to_added_collection_targets() {
        let mut r = rig();
        let banned = r.graph.create_object(NodeValue::Str("banned".into()));
        let banned_m = r.graph.add_member(banned, "z", NodeValue::Int(0)).unwrap();
        let listener = r
            .graph
            .create_listener_with(r.root, move |_, _, candidate| candidate != banned)
            .unwrap();

        r.graph
            .add_item_reference(r.c, Some(Index::Item(2)), Some(banned))
            .unwrap();

        // the filter rejected the added target, so its subtree never joins
        assert!(!r.graph.is_registered(listener, banned_m));
        assert!(r.graph.is_registered(listener, r.b0m));
    }

    #[test]
    fn test_dispose_releases_registrations_and_relays() {
        let mut r = rig();
        let listener = r.graph.create_listener(r.root).unwrap();
        let (log, sink) = log_sink();
        r.graph
            .on_changed(listener, move |e| sink.borrow_mut().push(e.path.to_string()))
            .unwrap();

        r.graph.dispose_listener(listener).unwrap();

        assert_eq!(r.graph.registered_count(listener), 0);
        assert!(!r.graph.is_registered(listener, r.hp));
        r.graph.set_value(r.hp, NodeValue::Int(1)).unwrap();
        assert!(log.borrow().is_empty());

        // the callback store is drained along with the listener
        assert_eq!(r.graph.stats().callback_count, 0);

        assert!(matches!(
            r.graph.dispose_listener(listener),
            Err(GraphError::ListenerDisposed)
        ));
        assert!(matches!(
            r.graph.on_changed(listener, |_| {}),
            Err(GraphError::ListenerDisposed)
        ));
    }

    #[test]
    fn test_multiple_listeners_are_independent() {
        let mut r = rig();
        let first = r.graph.create_listener(r.root).unwrap();
        let second = r.graph.create_listener(r.a).unwrap();

        let (log, sink) = log_sink();
        let first_sink = sink.clone();
        r.graph
            .on_changed(first, move |e| {
                first_sink.borrow_mut().push(format!("first {}", e.path))
            })
            .unwrap();
        r.graph
            .on_changed(second, move |e| {
                sink.borrow_mut().push(format!("second {}", e.path))
            })
            .unwrap();

        r.graph.set_value(r.ax, NodeValue::Int(2)).unwrap();
        assert_eq!(*log.borrow(), vec!["first x", "second x"]);

        r.graph.dispose_listener(first).unwrap();
        r.graph.set_value(r.ax, NodeValue::Int(3)).unwrap();
        assert_eq!(log.borrow().last().map(String::as_str), Some("second x"));
        assert!(r.graph.is_registered(second, r.ax));
    }

    #[test]
    fn test_unobserve_detaches_relay_but_keeps_listener() {
        let mut r = rig();
        let listener = r.graph.create_listener(r.root).unwrap();
        let (log, sink) = log_sink();
        let handle = r
            .graph
            .on_changed(listener, move |e| sink.borrow_mut().push(e.path.to_string()))
            .unwrap();

        r.graph.set_value(r.hp, NodeValue::Int(1)).unwrap();
        assert!(r.graph.unobserve(handle));
        r.graph.set_value(r.hp, NodeValue::Int(2)).unwrap();

        assert_eq!(log.borrow().len(), 1);
        assert!(r.graph.is_registered(listener, r.hp));
    }

    #[test]
    fn test_scalar_value_change_keeps_registration_stable() {
        let mut r = rig();
        let listener = r.graph.create_listener(r.root).unwrap();
        let before = r.graph.registered_count(listener);

        r.graph.set_value(r.hp, NodeValue::Int(99)).unwrap();

        assert_eq!(r.graph.registered_count(listener), before);
        assert!(r.graph.is_registered(listener, r.hp));
    }

    #[test]
    fn test_null_reference_add_leaves_set_unchanged() {
        let mut r = rig();
        let listener = r.graph.create_listener(r.root).unwrap();
        let before = r.graph.registered_count(listener);

        r.graph.add_item_reference(r.c, None, None).unwrap();
        r.graph.remove_item(r.c, Index::Item(2)).unwrap();

        assert_eq!(r.graph.registered_count(listener), before);
    }
}
