//! Depth-first traversal over reachable nodes.
//!
//! A visit starts at a root node and follows three edge kinds: object to
//! member, reference member to target object, and reference entry to target
//! object. [`GraphVisitor::visiting`] fires once per node, pre-order, with
//! the path the node was first reached through. A per-call seen set keeps
//! cyclic reference structures from looping; separate calls share nothing.

use rustc_hash::FxHashSet;

use crate::graph::NodeGraph;
use crate::node::{ItemSlot, MemberContent, NodeId, NodeVariant};
use crate::path::NodePath;

/// Visitor over the nodes reachable from a traversal root.
pub trait GraphVisitor {
    /// Called once per reachable node with its path relative to the
    /// traversal root.
    fn visiting(&mut self, graph: &NodeGraph, node: NodeId, path: &NodePath);

    /// Whether to descend into `candidate`. `owner` is the member node the
    /// candidate is reached through: the member itself for an object's
    /// members, the referencing member for reference targets. Returning
    /// `false` prunes the candidate's whole subtree.
    fn should_visit(&self, _graph: &NodeGraph, _owner: Option<NodeId>, _candidate: NodeId) -> bool {
        true
    }

    /// Suppress the `visiting` callback for the traversal root while still
    /// descending through it. Listener re-syncs use this to rebuild a
    /// subtree without touching the changed node's own subscription.
    fn skip_root(&self) -> bool {
        false
    }
}

impl NodeGraph {
    /// Depth-first visit of every node reachable from `root`.
    ///
    /// The root itself is never filtered: it was chosen by the caller, not
    /// reached through a relationship [`GraphVisitor::should_visit`] could
    /// judge.
    pub fn visit(&self, root: NodeId, visitor: &mut dyn GraphVisitor) {
        self.visit_with(root, None, None, visitor);
    }

    /// [`visit`](NodeGraph::visit) with an owning-member context and a seed
    /// path.
    ///
    /// When `owner` is supplied the predicate is consulted for the root
    /// itself, so a subtree entered through a pruned relationship stays
    /// untouched. `seed`, when given, becomes the root's path instead of an
    /// empty one; reported paths extend it.
    pub fn visit_with(
        &self,
        root: NodeId,
        owner: Option<NodeId>,
        seed: Option<NodePath>,
        visitor: &mut dyn GraphVisitor,
    ) {
        if !self.contains(root) {
            return;
        }
        if owner.is_some() && !visitor.should_visit(self, owner, root) {
            return;
        }
        let path = seed.unwrap_or_else(|| NodePath::new(root));
        let suppress_root = visitor.skip_root();
        let mut seen = FxHashSet::default();
        self.descend(root, &path, visitor, &mut seen, suppress_root);
    }

    /// Closure adapter over [`visit`](NodeGraph::visit) for callers that do
    /// not need filtering.
    pub fn traverse<F>(&self, root: NodeId, f: F)
    where
        F: FnMut(NodeId, &NodePath),
    {
        struct Closure<F>(F);
        impl<F: FnMut(NodeId, &NodePath)> GraphVisitor for Closure<F> {
            fn visiting(&mut self, _graph: &NodeGraph, node: NodeId, path: &NodePath) {
                (self.0)(node, path);
            }
        }
        self.visit(root, &mut Closure(f));
    }

    fn descend(
        &self,
        node: NodeId,
        path: &NodePath,
        visitor: &mut dyn GraphVisitor,
        seen: &mut FxHashSet<NodeId>,
        suppress_callback: bool,
    ) {
        if !seen.insert(node) {
            return;
        }
        if !suppress_callback {
            visitor.visiting(self, node, path);
        }
        let Some(state) = self.node(node) else { return };
        match &state.variant {
            NodeVariant::Object { members, .. } => {
                for (name, &member) in members {
                    if visitor.should_visit(self, Some(member), member) {
                        let child = path.push_member(name);
                        self.descend(member, &child, visitor, seen, false);
                    }
                }
            }
            NodeVariant::Member { content, .. } => match content {
                MemberContent::Value(_) => {}
                MemberContent::Reference(target) => {
                    // the target shares the member's path: a reference is
                    // where its target appears in the model
                    if let Some(target) = *target {
                        if visitor.should_visit(self, Some(node), target) {
                            self.descend(target, path, visitor, seen, false);
                        }
                    }
                }
                MemberContent::Collection { entries, .. } => {
                    for entry in entries {
                        if let ItemSlot::Reference(Some(target)) = &entry.slot {
                            if visitor.should_visit(self, Some(node), *target) {
                                let child = path.push_index(entry.index.clone());
                                self.descend(*target, &child, visitor, seen, false);
                            }
                        }
                    }
                }
            },
        }
    }
}
