//! Paths through the node graph.
//!
//! A [`NodePath`] pins down where a change happened: an ordered sequence of
//! member-name and index steps from a root node to a descendant. Paths are
//! immutable; extending one yields a new path, so an event can hold its path
//! while traversal keeps extending its own.

use std::fmt;

use crate::graph::NodeGraph;
use crate::index::Index;
use crate::node::{NodeId, NodeKind};

/// One step of a [`NodePath`].
#[derive(Clone, Debug, PartialEq)]
pub enum PathStep {
    /// Descend into the named member of the current object.
    Member(String),
    /// Descend into the reference entry at an index of the current member.
    Index(Index),
}

/// An ordered sequence of member and index steps from a root node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodePath {
    root: NodeId,
    steps: Vec<PathStep>,
}

impl NodePath {
    /// The empty path rooted at `root`.
    pub fn new(root: NodeId) -> Self {
        Self { root, steps: Vec::new() }
    }

    /// The node this path starts from.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The steps from the root, in order.
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// This path extended by a member step.
    pub fn push_member(&self, name: &str) -> NodePath {
        let mut steps = self.steps.clone();
        steps.push(PathStep::Member(name.to_string()));
        NodePath { root: self.root, steps }
    }

    /// This path extended by an index step.
    pub fn push_index(&self, index: Index) -> NodePath {
        let mut steps = self.steps.clone();
        steps.push(PathStep::Index(index));
        NodePath { root: self.root, steps }
    }

    /// The path one step shorter, or `None` for a root path.
    pub fn parent(&self) -> Option<NodePath> {
        if self.steps.is_empty() {
            return None;
        }
        let mut steps = self.steps.clone();
        steps.pop();
        Some(NodePath { root: self.root, steps })
    }

    /// Walks `graph` along this path and returns the node it lands on.
    ///
    /// Member steps look the name up on the object the current node
    /// designates, dereferencing a reference member first. Index steps
    /// follow the reference entry at that index. Returns `None` as soon as
    /// a step fails to resolve; value entries are not nodes, so an index
    /// step onto one ends resolution.
    pub fn resolve(&self, graph: &NodeGraph) -> Option<NodeId> {
        let mut current = self.root;
        if !graph.contains(current) {
            return None;
        }
        for step in &self.steps {
            current = match step {
                PathStep::Member(name) => {
                    let object = match graph.kind(current)? {
                        NodeKind::Object => current,
                        NodeKind::Member => graph.target(current)?,
                    };
                    graph.member(object, name)?
                }
                PathStep::Index(index) => graph.item_target(current, index)?,
            };
        }
        Some(current)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "(root)");
        }
        let mut first = true;
        for step in &self.steps {
            match step {
                PathStep::Member(name) => {
                    if !first {
                        write!(f, ".")?;
                    }
                    write!(f, "{}", name)?;
                }
                PathStep::Index(index) => write!(f, "[{}]", index)?,
            }
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::NodeValue;

    #[test]
    fn test_display_forms() {
        let mut graph = NodeGraph::new();
        let root = graph.create_object(NodeValue::Null);
        let path = NodePath::new(root);
        assert_eq!(path.to_string(), "(root)");
        assert_eq!(path.push_member("M").to_string(), "M");
        assert_eq!(path.push_member("M").push_member("x").to_string(), "M.x");
        assert_eq!(path.push_member("C").push_index(Index::Item(1)).to_string(), "C[1]");
        assert_eq!(
            path.push_member("C")
                .push_index(Index::Key("k".into()))
                .push_member("x")
                .to_string(),
            "C[k].x"
        );
    }

    #[test]
    fn test_push_is_immutable() {
        let mut graph = NodeGraph::new();
        let root = graph.create_object(NodeValue::Null);
        let base = NodePath::new(root).push_member("M");
        let extended = base.push_index(Index::Item(0));
        assert_eq!(base.len(), 1);
        assert_eq!(extended.len(), 2);
        assert_eq!(extended.parent(), Some(base));
    }

    #[test]
    fn test_parent_of_root_is_none() {
        let mut graph = NodeGraph::new();
        let root = graph.create_object(NodeValue::Null);
        assert_eq!(NodePath::new(root).parent(), None);
    }

    #[test]
    fn test_resolve_member_and_reference_steps() {
        let mut graph = NodeGraph::new();
        let root = graph.create_object(NodeValue::Null);
        let target = graph.create_object(NodeValue::Str("a".into()));
        let inner = graph.add_member(target, "x", NodeValue::Int(1)).unwrap();
        let member = graph.add_reference(root, "M", Some(target)).unwrap();

        let path = NodePath::new(root).push_member("M");
        assert_eq!(path.resolve(&graph), Some(member));
        // member step on a reference member dereferences to the target
        assert_eq!(path.push_member("x").resolve(&graph), Some(inner));
    }

    #[test]
    fn test_resolve_index_step() {
        let mut graph = NodeGraph::new();
        let root = graph.create_object(NodeValue::Null);
        let a = graph.create_object(NodeValue::Str("a".into()));
        let b = graph.create_object(NodeValue::Str("b".into()));
        graph
            .add_reference_collection(root, "C", [Some(a), Some(b)])
            .unwrap();

        let path = NodePath::new(root).push_member("C").push_index(Index::Item(1));
        assert_eq!(path.resolve(&graph), Some(b));
    }

    #[test]
    fn test_resolve_failures() {
        let mut graph = NodeGraph::new();
        let root = graph.create_object(NodeValue::Null);
        graph.add_member(root, "n", NodeValue::Int(7)).unwrap();
        graph.add_collection(root, "C", [NodeValue::Int(1)]).unwrap();

        // unknown member name
        assert_eq!(NodePath::new(root).push_member("missing").resolve(&graph), None);
        // value entries are not nodes
        assert_eq!(
            NodePath::new(root)
                .push_member("C")
                .push_index(Index::Item(0))
                .resolve(&graph),
            None
        );
        // scalar members have nothing to descend into
        assert_eq!(
            NodePath::new(root).push_member("n").push_member("x").resolve(&graph),
            None
        );
    }
}
