//! Error types for graph operations.

use thiserror::Error;

use crate::index::Index;
use crate::node::NodeId;

/// Errors reported by [`NodeGraph`](crate::NodeGraph) operations.
#[derive(Error, Debug)]
pub enum GraphError {
    /// The id does not refer to a live node of this graph.
    #[error("node {0:?} is not part of this graph")]
    UnknownNode(NodeId),

    /// The operation requires an object node.
    #[error("node {0:?} is not an object node")]
    NotAnObject(NodeId),

    /// The operation requires a member node; only members carry change
    /// events.
    #[error("node {0:?} is not a member node")]
    NotAMember(NodeId),

    /// The object already has a member under this name.
    #[error("object {0:?} already has a member named `{1}`")]
    DuplicateMember(NodeId, String),

    /// The member's content does not support the requested operation.
    #[error("member {0:?} does not hold {1}")]
    ContentMismatch(NodeId, &'static str),

    /// No entry exists at the given index.
    #[error("no entry at index `{0}` on node {1:?}")]
    UnknownIndex(Index, NodeId),

    /// The index flavor does not fit the collection shape, e.g. a key into
    /// a list.
    #[error("index `{0}` does not fit the collection shape of node {1:?}")]
    IndexMismatch(Index, NodeId),

    /// Dictionary entries require an explicit key.
    #[error("an explicit index is required to add an entry to node {0:?}")]
    IndexRequired(NodeId),

    /// An entry already exists at the given index.
    #[error("an entry already exists at index `{0}` on node {1:?}")]
    DuplicateIndex(Index, NodeId),

    /// The change listener was already disposed.
    #[error("the change listener has already been disposed")]
    ListenerDisposed,
}

/// Convenience result type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
