//! Trellis Content Graph
//!
//! This crate provides the foundational primitives for tracking changes in a
//! live object graph:
//!
//! - **Content Nodes**: Object nodes owning named members holding values,
//!   references, collections, and dictionaries
//! - **Graph Visitors**: Depth-first traversal over member and reference
//!   edges with path tracking and subtree pruning
//! - **Change Events**: The Prepare/Changing/Finalize/Changed cycle every
//!   member mutation runs, with resolved old/new values and paths
//! - **Change Listeners**: Subscription sets kept equal to the reachable
//!   member set across structural mutations, relaying every tracked event
//!   to one aggregation point
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use trellis_graph::{NodeGraph, NodeValue};
//!
//! let mut graph = NodeGraph::new();
//!
//! // Build a small object graph: a ship holding a reference to its hull
//! let ship = graph.create_object(NodeValue::Str("ship".into()));
//! let hull = graph.create_object(NodeValue::Str("hull-mk1".into()));
//! let slot = graph.add_reference(ship, "hull", Some(hull))?;
//!
//! // Listen over everything reachable from the ship
//! let listener = graph.create_listener(ship)?;
//! let changes = Rc::new(Cell::new(0));
//! let seen = changes.clone();
//! graph.on_changed(listener, move |_event| seen.set(seen.get() + 1))?;
//!
//! // Retargeting the reference is one tracked change
//! let refit = graph.create_object(NodeValue::Str("hull-mk2".into()));
//! graph.set_reference(slot, Some(refit))?;
//! assert_eq!(changes.get(), 1);
//! assert_eq!(graph.target(slot), Some(refit));
//! # Ok::<(), trellis_graph::GraphError>(())
//! ```

pub mod error;
pub mod events;
pub mod graph;
pub mod index;
pub mod listener;
pub mod node;
pub mod path;
pub mod value;
pub mod visitor;

pub use error::{GraphError, Result};
pub use events::{CallbackId, ChangeEvent, NodeEvent, SubscriptionHandle};
pub use graph::{GraphStats, NodeGraph};
pub use index::Index;
pub use listener::{ChangeListener, ListenerId, RegistrationFilter};
pub use node::{ChangeKind, NodeId, NodeKind};
pub use path::{NodePath, PathStep};
pub use value::NodeValue;
pub use visitor::GraphVisitor;
