//! Per-asset property graphs.
//!
//! An [`AssetPropertyGraph`] owns the node graph built from one asset's
//! property sheet, the root object of that graph, and a change listener
//! over the root. The listener keeps tracking reference targets as the
//! graph is edited, so one [`on_changed`](AssetPropertyGraph::on_changed)
//! subscription observes every tracked mutation of the asset, nested
//! objects included.

use std::fmt;

use trellis_graph::{ChangeEvent, ChangeListener, NodeGraph, NodeId, SubscriptionHandle};

use crate::asset::{AssetId, Property, PropertySheet};
use crate::error::Result;

/// The live node graph of one asset.
pub struct AssetPropertyGraph {
    id: AssetId,
    graph: NodeGraph,
    root: NodeId,
    listener: ChangeListener,
}

impl AssetPropertyGraph {
    /// Builds the node graph declared by `sheet` and puts a change listener
    /// over its root.
    pub fn build(id: AssetId, sheet: &PropertySheet) -> Result<Self> {
        let mut graph = NodeGraph::new();
        let root = build_object(&mut graph, sheet)?;
        let listener = graph.create_listener(root)?;
        tracing::debug!(
            "built property graph for asset {}: {} nodes",
            id,
            graph.stats().node_count
        );
        Ok(Self {
            id,
            graph,
            root,
            listener,
        })
    }

    pub fn id(&self) -> AssetId {
        self.id
    }

    /// The root object node of the asset.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    /// Mutable access to the node graph for edits; the listener re-syncs
    /// itself through each mutation's event cycle.
    pub fn graph_mut(&mut self) -> &mut NodeGraph {
        &mut self.graph
    }

    pub fn listener(&self) -> ChangeListener {
        self.listener
    }

    /// Subscribes to the pre-mutation event of every tracked node.
    pub fn on_changing<F>(&mut self, callback: F) -> Result<SubscriptionHandle>
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        Ok(self.graph.on_changing(self.listener, callback)?)
    }

    /// Subscribes to the post-mutation event of every tracked node.
    pub fn on_changed<F>(&mut self, callback: F) -> Result<SubscriptionHandle>
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        Ok(self.graph.on_changed(self.listener, callback)?)
    }
}

impl fmt::Debug for AssetPropertyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetPropertyGraph")
            .field("id", &self.id)
            .field("root", &self.root)
            .field("nodes", &self.graph.stats().node_count)
            .finish()
    }
}

fn build_object(graph: &mut NodeGraph, sheet: &PropertySheet) -> Result<NodeId> {
    let object = graph.create_object(sheet.value().clone());
    for (name, property) in sheet.entries() {
        match property {
            Property::Value(value) => {
                graph.add_member(object, name, value.clone())?;
            }
            Property::Reference(target) => {
                let target = build_target(graph, target.as_ref())?;
                graph.add_reference(object, name, target)?;
            }
            Property::Collection(values) => {
                graph.add_collection(object, name, values.iter().cloned())?;
            }
            Property::ReferenceCollection(sheets) => {
                let mut targets = Vec::with_capacity(sheets.len());
                for sheet in sheets {
                    targets.push(build_target(graph, sheet.as_ref())?);
                }
                graph.add_reference_collection(object, name, targets)?;
            }
            Property::Dictionary(entries) => {
                graph.add_dictionary(object, name, entries.iter().cloned())?;
            }
            Property::ReferenceDictionary(entries) => {
                let mut built = Vec::with_capacity(entries.len());
                for (key, sheet) in entries {
                    built.push((key.clone(), build_target(graph, sheet.as_ref())?));
                }
                graph.add_reference_dictionary(object, name, built)?;
            }
        }
    }
    Ok(object)
}

fn build_target(graph: &mut NodeGraph, sheet: Option<&PropertySheet>) -> Result<Option<NodeId>> {
    match sheet {
        Some(sheet) => Ok(Some(build_object(graph, sheet)?)),
        None => Ok(None),
    }
}
