//! The per-asset property graph registry.

use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;

use crate::asset::{AssetId, AssetItem};
use crate::error::{AssetError, Result};
use crate::property_graph::AssetPropertyGraph;

/// Registry mapping asset ids to their live property graphs.
///
/// One graph per asset id, and the single place of truth for whether an
/// asset currently has one.
#[derive(Default)]
pub struct PropertyGraphContainer {
    graphs: FxHashMap<AssetId, AssetPropertyGraph>,
}

impl PropertyGraphContainer {
    pub fn new() -> Self {
        Self {
            graphs: FxHashMap::default(),
        }
    }

    /// Builds and registers the property graph for an asset.
    ///
    /// Assets without a property sheet get no graph: the call returns
    /// `Ok(None)` and the registry is left untouched. Initializing an asset
    /// whose id is already registered is a lifecycle bug and fails with
    /// [`AssetError::GraphAlreadyRegistered`].
    pub fn initialize_asset(&mut self, asset: &AssetItem) -> Result<Option<&AssetPropertyGraph>> {
        let Some(sheet) = asset.properties() else {
            tracing::debug!(
                "asset {} ({}) declares no properties; skipping graph construction",
                asset.id(),
                asset.name()
            );
            return Ok(None);
        };
        let graph = AssetPropertyGraph::build(asset.id(), sheet)?;
        self.register_graph(graph)?;
        Ok(self.graphs.get(&asset.id()))
    }

    /// The graph registered for an id. Asking for an unregistered id is an
    /// ordinary miss, not an error.
    pub fn graph(&self, id: AssetId) -> Option<&AssetPropertyGraph> {
        self.graphs.get(&id)
    }

    pub fn graph_mut(&mut self, id: AssetId) -> Option<&mut AssetPropertyGraph> {
        self.graphs.get_mut(&id)
    }

    /// Registers a graph under its asset id.
    pub fn register_graph(&mut self, graph: AssetPropertyGraph) -> Result<()> {
        let id = graph.id();
        match self.graphs.entry(id) {
            Entry::Occupied(_) => Err(AssetError::GraphAlreadyRegistered(id)),
            Entry::Vacant(slot) => {
                slot.insert(graph);
                tracing::debug!("registered property graph for asset {}", id);
                Ok(())
            }
        }
    }

    /// Drops the graph registered for an id. Returns whether one was
    /// registered; removing an absent id is a no-op.
    pub fn unregister_graph(&mut self, id: AssetId) -> bool {
        let removed = self.graphs.remove(&id).is_some();
        if removed {
            tracing::debug!("unregistered property graph for asset {}", id);
        }
        removed
    }

    pub fn contains(&self, id: AssetId) -> bool {
        self.graphs.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    /// The registered asset ids, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = AssetId> + '_ {
        self.graphs.keys().copied()
    }
}
