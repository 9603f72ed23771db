//! Trellis Asset Graphs
//!
//! This crate ties [`trellis_graph`] node graphs to assets:
//!
//! - **Asset Model**: Asset identity plus a declarative property sheet
//!   describing the asset's object tree
//! - **Property Graphs**: One live node graph per asset, built from its
//!   sheet, with a change listener already covering everything reachable
//! - **Graph Container**: The registry mapping asset ids to their property
//!   graphs
//!
//! # Example
//!
//! ```rust
//! use trellis_assets::{AssetItem, Property, PropertyGraphContainer, PropertySheet};
//! use trellis_graph::NodeValue;
//!
//! let mut container = PropertyGraphContainer::new();
//! let asset = AssetItem::new(
//!     "ship",
//!     PropertySheet::new(NodeValue::Str("ship".into()))
//!         .with("hp", Property::Value(NodeValue::Int(10))),
//! );
//!
//! container.initialize_asset(&asset)?;
//! assert!(container.contains(asset.id()));
//!
//! // source-code-only assets never get a graph
//! let script = AssetItem::source_only("script.cs");
//! assert!(container.initialize_asset(&script)?.is_none());
//! # Ok::<(), trellis_assets::AssetError>(())
//! ```

pub mod asset;
pub mod container;
pub mod error;
pub mod property_graph;

pub use asset::{AssetId, AssetItem, Property, PropertySheet};
pub use container::PropertyGraphContainer;
pub use error::{AssetError, Result};
pub use property_graph::AssetPropertyGraph;
