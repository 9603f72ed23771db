//! Error types for asset graph management.

use thiserror::Error;

use trellis_graph::GraphError;

use crate::asset::AssetId;

/// Errors reported while building and managing asset property graphs.
#[derive(Error, Debug)]
pub enum AssetError {
    /// A property graph is already registered under this asset id.
    #[error("a property graph is already registered for asset {0}")]
    GraphAlreadyRegistered(AssetId),

    /// The underlying node graph rejected an operation.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Convenience result type for asset operations.
pub type Result<T> = std::result::Result<T, AssetError>;
