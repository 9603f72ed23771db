//! Asset identity and the declarative property model.
//!
//! An [`AssetItem`] pairs a stable id with what the asset contains. Assets
//! with structured content declare it as a [`PropertySheet`], a plain tree
//! of named properties; the sheet is the blueprint the per-asset node graph
//! is built from. Assets whose content is source code alone carry no sheet
//! and never get a graph.

use std::fmt;

use uuid::Uuid;

use trellis_graph::NodeValue;

/// Unique identifier of an asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AssetId(Uuid);

impl AssetId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing uuid, e.g. one read back from storage.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One declared property of an asset.
///
/// Reference flavors nest further [`PropertySheet`]s; `None` declares a
/// null reference.
#[derive(Clone, Debug)]
pub enum Property {
    /// A scalar value.
    Value(NodeValue),
    /// A single reference to a nested object.
    Reference(Option<PropertySheet>),
    /// An ordered list of scalar values.
    Collection(Vec<NodeValue>),
    /// An ordered list of references to nested objects.
    ReferenceCollection(Vec<Option<PropertySheet>>),
    /// Keyed scalar values.
    Dictionary(Vec<(String, NodeValue)>),
    /// Keyed references to nested objects.
    ReferenceDictionary(Vec<(String, Option<PropertySheet>)>),
}

/// Declarative description of one object in an asset's property tree.
#[derive(Clone, Debug, Default)]
pub struct PropertySheet {
    value: NodeValue,
    entries: Vec<(String, Property)>,
}

impl PropertySheet {
    /// A sheet whose object carries `value`.
    pub fn new(value: NodeValue) -> Self {
        Self {
            value,
            entries: Vec::new(),
        }
    }

    /// Appends a property declaration; chainable.
    pub fn with(mut self, name: impl Into<String>, property: Property) -> Self {
        self.entries.push((name.into(), property));
        self
    }

    pub fn value(&self) -> &NodeValue {
        &self.value
    }

    pub fn entries(&self) -> &[(String, Property)] {
        &self.entries
    }
}

/// An asset known to the container: identity, a display name, and
/// (optionally) its declared properties.
#[derive(Clone, Debug)]
pub struct AssetItem {
    id: AssetId,
    name: String,
    properties: Option<PropertySheet>,
}

impl AssetItem {
    /// An asset with structured content.
    pub fn new(name: impl Into<String>, sheet: PropertySheet) -> Self {
        Self {
            id: AssetId::new(),
            name: name.into(),
            properties: Some(sheet),
        }
    }

    /// An asset whose content is source code alone; it declares no
    /// properties and never gets a property graph.
    pub fn source_only(name: impl Into<String>) -> Self {
        Self {
            id: AssetId::new(),
            name: name.into(),
            properties: None,
        }
    }

    /// Replaces the random id, e.g. to mirror an id from storage.
    pub fn with_id(mut self, id: AssetId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> AssetId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> Option<&PropertySheet> {
        self.properties.as_ref()
    }
}
