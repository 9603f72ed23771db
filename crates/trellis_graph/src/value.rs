//! Plain data values carried by content nodes.
//!
//! `NodeValue` is the currency of change events: every mutation reports its
//! old and new content as resolved values, and collection adds that arrive
//! without an index fall back to value equality to locate the new entry.

/// A plain data value held by a node or a collection entry.
///
/// Reference members resolve to their target object's value; collection
/// members resolve to a [`NodeValue::List`] or [`NodeValue::Map`] of their
/// entries' resolved values. [`NodeValue::Null`] stands in for "no value"
/// wherever one side of a change has nothing to report.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum NodeValue {
    /// The absence of a value.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Ordered values, as resolved from list-shaped collection content.
    List(Vec<NodeValue>),
    /// Keyed values, as resolved from dictionary-shaped collection content.
    Map(Vec<(String, NodeValue)>),
}

impl NodeValue {
    /// Whether this is [`NodeValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, NodeValue::Null)
    }
}

impl From<bool> for NodeValue {
    fn from(v: bool) -> Self {
        NodeValue::Bool(v)
    }
}

impl From<i64> for NodeValue {
    fn from(v: i64) -> Self {
        NodeValue::Int(v)
    }
}

impl From<f64> for NodeValue {
    fn from(v: f64) -> Self {
        NodeValue::Float(v)
    }
}

impl From<&str> for NodeValue {
    fn from(v: &str) -> Self {
        NodeValue::Str(v.to_string())
    }
}

impl From<String> for NodeValue {
    fn from(v: String) -> Self {
        NodeValue::Str(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_detection() {
        assert!(NodeValue::Null.is_null());
        assert!(!NodeValue::Int(0).is_null());
        assert!(NodeValue::default().is_null());
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(NodeValue::from(true), NodeValue::Bool(true));
        assert_eq!(NodeValue::from(42i64), NodeValue::Int(42));
        assert_eq!(NodeValue::from("hull"), NodeValue::Str("hull".to_string()));
    }

    #[test]
    fn test_structural_equality() {
        let a = NodeValue::List(vec![NodeValue::Int(1), NodeValue::Str("x".into())]);
        let b = NodeValue::List(vec![NodeValue::Int(1), NodeValue::Str("x".into())]);
        assert_eq!(a, b);
        assert_ne!(a, NodeValue::List(vec![NodeValue::Int(1)]));
    }
}
