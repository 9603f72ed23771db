//! Positions within collection and dictionary content.

use std::fmt;

/// Identifies a position inside a collection- or dictionary-valued member.
///
/// [`Index::Empty`] means "no particular entry": whole-value changes carry
/// it, and so do collection adds whose caller let the collection pick the
/// position.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Index {
    /// No index; the change concerns the whole content.
    Empty,
    /// Position in an ordered collection.
    Item(usize),
    /// Key in a dictionary.
    Key(String),
}

impl Index {
    /// Whether this is [`Index::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Index::Empty)
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Index::Empty => write!(f, "(empty)"),
            Index::Item(i) => write!(f, "{}", i),
            Index::Key(k) => write!(f, "{}", k),
        }
    }
}

impl From<usize> for Index {
    fn from(i: usize) -> Self {
        Index::Item(i)
    }
}

impl From<&str> for Index {
    fn from(k: &str) -> Self {
        Index::Key(k.to_string())
    }
}

impl From<String> for Index {
    fn from(k: String) -> Self {
        Index::Key(k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_detection() {
        assert!(Index::Empty.is_empty());
        assert!(!Index::Item(0).is_empty());
        assert!(!Index::Key("a".into()).is_empty());
    }

    #[test]
    fn test_display() {
        assert_eq!(Index::Item(3).to_string(), "3");
        assert_eq!(Index::Key("hull".into()).to_string(), "hull");
        assert_eq!(Index::Empty.to_string(), "(empty)");
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Index::from(2usize), Index::Item(2));
        assert_eq!(Index::from("slot"), Index::Key("slot".into()));
    }
}
