//! Layered attribute model
//!
//! Attributes live in three scopes: one global layer, one layer per
//! connection and one layer per statement. Reads merge the layers from lowest
//! to highest precedence (global, connection, statement). A `Null` value is a
//! tombstone: it suppresses the same key from any lower layer and shows up as
//! `Null` in the merged view. A tombstone with nothing underneath it is
//! dropped from the merged view, unless it replaced a value the same layer
//! held before.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Merged or per-layer attribute mapping, ordered by key
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Scalar attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Float(f64),
    /// Explicit removal of an inherited key
    Null,
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => f.write_str(s),
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::Null => f.write_str("null"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(i64::from(value))
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        AttributeValue::Int(i64::from(value))
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(AttributeValue::Null, Into::into)
    }
}

/// One scope of attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeLayer {
    values: Attributes,
    /// Keys whose own value in this layer was replaced by a tombstone
    removed: BTreeSet<String>,
}

impl AttributeLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write several keys at once; later writes of a key replace earlier ones
    pub fn set_many<I, K, V>(&mut self, attributes: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        for (key, value) in attributes {
            let key = key.into();
            let value = value.into();
            if value.is_null() {
                if self.values.get(&key).is_some_and(|v| !v.is_null()) {
                    self.removed.insert(key.clone());
                }
            } else {
                self.removed.remove(&key);
            }
            self.values.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.values.get(key)
    }

    /// Raw contents of this layer, tombstones included
    pub fn get_all(&self) -> Attributes {
        self.values.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Apply this layer on top of `base`
    pub fn overlay(&self, base: &mut Attributes) {
        for (key, value) in &self.values {
            if value.is_null() {
                if base.contains_key(key) || self.removed.contains(key) {
                    base.insert(key.clone(), AttributeValue::Null);
                }
            } else {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Merge layers given lowest precedence first
pub fn merge_layers<'a, I>(layers: I) -> Attributes
where
    I: IntoIterator<Item = &'a AttributeLayer>,
{
    let mut merged = Attributes::new();
    for layer in layers {
        layer.overlay(&mut merged);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(pairs: &[(&str, AttributeValue)]) -> AttributeLayer {
        let mut layer = AttributeLayer::new();
        layer.set_many(pairs.iter().cloned());
        layer
    }

    #[test]
    fn test_set_many_overrides_within_layer() {
        let mut l = AttributeLayer::new();
        l.set_many([("foo", "bar")]);
        l.set_many([("foo", "baz"), ("other", "x")]);

        assert_eq!(l.get("foo"), Some(&AttributeValue::from("baz")));
        assert_eq!(l.get_all().len(), 2);
        assert_eq!(l.get("missing"), None);
    }

    #[test]
    fn test_higher_layer_wins() {
        let global = layer(&[("env", "prod".into()), ("region", "eu".into())]);
        let connection = layer(&[("env", "staging".into())]);

        let merged = merge_layers([&global, &connection]);
        assert_eq!(merged["env"], AttributeValue::from("staging"));
        assert_eq!(merged["region"], AttributeValue::from("eu"));
    }

    #[test]
    fn test_tombstone_suppresses_lower_value() {
        let global = layer(&[("tenant", "acme".into())]);
        let statement = layer(&[("tenant", AttributeValue::Null)]);

        let merged = merge_layers([&global, &statement]);
        assert_eq!(merged.get("tenant"), Some(&AttributeValue::Null));
    }

    #[test]
    fn test_tombstone_without_lower_value_is_absent() {
        let global = AttributeLayer::new();
        let statement = layer(&[("never_set", AttributeValue::Null)]);

        let merged = merge_layers([&global, &statement]);
        assert!(!merged.contains_key("never_set"));
    }

    #[test]
    fn test_removing_own_value_reads_as_null() {
        let mut statement = AttributeLayer::new();
        statement.set_many([("one", "attribute")]);
        statement.set_many([("one", AttributeValue::Null)]);

        let merged = merge_layers([&AttributeLayer::new(), &statement]);
        assert_eq!(merged.get("one"), Some(&AttributeValue::Null));

        statement.set_many([("one", "again")]);
        let merged = merge_layers([&statement]);
        assert_eq!(merged["one"], AttributeValue::from("again"));
    }

    #[test]
    fn test_value_above_tombstone_restores_key() {
        let global = layer(&[("k", 1i64.into())]);
        let connection = layer(&[("k", AttributeValue::Null)]);
        let statement = layer(&[("k", 2i64.into())]);

        let merged = merge_layers([&global, &connection, &statement]);
        assert_eq!(merged["k"], AttributeValue::Int(2));
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(AttributeValue::from(None::<&str>), AttributeValue::Null);
        assert_eq!(AttributeValue::from(Some(3i64)), AttributeValue::Int(3));
    }
}
