use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Represents a packet of data flowing through the graph
///
/// This is a wrapper around a JSON value with some helper methods
/// for working with node outputs in different formats. It serializes as the
/// inner value.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct DataPacket {
    /// The inner JSON value
    pub value: serde_json::Value,
}

impl DataPacket {
    /// Create a new data packet from a JSON value
    #[inline]
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Create a null data packet
    #[inline]
    pub fn null() -> Self {
        Self {
            value: serde_json::Value::Null,
        }
    }

    /// Get the inner JSON value
    #[inline]
    pub fn as_value(&self) -> &serde_json::Value {
        &self.value
    }

    /// Take ownership of the inner JSON value
    #[inline]
    pub fn into_value(self) -> serde_json::Value {
        self.value
    }

    /// Check if the data packet is null
    #[inline]
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Try to view the data packet as a string
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }

    /// Try to view the data packet as an object
    #[inline]
    pub fn as_object(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.value.as_object()
    }

    /// Try to view the data packet as an array
    #[inline]
    pub fn as_array(&self) -> Option<&Vec<serde_json::Value>> {
        self.value.as_array()
    }

    /// Try to convert the data packet to a specific type
    pub fn to<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_value(self.value.clone())
    }

    /// Create a data packet from a serializable value
    pub fn from<T>(value: &T) -> Result<Self, serde_json::Error>
    where
        T: Serialize,
    {
        Ok(Self::new(serde_json::to_value(value)?))
    }

    /// Create a data packet from a string reference
    #[inline]
    pub fn from_string(s: &str) -> Self {
        Self::new(serde_json::Value::String(s.to_string()))
    }
}

/// A text value carrying provenance metadata through the graph
///
/// Split nodes emit one of these per derived item and join nodes emit a
/// single one for the combined text, so downstream consumers can tell where
/// a piece of text came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedText {
    /// The text payload
    pub text: String,
    /// Provenance metadata inherited from the producing node
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Unique id for this item
    pub uid: String,
}

impl TaggedText {
    /// Create a tagged text item with a fresh unique id
    pub fn new(
        text: impl Into<String>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            text: text.into(),
            metadata,
            uid: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// A value resolved for a node input by the variable binder
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    /// A plain string value
    Plain(String),
    /// A text value with provenance metadata
    Tagged(TaggedText),
}

impl BoundValue {
    /// The text carried by this value
    pub fn text(&self) -> &str {
        match self {
            BoundValue::Plain(s) => s,
            BoundValue::Tagged(t) => &t.text,
        }
    }

    /// The provenance metadata, if any
    pub fn metadata(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        match self {
            BoundValue::Plain(_) => None,
            BoundValue::Tagged(t) => Some(&t.metadata),
        }
    }
}

/// Render a JSON value the way a node input expects it: strings unquoted,
/// everything else as compact JSON
pub fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_packet_creation() {
        let packet = DataPacket::new(json!({"name": "test"}));
        assert_eq!(packet.as_value()["name"], "test");
    }

    #[test]
    fn test_data_packet_from_string() {
        let packet = DataPacket::from_string("test string");
        assert_eq!(packet.as_str().unwrap(), "test string");
    }

    #[test]
    fn test_data_packet_roundtrip() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Sample {
            name: String,
            count: u32,
        }

        let sample = Sample {
            name: "x".to_string(),
            count: 3,
        };
        let packet = DataPacket::from(&sample).unwrap();
        let back: Sample = packet.to().unwrap();
        assert_eq!(back, sample);
    }

    #[test]
    fn test_data_packet_null() {
        assert!(DataPacket::null().is_null());
        assert!(!DataPacket::from_string("x").is_null());
    }

    #[test]
    fn test_tagged_text_unique_ids() {
        let a = TaggedText::new("a", serde_json::Map::new());
        let b = TaggedText::new("b", serde_json::Map::new());
        assert_ne!(a.uid, b.uid);
    }

    #[test]
    fn test_tagged_text_metadata_defaults_on_deserialize() {
        let value = json!({"text": "hello", "uid": "u-1"});
        let tagged: TaggedText = serde_json::from_value(value).unwrap();
        assert_eq!(tagged.text, "hello");
        assert!(tagged.metadata.is_empty());
    }

    #[test]
    fn test_bound_value_text() {
        let plain = BoundValue::Plain("a".to_string());
        let tagged = BoundValue::Tagged(TaggedText::new("b", serde_json::Map::new()));

        assert_eq!(plain.text(), "a");
        assert_eq!(tagged.text(), "b");
        assert!(plain.metadata().is_none());
        assert!(tagged.metadata().is_some());
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!("plain")), "plain");
        assert_eq!(value_to_string(&json!(42)), "42");
        assert_eq!(value_to_string(&json!({"a": 1})), "{\"a\":1}");
    }
}
