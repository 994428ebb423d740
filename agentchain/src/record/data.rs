//! The record flowing between agents.

use super::Value;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared handle to an immutable record.
///
/// Stages receive and return handles; identity of the handle is what ties
/// results back to the record they were derived from.
pub type RecordRef = Arc<Record>;

/// A named header attached to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: Value,
}

impl Header {
    /// Creates a new header.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A unit of data flowing through a pipeline.
///
/// Records are never changed once handed to a stage. Agents that transform
/// data build a new record, usually through [`Record::derive`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Optional key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Value>,
    /// The payload.
    pub value: Value,
    /// Where the record came from (topic, file, agent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Ordered headers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<Header>,
}

impl Record {
    /// Creates a record with only a value.
    #[must_use]
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            key: None,
            value: value.into(),
            origin: None,
            timestamp: None,
            headers: Vec::new(),
        }
    }

    /// Sets the key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<Value>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the origin.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Sets the timestamp in epoch milliseconds.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Appends a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    /// Wraps the record in a shared handle.
    #[must_use]
    pub fn into_ref(self) -> RecordRef {
        Arc::new(self)
    }

    /// Builds a new record with the same key, origin, timestamp and headers
    /// but a different value.
    #[must_use]
    pub fn derive(&self, value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            ..self.clone()
        }
    }

    /// Returns the value of the first header with the given name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| &h.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = Record::new("payload")
            .with_key("k1")
            .with_origin("input-topic")
            .with_timestamp(1_700_000_000_000)
            .with_header("lang", "en");

        assert_eq!(record.value, Value::from("payload"));
        assert_eq!(record.key, Some(Value::from("k1")));
        assert_eq!(record.origin.as_deref(), Some("input-topic"));
        assert_eq!(record.timestamp, Some(1_700_000_000_000));
        assert_eq!(record.header("lang"), Some(&Value::from("en")));
        assert_eq!(record.header("missing"), None);
    }

    #[test]
    fn test_derive_keeps_metadata() {
        let original = Record::new("a").with_key("k").with_header("h", 1_i64);
        let derived = original.derive("b");

        assert_eq!(derived.value, Value::from("b"));
        assert_eq!(derived.key, original.key);
        assert_eq!(derived.headers, original.headers);
        assert_eq!(original.value, Value::from("a"));
    }

    #[test]
    fn test_record_serialization_skips_empty_fields() {
        let json = serde_json::to_value(Record::new("x")).unwrap();
        assert_eq!(json, serde_json::json!({"value": {"type": "string", "data": "x"}}));
    }
}
