//! Agent configuration maps and typed accessors.

use crate::errors::ConfigurationError;
use std::collections::HashMap;

/// Free-form configuration handed to an agent's `init`.
pub type Configuration = HashMap<String, serde_json::Value>;

/// Typed, validating reads from a [`Configuration`].
///
/// Missing required fields and fields of the wrong type are reported as
/// [`ConfigurationError`]s naming the field. `null` counts as absent.
pub trait ConfigurationExt {
    /// Reads a required string field.
    fn required_str(&self, field: &str) -> Result<&str, ConfigurationError>;

    /// Reads an optional string field.
    fn optional_str(&self, field: &str) -> Result<Option<&str>, ConfigurationError>;

    /// Reads an optional non-negative integer field.
    fn optional_u64(&self, field: &str) -> Result<Option<u64>, ConfigurationError>;

    /// Reads an optional boolean field.
    fn optional_bool(&self, field: &str) -> Result<Option<bool>, ConfigurationError>;

    /// Reads an optional nested map.
    fn optional_map(&self, field: &str) -> Result<Option<Configuration>, ConfigurationError>;
}

impl ConfigurationExt for Configuration {
    fn required_str(&self, field: &str) -> Result<&str, ConfigurationError> {
        self.optional_str(field)?
            .ok_or_else(|| ConfigurationError::missing_field(field))
    }

    fn optional_str(&self, field: &str) -> Result<Option<&str>, ConfigurationError> {
        match self.get(field) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(ConfigurationError::invalid_field(
                field,
                format!("expected a string, got {other}"),
            )),
        }
    }

    fn optional_u64(&self, field: &str) -> Result<Option<u64>, ConfigurationError> {
        match self.get(field) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| {
                ConfigurationError::invalid_field(
                    field,
                    format!("expected a non-negative integer, got {value}"),
                )
            }),
        }
    }

    fn optional_bool(&self, field: &str) -> Result<Option<bool>, ConfigurationError> {
        match self.get(field) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(ConfigurationError::invalid_field(
                field,
                format!("expected a boolean, got {other}"),
            )),
        }
    }

    fn optional_map(&self, field: &str) -> Result<Option<Configuration>, ConfigurationError> {
        match self.get(field) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::Object(map)) => Ok(Some(
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            )),
            Some(other) => Err(ConfigurationError::invalid_field(
                field,
                format!("expected an object, got {other}"),
            )),
        }
    }
}

/// Builds a [`Configuration`] from a JSON object.
///
/// Anything other than an object yields an empty configuration.
#[must_use]
pub fn configuration_from_json(value: serde_json::Value) -> Configuration {
    match value {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        _ => Configuration::new(),
    }
}

/// Converts a [`Configuration`] back into a JSON object.
#[must_use]
pub fn configuration_to_json(configuration: &Configuration) -> serde_json::Value {
    serde_json::Value::Object(
        configuration
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> Configuration {
        configuration_from_json(json!({
            "name": "header",
            "count": 3,
            "negative": -1,
            "enabled": true,
            "nested": {"a": 1},
            "nothing": null,
        }))
    }

    #[test]
    fn test_required_str() {
        let config = config();
        assert_eq!(config.required_str("name").unwrap(), "header");

        let err = config.required_str("missing").unwrap_err();
        assert_eq!(err.field.as_deref(), Some("missing"));

        let err = config.required_str("nothing").unwrap_err();
        assert!(err.message.contains("missing required field"));

        let err = config.required_str("count").unwrap_err();
        assert!(err.message.contains("expected a string"));
    }

    #[test]
    fn test_optional_numbers_and_flags() {
        let config = config();
        assert_eq!(config.optional_u64("count").unwrap(), Some(3));
        assert_eq!(config.optional_u64("missing").unwrap(), None);
        assert!(config.optional_u64("negative").is_err());
        assert_eq!(config.optional_bool("enabled").unwrap(), Some(true));
        assert!(config.optional_bool("name").is_err());
    }

    #[test]
    fn test_optional_map() {
        let config = config();
        let nested = config.optional_map("nested").unwrap().unwrap();
        assert_eq!(nested.get("a"), Some(&json!(1)));
        assert!(config.optional_map("name").is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = config();
        let back = configuration_from_json(configuration_to_json(&config));
        assert_eq!(back, config);
        assert!(configuration_from_json(json!([1, 2])).is_empty());
    }
}
