//! Resource specifications and their cascade.
//!
//! A step may leave `parallelism` or `size` unset. Each field is resolved
//! on its own: the step's value, else the pipeline default, else 1.

use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};

/// Value used when neither the step nor the pipeline sets a field.
pub const DEFAULT_RESOURCE_VALUE: u32 = 1;

/// Possibly partial resource request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourcesSpec {
    /// Number of parallel instances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<u32>,
    /// Size of each instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

impl ResourcesSpec {
    /// Creates a spec with both fields set.
    #[must_use]
    pub const fn new(parallelism: u32, size: u32) -> Self {
        Self {
            parallelism: Some(parallelism),
            size: Some(size),
        }
    }

    /// Sets the parallelism.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: u32) -> Self {
        self.parallelism = Some(parallelism);
        self
    }

    /// Sets the size.
    #[must_use]
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Fills unset fields from `defaults`.
    #[must_use]
    pub fn with_defaults_from(self, defaults: Option<&Self>) -> Self {
        let defaults = defaults.copied().unwrap_or_default();
        Self {
            parallelism: self.parallelism.or(defaults.parallelism),
            size: self.size.or(defaults.size),
        }
    }

    /// Rejects zero values.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.parallelism == Some(0) {
            return Err(ConfigurationError::invalid_field("parallelism", "must be positive"));
        }
        if self.size == Some(0) {
            return Err(ConfigurationError::invalid_field("size", "must be positive"));
        }
        Ok(())
    }
}

/// Fully resolved resources of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectiveResources {
    /// Number of parallel instances.
    pub parallelism: u32,
    /// Size of each instance.
    pub size: u32,
}

impl Default for EffectiveResources {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_RESOURCE_VALUE,
            size: DEFAULT_RESOURCE_VALUE,
        }
    }
}

/// Resolves the effective resources of a step.
#[must_use]
pub fn resolve(
    step: Option<&ResourcesSpec>,
    default: Option<&ResourcesSpec>,
) -> EffectiveResources {
    let merged = step.copied().unwrap_or_default().with_defaults_from(default);
    EffectiveResources {
        parallelism: merged.parallelism.unwrap_or(DEFAULT_RESOURCE_VALUE),
        size: merged.size.unwrap_or(DEFAULT_RESOURCE_VALUE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fields_cascade_independently() {
        let default = ResourcesSpec::new(7, 7);

        let step = ResourcesSpec::default().with_parallelism(2);
        assert_eq!(
            resolve(Some(&step), Some(&default)),
            EffectiveResources { parallelism: 2, size: 7 }
        );

        let step = ResourcesSpec::default().with_size(3);
        assert_eq!(
            resolve(Some(&step), Some(&default)),
            EffectiveResources { parallelism: 7, size: 3 }
        );

        assert_eq!(resolve(None, Some(&default)), EffectiveResources { parallelism: 7, size: 7 });
    }

    #[test]
    fn test_hard_default_when_nothing_is_set() {
        assert_eq!(resolve(None, None), EffectiveResources { parallelism: 1, size: 1 });

        let step = ResourcesSpec::default().with_parallelism(2);
        assert_eq!(resolve(Some(&step), None), EffectiveResources { parallelism: 2, size: 1 });

        let step = ResourcesSpec::new(5, 3);
        assert_eq!(resolve(Some(&step), None), EffectiveResources { parallelism: 5, size: 3 });
    }

    #[test]
    fn test_partial_default() {
        let default = ResourcesSpec::default().with_size(4);
        assert_eq!(resolve(None, Some(&default)), EffectiveResources { parallelism: 1, size: 4 });
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert!(ResourcesSpec::new(1, 1).validate().is_ok());
        assert!(ResourcesSpec::default().validate().is_ok());

        let err = ResourcesSpec::default().with_size(0).validate().unwrap_err();
        assert_eq!(err.field.as_deref(), Some("size"));

        let err = ResourcesSpec::default().with_parallelism(0).validate().unwrap_err();
        assert_eq!(err.field.as_deref(), Some("parallelism"));
    }

    #[test]
    fn test_deserialize_partial() {
        let spec: ResourcesSpec = serde_json::from_str(r#"{"size": 3}"#).unwrap();
        assert_eq!(spec, ResourcesSpec::default().with_size(3));
    }
}
