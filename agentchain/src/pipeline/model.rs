//! Typed pipeline definitions.

use super::resources::{resolve, EffectiveResources, ResourcesSpec};
use super::ChainConfiguration;
use crate::agents::AgentDefinition;
use crate::config::Configuration;
use crate::errors::ConfigurationError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

static ID_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").ok());

fn is_valid_id(id: &str) -> bool {
    ID_PATTERN.as_ref().is_some_and(|re| re.is_match(id))
}

/// A pipeline: an id, default resources and ordered steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDefinition {
    /// Pipeline id.
    pub id: String,
    /// Defaults for steps that leave resources unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesSpec>,
    /// Steps in execution order.
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

/// One step of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    /// Step id. Generated from the pipeline id, type and position when
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Registered agent type.
    #[serde(rename = "type", alias = "agentType")]
    pub agent_type: String,
    /// Agent configuration.
    #[serde(default)]
    pub configuration: Configuration,
    /// Requested resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesSpec>,
}

impl StepDefinition {
    /// Creates a step.
    #[must_use]
    pub fn new(agent_type: impl Into<String>) -> Self {
        Self {
            id: None,
            agent_type: agent_type.into(),
            configuration: Configuration::new(),
            resources: None,
        }
    }

    /// Sets the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the resources.
    #[must_use]
    pub fn with_resources(mut self, resources: ResourcesSpec) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Sets one configuration entry.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.configuration.insert(key.into(), value);
        self
    }
}

/// A step with its id assigned and resources resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedStep {
    /// Step id.
    pub id: String,
    /// Registered agent type.
    pub agent_type: String,
    /// Agent configuration.
    pub configuration: Configuration,
    /// Effective resources.
    pub resources: EffectiveResources,
}

impl ResolvedStep {
    /// The agent definition of this step.
    #[must_use]
    pub fn to_agent_definition(&self) -> AgentDefinition {
        AgentDefinition {
            agent_id: self.id.clone(),
            agent_type: self.agent_type.clone(),
            configuration: self.configuration.clone(),
        }
    }
}

impl PipelineDefinition {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resources: None,
            steps: Vec::new(),
        }
    }

    /// Sets the default resources.
    #[must_use]
    pub fn with_resources(mut self, resources: ResourcesSpec) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Appends a step.
    #[must_use]
    pub fn with_step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    /// Validates the pipeline and resolves every step.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if an id is empty or malformed, two
    /// steps share an id, a step has no type, or any resource value is
    /// zero.
    pub fn resolve(&self) -> Result<Vec<ResolvedStep>, ConfigurationError> {
        if !is_valid_id(&self.id) {
            return Err(ConfigurationError::invalid_field(
                "id",
                format!("'{}' is not a valid pipeline id", self.id),
            ));
        }
        if let Some(defaults) = &self.resources {
            defaults.validate().map_err(|err| err.with_agent_id(&self.id))?;
        }

        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let id = step
                .id
                .clone()
                .unwrap_or_else(|| format!("{}-{}-{}", self.id, step.agent_type, index + 1));

            if !is_valid_id(&id) {
                return Err(ConfigurationError::invalid_field(
                    "id",
                    format!("'{id}' is not a valid step id"),
                ));
            }
            if step.agent_type.is_empty() {
                return Err(ConfigurationError::missing_field("type").with_agent_id(id));
            }
            if !seen.insert(id.clone()) {
                return Err(ConfigurationError::new(format!("duplicate step id '{id}'"))
                    .with_agent_id(id));
            }
            if let Some(resources) = &step.resources {
                resources.validate().map_err(|err| err.with_agent_id(&id))?;
            }

            resolved.push(ResolvedStep {
                resources: resolve(step.resources.as_ref(), self.resources.as_ref()),
                id,
                agent_type: step.agent_type.clone(),
                configuration: step.configuration.clone(),
            });
        }
        Ok(resolved)
    }

    /// Resolves the pipeline into a processors-only chain layout.
    ///
    /// # Errors
    ///
    /// See [`PipelineDefinition::resolve`].
    pub fn to_chain_configuration(&self) -> Result<ChainConfiguration, ConfigurationError> {
        Ok(ChainConfiguration {
            source: None,
            processors: self
                .resolve()?
                .iter()
                .map(ResolvedStep::to_agent_definition)
                .collect(),
            sink: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn pipeline() -> PipelineDefinition {
        serde_json::from_value(json!({
            "id": "pipeline-1",
            "resources": {"parallelism": 7, "size": 7},
            "steps": [
                {"id": "step1", "type": "identity"},
                {"id": "step2", "type": "identity", "resources": {"parallelism": 2}},
                {"id": "step3", "type": "identity", "resources": {"size": 3}},
                {"id": "step4", "type": "identity", "resources": {"parallelism": 5, "size": 3}},
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_resolve_cascades_resources() {
        let resolved = pipeline().resolve().unwrap();
        let resources: Vec<(u32, u32)> = resolved
            .iter()
            .map(|s| (s.resources.parallelism, s.resources.size))
            .collect();
        assert_eq!(resources, vec![(7, 7), (2, 7), (7, 3), (5, 3)]);
    }

    #[test]
    fn test_resolve_without_defaults() {
        let mut definition = pipeline();
        definition.resources = None;
        let resolved = definition.resolve().unwrap();
        let resources: Vec<(u32, u32)> = resolved
            .iter()
            .map(|s| (s.resources.parallelism, s.resources.size))
            .collect();
        assert_eq!(resources, vec![(1, 1), (2, 1), (1, 3), (5, 3)]);
    }

    #[test]
    fn test_generated_step_ids() {
        let definition = PipelineDefinition::new("p")
            .with_step(StepDefinition::new("identity"))
            .with_step(StepDefinition::new("drop"));
        let ids: Vec<String> = definition.resolve().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["p-identity-1", "p-drop-2"]);
    }

    #[test]
    fn test_duplicate_step_ids_rejected() {
        let definition = PipelineDefinition::new("p")
            .with_step(StepDefinition::new("identity").with_id("a"))
            .with_step(StepDefinition::new("drop").with_id("a"));
        let err = definition.resolve().unwrap_err();
        assert!(err.message.contains("duplicate step id 'a'"));
    }

    #[test]
    fn test_invalid_ids_and_resources_rejected() {
        assert!(PipelineDefinition::new("").resolve().is_err());
        assert!(PipelineDefinition::new("has space").resolve().is_err());

        let definition = PipelineDefinition::new("p").with_step(
            StepDefinition::new("identity")
                .with_id("s")
                .with_resources(ResourcesSpec::default().with_parallelism(0)),
        );
        let err = definition.resolve().unwrap_err();
        assert_eq!(err.agent_id.as_deref(), Some("s"));
        assert_eq!(err.field.as_deref(), Some("parallelism"));

        let definition = PipelineDefinition::new("p").with_resources(ResourcesSpec::new(1, 0));
        assert!(definition.resolve().is_err());
    }

    #[test]
    fn test_to_chain_configuration() {
        let definition = PipelineDefinition::new("p").with_step(
            StepDefinition::new("set-header")
                .with_id("h")
                .with_config("name", json!("lang"))
                .with_config("value", json!("en")),
        );
        let chain = definition.to_chain_configuration().unwrap();

        assert!(chain.source.is_none());
        assert!(chain.sink.is_none());
        assert_eq!(
            chain.processors,
            vec![AgentDefinition::new("h", "set-header")
                .with_config("name", json!("lang"))
                .with_config("value", json!("en"))]
        );
    }
}
