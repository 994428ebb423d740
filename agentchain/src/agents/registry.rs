//! Registry of agent constructors keyed by agent type.

use super::{
    AgentCode, AgentIdentity, AgentProcessor, AgentSink, AgentSource, DropProcessor,
    IdentityProcessor, LogEventSink, SetHeaderProcessor,
};
use crate::config::Configuration;
use crate::errors::{AgentflowError, ConfigurationError};
use crate::pipeline::CompositeAgentProcessor;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Builds an uninitialized agent.
///
/// The registry is passed in so that agents wrapping other agents can
/// construct their children.
pub type AgentConstructor =
    Arc<dyn Fn(&AgentRegistry, AgentIdentity) -> Box<dyn AgentCode> + Send + Sync>;

/// Declarative description of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefinition {
    /// Agent id.
    pub agent_id: String,
    /// Registered type tag.
    pub agent_type: String,
    /// Agent configuration.
    #[serde(default)]
    pub configuration: Configuration,
}

impl AgentDefinition {
    /// Creates a definition with an empty configuration.
    #[must_use]
    pub fn new(agent_id: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_type: agent_type.into(),
            configuration: Configuration::new(),
        }
    }

    /// Sets one configuration entry.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.configuration.insert(key.into(), value);
        self
    }
}

/// Constructs and initializes agents by type.
///
/// Cloning is cheap and clones share the registered constructors.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    constructors: Arc<RwLock<HashMap<String, AgentConstructor>>>,
}

impl AgentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in agent types registered.
    ///
    /// Built-ins: `identity`, `drop`, `set-header`, `log-event` and
    /// `composite-agent`.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(IdentityProcessor::AGENT_TYPE, |_, identity| {
            Box::new(IdentityProcessor::new(identity))
        });
        registry.register(DropProcessor::AGENT_TYPE, |_, identity| {
            Box::new(DropProcessor::new(identity))
        });
        registry.register(SetHeaderProcessor::AGENT_TYPE, |_, identity| {
            Box::new(SetHeaderProcessor::new(identity))
        });
        registry.register(LogEventSink::AGENT_TYPE, |_, identity| {
            Box::new(LogEventSink::new(identity))
        });
        registry.register(CompositeAgentProcessor::AGENT_TYPE, |registry, identity| {
            Box::new(CompositeAgentProcessor::new(identity, registry.clone()))
        });
        registry
    }

    /// Registers a constructor, replacing any previous one for the type.
    pub fn register<F>(&self, agent_type: impl Into<String>, constructor: F)
    where
        F: Fn(&Self, AgentIdentity) -> Box<dyn AgentCode> + Send + Sync + 'static,
    {
        self.constructors
            .write()
            .insert(agent_type.into(), Arc::new(constructor));
    }

    /// Returns true if the type is registered.
    #[must_use]
    pub fn contains(&self, agent_type: &str) -> bool {
        self.constructors.read().contains_key(agent_type)
    }

    /// Registered agent types, sorted.
    #[must_use]
    pub fn agent_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.constructors.read().keys().cloned().collect();
        types.sort();
        types
    }

    /// Constructs and initializes an agent.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the type is unknown or `init`
    /// rejects the configuration.
    pub fn construct(
        &self,
        agent_id: &str,
        agent_type: &str,
        started_at: DateTime<Utc>,
        configuration: &Configuration,
    ) -> Result<Box<dyn AgentCode>, AgentflowError> {
        // Released before calling out: constructors and `init` may re-enter
        // the registry.
        let constructor = self.constructors.read().get(agent_type).cloned();
        let constructor = constructor.ok_or_else(|| {
            ConfigurationError::unknown_agent_type(agent_type).with_agent_id(agent_id)
        })?;

        let mut agent = constructor(self, AgentIdentity::new(agent_id, agent_type, started_at));
        agent.init(configuration).map_err(|err| {
            ConfigurationError::new(err.message).with_agent_id(agent_id)
        })?;

        debug!(agent_id, agent_type, "Agent initialized");
        Ok(agent)
    }

    /// Constructs an agent from its definition.
    ///
    /// # Errors
    ///
    /// See [`AgentRegistry::construct`].
    pub fn construct_definition(
        &self,
        definition: &AgentDefinition,
        started_at: DateTime<Utc>,
    ) -> Result<Box<dyn AgentCode>, AgentflowError> {
        self.construct(
            &definition.agent_id,
            &definition.agent_type,
            started_at,
            &definition.configuration,
        )
    }

    /// Constructs an agent that must be a source.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the type is not a source.
    pub fn construct_source(
        &self,
        definition: &AgentDefinition,
        started_at: DateTime<Utc>,
    ) -> Result<Box<dyn AgentSource>, AgentflowError> {
        self.construct_definition(definition, started_at)?
            .into_source()
            .ok_or_else(|| missing_capability(definition, "source"))
    }

    /// Constructs an agent that must be a processor.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the type is not a processor.
    pub fn construct_processor(
        &self,
        definition: &AgentDefinition,
        started_at: DateTime<Utc>,
    ) -> Result<Box<dyn AgentProcessor>, AgentflowError> {
        self.construct_definition(definition, started_at)?
            .into_processor()
            .ok_or_else(|| missing_capability(definition, "processor"))
    }

    /// Constructs an agent that must be a sink.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the type is not a sink.
    pub fn construct_sink(
        &self,
        definition: &AgentDefinition,
        started_at: DateTime<Utc>,
    ) -> Result<Box<dyn AgentSink>, AgentflowError> {
        self.construct_definition(definition, started_at)?
            .into_sink()
            .ok_or_else(|| missing_capability(definition, "sink"))
    }
}

fn missing_capability(definition: &AgentDefinition, capability: &str) -> AgentflowError {
    ConfigurationError::new(format!(
        "agent type '{}' cannot be used as a {capability}",
        definition.agent_type
    ))
    .with_agent_id(&definition.agent_id)
    .into()
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agent_types", &self.agent_types())
            .finish()
    }
}
