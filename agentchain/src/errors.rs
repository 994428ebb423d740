//! Error types for the agentchain runtime.
//!
//! Every failure surfaced to a caller is structured: it carries an
//! [`ErrorKind`] and a message, and can be rendered as a dictionary for
//! status reporting.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// The main error type for agentchain operations.
#[derive(Debug, Error)]
pub enum AgentflowError {
    /// Invalid or missing configuration, or an unknown agent type.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A stage failed while processing records.
    #[error("{0}")]
    Processing(#[from] ProcessingError),

    /// A stage failed to start or close.
    #[error("{0}")]
    Lifecycle(#[from] LifecycleError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AgentflowError {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Processing(err) => err.kind,
            Self::Lifecycle(_) => ErrorKind::Lifecycle,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("kind".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

impl From<serde_json::Error> for AgentflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Broad classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid configuration or unknown agent type.
    Configuration,
    /// A stage rejected or failed on a batch of records.
    Processing,
    /// A stage panicked while running.
    Panic,
    /// A start or close failure.
    Lifecycle,
    /// Encoding or decoding failure.
    Serialization,
    /// Any other failure raised by an agent implementation.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Processing => write!(f, "processing"),
            Self::Panic => write!(f, "panic"),
            Self::Lifecycle => write!(f, "lifecycle"),
            Self::Serialization => write!(f, "serialization"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Error raised when configuration is missing or invalid.
///
/// Configuration errors are fatal at construction time and are never
/// retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// The agent being configured, if known.
    pub agent_id: Option<String>,
    /// The offending configuration field, if any.
    pub field: Option<String>,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.agent_id {
            Some(agent_id) => write!(
                f,
                "Invalid configuration for agent '{agent_id}': {}",
                self.message
            ),
            None => write!(f, "Invalid configuration: {}", self.message),
        }
    }
}

impl std::error::Error for ConfigurationError {}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            agent_id: None,
            field: None,
        }
    }

    /// A required field is absent.
    #[must_use]
    pub fn missing_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            message: format!("missing required field '{field}'"),
            agent_id: None,
            field: Some(field),
        }
    }

    /// A field is present but has the wrong shape.
    #[must_use]
    pub fn invalid_field(field: impl Into<String>, reason: impl fmt::Display) -> Self {
        let field = field.into();
        Self {
            message: format!("invalid value for field '{field}': {reason}"),
            agent_id: None,
            field: Some(field),
        }
    }

    /// No constructor is registered for the agent type.
    #[must_use]
    pub fn unknown_agent_type(agent_type: &str) -> Self {
        Self::new(format!("unknown agent type '{agent_type}'"))
    }

    /// Sets the agent the error refers to, keeping an existing one.
    #[must_use]
    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        if self.agent_id.is_none() {
            self.agent_id = Some(agent_id.into());
        }
        self
    }
}

/// Error captured for every lineage affected by a failed stage call.
///
/// Cloned into each affected [`crate::record::SourceRecordAndResult`].
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("Agent '{agent_id}' failed ({kind}): {message}")]
pub struct ProcessingError {
    /// The agent that failed.
    pub agent_id: String,
    /// The kind of failure.
    pub kind: ErrorKind,
    /// The failure message.
    pub message: String,
}

impl ProcessingError {
    /// Creates a new processing error.
    #[must_use]
    pub fn new(agent_id: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            kind,
            message: message.into(),
        }
    }

    /// Wraps an error returned by an agent.
    #[must_use]
    pub fn from_agent(agent_id: impl Into<String>, err: AgentError) -> Self {
        Self::new(agent_id, err.kind, err.message)
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("agent_id".to_string(), serde_json::json!(self.agent_id));
        map.insert("kind".to_string(), serde_json::json!(self.kind));
        map.insert("message".to_string(), serde_json::json!(self.message));
        map
    }
}

/// Lifecycle phase in which an agent failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecyclePhase {
    /// `start()`.
    Start,
    /// `close()`.
    Close,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Close => write!(f, "close"),
        }
    }
}

/// One agent's lifecycle failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentFailure {
    /// The agent that failed.
    pub agent_id: String,
    /// The failure message.
    pub message: String,
}

/// Error raised when one or more agents fail to start or close.
///
/// On close every agent is attempted and all failures are collected here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Failed to {phase} {} agent(s): {}", .failures.len(), render_failures(.failures))]
pub struct LifecycleError {
    /// The phase that failed.
    pub phase: LifecyclePhase,
    /// Every failure observed, in the order agents were visited.
    pub failures: Vec<AgentFailure>,
}

fn render_failures(failures: &[AgentFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.agent_id, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl LifecycleError {
    /// Creates a lifecycle error from collected failures.
    #[must_use]
    pub fn new(phase: LifecyclePhase, failures: Vec<AgentFailure>) -> Self {
        Self { phase, failures }
    }

    /// Creates a lifecycle error for a single agent.
    #[must_use]
    pub fn single(
        phase: LifecyclePhase,
        agent_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            phase,
            vec![AgentFailure {
                agent_id: agent_id.into(),
                message: message.into(),
            }],
        )
    }

    /// Ids of the agents that failed.
    #[must_use]
    pub fn agent_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.agent_id.as_str()).collect()
    }
}

/// Error returned by agent implementations.
///
/// Implementations can use `?` on any `anyhow`-compatible error; the
/// runtime attaches the agent id when it records the failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct AgentError {
    /// The kind of failure.
    pub kind: ErrorKind,
    /// The failure message.
    pub message: String,
}

impl AgentError {
    /// Creates a new agent error.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A processing failure.
    #[must_use]
    pub fn processing(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Processing, message)
    }

    /// A configuration failure.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// A panic captured while running agent code.
    #[must_use]
    pub fn panic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Panic, message)
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(ErrorKind::Internal, format!("{err:#}"))
    }
}

impl From<ConfigurationError> for AgentError {
    fn from(err: ConfigurationError) -> Self {
        Self::configuration(err.message)
    }
}

impl From<LifecycleError> for AgentError {
    fn from(err: LifecycleError) -> Self {
        Self::new(ErrorKind::Lifecycle, err.to_string())
    }
}

impl From<AgentflowError> for AgentError {
    fn from(err: AgentflowError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_missing_field() {
        let err = ConfigurationError::missing_field("agentType").with_agent_id("step-1");

        assert_eq!(err.field.as_deref(), Some("agentType"));
        assert_eq!(
            err.to_string(),
            "Invalid configuration for agent 'step-1': missing required field 'agentType'"
        );
    }

    #[test]
    fn test_configuration_error_keeps_first_agent_id() {
        let err = ConfigurationError::new("bad")
            .with_agent_id("inner")
            .with_agent_id("outer");
        assert_eq!(err.agent_id.as_deref(), Some("inner"));
    }

    #[test]
    fn test_unknown_agent_type_kind() {
        let err: AgentflowError = ConfigurationError::unknown_agent_type("nope").into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("unknown agent type 'nope'"));
    }

    #[test]
    fn test_processing_error_from_agent() {
        let err = ProcessingError::from_agent("embedder", AgentError::processing("timeout"));
        assert_eq!(err.kind, ErrorKind::Processing);
        assert_eq!(err.to_string(), "Agent 'embedder' failed (processing): timeout");

        let dict = err.to_dict();
        assert_eq!(dict.get("agent_id").unwrap(), "embedder");
        assert_eq!(dict.get("kind").unwrap(), "processing");
    }

    #[test]
    fn test_lifecycle_error_lists_every_failure() {
        let err = LifecycleError::new(
            LifecyclePhase::Close,
            vec![
                AgentFailure {
                    agent_id: "a".to_string(),
                    message: "boom".to_string(),
                },
                AgentFailure {
                    agent_id: "c".to_string(),
                    message: "bang".to_string(),
                },
            ],
        );

        assert_eq!(err.agent_ids(), vec!["a", "c"]);
        assert_eq!(err.to_string(), "Failed to close 2 agent(s): a: boom; c: bang");
    }

    #[test]
    fn test_agent_error_from_anyhow() {
        let err: AgentError = anyhow::anyhow!("connection refused")
            .context("calling embedding service")
            .into();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert_eq!(err.message, "calling embedding service: connection refused");
    }

    #[test]
    fn test_agentflow_error_to_dict() {
        let err =
            AgentflowError::Lifecycle(LifecycleError::single(LifecyclePhase::Start, "s", "x"));
        let dict = err.to_dict();
        assert_eq!(dict.get("kind").unwrap(), "lifecycle");
    }
}
