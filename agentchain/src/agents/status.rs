//! Agent status reporting.

use super::AgentIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The role an agent plays in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    /// Produces records.
    Source,
    /// Transforms records.
    Processor,
    /// Consumes records.
    Sink,
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Processor => write!(f, "processor"),
            Self::Sink => write!(f, "sink"),
        }
    }
}

/// Throughput counters of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetrics {
    /// Records accepted.
    pub total_in: u64,
    /// Records emitted.
    pub total_out: u64,
    /// When the agent was started by its host.
    pub started_at: DateTime<Utc>,
    /// When the agent last handled records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_processed_at: Option<DateTime<Utc>>,
}

/// Status entry of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatus {
    /// Agent id.
    pub agent_id: String,
    /// Agent type tag.
    pub agent_type: String,
    /// Role of the agent.
    pub component_type: ComponentType,
    /// Throughput counters.
    pub metrics: AgentMetrics,
    /// Free-form additional information.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub info: HashMap<String, serde_json::Value>,
}

/// Record counters every agent keeps to build its [`AgentStatus`].
#[derive(Debug, Clone)]
pub struct AgentCounters {
    identity: AgentIdentity,
    component_type: ComponentType,
    total_in: u64,
    total_out: u64,
    last_processed_at: Option<DateTime<Utc>>,
}

impl AgentCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new(identity: AgentIdentity, component_type: ComponentType) -> Self {
        Self {
            identity,
            component_type,
            total_in: 0,
            total_out: 0,
            last_processed_at: None,
        }
    }

    /// The identity of the counted agent.
    #[must_use]
    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    /// Adds to the counters.
    pub fn processed(&mut self, records_in: usize, records_out: usize) {
        self.total_in += records_in as u64;
        self.total_out += records_out as u64;
        self.last_processed_at = Some(Utc::now());
    }

    /// Records accepted so far.
    #[must_use]
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Records emitted so far.
    #[must_use]
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Current metrics.
    #[must_use]
    pub fn metrics(&self) -> AgentMetrics {
        AgentMetrics {
            total_in: self.total_in,
            total_out: self.total_out,
            started_at: self.identity.started_at,
            last_processed_at: self.last_processed_at,
        }
    }

    /// Builds a status entry with the given additional info.
    #[must_use]
    pub fn status(&self, info: HashMap<String, serde_json::Value>) -> AgentStatus {
        AgentStatus {
            agent_id: self.identity.agent_id.clone(),
            agent_type: self.identity.agent_type.clone(),
            component_type: self.component_type,
            metrics: self.metrics(),
            info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters() -> AgentCounters {
        AgentCounters::new(
            AgentIdentity::new("step-1", "identity", Utc::now()),
            ComponentType::Processor,
        )
    }

    #[test]
    fn test_counters_accumulate() {
        let mut counters = counters();
        assert!(counters.metrics().last_processed_at.is_none());

        counters.processed(3, 0);
        counters.processed(0, 5);

        assert_eq!(counters.total_in(), 3);
        assert_eq!(counters.total_out(), 5);
        assert!(counters.metrics().last_processed_at.is_some());
    }

    #[test]
    fn test_status_carries_identity() {
        let mut info = HashMap::new();
        info.insert("batch-size".to_string(), serde_json::json!(10));
        let status = counters().status(info);

        assert_eq!(status.agent_id, "step-1");
        assert_eq!(status.agent_type, "identity");
        assert_eq!(status.component_type, ComponentType::Processor);
        assert_eq!(status.info.get("batch-size"), Some(&serde_json::json!(10)));
    }

    #[test]
    fn test_status_serialization() {
        let status = counters().status(HashMap::new());
        let json = serde_json::to_value(&status).unwrap();

        assert_eq!(json["component_type"], "processor");
        assert_eq!(json["metrics"]["total_in"], 0);
        assert!(json.get("info").is_none());
    }
}
