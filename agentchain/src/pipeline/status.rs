//! Status aggregation across the agents of a chain.

use crate::agents::{AgentProcessor, AgentSink, AgentSource, AgentStatus, ComponentType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Concatenates the status entries of the source, every processor in
/// order, and the sink.
///
/// Entries are taken as each agent reports them.
#[must_use]
pub fn collect_status(
    source: Option<&dyn AgentSource>,
    processors: &[Box<dyn AgentProcessor>],
    sink: Option<&dyn AgentSink>,
) -> Vec<AgentStatus> {
    let mut statuses = Vec::new();
    if let Some(source) = source {
        statuses.extend(source.status());
    }
    for processor in processors {
        statuses.extend(processor.status());
    }
    if let Some(sink) = sink {
        statuses.extend(sink.status());
    }
    statuses
}

/// A point-in-time status report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
    /// Per-agent entries in chain order.
    pub agents: Vec<AgentStatus>,
}

impl StatusSnapshot {
    /// Wraps collected entries with the current time.
    #[must_use]
    pub fn new(agents: Vec<AgentStatus>) -> Self {
        Self {
            taken_at: Utc::now(),
            agents,
        }
    }

    /// Looks up the entry of one agent.
    #[must_use]
    pub fn agent(&self, agent_id: &str) -> Option<&AgentStatus> {
        self.agents.iter().find(|s| s.agent_id == agent_id)
    }

    /// Entries with the given role.
    pub fn by_component(
        &self,
        component_type: ComponentType,
    ) -> impl Iterator<Item = &AgentStatus> {
        self.agents
            .iter()
            .filter(move |s| s.component_type == component_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EchoProcessor, RecordingSink, StaticSource};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collects_in_chain_order() {
        let source = StaticSource::new("in", Vec::new());
        let processors: Vec<Box<dyn AgentProcessor>> = vec![
            Box::new(EchoProcessor::new("p1")),
            Box::new(EchoProcessor::new("p2")),
        ];
        let sink = RecordingSink::new("out");

        let statuses = collect_status(Some(&source), &processors, Some(&sink));
        let ids: Vec<&str> = statuses.iter().map(|s| s.agent_id.as_str()).collect();
        assert_eq!(ids, vec!["in", "p1", "p2", "out"]);
    }

    #[test]
    fn test_processors_only() {
        let processors: Vec<Box<dyn AgentProcessor>> = vec![Box::new(EchoProcessor::new("p1"))];
        let statuses = collect_status(None, &processors, None);
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].component_type, ComponentType::Processor);
    }

    #[test]
    fn test_snapshot_lookup() {
        let processors: Vec<Box<dyn AgentProcessor>> = vec![Box::new(EchoProcessor::new("p1"))];
        let sink = RecordingSink::new("out");
        let snapshot = StatusSnapshot::new(collect_status(None, &processors, Some(&sink)));

        assert!(snapshot.agent("p1").is_some());
        assert!(snapshot.agent("missing").is_none());
        assert_eq!(snapshot.by_component(ComponentType::Sink).count(), 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["agents"][1]["component_type"], "sink");
    }
}
