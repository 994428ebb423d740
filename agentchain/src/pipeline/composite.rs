//! A chain deployed as a single processor.

use super::{ChainConfiguration, PipelineChain};
use crate::agents::{
    AgentCode, AgentContext, AgentIdentity, AgentProcessor, AgentRegistry, AgentStatus,
};
use crate::config::Configuration;
use crate::errors::AgentError;
use crate::record::{RecordRef, SourceRecordAndResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Runs a [`PipelineChain`] in memory behind the processor contract.
///
/// The configuration is a chain layout (`source`, `processors`, `sink`).
/// Its status is the status of the wrapped agents.
#[derive(Debug)]
pub struct CompositeAgentProcessor {
    identity: AgentIdentity,
    registry: AgentRegistry,
    chain: PipelineChain,
}

impl CompositeAgentProcessor {
    /// Type tag.
    pub const AGENT_TYPE: &'static str = "composite-agent";

    /// Creates an empty composite; `init` builds the chain.
    #[must_use]
    pub fn new(identity: AgentIdentity, registry: AgentRegistry) -> Self {
        Self {
            identity,
            registry,
            chain: PipelineChain::default(),
        }
    }

    /// The wrapped chain.
    #[must_use]
    pub fn chain(&self) -> &PipelineChain {
        &self.chain
    }
}

#[async_trait]
impl AgentCode for CompositeAgentProcessor {
    fn agent_id(&self) -> &str {
        &self.identity.agent_id
    }

    fn agent_type(&self) -> &str {
        &self.identity.agent_type
    }

    fn init(&mut self, configuration: &Configuration) -> Result<(), AgentError> {
        let layout = ChainConfiguration::from_configuration(configuration)?;
        self.chain =
            PipelineChain::from_configuration(&self.registry, &layout, self.identity.started_at)?;
        debug!(
            agent_id = %self.identity.agent_id,
            processors = layout.processors.len(),
            "Composite chain built"
        );
        Ok(())
    }

    // Wrapped agents get no context: it would hand them the host's
    // consumers and producers.
    fn set_context(&mut self, _context: Arc<dyn AgentContext>) {}

    async fn start(&mut self) -> Result<(), AgentError> {
        self.chain.start().await.map_err(Into::into)
    }

    async fn close(&mut self) -> Result<(), AgentError> {
        self.chain.close().await.map_err(Into::into)
    }

    fn status(&self) -> Vec<AgentStatus> {
        self.chain.status()
    }

    fn into_processor(self: Box<Self>) -> Option<Box<dyn AgentProcessor>> {
        Some(self)
    }
}

#[async_trait]
impl AgentProcessor for CompositeAgentProcessor {
    async fn process(
        &mut self,
        records: Vec<RecordRef>,
    ) -> Result<Vec<SourceRecordAndResult>, AgentError> {
        Ok(self.chain.process(records).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{AgentflowError, ErrorKind};
    use crate::testing::{records, register_test_agents, TestContext};
    use chrono::Utc;
    use serde_json::json;

    fn registry() -> AgentRegistry {
        let registry = AgentRegistry::with_builtins();
        register_test_agents(&registry);
        registry
    }

    #[tokio::test]
    async fn test_built_from_registry() {
        let registry = registry();
        let configuration = crate::config::configuration_from_json(json!({
            "processors": [
                {"agentId": "a", "agentType": "echo"},
                {"agentId": "b", "agentType": "duplicate"},
            ],
        }));
        let mut agent = registry
            .construct_processor(
                &crate::agents::AgentDefinition {
                    agent_id: "composite".to_string(),
                    agent_type: CompositeAgentProcessor::AGENT_TYPE.to_string(),
                    configuration,
                },
                Utc::now(),
            )
            .unwrap();

        agent.start().await.unwrap();
        let results = agent.process(records(&["r1"])).await.unwrap();
        assert_eq!(results[0].result_records().unwrap().len(), 2);

        let ids: Vec<String> = agent.status().into_iter().map(|s| s.agent_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        agent.close().await.unwrap();
    }

    #[test]
    fn test_init_rejects_unknown_child_type() {
        let registry = registry();
        let err = registry
            .construct(
                "composite",
                CompositeAgentProcessor::AGENT_TYPE,
                Utc::now(),
                &crate::config::configuration_from_json(json!({
                    "processors": [{"agentId": "x", "agentType": "missing"}],
                })),
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
        match err {
            AgentflowError::Configuration(err) => assert!(err.message.contains("missing")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_context_is_not_forwarded() {
        let registry = registry();
        let probe_events = crate::testing::LifecycleLog::default();
        let probe_log = probe_events.clone();
        registry.register("probe", move |_, identity| {
            Box::new(crate::testing::LifecycleProbe::with_log(identity.agent_id, probe_log.clone()))
        });

        let mut agent = registry
            .construct(
                "composite",
                CompositeAgentProcessor::AGENT_TYPE,
                Utc::now(),
                &crate::config::configuration_from_json(json!({
                    "processors": [{"agentId": "p", "agentType": "probe"}],
                })),
            )
            .unwrap();
        agent.set_context(Arc::new(TestContext::new("host")));

        assert!(probe_events.events().is_empty());
    }
}
