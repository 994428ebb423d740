//! Fixtures for chain tests.

use std::path::{Path, PathBuf};

use crate::agents::{AgentContext, AgentRegistry};
use crate::record::{Record, RecordRef};

use super::mocks::{
    DuplicateProcessor, EchoProcessor, FailingProcessor, FailurePolicy, PanickingProcessor,
    RecordingSink, StaticSource,
};

/// An [`AgentContext`] with fixed values.
#[derive(Debug, Clone, Default)]
pub struct TestContext {
    global_agent_id: String,
    state_directory: Option<PathBuf>,
}

impl TestContext {
    /// Creates a context for the given hosting agent.
    #[must_use]
    pub fn new(global_agent_id: impl Into<String>) -> Self {
        Self {
            global_agent_id: global_agent_id.into(),
            state_directory: None,
        }
    }

    /// Sets the persistent state directory.
    #[must_use]
    pub fn with_state_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.state_directory = Some(directory.into());
        self
    }
}

impl AgentContext for TestContext {
    fn global_agent_id(&self) -> &str {
        &self.global_agent_id
    }

    fn persistent_state_directory(&self) -> Option<&Path> {
        self.state_directory.as_deref()
    }
}

/// Builds one record per value.
#[must_use]
pub fn records(values: &[&str]) -> Vec<RecordRef> {
    values.iter().map(|v| Record::new(*v).into_ref()).collect()
}

/// Registers the test agents under their type tags: `echo`, `duplicate`,
/// `failing`, `panicking`, `recording-sink` and `static-source`.
pub fn register_test_agents(registry: &AgentRegistry) {
    registry.register(EchoProcessor::AGENT_TYPE, |_, identity| {
        Box::new(EchoProcessor::from_identity(identity))
    });
    registry.register(DuplicateProcessor::AGENT_TYPE, |_, identity| {
        Box::new(DuplicateProcessor::from_identity(identity))
    });
    registry.register(FailingProcessor::AGENT_TYPE, |_, identity| {
        Box::new(FailingProcessor::new(identity.agent_id, FailurePolicy::Always, "failed"))
    });
    registry.register(PanickingProcessor::AGENT_TYPE, |_, identity| {
        Box::new(PanickingProcessor::new(identity.agent_id))
    });
    registry.register(RecordingSink::AGENT_TYPE, |_, identity| {
        Box::new(RecordingSink::from_identity(identity))
    });
    registry.register(StaticSource::AGENT_TYPE, |_, identity| {
        Box::new(StaticSource::from_identity(identity, Vec::new()))
    });
}
