//! Agent capability contracts.
//!
//! An agent is any type implementing [`AgentCode`]. It may additionally
//! implement any subset of [`AgentSource`], [`AgentProcessor`] and
//! [`AgentSink`], and advertises them through the `into_*` conversions so
//! the runtime checks capabilities instead of inspecting concrete types.

mod builtin;
mod registry;
mod status;

pub use builtin::{DropProcessor, IdentityProcessor, LogEventSink, SetHeaderProcessor};
pub use registry::{AgentConstructor, AgentDefinition, AgentRegistry};
pub use status::{AgentCounters, AgentMetrics, AgentStatus, ComponentType};

use crate::config::Configuration;
use crate::errors::AgentError;
use crate::record::{RecordRef, SourceRecordAndResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

/// Identity assigned to an agent when it is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    /// Unique id of the agent within its pipeline.
    pub agent_id: String,
    /// Registered type tag.
    pub agent_type: String,
    /// When the hosting runtime started the agent.
    pub started_at: DateTime<Utc>,
}

impl AgentIdentity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(
        agent_id: impl Into<String>,
        agent_type: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_type: agent_type.into(),
            started_at,
        }
    }
}

/// Runtime services offered to an agent by its host.
///
/// This is where a deployed agent would reach its input and output topics.
pub trait AgentContext: Send + Sync + Debug {
    /// Globally unique id of the hosting agent.
    fn global_agent_id(&self) -> &str;

    /// Directory for agent-local persistent state, if configured.
    fn persistent_state_directory(&self) -> Option<&Path> {
        None
    }
}

/// Lifecycle and status shared by every agent.
#[async_trait]
pub trait AgentCode: Send + Sync + Debug {
    /// The agent id.
    fn agent_id(&self) -> &str;

    /// The registered type tag.
    fn agent_type(&self) -> &str;

    /// Validates and stores the configuration.
    ///
    /// Fails with a configuration error on missing or invalid fields.
    fn init(&mut self, configuration: &Configuration) -> Result<(), AgentError>;

    /// Hands the runtime context to the agent.
    fn set_context(&mut self, _context: Arc<dyn AgentContext>) {}

    /// Starts the agent.
    async fn start(&mut self) -> Result<(), AgentError> {
        Ok(())
    }

    /// Releases the agent's resources.
    async fn close(&mut self) -> Result<(), AgentError> {
        Ok(())
    }

    /// Current status entries for this agent.
    fn status(&self) -> Vec<AgentStatus>;

    /// Converts into a source, if the agent is one.
    fn into_source(self: Box<Self>) -> Option<Box<dyn AgentSource>> {
        None
    }

    /// Converts into a processor, if the agent is one.
    fn into_processor(self: Box<Self>) -> Option<Box<dyn AgentProcessor>> {
        None
    }

    /// Converts into a sink, if the agent is one.
    fn into_sink(self: Box<Self>) -> Option<Box<dyn AgentSink>> {
        None
    }
}

/// An agent that produces records.
#[async_trait]
pub trait AgentSource: AgentCode {
    /// Emits the next batch. An empty batch means nothing is available yet.
    async fn read(&mut self) -> Result<Vec<RecordRef>, AgentError>;

    /// Acknowledges records fully processed downstream.
    async fn commit(&mut self, _records: &[RecordRef]) -> Result<(), AgentError> {
        Ok(())
    }

    /// Reports a record that could not be processed.
    ///
    /// The default re-raises the error; a source may instead route the
    /// record to a dead-letter destination and return `Ok`.
    async fn permanent_failure(
        &mut self,
        _record: &RecordRef,
        error: AgentError,
    ) -> Result<(), AgentError> {
        Err(error)
    }
}

/// An agent that transforms records.
#[async_trait]
pub trait AgentProcessor: AgentCode {
    /// Processes a batch.
    ///
    /// Returns one entry per input record, with that record as the source.
    /// Returning `Err` is a failure of the whole call and affects every
    /// record of the batch.
    async fn process(
        &mut self,
        records: Vec<RecordRef>,
    ) -> Result<Vec<SourceRecordAndResult>, AgentError>;
}

/// An agent that consumes records.
#[async_trait]
pub trait AgentSink: AgentCode {
    /// Writes a batch.
    async fn write(&mut self, records: Vec<RecordRef>) -> Result<(), AgentError>;
}
