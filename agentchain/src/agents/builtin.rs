//! Built-in agents available from [`super::AgentRegistry::with_builtins`].

use super::{
    AgentCode, AgentCounters, AgentIdentity, AgentProcessor, AgentSink, AgentStatus,
    ComponentType,
};
use crate::config::{Configuration, ConfigurationExt};
use crate::errors::{AgentError, ConfigurationError};
use crate::record::{RecordRef, SourceRecordAndResult, Value};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn, Level};

/// Emits every record unchanged.
#[derive(Debug)]
pub struct IdentityProcessor {
    counters: AgentCounters,
}

impl IdentityProcessor {
    /// Type tag.
    pub const AGENT_TYPE: &'static str = "identity";

    /// Creates the processor.
    #[must_use]
    pub fn new(identity: AgentIdentity) -> Self {
        Self {
            counters: AgentCounters::new(identity, ComponentType::Processor),
        }
    }
}

#[async_trait]
impl AgentCode for IdentityProcessor {
    fn agent_id(&self) -> &str {
        &self.counters.identity().agent_id
    }

    fn agent_type(&self) -> &str {
        &self.counters.identity().agent_type
    }

    fn init(&mut self, _configuration: &Configuration) -> Result<(), AgentError> {
        Ok(())
    }

    fn status(&self) -> Vec<AgentStatus> {
        vec![self.counters.status(HashMap::new())]
    }

    fn into_processor(self: Box<Self>) -> Option<Box<dyn AgentProcessor>> {
        Some(self)
    }
}

#[async_trait]
impl AgentProcessor for IdentityProcessor {
    async fn process(
        &mut self,
        records: Vec<RecordRef>,
    ) -> Result<Vec<SourceRecordAndResult>, AgentError> {
        self.counters.processed(records.len(), records.len());
        Ok(records
            .into_iter()
            .map(SourceRecordAndResult::pass_through)
            .collect())
    }
}

/// Discards every record.
#[derive(Debug)]
pub struct DropProcessor {
    counters: AgentCounters,
}

impl DropProcessor {
    /// Type tag.
    pub const AGENT_TYPE: &'static str = "drop";

    /// Creates the processor.
    #[must_use]
    pub fn new(identity: AgentIdentity) -> Self {
        Self {
            counters: AgentCounters::new(identity, ComponentType::Processor),
        }
    }
}

#[async_trait]
impl AgentCode for DropProcessor {
    fn agent_id(&self) -> &str {
        &self.counters.identity().agent_id
    }

    fn agent_type(&self) -> &str {
        &self.counters.identity().agent_type
    }

    fn init(&mut self, _configuration: &Configuration) -> Result<(), AgentError> {
        Ok(())
    }

    fn status(&self) -> Vec<AgentStatus> {
        vec![self.counters.status(HashMap::new())]
    }

    fn into_processor(self: Box<Self>) -> Option<Box<dyn AgentProcessor>> {
        Some(self)
    }
}

#[async_trait]
impl AgentProcessor for DropProcessor {
    async fn process(
        &mut self,
        records: Vec<RecordRef>,
    ) -> Result<Vec<SourceRecordAndResult>, AgentError> {
        self.counters.processed(records.len(), 0);
        Ok(records
            .into_iter()
            .map(|record| SourceRecordAndResult::records(record, Vec::new()))
            .collect())
    }
}

/// Appends a header to every record.
///
/// Configuration: `name` (required string) and `value` (required, any JSON;
/// strings stay strings, other values are kept as JSON).
#[derive(Debug)]
pub struct SetHeaderProcessor {
    counters: AgentCounters,
    name: String,
    value: Value,
}

impl SetHeaderProcessor {
    /// Type tag.
    pub const AGENT_TYPE: &'static str = "set-header";

    /// Creates an unconfigured processor.
    #[must_use]
    pub fn new(identity: AgentIdentity) -> Self {
        Self {
            counters: AgentCounters::new(identity, ComponentType::Processor),
            name: String::new(),
            value: Value::Null,
        }
    }
}

#[async_trait]
impl AgentCode for SetHeaderProcessor {
    fn agent_id(&self) -> &str {
        &self.counters.identity().agent_id
    }

    fn agent_type(&self) -> &str {
        &self.counters.identity().agent_type
    }

    fn init(&mut self, configuration: &Configuration) -> Result<(), AgentError> {
        self.name = configuration.required_str("name")?.to_string();
        if self.name.is_empty() {
            return Err(ConfigurationError::invalid_field("name", "must not be empty").into());
        }
        self.value = match configuration.get("value") {
            None | Some(serde_json::Value::Null) => {
                return Err(ConfigurationError::missing_field("value").into())
            }
            Some(serde_json::Value::String(s)) => Value::String(s.clone()),
            Some(other) => Value::Json(other.clone()),
        };
        Ok(())
    }

    fn status(&self) -> Vec<AgentStatus> {
        let mut info = HashMap::new();
        info.insert("header".to_string(), serde_json::json!(self.name));
        vec![self.counters.status(info)]
    }

    fn into_processor(self: Box<Self>) -> Option<Box<dyn AgentProcessor>> {
        Some(self)
    }
}

#[async_trait]
impl AgentProcessor for SetHeaderProcessor {
    async fn process(
        &mut self,
        records: Vec<RecordRef>,
    ) -> Result<Vec<SourceRecordAndResult>, AgentError> {
        self.counters.processed(records.len(), records.len());
        Ok(records
            .into_iter()
            .map(|record| {
                let updated = record
                    .as_ref()
                    .clone()
                    .with_header(self.name.clone(), self.value.clone());
                SourceRecordAndResult::records(record, vec![Arc::new(updated)])
            })
            .collect())
    }
}

/// Logs every record it receives.
///
/// Configuration: `level` (optional, one of `debug`, `info`, `warn`;
/// defaults to `info`).
#[derive(Debug)]
pub struct LogEventSink {
    counters: AgentCounters,
    level: Level,
}

impl LogEventSink {
    /// Type tag.
    pub const AGENT_TYPE: &'static str = "log-event";

    /// Creates the sink logging at info level.
    #[must_use]
    pub fn new(identity: AgentIdentity) -> Self {
        Self {
            counters: AgentCounters::new(identity, ComponentType::Sink),
            level: Level::INFO,
        }
    }

    fn log(&self, record: &RecordRef) {
        let agent_id = self.agent_id();
        let key = record.key.as_ref().map(ToString::to_string);
        if self.level == Level::DEBUG {
            debug!(agent_id, ?key, value = %record.value, "Record received");
        } else if self.level == Level::WARN {
            warn!(agent_id, ?key, value = %record.value, "Record received");
        } else {
            info!(agent_id, ?key, value = %record.value, "Record received");
        }
    }
}

#[async_trait]
impl AgentCode for LogEventSink {
    fn agent_id(&self) -> &str {
        &self.counters.identity().agent_id
    }

    fn agent_type(&self) -> &str {
        &self.counters.identity().agent_type
    }

    fn init(&mut self, configuration: &Configuration) -> Result<(), AgentError> {
        self.level = match configuration.optional_str("level")? {
            None | Some("info") => Level::INFO,
            Some("debug") => Level::DEBUG,
            Some("warn") => Level::WARN,
            Some(other) => {
                return Err(ConfigurationError::invalid_field(
                    "level",
                    format!("expected debug, info or warn, got '{other}'"),
                )
                .into())
            }
        };
        Ok(())
    }

    fn status(&self) -> Vec<AgentStatus> {
        vec![self.counters.status(HashMap::new())]
    }

    fn into_sink(self: Box<Self>) -> Option<Box<dyn AgentSink>> {
        Some(self)
    }
}

#[async_trait]
impl AgentSink for LogEventSink {
    async fn write(&mut self, records: Vec<RecordRef>) -> Result<(), AgentError> {
        for record in &records {
            self.log(record);
        }
        self.counters.processed(records.len(), 0);
        Ok(())
    }
}
