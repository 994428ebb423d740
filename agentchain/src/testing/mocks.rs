//! Agents for exercising chains in tests.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::agents::{
    AgentCode, AgentContext, AgentCounters, AgentIdentity, AgentProcessor, AgentSink,
    AgentSource, AgentStatus, ComponentType,
};
use crate::config::Configuration;
use crate::errors::{AgentError, ErrorKind, ProcessingError};
use crate::record::{RecordRef, SourceRecordAndResult, Value};

fn identity(agent_id: impl Into<String>, agent_type: &str) -> AgentIdentity {
    AgentIdentity::new(agent_id, agent_type, Utc::now())
}

/// Maps every record to itself.
#[derive(Debug)]
pub struct EchoProcessor {
    counters: AgentCounters,
    calls: usize,
}

impl EchoProcessor {
    /// Type tag used by [`super::register_test_agents`].
    pub const AGENT_TYPE: &'static str = "echo";

    /// Creates an echo processor.
    #[must_use]
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self::from_identity(identity(agent_id, Self::AGENT_TYPE))
    }

    /// Creates an echo processor with a given identity.
    #[must_use]
    pub fn from_identity(identity: AgentIdentity) -> Self {
        Self {
            counters: AgentCounters::new(identity, ComponentType::Processor),
            calls: 0,
        }
    }

    /// Number of `process` calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls
    }
}

#[async_trait]
impl AgentCode for EchoProcessor {
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
        let mut info = HashMap::new();
        info.insert("calls".to_string(), serde_json::json!(self.calls));
        vec![self.counters.status(info)]
    }

    fn into_processor(self: Box<Self>) -> Option<Box<dyn AgentProcessor>> {
        Some(self)
    }
}

#[async_trait]
impl AgentProcessor for EchoProcessor {
    async fn process(
        &mut self,
        records: Vec<RecordRef>,
    ) -> Result<Vec<SourceRecordAndResult>, AgentError> {
        self.calls += 1;
        self.counters.processed(records.len(), records.len());
        Ok(records
            .into_iter()
            .map(SourceRecordAndResult::pass_through)
            .collect())
    }
}

/// Turns every record into two, suffixing the value with `a` and `b`.
#[derive(Debug)]
pub struct DuplicateProcessor {
    counters: AgentCounters,
}

impl DuplicateProcessor {
    /// Type tag used by [`super::register_test_agents`].
    pub const AGENT_TYPE: &'static str = "duplicate";

    /// Creates a duplicating processor.
    #[must_use]
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self::from_identity(identity(agent_id, Self::AGENT_TYPE))
    }

    /// Creates a duplicating processor with a given identity.
    #[must_use]
    pub fn from_identity(identity: AgentIdentity) -> Self {
        Self {
            counters: AgentCounters::new(identity, ComponentType::Processor),
        }
    }
}

#[async_trait]
impl AgentCode for DuplicateProcessor {
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
impl AgentProcessor for DuplicateProcessor {
    async fn process(
        &mut self,
        records: Vec<RecordRef>,
    ) -> Result<Vec<SourceRecordAndResult>, AgentError> {
        self.counters.processed(records.len(), records.len() * 2);
        Ok(records
            .into_iter()
            .map(|record| {
                let produced = ["a", "b"]
                    .iter()
                    .map(|suffix| record.derive(format!("{}{suffix}", record.value)).into_ref())
                    .collect();
                SourceRecordAndResult::records(record, produced)
            })
            .collect())
    }
}

/// When a [`FailingProcessor`] fails.
#[derive(Debug, Clone, PartialEq)]
pub enum FailurePolicy {
    /// Every call fails.
    Always,
    /// A call fails if any of its records has this value.
    OnValue(Value),
    /// The first `n` calls fail, later ones pass records through.
    FirstCalls(usize),
    /// Never fails the call; records with this value get an error entry.
    ReportOnValue(Value),
}

/// A processor that fails according to a [`FailurePolicy`].
///
/// Records it does not fail are passed through.
#[derive(Debug)]
pub struct FailingProcessor {
    counters: AgentCounters,
    policy: FailurePolicy,
    message: String,
    calls: usize,
}

impl FailingProcessor {
    /// Type tag used by [`super::register_test_agents`].
    pub const AGENT_TYPE: &'static str = "failing";

    /// Creates a processor with the given policy.
    #[must_use]
    pub fn new(
        agent_id: impl Into<String>,
        policy: FailurePolicy,
        message: impl Into<String>,
    ) -> Self {
        Self {
            counters: AgentCounters::new(
                identity(agent_id, Self::AGENT_TYPE),
                ComponentType::Processor,
            ),
            policy,
            message: message.into(),
            calls: 0,
        }
    }

    /// Fails every call.
    #[must_use]
    pub fn always(agent_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(agent_id, FailurePolicy::Always, message)
    }

    /// Fails calls containing a record with the given value.
    #[must_use]
    pub fn on_value(
        agent_id: impl Into<String>,
        value: impl Into<Value>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(agent_id, FailurePolicy::OnValue(value.into()), message)
    }

    fn fails_call(&self, records: &[RecordRef]) -> bool {
        match &self.policy {
            FailurePolicy::Always => true,
            FailurePolicy::OnValue(value) => records.iter().any(|r| &r.value == value),
            FailurePolicy::FirstCalls(n) => self.calls <= *n,
            FailurePolicy::ReportOnValue(_) => false,
        }
    }
}

#[async_trait]
impl AgentCode for FailingProcessor {
    fn agent_id(&self) -> &str {
        &self.counters.identity().agent_id
    }

    fn agent_type(&self) -> &str {
        &self.counters.identity().agent_type
    }

    fn init(&mut self, configuration: &Configuration) -> Result<(), AgentError> {
        use crate::config::ConfigurationExt;

        if let Some(message) = configuration.optional_str("message")? {
            self.message = message.to_string();
        }
        if let Some(value) = configuration.optional_str("onValue")? {
            self.policy = FailurePolicy::OnValue(Value::from(value));
        }
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
impl AgentProcessor for FailingProcessor {
    async fn process(
        &mut self,
        records: Vec<RecordRef>,
    ) -> Result<Vec<SourceRecordAndResult>, AgentError> {
        self.calls += 1;
        if self.fails_call(&records) {
            return Err(AgentError::processing(self.message.clone()));
        }

        self.counters.processed(records.len(), records.len());
        let agent_id = self.agent_id().to_string();
        Ok(records
            .into_iter()
            .map(|record| match &self.policy {
                FailurePolicy::ReportOnValue(value) if &record.value == value => {
                    let error = ProcessingError::new(
                        agent_id.clone(),
                        ErrorKind::Processing,
                        self.message.clone(),
                    );
                    SourceRecordAndResult::failed(record, error)
                }
                _ => SourceRecordAndResult::pass_through(record),
            })
            .collect())
    }
}

/// A processor that panics on every call.
#[derive(Debug)]
pub struct PanickingProcessor {
    counters: AgentCounters,
}

impl PanickingProcessor {
    /// Type tag used by [`super::register_test_agents`].
    pub const AGENT_TYPE: &'static str = "panicking";

    /// Creates a panicking processor.
    #[must_use]
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            counters: AgentCounters::new(
                identity(agent_id, Self::AGENT_TYPE),
                ComponentType::Processor,
            ),
        }
    }
}

#[async_trait]
impl AgentCode for PanickingProcessor {
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
impl AgentProcessor for PanickingProcessor {
    #[allow(clippy::panic)]
    async fn process(
        &mut self,
        records: Vec<RecordRef>,
    ) -> Result<Vec<SourceRecordAndResult>, AgentError> {
        panic!("{} cannot handle {} record(s)", self.agent_id(), records.len());
    }
}

/// Answers for only the first `answered` records of each batch, the way a
/// buffering stage holds the rest back.
///
/// With [`PartialProcessor::with_stray`] it also returns an entry for a
/// record that was never in the batch.
#[derive(Debug)]
pub struct PartialProcessor {
    counters: AgentCounters,
    answered: usize,
    stray: Option<RecordRef>,
}

impl PartialProcessor {
    /// Type tag of the processor.
    pub const AGENT_TYPE: &'static str = "partial";

    /// Creates a processor answering for `answered` records per batch.
    #[must_use]
    pub fn new(agent_id: impl Into<String>, answered: usize) -> Self {
        Self {
            counters: AgentCounters::new(
                identity(agent_id, Self::AGENT_TYPE),
                ComponentType::Processor,
            ),
            answered,
            stray: None,
        }
    }

    /// Adds an entry keyed by `record` to every answer.
    #[must_use]
    pub fn with_stray(mut self, record: RecordRef) -> Self {
        self.stray = Some(record);
        self
    }
}

#[async_trait]
impl AgentCode for PartialProcessor {
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
impl AgentProcessor for PartialProcessor {
    async fn process(
        &mut self,
        records: Vec<RecordRef>,
    ) -> Result<Vec<SourceRecordAndResult>, AgentError> {
        let total = records.len();
        let mut results: Vec<SourceRecordAndResult> = records
            .into_iter()
            .take(self.answered)
            .map(SourceRecordAndResult::pass_through)
            .collect();
        if let Some(stray) = &self.stray {
            results.push(SourceRecordAndResult::pass_through(Arc::clone(stray)));
        }
        self.counters.processed(total, results.len());
        Ok(results)
    }
}

/// Shared, ordered log of lifecycle events.
///
/// Entries look like `start:p1`, `close:p1` or `set_context:p1`.
#[derive(Debug, Clone, Default)]
pub struct LifecycleLog(Arc<Mutex<Vec<String>>>);

impl LifecycleLog {
    /// Appends an event.
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    /// All events so far.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// A pass-through processor that logs its lifecycle and can fail on start
/// or close.
#[derive(Debug)]
pub struct LifecycleProbe {
    counters: AgentCounters,
    log: LifecycleLog,
    fail_start: bool,
    fail_close: bool,
}

impl LifecycleProbe {
    /// Creates a probe with its own log.
    #[must_use]
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self::with_log(agent_id, LifecycleLog::default())
    }

    /// Creates a probe writing to a shared log.
    #[must_use]
    pub fn with_log(agent_id: impl Into<String>, log: LifecycleLog) -> Self {
        Self {
            counters: AgentCounters::new(identity(agent_id, "probe"), ComponentType::Processor),
            log,
            fail_start: false,
            fail_close: false,
        }
    }

    /// Makes `start` fail.
    #[must_use]
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Makes `close` fail.
    #[must_use]
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// The log this probe writes to.
    #[must_use]
    pub fn log(&self) -> LifecycleLog {
        self.log.clone()
    }
}

#[async_trait]
impl AgentCode for LifecycleProbe {
    fn agent_id(&self) -> &str {
        &self.counters.identity().agent_id
    }

    fn agent_type(&self) -> &str {
        &self.counters.identity().agent_type
    }

    fn init(&mut self, _configuration: &Configuration) -> Result<(), AgentError> {
        Ok(())
    }

    fn set_context(&mut self, _context: Arc<dyn AgentContext>) {
        self.log.push(format!("set_context:{}", self.agent_id()));
    }

    async fn start(&mut self) -> Result<(), AgentError> {
        self.log.push(format!("start:{}", self.agent_id()));
        if self.fail_start {
            return Err(AgentError::processing("start refused"));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AgentError> {
        self.log.push(format!("close:{}", self.agent_id()));
        if self.fail_close {
            return Err(AgentError::processing("close refused"));
        }
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
impl AgentProcessor for LifecycleProbe {
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

/// A sink keeping every record written to it.
#[derive(Debug)]
pub struct RecordingSink {
    counters: AgentCounters,
    written: Arc<Mutex<Vec<RecordRef>>>,
    fail_writes: bool,
}

impl RecordingSink {
    /// Type tag used by [`super::register_test_agents`].
    pub const AGENT_TYPE: &'static str = "recording-sink";

    /// Creates a recording sink.
    #[must_use]
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self::from_identity(identity(agent_id, Self::AGENT_TYPE))
    }

    /// Creates a recording sink with a given identity.
    #[must_use]
    pub fn from_identity(identity: AgentIdentity) -> Self {
        Self {
            counters: AgentCounters::new(identity, ComponentType::Sink),
            written: Arc::default(),
            fail_writes: false,
        }
    }

    /// Makes every write fail.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Handle to the written records, usable after the sink is moved into
    /// a chain.
    #[must_use]
    pub fn written(&self) -> Arc<Mutex<Vec<RecordRef>>> {
        Arc::clone(&self.written)
    }
}

#[async_trait]
impl AgentCode for RecordingSink {
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

    fn into_sink(self: Box<Self>) -> Option<Box<dyn AgentSink>> {
        Some(self)
    }
}

#[async_trait]
impl AgentSink for RecordingSink {
    async fn write(&mut self, records: Vec<RecordRef>) -> Result<(), AgentError> {
        if self.fail_writes {
            return Err(AgentError::processing("sink unavailable"));
        }
        self.counters.processed(records.len(), 0);
        self.written.lock().extend(records);
        Ok(())
    }
}

/// What a [`StaticSource`] was told about its records.
#[derive(Debug, Default)]
pub struct SourceLedger {
    /// Committed records, in commit order.
    pub committed: Vec<RecordRef>,
    /// Records reported as permanently failed, with the error message.
    pub failed: Vec<(RecordRef, String)>,
}

/// A source replaying fixed batches.
#[derive(Debug)]
pub struct StaticSource {
    counters: AgentCounters,
    batches: VecDeque<Vec<RecordRef>>,
    ledger: Arc<Mutex<SourceLedger>>,
    dead_letter: bool,
}

impl StaticSource {
    /// Type tag used by [`super::register_test_agents`].
    pub const AGENT_TYPE: &'static str = "static-source";

    /// Creates a source emitting the given batches, then empty ones.
    #[must_use]
    pub fn new(agent_id: impl Into<String>, batches: Vec<Vec<RecordRef>>) -> Self {
        Self::from_identity(identity(agent_id, Self::AGENT_TYPE), batches)
    }

    /// Creates a source with a given identity.
    #[must_use]
    pub fn from_identity(identity: AgentIdentity, batches: Vec<Vec<RecordRef>>) -> Self {
        Self {
            counters: AgentCounters::new(identity, ComponentType::Source),
            batches: batches.into(),
            ledger: Arc::default(),
            dead_letter: false,
        }
    }

    /// Accepts permanent failures instead of re-raising them.
    #[must_use]
    pub fn with_dead_letter(mut self) -> Self {
        self.dead_letter = true;
        self
    }

    /// Handle to the commit and failure ledger.
    #[must_use]
    pub fn ledger(&self) -> Arc<Mutex<SourceLedger>> {
        Arc::clone(&self.ledger)
    }
}

#[async_trait]
impl AgentCode for StaticSource {
    fn agent_id(&self) -> &str {
        &self.counters.identity().agent_id
    }

    fn agent_type(&self) -> &str {
        &self.counters.identity().agent_type
    }

    fn init(&mut self, configuration: &Configuration) -> Result<(), AgentError> {
        if let Some(values) = configuration.get("values").and_then(serde_json::Value::as_array) {
            let batch = values
                .iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => crate::record::Record::new(s.as_str()),
                    other => crate::record::Record::new(other.clone()),
                })
                .map(crate::record::Record::into_ref)
                .collect();
            self.batches.push_back(batch);
        }
        Ok(())
    }

    fn status(&self) -> Vec<AgentStatus> {
        vec![self.counters.status(HashMap::new())]
    }

    fn into_source(self: Box<Self>) -> Option<Box<dyn AgentSource>> {
        Some(self)
    }
}

#[async_trait]
impl AgentSource for StaticSource {
    async fn read(&mut self) -> Result<Vec<RecordRef>, AgentError> {
        let batch = self.batches.pop_front().unwrap_or_default();
        self.counters.processed(0, batch.len());
        Ok(batch)
    }

    async fn commit(&mut self, records: &[RecordRef]) -> Result<(), AgentError> {
        self.ledger.lock().committed.extend(records.iter().cloned());
        Ok(())
    }

    async fn permanent_failure(
        &mut self,
        record: &RecordRef,
        error: AgentError,
    ) -> Result<(), AgentError> {
        if !self.dead_letter {
            return Err(error);
        }
        self.ledger
            .lock()
            .failed
            .push((Arc::clone(record), error.message));
        Ok(())
    }
}
