//! In-process execution of a chain of agents.
//!
//! A [`PipelineChain`] holds an optional source, an ordered list of
//! processors and an optional sink. [`PipelineChain::process`] pushes a
//! batch through every processor while keeping each output record tied to
//! the input record it was derived from, and confines failures to the
//! lineages they affect.

use super::status::collect_status;
use crate::agents::{
    AgentDefinition, AgentProcessor, AgentRegistry, AgentSink, AgentSource, AgentStatus,
};
use crate::config::{configuration_to_json, Configuration};
use crate::errors::{
    AgentError, AgentFailure, AgentflowError, ConfigurationError, ErrorKind, LifecycleError,
    LifecyclePhase, ProcessingError,
};
use crate::record::{RecordOutcome, RecordRef, SourceRecordAndResult};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Deserializer, Serialize};
use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// Declarative layout of a chain.
///
/// `source` and `sink` may be absent, `null` or an empty object, all of
/// which mean the chain has none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfiguration {
    /// The source, if any.
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub source: Option<AgentDefinition>,
    /// Processors in execution order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub processors: Vec<AgentDefinition>,
    /// The sink, if any.
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub sink: Option<AgentDefinition>,
}

impl ChainConfiguration {
    /// Parses a chain layout out of an agent configuration map.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if an entry is malformed.
    pub fn from_configuration(configuration: &Configuration) -> Result<Self, ConfigurationError> {
        serde_json::from_value(configuration_to_json(configuration))
            .map_err(|err| ConfigurationError::new(format!("invalid chain configuration: {err}")))
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<AgentDefinition>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Object(map)) if map.is_empty() => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<AgentDefinition>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<AgentDefinition>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Counters kept by a chain across `process` calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMetrics {
    /// Number of `process` calls.
    pub calls: u64,
    /// Source records accepted.
    pub records_in: u64,
    /// Records produced by lineages that completed.
    pub records_out: u64,
    /// Lineages that ended in an error.
    pub failed_lineages: u64,
    /// End of the last `process` call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_processed_at: Option<DateTime<Utc>>,
}

/// Outcome of one [`PipelineChain::run_once`] cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records read from the source.
    pub read: usize,
    /// Records written to the sink.
    pub written: usize,
    /// Source records whose lineage failed.
    pub failed: usize,
}

/// An ordered chain of agents executed in process.
///
/// `process`, `start` and `close` take `&mut self`; one chain serves one
/// caller at a time.
#[derive(Debug, Default)]
pub struct PipelineChain {
    source: Option<Box<dyn AgentSource>>,
    processors: Vec<Box<dyn AgentProcessor>>,
    sink: Option<Box<dyn AgentSink>>,
    metrics: ChainMetrics,
}

impl PipelineChain {
    /// Starts building a chain.
    #[must_use]
    pub fn builder() -> ChainBuilder {
        ChainBuilder::default()
    }

    /// Constructs and initializes every agent of a chain layout.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any agent cannot be constructed or
    /// lacks the capability its position requires.
    pub fn from_configuration(
        registry: &AgentRegistry,
        configuration: &ChainConfiguration,
        started_at: DateTime<Utc>,
    ) -> Result<Self, AgentflowError> {
        let mut builder = Self::builder();
        if let Some(definition) = &configuration.source {
            builder = builder.source(registry.construct_source(definition, started_at)?);
        }
        for definition in &configuration.processors {
            builder = builder.processor(registry.construct_processor(definition, started_at)?);
        }
        if let Some(definition) = &configuration.sink {
            builder = builder.sink(registry.construct_sink(definition, started_at)?);
        }
        builder.build()
    }

    /// The wired source, if any.
    #[must_use]
    pub fn source(&self) -> Option<&dyn AgentSource> {
        self.source.as_deref()
    }

    /// The processors in execution order.
    #[must_use]
    pub fn processors(&self) -> &[Box<dyn AgentProcessor>] {
        &self.processors
    }

    /// The wired sink, if any.
    #[must_use]
    pub fn sink(&self) -> Option<&dyn AgentSink> {
        self.sink.as_deref()
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn metrics(&self) -> &ChainMetrics {
        &self.metrics
    }

    /// Status of every wired agent: source, processors in order, then sink.
    #[must_use]
    pub fn status(&self) -> Vec<AgentStatus> {
        collect_status(self.source(), &self.processors, self.sink())
    }

    /// Starts the source, every processor in order, then the sink.
    ///
    /// Stops at the first failure.
    ///
    /// # Errors
    ///
    /// Returns a start lifecycle error naming the failing agent.
    pub async fn start(&mut self) -> Result<(), LifecycleError> {
        if let Some(source) = self.source.as_mut() {
            let agent_id = source.agent_id().to_string();
            guarded(source.start())
                .await
                .map_err(|err| {
                    LifecycleError::single(LifecyclePhase::Start, agent_id, err.message)
                })?;
        }
        for processor in &mut self.processors {
            let agent_id = processor.agent_id().to_string();
            guarded(processor.start())
                .await
                .map_err(|err| {
                    LifecycleError::single(LifecyclePhase::Start, agent_id, err.message)
                })?;
        }
        if let Some(sink) = self.sink.as_mut() {
            let agent_id = sink.agent_id().to_string();
            guarded(sink.start())
                .await
                .map_err(|err| {
                    LifecycleError::single(LifecyclePhase::Start, agent_id, err.message)
                })?;
        }
        info!(
            processors = self.processors.len(),
            has_source = self.source.is_some(),
            has_sink = self.sink.is_some(),
            "Chain started"
        );
        Ok(())
    }

    /// Closes every agent in the order they were started.
    ///
    /// Every agent is attempted, whether or not an earlier one failed or
    /// it was ever started.
    ///
    /// # Errors
    ///
    /// Returns a close lifecycle error listing every failure.
    pub async fn close(&mut self) -> Result<(), LifecycleError> {
        let mut failures = Vec::new();

        if let Some(source) = self.source.as_mut() {
            let agent_id = source.agent_id().to_string();
            note_failure(&mut failures, agent_id, guarded(source.close()).await);
        }
        for processor in &mut self.processors {
            let agent_id = processor.agent_id().to_string();
            note_failure(&mut failures, agent_id, guarded(processor.close()).await);
        }
        if let Some(sink) = self.sink.as_mut() {
            let agent_id = sink.agent_id().to_string();
            note_failure(&mut failures, agent_id, guarded(sink.close()).await);
        }

        if failures.is_empty() {
            info!("Chain closed");
            Ok(())
        } else {
            let err = LifecycleError::new(LifecyclePhase::Close, failures);
            warn!(error = %err, "Chain closed with failures");
            Err(err)
        }
    }

    /// Pushes a batch through every processor.
    ///
    /// Returns one entry per lineage, keyed by the record the lineage
    /// started from. Stage failures, including panics, never escape: they
    /// become errored entries for the lineages they hit.
    pub async fn process(&mut self, records: Vec<RecordRef>) -> Vec<SourceRecordAndResult> {
        let span = tracing::debug_span!(
            "chain.process",
            batch_id = %Uuid::new_v4(),
            records = records.len()
        );
        let records_in = records.len();
        let started = Instant::now();
        let results = self.run_stages(records).instrument(span).await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut records_out = 0;
        let mut failed = 0;
        for result in &results {
            match result.outcome() {
                RecordOutcome::Records(records) => records_out += records.len(),
                RecordOutcome::Failed(_) => failed += 1,
            }
        }
        self.metrics.calls += 1;
        self.metrics.records_in += records_in as u64;
        self.metrics.records_out += records_out as u64;
        self.metrics.failed_lineages += failed as u64;
        self.metrics.last_processed_at = Some(Utc::now());

        debug!(records_in, records_out, failed, duration_ms, "Batch processed");
        results
    }

    async fn run_stages(&mut self, records: Vec<RecordRef>) -> Vec<SourceRecordAndResult> {
        let Some((first, rest)) = self.processors.split_first_mut() else {
            return records.into_iter().map(SourceRecordAndResult::pass_through).collect();
        };

        let first_id = first.agent_id().to_string();
        let mut current = match invoke(first.as_mut(), records.clone()).await {
            Ok(results) => reconcile(&first_id, records, results),
            Err(err) => {
                warn!(
                    agent_id = %err.agent_id,
                    stage = 0,
                    error = %err.message,
                    "Stage failed for the whole batch"
                );
                return records
                    .into_iter()
                    .map(|record| SourceRecordAndResult::failed(record, err.clone()))
                    .collect();
            }
        };

        for (index, processor) in rest.iter_mut().enumerate() {
            let stage = index + 1;
            let mut next = Vec::with_capacity(current.len());

            for entry in current {
                let (source, outcome) = entry.into_parts();
                let lineage = match outcome {
                    RecordOutcome::Failed(err) => RecordOutcome::Failed(err),
                    RecordOutcome::Records(records) => {
                        match invoke(processor.as_mut(), records).await {
                            Ok(results) => flatten(results),
                            Err(err) => {
                                warn!(
                                    agent_id = %err.agent_id,
                                    stage,
                                    error = %err.message,
                                    "Stage failed for lineage"
                                );
                                RecordOutcome::Failed(err)
                            }
                        }
                    }
                };
                next.push(SourceRecordAndResult::new(source, lineage));
            }
            current = next;
        }
        current
    }

    /// Reads one batch from the source.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the chain has no source, or a
    /// processing error if the read fails.
    pub async fn read_source(&mut self) -> Result<Vec<RecordRef>, AgentflowError> {
        let source = self
            .source
            .as_mut()
            .ok_or_else(|| ConfigurationError::new("chain has no source"))?;
        let agent_id = source.agent_id().to_string();
        guarded(source.read())
            .await
            .map_err(|err| ProcessingError::from_agent(agent_id, err).into())
    }

    /// Writes records to the sink.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the chain has no sink, or a
    /// processing error if the write fails.
    pub async fn write_sink(&mut self, records: Vec<RecordRef>) -> Result<(), AgentflowError> {
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| ConfigurationError::new("chain has no sink"))?;
        let agent_id = sink.agent_id().to_string();
        guarded(sink.write(records))
            .await
            .map_err(|err| ProcessingError::from_agent(agent_id, err).into())
    }

    /// Runs one read, process, write and commit cycle.
    ///
    /// Records of completed lineages are written to the sink in lineage
    /// order. Failed lineages are reported to the source through
    /// [`AgentSource::permanent_failure`]. The whole batch is committed
    /// once both succeed.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the source or sink is missing, or a
    /// processing error if reading, writing, failure handling or the
    /// commit fails. Nothing is committed in that case.
    pub async fn run_once(&mut self) -> Result<RunSummary, AgentflowError> {
        if self.sink.is_none() {
            return Err(ConfigurationError::new("chain has no sink").into());
        }
        let batch = self.read_source().await?;
        if batch.is_empty() {
            return Ok(RunSummary::default());
        }

        let results = self.process(batch.clone()).await;
        let mut output = Vec::new();
        let mut failed = Vec::new();
        for result in results {
            let (source, outcome) = result.into_parts();
            match outcome {
                RecordOutcome::Records(records) => output.extend(records),
                RecordOutcome::Failed(err) => failed.push((source, err)),
            }
        }

        let summary = RunSummary {
            read: batch.len(),
            written: output.len(),
            failed: failed.len(),
        };
        if !output.is_empty() {
            self.write_sink(output).await?;
        }

        let source = self
            .source
            .as_mut()
            .ok_or_else(|| ConfigurationError::new("chain has no source"))?;
        let agent_id = source.agent_id().to_string();
        for (record, err) in failed {
            let error = AgentError::new(err.kind, err.to_string());
            guarded(source.permanent_failure(&record, error))
                .await
                .map_err(|err| ProcessingError::from_agent(agent_id.clone(), err))?;
        }
        guarded(source.commit(&batch))
            .await
            .map_err(|err| ProcessingError::from_agent(agent_id, err))?;

        debug!(
            read = summary.read,
            written = summary.written,
            failed = summary.failed,
            "Cycle completed"
        );
        Ok(summary)
    }
}

/// Assembles a [`PipelineChain`] from already initialized agents.
#[derive(Debug, Default)]
pub struct ChainBuilder {
    source: Option<Box<dyn AgentSource>>,
    processors: Vec<Box<dyn AgentProcessor>>,
    sink: Option<Box<dyn AgentSink>>,
}

impl ChainBuilder {
    /// Sets the source.
    #[must_use]
    pub fn source(mut self, source: Box<dyn AgentSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Appends a processor.
    #[must_use]
    pub fn processor(mut self, processor: Box<dyn AgentProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Sets the sink.
    #[must_use]
    pub fn sink(mut self, sink: Box<dyn AgentSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Builds the chain.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if two agents share an id.
    pub fn build(self) -> Result<PipelineChain, AgentflowError> {
        let ids = self
            .source
            .iter()
            .map(|s| s.agent_id())
            .chain(self.processors.iter().map(|p| p.agent_id()))
            .chain(self.sink.iter().map(|s| s.agent_id()));

        let mut seen = HashSet::new();
        for id in ids {
            if !seen.insert(id) {
                return Err(ConfigurationError::new(format!("duplicate agent id '{id}' in chain"))
                    .with_agent_id(id)
                    .into());
            }
        }

        Ok(PipelineChain {
            source: self.source,
            processors: self.processors,
            sink: self.sink,
            metrics: ChainMetrics::default(),
        })
    }
}

/// Calls one stage, turning an error or a panic into a [`ProcessingError`].
async fn invoke(
    processor: &mut dyn AgentProcessor,
    records: Vec<RecordRef>,
) -> Result<Vec<SourceRecordAndResult>, ProcessingError> {
    let agent_id = processor.agent_id().to_string();
    guarded(processor.process(records))
        .await
        .map_err(|err| ProcessingError::from_agent(agent_id, err))
}

/// Lines up the first stage's results with the batch it was given.
///
/// Yields exactly one entry per input record, in input order. An input the
/// stage gave no entry for becomes a failed lineage. Entries whose source
/// is not in the batch, or that repeat a source, are dropped.
fn reconcile(
    agent_id: &str,
    records: Vec<RecordRef>,
    results: Vec<SourceRecordAndResult>,
) -> Vec<SourceRecordAndResult> {
    let aligned = results.len() == records.len()
        && results.iter().zip(&records).all(|(result, record)| result.is_from(record));
    if aligned {
        return results;
    }

    let mut pending: Vec<Option<SourceRecordAndResult>> = results.into_iter().map(Some).collect();
    let mut unanswered = 0;
    let reconciled: Vec<_> = records
        .into_iter()
        .map(|record| {
            let found = pending
                .iter_mut()
                .find(|slot| matches!(slot, Some(entry) if entry.is_from(&record)))
                .and_then(Option::take);
            found.unwrap_or_else(|| {
                unanswered += 1;
                let error =
                    ProcessingError::new(agent_id, ErrorKind::Processing, "no result for record");
                SourceRecordAndResult::failed(record, error)
            })
        })
        .collect();

    let stray = pending.iter().flatten().count();
    if unanswered > 0 || stray > 0 {
        warn!(agent_id, unanswered, stray, "Stage results did not match its batch");
    }
    reconciled
}

/// Concatenates the result records of one lineage's sub-results.
///
/// The first error among them fails the lineage.
fn flatten(results: Vec<SourceRecordAndResult>) -> RecordOutcome {
    let mut records = Vec::new();
    for result in results {
        match result.into_parts().1 {
            RecordOutcome::Records(produced) => records.extend(produced),
            RecordOutcome::Failed(err) => return RecordOutcome::Failed(err),
        }
    }
    RecordOutcome::Records(records)
}

async fn guarded<T, F>(future: F) -> Result<T, AgentError>
where
    F: Future<Output = Result<T, AgentError>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(AgentError::panic(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

fn note_failure(
    failures: &mut Vec<AgentFailure>,
    agent_id: String,
    result: Result<(), AgentError>,
) {
    if let Err(err) = result {
        warn!(agent_id = %agent_id, error = %err, "Agent failed to close");
        failures.push(AgentFailure {
            agent_id,
            message: err.message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{records, EchoProcessor, FailingProcessor, PanickingProcessor};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_reconcile_restores_input_order() {
        let input = records(&["a", "b", "c"]);
        let answered = vec![
            SourceRecordAndResult::pass_through(Arc::clone(&input[2])),
            SourceRecordAndResult::pass_through(Arc::clone(&input[0])),
            SourceRecordAndResult::pass_through(Arc::clone(&input[0])),
        ];

        let results = reconcile("stage", input.clone(), answered);

        assert_eq!(results.len(), 3);
        assert!(results.iter().zip(&input).all(|(result, record)| result.is_from(record)));
        assert!(!results[0].is_failed());
        assert_eq!(results[1].error().unwrap().agent_id, "stage");
        assert!(!results[2].is_failed());
    }

    #[test]
    fn test_chain_configuration_treats_empty_entries_as_absent() {
        let config: ChainConfiguration = serde_json::from_value(json!({
            "source": {},
            "processors": null,
            "sink": null,
        }))
        .unwrap();
        assert_eq!(config, ChainConfiguration::default());

        let config: ChainConfiguration = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config, ChainConfiguration::default());
    }

    #[test]
    fn test_chain_configuration_parses_definitions() {
        let configuration = crate::config::configuration_from_json(json!({
            "processors": [
                {"agentId": "a", "agentType": "identity"},
                {
                    "agentId": "b",
                    "agentType": "set-header",
                    "configuration": {"name": "x", "value": 1}
                },
            ],
            "sink": {"agentId": "out", "agentType": "log-event"},
        }));
        let config = ChainConfiguration::from_configuration(&configuration).unwrap();

        assert_eq!(config.processors.len(), 2);
        assert_eq!(config.processors[1].configuration.get("name"), Some(&json!("x")));
        assert_eq!(config.sink.unwrap().agent_id, "out");
        assert!(config.source.is_none());
    }

    #[test]
    fn test_chain_configuration_rejects_malformed_entry() {
        let configuration = crate::config::configuration_from_json(json!({
            "source": {"agentId": "s"},
        }));
        let err = ChainConfiguration::from_configuration(&configuration).unwrap_err();
        assert!(err.message.contains("agentType"));
    }

    #[test]
    fn test_builder_rejects_duplicate_ids() {
        let err = PipelineChain::builder()
            .processor(Box::new(EchoProcessor::new("same")))
            .processor(Box::new(EchoProcessor::new("same")))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate agent id 'same'"));
    }

    #[tokio::test]
    async fn test_empty_chain_passes_records_through() {
        let mut chain = PipelineChain::builder().build().unwrap();
        let input = records(&["a", "b"]);
        let results = chain.process(input.clone()).await;

        assert_eq!(results.len(), 2);
        for (result, record) in results.iter().zip(&input) {
            assert!(result.is_from(record));
            assert!(Arc::ptr_eq(&result.result_records().unwrap()[0], record));
        }
        assert_eq!(chain.metrics().records_out, 2);
    }

    #[tokio::test]
    async fn test_stage_zero_failure_fails_whole_batch() {
        let mut chain = PipelineChain::builder()
            .processor(Box::new(FailingProcessor::always("broken", "down")))
            .processor(Box::new(EchoProcessor::new("after")))
            .build()
            .unwrap();

        let results = chain.process(records(&["a", "b", "c"])).await;

        assert_eq!(results.len(), 3);
        for result in &results {
            let err = result.error().unwrap();
            assert_eq!(err.agent_id, "broken");
            assert_eq!(err.message, "down");
        }
        assert_eq!(chain.metrics().failed_lineages, 3);
        assert_eq!(chain.metrics().records_out, 0);
    }

    #[tokio::test]
    async fn test_panic_is_captured() {
        let mut chain = PipelineChain::builder()
            .processor(Box::new(EchoProcessor::new("first")))
            .processor(Box::new(PanickingProcessor::new("boom")))
            .build()
            .unwrap();

        let results = chain.process(records(&["a"])).await;
        let err = results[0].error().unwrap();
        assert_eq!(err.kind, ErrorKind::Panic);
        assert!(err.message.contains("panicked"));
    }

    #[test]
    fn test_flatten_fails_on_first_error() {
        let source = crate::record::Record::new("s").into_ref();
        let error = ProcessingError::new("p", ErrorKind::Processing, "nope");
        let outcome = flatten(vec![
            SourceRecordAndResult::pass_through(source.clone()),
            SourceRecordAndResult::failed(source.clone(), error.clone()),
        ]);
        assert_eq!(outcome, RecordOutcome::Failed(error));

        let outcome = flatten(vec![
            SourceRecordAndResult::pass_through(source.clone()),
            SourceRecordAndResult::records(source.clone(), Vec::new()),
        ]);
        assert!(matches!(outcome, RecordOutcome::Records(r) if r.len() == 1));
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(&"static"), "panicked: static");
        assert_eq!(panic_message(&String::from("owned")), "panicked: owned");
        assert_eq!(panic_message(&42_u8), "panicked");
    }

    #[tokio::test]
    async fn test_read_and_write_require_capabilities() {
        let mut chain = PipelineChain::builder().build().unwrap();
        assert_eq!(chain.read_source().await.unwrap_err().kind(), ErrorKind::Configuration);
        assert_eq!(
            chain.write_sink(Vec::new()).await.unwrap_err().kind(),
            ErrorKind::Configuration
        );
    }
}
