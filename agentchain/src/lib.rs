//! # Agentchain
//!
//! An in-process execution engine for chains of data-processing agents.
//!
//! Agentchain runs an ordered chain of agents (an optional source, any
//! number of processors and an optional sink) with support for:
//!
//! - **Provenance**: every output record stays tied to the input record it
//!   was derived from, across fan-out and every stage
//! - **Failure isolation**: a stage error or panic only fails the lineages
//!   it touched
//! - **Lifecycle management**: ordered start and best-effort close
//! - **Resource cascade**: per-step resources resolved from pipeline
//!   defaults
//! - **Status aggregation**: one status entry per wrapped agent
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use agentchain::prelude::*;
//!
//! let registry = AgentRegistry::with_builtins();
//! let layout: ChainConfiguration = serde_json::from_value(serde_json::json!({
//!     "processors": [
//!         {"agentId": "tag", "agentType": "set-header",
//!          "configuration": {"name": "lang", "value": "en"}},
//!     ],
//! }))?;
//!
//! let mut chain = PipelineChain::from_configuration(&registry, &layout, chrono::Utc::now())?;
//! chain.start().await?;
//! let results = chain.process(vec![Record::new("hello").into_ref()]).await;
//! chain.close().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod agents;
pub mod config;
pub mod errors;
pub mod observability;
pub mod pipeline;
pub mod record;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::agents::{
        AgentCode, AgentContext, AgentCounters, AgentDefinition, AgentIdentity, AgentProcessor,
        AgentRegistry, AgentSink, AgentSource, AgentStatus, ComponentType,
    };
    pub use crate::config::{Configuration, ConfigurationExt};
    pub use crate::errors::{
        AgentError, AgentflowError, ConfigurationError, ErrorKind, LifecycleError,
        ProcessingError,
    };
    pub use crate::observability::{init_logging, LogFormat, LoggingConfig};
    pub use crate::pipeline::{
        ChainConfiguration, CompositeAgentProcessor, EffectiveResources, PipelineChain,
        PipelineDefinition, ResourcesSpec, StepDefinition,
    };
    pub use crate::record::{Header, Record, RecordOutcome, RecordRef, SourceRecordAndResult, Value};
}
