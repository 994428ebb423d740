//! Chain construction and execution.
//!
//! This module provides:
//! - The in-process chain engine with provenance tracking
//! - The composite agent wrapping a chain
//! - Pipeline definitions and resource resolution
//! - Status aggregation

mod chain;
mod composite;
mod model;
mod resources;
mod status;


pub use chain::{ChainBuilder, ChainConfiguration, ChainMetrics, PipelineChain, RunSummary};
pub use composite::CompositeAgentProcessor;
pub use model::{PipelineDefinition, ResolvedStep, StepDefinition};
pub use resources::{resolve, EffectiveResources, ResourcesSpec, DEFAULT_RESOURCE_VALUE};
pub use status::{collect_status, StatusSnapshot};
