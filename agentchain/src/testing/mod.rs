//! Testing utilities for agent chains.
//!
//! This module provides:
//! - Test agents covering every capability and failure mode
//! - Fixtures for records, contexts and registries
//! - Assertions over provenance-carrying results

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_lineage_failed, assert_lineage_values, assert_sources, count_failed, count_records,
};
pub use fixtures::{records, register_test_agents, TestContext};
pub use mocks::{
    DuplicateProcessor, EchoProcessor, FailingProcessor, FailurePolicy, LifecycleLog,
    LifecycleProbe, PanickingProcessor, PartialProcessor, RecordingSink, SourceLedger,
    StaticSource,
};
