//! Assertions over chain results.

use std::sync::Arc;

use crate::record::{RecordRef, SourceRecordAndResult};

/// Asserts that results are keyed by `sources`, one entry each, in order,
/// compared by identity.
pub fn assert_sources(results: &[SourceRecordAndResult], sources: &[RecordRef]) {
    assert_eq!(
        results.len(),
        sources.len(),
        "Expected {} lineages, got {}",
        sources.len(),
        results.len()
    );
    for (index, (result, source)) in results.iter().zip(sources).enumerate() {
        assert!(
            Arc::ptr_eq(result.source_record(), source),
            "Lineage {index} is keyed by {:?}, expected {:?}",
            result.source_record().value,
            source.value
        );
    }
}

/// Asserts that a lineage succeeded with records of the given string values.
pub fn assert_lineage_values(result: &SourceRecordAndResult, expected: &[&str]) {
    let records = result.result_records().unwrap_or_else(|| {
        panic!(
            "Expected lineage of {:?} to succeed, got error: {:?}",
            result.source_record().value,
            result.error()
        )
    });
    let values: Vec<String> = records.iter().map(|r| r.value.to_string()).collect();
    assert_eq!(
        values,
        expected,
        "Unexpected records for lineage {:?}",
        result.source_record().value
    );
}

/// Asserts that a lineage failed because of the given agent.
pub fn assert_lineage_failed(result: &SourceRecordAndResult, agent_id: &str) {
    let error = result.error().unwrap_or_else(|| {
        panic!(
            "Expected lineage of {:?} to fail, got records: {:?}",
            result.source_record().value,
            result.result_records()
        )
    });
    assert_eq!(error.agent_id, agent_id, "Lineage failed in an unexpected agent: {error}");
}

/// Number of lineages that failed.
#[must_use]
pub fn count_failed(results: &[SourceRecordAndResult]) -> usize {
    results.iter().filter(|r| r.is_failed()).count()
}

/// Total records produced by lineages that succeeded.
#[must_use]
pub fn count_records(results: &[SourceRecordAndResult]) -> usize {
    results
        .iter()
        .filter_map(SourceRecordAndResult::result_records)
        .map(<[RecordRef]>::len)
        .sum()
}
