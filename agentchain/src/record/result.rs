//! Provenance-carrying results of a processing stage.

use super::RecordRef;
use crate::errors::ProcessingError;
use std::sync::Arc;

/// What a source record has produced so far.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// The ordered records derived from the source record.
    Records(Vec<RecordRef>),
    /// The lineage failed.
    Failed(ProcessingError),
}

/// Ties one source record to the records it produced, or to the error that
/// stopped its lineage.
///
/// Exactly one of results and error is present; the enum makes the other
/// combinations unrepresentable.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecordAndResult {
    source: RecordRef,
    outcome: RecordOutcome,
}

impl SourceRecordAndResult {
    /// Creates a result from its parts.
    #[must_use]
    pub fn new(source: RecordRef, outcome: RecordOutcome) -> Self {
        Self { source, outcome }
    }

    /// A successful result.
    #[must_use]
    pub fn records(source: RecordRef, records: Vec<RecordRef>) -> Self {
        Self::new(source, RecordOutcome::Records(records))
    }

    /// A failed result.
    #[must_use]
    pub fn failed(source: RecordRef, error: ProcessingError) -> Self {
        Self::new(source, RecordOutcome::Failed(error))
    }

    /// The record mapped to itself.
    #[must_use]
    pub fn pass_through(source: RecordRef) -> Self {
        let records = vec![Arc::clone(&source)];
        Self::records(source, records)
    }

    /// The originating record.
    #[must_use]
    pub fn source_record(&self) -> &RecordRef {
        &self.source
    }

    /// The outcome.
    #[must_use]
    pub fn outcome(&self) -> &RecordOutcome {
        &self.outcome
    }

    /// Result records, if the lineage succeeded.
    #[must_use]
    pub fn result_records(&self) -> Option<&[RecordRef]> {
        match &self.outcome {
            RecordOutcome::Records(records) => Some(records),
            RecordOutcome::Failed(_) => None,
        }
    }

    /// The error, if the lineage failed.
    #[must_use]
    pub fn error(&self) -> Option<&ProcessingError> {
        match &self.outcome {
            RecordOutcome::Records(_) => None,
            RecordOutcome::Failed(err) => Some(err),
        }
    }

    /// Returns true if the lineage failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, RecordOutcome::Failed(_))
    }

    /// Splits into source record and outcome.
    #[must_use]
    pub fn into_parts(self) -> (RecordRef, RecordOutcome) {
        (self.source, self.outcome)
    }

    /// Returns true if `record` is this entry's source, by identity.
    #[must_use]
    pub fn is_from(&self, record: &RecordRef) -> bool {
        Arc::ptr_eq(&self.source, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::record::Record;

    #[test]
    fn test_pass_through_maps_record_to_itself() {
        let record = Record::new("a").into_ref();
        let result = SourceRecordAndResult::pass_through(Arc::clone(&record));

        assert!(result.is_from(&record));
        let records = result.result_records().unwrap();
        assert_eq!(records.len(), 1);
        assert!(Arc::ptr_eq(&records[0], &record));
        assert!(result.error().is_none());
    }

    #[test]
    fn test_failed_has_no_records() {
        let record = Record::new("a").into_ref();
        let error = ProcessingError::new("p", ErrorKind::Processing, "bad");
        let result = SourceRecordAndResult::failed(record, error.clone());

        assert!(result.is_failed());
        assert!(result.result_records().is_none());
        assert_eq!(result.error(), Some(&error));
    }

    #[test]
    fn test_identity_is_by_handle_not_value() {
        let a = Record::new("same").into_ref();
        let b = Record::new("same").into_ref();
        let result = SourceRecordAndResult::pass_through(Arc::clone(&a));

        assert!(result.is_from(&a));
        assert!(!result.is_from(&b));
    }
}
