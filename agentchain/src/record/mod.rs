//! Record model shared by every agent.
//!
//! - [`Record`] and [`Header`], the immutable unit of data
//! - [`Value`], the typed payload
//! - [`SourceRecordAndResult`], the provenance link between a source record
//!   and what it produced

mod data;
mod result;
mod value;

pub use data::{Header, Record, RecordRef};
pub use result::{RecordOutcome, SourceRecordAndResult};
pub use value::Value;
