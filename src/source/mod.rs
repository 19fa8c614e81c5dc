//! Record source abstraction
//!
//! The pipeline consumes raw records through the [`RecordSource`] trait so
//! the actual record store stays behind a narrow seam. [`JsonFileSource`]
//! is the production implementation, reading a day's exported records from
//! a JSON array on disk.

mod json_file;

pub use json_file::JsonFileSource;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::errors::PipelineResult;

/// A single fetch is capped at this many records by the source.
pub const FETCH_PAGE_LIMIT: usize = 1000;

/// An opaque, source-defined record: an identifier plus typed field values.
/// Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    pub fields: Value,
}

/// Supplies the day's raw transaction records.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch the records for one day, bounded at [`FETCH_PAGE_LIMIT`] per
    /// call. Errors here are fatal to the run: there is no partial pipeline
    /// run without input.
    async fn fetch_daily_records(&self, as_of: NaiveDate) -> PipelineResult<Vec<RawRecord>>;
}
