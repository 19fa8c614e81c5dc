//! Structured error types for pipeline runs
//!
//! The taxonomy separates fatal run-level failures (source unavailable,
//! state store faults, bad configuration) from per-unit failures
//! (extraction, dispatch) that are recorded and skipped without aborting
//! the run.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The record source could not be queried. Fatal: there is no partial
    /// run without input.
    #[error("record source unavailable: {reason}")]
    SourceUnavailable {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// One record could not be normalized into a fact. Recorded against the
    /// record id and skipped; never aborts the run.
    #[error("record {record_id} could not be extracted: {reason}")]
    ExtractionFailure { record_id: String, reason: String },

    /// Sending one group's notification failed. Recorded against the group
    /// key and skipped; never aborts the run or retries in-run.
    #[error("dispatch failed for group {group_key}: {reason}")]
    DispatchFailure {
        group_key: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Checkpoint could not be read or written. Fatal: restart safety is
    /// gone without durable state.
    #[error("state store failure at {path}")]
    StateStore {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("invalid configuration: {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    /// The overall run deadline expired. In-flight units are abandoned with
    /// their completion state unrecorded, so a restart retries them.
    #[error("run timed out after {elapsed_secs}s")]
    RunTimeout { elapsed_secs: u64 },
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Whether this error aborts the run rather than one unit of work.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable { .. }
                | Self::StateStore { .. }
                | Self::InvalidConfiguration { .. }
                | Self::RunTimeout { .. }
        )
    }

    /// Short kind label for failure events and categorization.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "source_unavailable",
            Self::ExtractionFailure { .. } => "extraction_failure",
            Self::DispatchFailure { .. } => "dispatch_failure",
            Self::StateStore { .. } => "state_store",
            Self::InvalidConfiguration { .. } => "invalid_configuration",
            Self::RunTimeout { .. } => "run_timeout",
        }
    }
}
