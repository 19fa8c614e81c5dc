//! Two-phase grouped-aggregation batch engine
//!
//! Fan-out map over raw records, keyed shuffle into per-owner groups, and a
//! group-and-reduce pass that dispatches one summary notification per
//! group. Built around per-unit failure isolation and checkpointed restart
//! safety: one bad record or one failed send never suppresses notifications
//! for unrelated groups.

pub mod coordinator;
pub mod errors;
pub mod events;
pub mod extract;
pub mod group;
pub mod reduce;
pub mod state;
pub mod types;

pub use coordinator::{RunCoordinator, RunOutcome, RunPhase};
pub use errors::{PipelineError, PipelineResult};
