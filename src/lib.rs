//! # daydigest
//!
//! Batch pipeline that, on a recurring trigger, fetches a day's transaction
//! records, groups them by owning agent, aggregates each group, and
//! dispatches exactly one summary notification per group to that agent's
//! supervisor.
//!
//! ## Modules
//!
//! - `config` - YAML configuration for runs
//! - `dispatch` - Notification rendering and transport boundary
//! - `pipeline` - Map / shuffle / reduce engine, run state, coordinator
//! - `source` - Record source boundary and JSON file implementation
pub mod config;
pub mod dispatch;
pub mod pipeline;
pub mod source;
