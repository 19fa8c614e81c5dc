//! Run coordinator
//!
//! Sequences the fetch, map, shuffle, and reduce phases for one run day,
//! owns the checkpointed run state, and enforces the overall run deadline.
//! Invoking the coordinator again for the same day resumes from the
//! checkpoint: the captured page is reused, completed extractions are not
//! redone, and already-dispatched groups are suppressed.

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::DigestConfig;
use crate::dispatch::Dispatcher;
use crate::pipeline::errors::{PipelineError, PipelineResult};
use crate::pipeline::events::{FailureKind, FailureSink};
use crate::pipeline::extract::run_map_phase;
use crate::pipeline::group::GroupingAccumulator;
use crate::pipeline::reduce::{run_reduce_phase, ReduceContext};
use crate::pipeline::state::{RunState, RunStateStore};
use crate::source::RecordSource;

/// Phase the run terminated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Fetching,
    Mapping,
    Grouping,
    Reducing,
    /// Terminal: every non-empty group was handed to the reduce stage,
    /// regardless of individual dispatch outcomes.
    Done,
    /// Terminal: the source returned zero records; nothing to do.
    Idle,
}

/// Summary of one coordinator invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub as_of: NaiveDate,
    pub phase: RunPhase,
    pub fetched: usize,
    /// Facts extracted by this invocation.
    pub extracted: usize,
    /// Facts reused from a prior attempt's checkpoint.
    pub reused_facts: usize,
    pub extraction_failures: usize,
    pub groups: usize,
    pub dispatched: usize,
    pub skipped_already_dispatched: usize,
    pub dispatch_failures: usize,
}

pub struct RunCoordinator {
    config: DigestConfig,
    source: Arc<dyn RecordSource>,
    dispatcher: Arc<dyn Dispatcher>,
    store: Arc<RunStateStore>,
}

impl RunCoordinator {
    pub fn new(
        config: DigestConfig,
        source: Arc<dyn RecordSource>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        let store = Arc::new(RunStateStore::new(&config.state_dir));
        Self {
            config,
            source,
            dispatcher,
            store,
        }
    }

    /// Execute (or resume) the run for one day under the overall deadline.
    /// On timeout, in-flight units are abandoned with their completion
    /// state unrecorded; the next invocation retries them.
    pub async fn execute(&self, as_of: NaiveDate) -> PipelineResult<RunOutcome> {
        let started = Instant::now();
        match tokio::time::timeout(self.config.run_timeout, self.run(as_of)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("run for {} timed out, abandoning in-flight work", as_of);
                Err(PipelineError::RunTimeout {
                    elapsed_secs: started.elapsed().as_secs(),
                })
            }
        }
    }

    /// Load the checkpoint for a run day without executing anything.
    pub async fn status(&self, as_of: NaiveDate) -> PipelineResult<Option<RunState>> {
        self.store.load(as_of).await
    }

    async fn run(&self, as_of: NaiveDate) -> PipelineResult<RunOutcome> {
        let mut state = match self.store.load(as_of).await? {
            Some(state) => {
                info!(
                    "resuming run {} for {} from checkpoint v{}",
                    state.run_id, as_of, state.checkpoint_version
                );
                state
            }
            None => RunState::new(as_of),
        };
        let run_id = state.run_id;
        let sink = Arc::new(FailureSink::new(&self.config.state_dir, run_id));

        // Fetching
        if !state.fetched {
            info!("fetching records for {}", as_of);
            let records = match self.source.fetch_daily_records(as_of).await {
                Ok(records) => records,
                Err(err) => {
                    sink.record(FailureKind::Fetch, &as_of.to_string(), &err.to_string())
                        .await;
                    return Err(err);
                }
            };
            state.capture_records(records);
            self.store.save(&state).await?;
        } else {
            info!(
                "reusing {} records captured by a prior attempt",
                state.records.len()
            );
        }

        if state.records.is_empty() {
            info!("zero records for {}, run is idle", as_of);
            state.mark_complete();
            self.store.save(&state).await?;
            return Ok(RunOutcome {
                run_id,
                as_of,
                phase: RunPhase::Idle,
                fetched: 0,
                extracted: 0,
                reused_facts: 0,
                extraction_failures: 0,
                groups: 0,
                dispatched: 0,
                skipped_already_dispatched: 0,
                dispatch_failures: 0,
            });
        }

        let fetched = state.records.len();

        // Mapping. Facts checkpointed by a prior attempt are seeded into
        // the accumulator; only unprocessed records go through extraction.
        let accumulator = Arc::new(GroupingAccumulator::new());
        let reused_facts = state.facts.len();
        for fact in state.facts.values() {
            accumulator.add(fact.clone()).await;
        }
        let pending = state.pending_records();

        let state = Arc::new(Mutex::new(state));
        let map_report = run_map_phase(
            pending,
            accumulator.clone(),
            state.clone(),
            sink.clone(),
            self.config.max_parallel,
        )
        .await;
        {
            let snapshot = state.lock().await.clone();
            self.store.save(&snapshot).await?;
        }

        // Grouping. The map phase has fully drained, so the barrier holds
        // and every group is complete.
        let groups = accumulator.take_groups().await;
        let group_count = groups.len();
        info!("grouping produced {} groups", group_count);

        // Reducing
        let reduce_report = run_reduce_phase(
            groups,
            ReduceContext {
                dispatcher: self.dispatcher.clone(),
                state: state.clone(),
                store: self.store.clone(),
                sink: sink.clone(),
                as_of,
                author_id: self.config.author_id.clone(),
                fallback_recipient: self.config.fallback_recipient.clone(),
                document_link_base: self.config.document_link_base.clone(),
                max_parallel: self.config.max_parallel,
            },
        )
        .await;

        // Done
        let mut final_state = state.lock().await;
        final_state.mark_complete();
        self.store.save(&final_state).await?;

        Ok(RunOutcome {
            run_id,
            as_of,
            phase: RunPhase::Done,
            fetched,
            extracted: map_report.extracted,
            reused_facts,
            extraction_failures: final_state.failed_records.len(),
            groups: group_count,
            dispatched: reduce_report.dispatched,
            skipped_already_dispatched: reduce_report.skipped_already_dispatched,
            dispatch_failures: reduce_report.failed,
        })
    }
}
