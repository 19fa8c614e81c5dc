//! Reduce stage: aggregate each fact group and request dispatch
//!
//! Runs in parallel across distinct group keys; each key is one worker, so
//! aggregation within a group is strictly sequential. A failed dispatch is
//! recorded and the next group proceeds; nothing here retries in-run or
//! aborts the run.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::dispatch::{Dispatcher, Notification};
use crate::pipeline::errors::PipelineError;
use crate::pipeline::events::{FailureKind, FailureSink};
use crate::pipeline::state::{RunState, RunStateStore};
use crate::pipeline::types::{FactGroup, GroupSummary, SummaryRow, UNKNOWN_APPROVER};

/// Everything a reduce worker needs, cloneable per key.
#[derive(Clone)]
pub struct ReduceContext {
    pub dispatcher: Arc<dyn Dispatcher>,
    pub state: Arc<Mutex<RunState>>,
    pub store: Arc<RunStateStore>,
    pub sink: Arc<FailureSink>,
    pub as_of: NaiveDate,
    pub author_id: String,
    pub fallback_recipient: String,
    pub document_link_base: String,
    pub max_parallel: usize,
}

/// Counts from one reduce phase execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReducePhaseReport {
    pub groups: usize,
    pub dispatched: usize,
    pub skipped_already_dispatched: usize,
    pub failed: usize,
}

/// Derive the summary for one complete fact group. Empty groups produce
/// nothing. Order-independent apart from row order, which is not a
/// correctness property.
pub fn summarize_group(
    group_key: &str,
    facts: &FactGroup,
    document_link_base: &str,
) -> Option<GroupSummary> {
    if facts.is_empty() {
        return None;
    }

    let approver_id = facts
        .iter()
        .find_map(|fact| fact.approver_id.clone())
        .unwrap_or_else(|| UNKNOWN_APPROVER.to_string());

    let rows = facts
        .iter()
        .map(|fact| SummaryRow {
            document_id: fact.document_id.clone(),
            counterparty_name: fact.counterparty_name.clone(),
            occurred_on: fact.occurred_on,
            amount: fact.amount,
            document_link: document_link(document_link_base, &fact.document_id),
        })
        .collect();

    Some(GroupSummary {
        group_key: group_key.to_string(),
        approver_id,
        owner_name: facts[0].owner_name.clone(),
        rows,
    })
}

fn document_link(base: &str, document_id: &str) -> String {
    if base.is_empty() {
        document_id.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), document_id)
    }
}

enum GroupOutcome {
    Dispatched,
    SkippedAlreadyDispatched,
    SkippedEmpty,
    Failed,
}

/// Run the reduce phase over the complete set of groups.
pub async fn run_reduce_phase(
    groups: HashMap<String, FactGroup>,
    ctx: ReduceContext,
) -> ReducePhaseReport {
    let mut report = ReducePhaseReport {
        groups: groups.len(),
        ..Default::default()
    };
    info!(
        "reduce phase: {} groups (max parallel: {})",
        report.groups, ctx.max_parallel
    );

    let semaphore = Arc::new(Semaphore::new(ctx.max_parallel.max(1)));
    let mut workers = FuturesUnordered::new();

    for (group_key, facts) in groups {
        let permit = semaphore.clone().acquire_owned().await.unwrap();
        let ctx = ctx.clone();

        workers.push(tokio::spawn(async move {
            let outcome = dispatch_group(&group_key, &facts, &ctx).await;
            drop(permit);
            outcome
        }));
    }

    while let Some(joined) = workers.next().await {
        match joined {
            Ok(GroupOutcome::Dispatched) => report.dispatched += 1,
            Ok(GroupOutcome::SkippedAlreadyDispatched) => {
                report.skipped_already_dispatched += 1
            }
            Ok(GroupOutcome::SkippedEmpty) => {}
            Ok(GroupOutcome::Failed) => report.failed += 1,
            Err(e) => {
                warn!("reduce worker panicked: {e}");
                report.failed += 1;
            }
        }
    }

    info!(
        "reduce phase complete: {} dispatched, {} already dispatched, {} failed",
        report.dispatched, report.skipped_already_dispatched, report.failed
    );
    report
}

async fn dispatch_group(group_key: &str, facts: &FactGroup, ctx: &ReduceContext) -> GroupOutcome {
    if ctx.state.lock().await.is_dispatched(group_key) {
        debug!("group {group_key} already dispatched in a prior attempt, skipping");
        return GroupOutcome::SkippedAlreadyDispatched;
    }

    let Some(summary) = summarize_group(group_key, facts, &ctx.document_link_base) else {
        return GroupOutcome::SkippedEmpty;
    };

    let notification = Notification::for_summary(
        &summary,
        ctx.as_of,
        &ctx.author_id,
        &ctx.fallback_recipient,
    );

    match ctx.dispatcher.send(&notification).await {
        Ok(()) => {
            let snapshot = {
                let mut state = ctx.state.lock().await;
                state.mark_dispatched(group_key);
                state.clone()
            };
            // A failed checkpoint write here is survivable: worst case the
            // next restart re-reduces a group that was already sent.
            if let Err(err) = ctx.store.save(&snapshot).await {
                warn!("checkpoint write failed after dispatching group {group_key}: {err}");
            }
            info!(
                "dispatched summary for group {} to {}",
                group_key, notification.recipient_id
            );
            GroupOutcome::Dispatched
        }
        Err(send_err) => {
            let err = PipelineError::DispatchFailure {
                group_key: group_key.to_string(),
                reason: send_err.reason,
                source: send_err.source,
            };
            warn!("{err}");
            ctx.sink
                .record(FailureKind::Dispatch, group_key, &err.to_string())
                .await;
            GroupOutcome::Failed
        }
    }
}
