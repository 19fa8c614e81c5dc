//! Map stage: per-record fact extraction
//!
//! Each raw record is normalized into a fact tagged with its owner's group
//! key, or converted into a recorded extraction failure. Malformed input
//! never raises past this stage: the failure is written to the sink and the
//! record's siblings keep flowing.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::pipeline::errors::{PipelineError, PipelineResult};
use crate::pipeline::events::{FailureKind, FailureSink};
use crate::pipeline::group::GroupingAccumulator;
use crate::pipeline::state::RunState;
use crate::pipeline::types::Fact;
use crate::source::RawRecord;

/// Counts from one map phase execution.
#[derive(Debug, Clone, Copy)]
pub struct MapPhaseReport {
    pub total: usize,
    pub extracted: usize,
    pub failed: usize,
}

/// Normalize one raw record into a fact. Pure field projection.
pub fn extract_fact(record: &RawRecord) -> PipelineResult<Fact> {
    let fields = &record.fields;

    let owner_id = required_string(fields, "owner_id", &record.id)?;
    let owner_name = optional_string(fields, "owner_name").unwrap_or_else(|| owner_id.clone());
    let document_id = optional_string(fields, "document_id").unwrap_or_else(|| record.id.clone());
    let counterparty_name = optional_string(fields, "counterparty_name").unwrap_or_default();
    let occurred_on = parse_date(fields, "occurred_on", &record.id)?;
    let amount = parse_amount(fields, "amount", &record.id)?;
    let approver_id = parse_approver(fields.get("approver_id"));

    Ok(Fact {
        group_key: owner_id.clone(),
        document_id,
        counterparty_name,
        occurred_on,
        amount,
        owner_id,
        owner_name,
        approver_id,
    })
}

/// Run the map phase over the pending records with a bounded worker pool.
///
/// Facts land in the accumulator and the run state; failures land in the
/// sink and the run state. Both sides count a record as processed, so the
/// shuffle barrier is reached even when extractions fail.
pub async fn run_map_phase(
    pending: Vec<RawRecord>,
    accumulator: Arc<GroupingAccumulator>,
    state: Arc<Mutex<RunState>>,
    sink: Arc<FailureSink>,
    max_parallel: usize,
) -> MapPhaseReport {
    let total = pending.len();
    info!(
        "map phase: {} records pending (max parallel: {})",
        total, max_parallel
    );

    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
    let mut workers = FuturesUnordered::new();

    for record in pending {
        let permit = semaphore.clone().acquire_owned().await.unwrap();
        let accumulator = accumulator.clone();
        let state = state.clone();
        let sink = sink.clone();

        workers.push(tokio::spawn(async move {
            let extracted = match extract_fact(&record) {
                Ok(fact) => {
                    debug!(
                        "extracted fact for record {} (group {})",
                        record.id, fact.group_key
                    );
                    accumulator.add(fact.clone()).await;
                    state.lock().await.record_fact(&record.id, fact);
                    true
                }
                Err(err) => {
                    warn!("{err}");
                    sink.record(FailureKind::Extraction, &record.id, &err.to_string())
                        .await;
                    state
                        .lock()
                        .await
                        .record_extraction_failure(&record.id, &err.to_string());
                    false
                }
            };
            drop(permit);
            extracted
        }));
    }

    let mut extracted = 0;
    let mut failed = 0;
    while let Some(joined) = workers.next().await {
        match joined {
            Ok(true) => extracted += 1,
            Ok(false) => failed += 1,
            Err(e) => {
                warn!("map worker panicked: {e}");
                failed += 1;
            }
        }
    }

    info!(
        "map phase complete: {} extracted, {} failed of {}",
        extracted, failed, total
    );
    MapPhaseReport {
        total,
        extracted,
        failed,
    }
}

fn extraction_failure(record_id: &str, reason: impl Into<String>) -> PipelineError {
    PipelineError::ExtractionFailure {
        record_id: record_id.to_string(),
        reason: reason.into(),
    }
}

fn optional_string(fields: &Value, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required_string(fields: &Value, key: &str, record_id: &str) -> PipelineResult<String> {
    optional_string(fields, key)
        .ok_or_else(|| extraction_failure(record_id, format!("missing {key} field")))
}

fn parse_date(fields: &Value, key: &str, record_id: &str) -> PipelineResult<chrono::NaiveDate> {
    let raw = required_string(fields, key, record_id)?;
    raw.parse()
        .map_err(|_| extraction_failure(record_id, format!("malformed {key} value '{raw}'")))
}

fn parse_amount(fields: &Value, key: &str, record_id: &str) -> PipelineResult<Decimal> {
    let value = fields
        .get(key)
        .ok_or_else(|| extraction_failure(record_id, format!("missing {key} field")))?;

    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(extraction_failure(
                record_id,
                format!("malformed {key} value '{other}'"),
            ))
        }
    };

    raw.parse()
        .map_err(|_| extraction_failure(record_id, format!("malformed {key} value '{raw}'")))
}

/// The source encodes "no approver" as either an absent field or a negative
/// placeholder id; both normalize to `None`.
fn parse_approver(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => n
            .as_i64()
            .filter(|id| *id >= 0)
            .map(|id| id.to_string()),
        _ => None,
    }
}
