//! Shared fakes and builders for pipeline integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};

use daydigest::config::DigestConfig;
use daydigest::dispatch::{DispatchError, Dispatcher, Notification};
use daydigest::pipeline::errors::{PipelineError, PipelineResult};
use daydigest::source::{RawRecord, RecordSource};

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
}

pub fn test_config(state_dir: &Path) -> DigestConfig {
    DigestConfig {
        records_path: "unused.json".into(),
        webhook_url: None,
        state_dir: state_dir.to_path_buf(),
        max_parallel: 4,
        run_timeout: Duration::from_secs(30),
        document_link_base: "https://ledger.example.com/documents".to_string(),
        fallback_recipient: "unassigned-approvals".to_string(),
        author_id: "daydigest".to_string(),
    }
}

pub fn record(id: &str, owner: &str, amount: Value, approver: Option<&str>) -> RawRecord {
    let mut fields = json!({
        "id": id,
        "owner_id": owner,
        "owner_name": format!("Agent {owner}"),
        "document_id": format!("doc-{id}"),
        "counterparty_name": "Acme",
        "occurred_on": "2024-03-14",
        "amount": amount,
    });
    if let Some(approver) = approver {
        fields["approver_id"] = json!(approver);
    }
    RawRecord {
        id: id.to_string(),
        fields,
    }
}

/// Serves a fixed set of records.
pub struct StaticSource {
    pub records: Vec<RawRecord>,
}

#[async_trait]
impl RecordSource for StaticSource {
    async fn fetch_daily_records(&self, _as_of: NaiveDate) -> PipelineResult<Vec<RawRecord>> {
        Ok(self.records.clone())
    }
}

/// Always reports the record store as unreachable.
pub struct FailingSource;

#[async_trait]
impl RecordSource for FailingSource {
    async fn fetch_daily_records(&self, _as_of: NaiveDate) -> PipelineResult<Vec<RawRecord>> {
        Err(PipelineError::SourceUnavailable {
            reason: "record store offline".to_string(),
            source: None,
        })
    }
}

/// Captures sent notifications; optionally rejects specific recipients.
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<Notification>>,
    fail_recipients: HashSet<String>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(recipients: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_recipients: recipients.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn send(&self, notification: &Notification) -> Result<(), DispatchError> {
        if self.fail_recipients.contains(&notification.recipient_id) {
            return Err(DispatchError::new("relay rejected message"));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// All failure events recorded under a state directory, across runs.
pub fn failure_events(state_dir: &Path) -> Vec<Value> {
    let mut events = Vec::new();
    if let Ok(entries) = std::fs::read_dir(state_dir) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with("failures-") && name.ends_with(".jsonl") {
                let contents = std::fs::read_to_string(entry.path()).unwrap();
                for line in contents.lines() {
                    events.push(serde_json::from_str(line).unwrap());
                }
            }
        }
    }
    events
}
