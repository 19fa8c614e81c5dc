//! Operator-facing failure sink
//!
//! Every stage-level failure (fetch, extraction, dispatch) is appended as a
//! JSONL event alongside the run checkpoint, carrying enough context to
//! diagnose without re-running. Sink write errors are logged but never fail
//! the unit that reported them.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

/// Which stage the failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Fetch,
    Extraction,
    Dispatch,
}

/// One recorded failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEvent {
    pub timestamp: DateTime<Utc>,
    pub run_id: Uuid,
    pub kind: FailureKind,
    /// Record id or group key, depending on the stage.
    pub unit_id: String,
    pub message: String,
}

/// Append-only JSONL failure log for one run.
pub struct FailureSink {
    path: PathBuf,
    run_id: Uuid,
    write_lock: Mutex<()>,
}

impl FailureSink {
    pub fn new(dir: &Path, run_id: Uuid) -> Self {
        Self {
            path: dir.join(format!("failures-{run_id}.jsonl")),
            run_id,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one failure. Never propagates an error: a broken sink must
    /// not take down the unit that reported the failure.
    pub async fn record(&self, kind: FailureKind, unit_id: &str, message: &str) {
        let event = FailureEvent {
            timestamp: Utc::now(),
            run_id: self.run_id,
            kind,
            unit_id: unit_id.to_string(),
            message: message.to_string(),
        };
        if let Err(err) = self.append(&event).await {
            warn!("failed to write failure event for {unit_id}: {err}");
        }
    }

    async fn append(&self, event: &FailureEvent) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_string(event)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}
