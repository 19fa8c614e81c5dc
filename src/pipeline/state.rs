//! Run state persistence and checkpointing
//!
//! One checkpoint per run day, written atomically as JSON. The checkpoint
//! carries the durably captured record page, every extracted fact, and the
//! set of dispatched group keys, so an interrupted run resumes without
//! re-fetching, re-extracting completed records, or re-dispatching groups.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::pipeline::errors::{PipelineError, PipelineResult};
use crate::pipeline::types::Fact;
use crate::source::RawRecord;

/// Complete state of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: Uuid,
    pub as_of: NaiveDate,
    /// Page captured from the record source. Reused on resume instead of
    /// re-fetching.
    #[serde(default)]
    pub records: Vec<RawRecord>,
    /// Distinguishes "fetch never completed" from "fetch returned zero
    /// records".
    #[serde(default)]
    pub fetched: bool,
    /// Extracted facts keyed by the id of the record they came from.
    #[serde(default)]
    pub facts: HashMap<String, Fact>,
    pub processed_record_ids: HashSet<String>,
    /// Extraction failures keyed by record id. Not retried within the run.
    #[serde(default)]
    pub failed_records: HashMap<String, String>,
    pub dispatched_group_keys: HashSet<String>,
    pub checkpoint_version: u32,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_complete: bool,
}

impl RunState {
    pub fn new(as_of: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            as_of,
            records: Vec::new(),
            fetched: false,
            facts: HashMap::new(),
            processed_record_ids: HashSet::new(),
            failed_records: HashMap::new(),
            dispatched_group_keys: HashSet::new(),
            checkpoint_version: 0,
            started_at: now,
            updated_at: now,
            is_complete: false,
        }
    }

    /// Durably capture the fetched page so a resumed run never re-queries
    /// the source.
    pub fn capture_records(&mut self, records: Vec<RawRecord>) {
        self.records = records;
        self.fetched = true;
        self.touch();
    }

    pub fn record_fact(&mut self, record_id: &str, fact: Fact) {
        self.facts.insert(record_id.to_string(), fact);
        self.processed_record_ids.insert(record_id.to_string());
        self.touch();
    }

    pub fn record_extraction_failure(&mut self, record_id: &str, reason: &str) {
        self.failed_records
            .insert(record_id.to_string(), reason.to_string());
        self.processed_record_ids.insert(record_id.to_string());
        self.touch();
    }

    pub fn mark_dispatched(&mut self, group_key: &str) {
        self.dispatched_group_keys.insert(group_key.to_string());
        self.touch();
    }

    pub fn is_dispatched(&self, group_key: &str) -> bool {
        self.dispatched_group_keys.contains(group_key)
    }

    /// Records not yet routed to a fact or a recorded extraction failure.
    pub fn pending_records(&self) -> Vec<RawRecord> {
        self.records
            .iter()
            .filter(|record| !self.processed_record_ids.contains(&record.id))
            .cloned()
            .collect()
    }

    pub fn map_phase_complete(&self) -> bool {
        self.fetched && self.processed_record_ids.len() == self.records.len()
    }

    pub fn mark_complete(&mut self) {
        self.is_complete = true;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.checkpoint_version += 1;
    }
}

/// Loads and saves run checkpoints, one JSON file per run day.
pub struct RunStateStore {
    dir: PathBuf,
}

impl RunStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn checkpoint_path(&self, as_of: NaiveDate) -> PathBuf {
        self.dir.join(format!("run-{as_of}.json"))
    }

    pub async fn load(&self, as_of: NaiveDate) -> PipelineResult<Option<RunState>> {
        let path = self.checkpoint_path(as_of);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let state: RunState =
                    serde_json::from_str(&contents).map_err(|e| PipelineError::StateStore {
                        path: path.clone(),
                        source: Box::new(e),
                    })?;
                debug!(
                    "loaded checkpoint v{} for {} from {}",
                    state.checkpoint_version,
                    as_of,
                    path.display()
                );
                Ok(Some(state))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PipelineError::StateStore {
                path,
                source: Box::new(e),
            }),
        }
    }

    /// Atomic replace: write to a temp file, then rename over the
    /// checkpoint. A crash mid-save leaves the previous checkpoint intact.
    pub async fn save(&self, state: &RunState) -> PipelineResult<()> {
        let path = self.checkpoint_path(state.as_of);
        let store_err = |source: Box<dyn std::error::Error + Send + Sync>| {
            PipelineError::StateStore {
                path: path.clone(),
                source,
            }
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| store_err(Box::new(e)))?;

        let payload =
            serde_json::to_string_pretty(state).map_err(|e| store_err(Box::new(e)))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, payload)
            .await
            .map_err(|e| store_err(Box::new(e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| store_err(Box::new(e)))?;

        debug!(
            "saved checkpoint v{} to {}",
            state.checkpoint_version,
            path.display()
        );
        Ok(())
    }
}
