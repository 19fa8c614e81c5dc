//! JSON file record source
//!
//! Reads a day's exported records from a JSON array on disk. Each element
//! is one record; an `id` field names the record, falling back to its
//! position in the array when absent.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, warn};

use super::{RawRecord, RecordSource, FETCH_PAGE_LIMIT};
use crate::pipeline::errors::{PipelineError, PipelineResult};

pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RecordSource for JsonFileSource {
    async fn fetch_daily_records(&self, as_of: NaiveDate) -> PipelineResult<Vec<RawRecord>> {
        debug!("loading records for {} from {}", as_of, self.path.display());

        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            PipelineError::SourceUnavailable {
                reason: format!("failed to read {}", self.path.display()),
                source: Some(Box::new(e)),
            }
        })?;

        let values: Vec<Value> =
            serde_json::from_str(&contents).map_err(|e| PipelineError::SourceUnavailable {
                reason: format!("{} is not a JSON array of records", self.path.display()),
                source: Some(Box::new(e)),
            })?;

        let total = values.len();
        let mut records: Vec<RawRecord> = values
            .into_iter()
            .enumerate()
            .map(|(index, fields)| {
                let id = fields
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("record-{index}"));
                RawRecord { id, fields }
            })
            .collect();

        if records.len() > FETCH_PAGE_LIMIT {
            warn!(
                "source returned {} records, truncating to page limit {}",
                total, FETCH_PAGE_LIMIT
            );
            records.truncate(FETCH_PAGE_LIMIT);
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
    }

    #[tokio::test]
    async fn test_loads_records_with_ids() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("records.json");
        std::fs::write(
            &path,
            json!([
                {"id": "rec-1", "owner_id": "a"},
                {"id": "rec-2", "owner_id": "b"}
            ])
            .to_string(),
        )
        .unwrap();

        let records = JsonFileSource::new(&path)
            .fetch_daily_records(day())
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "rec-1");
        assert_eq!(records[1].fields["owner_id"], "b");
    }

    #[tokio::test]
    async fn test_missing_id_falls_back_to_position() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("records.json");
        std::fs::write(&path, json!([{"owner_id": "a"}]).to_string()).unwrap();

        let records = JsonFileSource::new(&path)
            .fetch_daily_records(day())
            .await
            .unwrap();
        assert_eq!(records[0].id, "record-0");
    }

    #[tokio::test]
    async fn test_missing_file_is_source_unavailable() {
        let err = JsonFileSource::new("/nonexistent/records.json")
            .fetch_daily_records(day())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_non_array_payload_is_source_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("records.json");
        std::fs::write(&path, "{\"not\": \"an array\"}").unwrap();

        let err = JsonFileSource::new(&path)
            .fetch_daily_records(day())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_fetch_is_bounded_at_page_limit() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("records.json");
        let values: Vec<_> = (0..FETCH_PAGE_LIMIT + 25)
            .map(|i| json!({"id": format!("rec-{i}"), "owner_id": "a"}))
            .collect();
        std::fs::write(&path, Value::Array(values).to_string()).unwrap();

        let records = JsonFileSource::new(&path)
            .fetch_daily_records(day())
            .await
            .unwrap();
        assert_eq!(records.len(), FETCH_PAGE_LIMIT);
    }
}
