//! Configuration for the digest pipeline
//!
//! Loaded from a YAML file; everything except the records path has a
//! sensible default so a minimal config is one line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::pipeline::errors::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    /// JSON file holding the day's exported transaction records.
    pub records_path: PathBuf,
    /// Endpoint notifications are POSTed to; logs to the console when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// Directory run checkpoints and failure logs live in.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Maximum concurrent map/reduce workers.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    /// Overall run deadline; in-flight work is abandoned past it.
    #[serde(default = "default_run_timeout", with = "humantime_serde")]
    pub run_timeout: Duration,
    /// Base URL summary rows link their document id under.
    #[serde(default)]
    pub document_link_base: String,
    /// Inbox that receives summaries whose group has no approver on any fact.
    #[serde(default = "default_fallback_recipient")]
    pub fallback_recipient: String,
    /// Identity stamped as the notification author.
    #[serde(default = "default_author_id")]
    pub author_id: String,
}

fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("daydigest"))
        .unwrap_or_else(|| PathBuf::from(".daydigest"))
}

fn default_max_parallel() -> usize {
    10
}

fn default_run_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_fallback_recipient() -> String {
    "unassigned-approvals".to_string()
}

fn default_author_id() -> String {
    "daydigest".to_string()
}

impl DigestConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.max_parallel == 0 {
            return Err(PipelineError::InvalidConfiguration {
                field: "max_parallel".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.run_timeout.is_zero() {
            return Err(PipelineError::InvalidConfiguration {
                field: "run_timeout".to_string(),
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}
