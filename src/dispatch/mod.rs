//! Notification dispatch boundary
//!
//! The pipeline hands each group summary to a [`Dispatcher`], which renders
//! and sends exactly one message. Send failures are reported back to the
//! reduce stage, which records them and moves on; nothing here may abort
//! the run.

mod webhook;

pub use webhook::WebhookDispatcher;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::pipeline::types::GroupSummary;

/// One rendered, addressable message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub author_id: String,
    pub recipient_id: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// Render one group summary into its notification. Summaries whose
    /// approver resolved to the sentinel are routed to the fallback
    /// recipient instead of being dropped.
    pub fn for_summary(
        summary: &GroupSummary,
        as_of: NaiveDate,
        author_id: &str,
        fallback_recipient: &str,
    ) -> Self {
        let recipient_id = if summary.has_known_approver() {
            summary.approver_id.clone()
        } else {
            fallback_recipient.to_string()
        };

        Self {
            author_id: author_id.to_string(),
            recipient_id,
            subject: format!(
                "{}, review your summary for {}",
                summary.owner_name, as_of
            ),
            body: render_body(summary),
        }
    }
}

fn render_body(summary: &GroupSummary) -> String {
    let mut body = String::new();
    for row in &summary.rows {
        body.push_str(&format!(
            "{}  {}  {}  {}  {}\n",
            row.occurred_on, row.document_id, row.counterparty_name, row.amount, row.document_link
        ));
    }
    body.push_str(&format!(
        "Total: {} across {} transaction(s)\n",
        summary.total(),
        summary.rows.len()
    ));
    body
}

/// A failed send attempt.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct DispatchError {
    pub reason: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DispatchError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            source: None,
        }
    }
}

/// Sends one notification per group summary.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), DispatchError>;
}

/// Logs notifications instead of sending them. Used when no webhook is
/// configured, and for dry runs.
pub struct ConsoleDispatcher;

#[async_trait]
impl Dispatcher for ConsoleDispatcher {
    async fn send(&self, notification: &Notification) -> Result<(), DispatchError> {
        info!(
            "notification to {}: {}",
            notification.recipient_id, notification.subject
        );
        debug!("{}", notification.body);
        Ok(())
    }
}
