//! Core data types for the grouped-aggregation pipeline
//!
//! Facts are the normalized projection of raw records; groups collect facts
//! by owner; summaries are the dispatch-ready aggregate of one group. All of
//! these are serde-serializable so they can ride along in run checkpoints.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sentinel approver id used when no fact in a group carries one.
///
/// A group without an approver still produces a notification; the dispatch
/// boundary maps this sentinel to the configured fallback recipient.
pub const UNKNOWN_APPROVER: &str = "unknown-approver";

/// Normalized, immutable projection of one raw record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Owner identifier used to partition facts. Always equals `owner_id`.
    pub group_key: String,
    /// Identifier of the underlying business document.
    pub document_id: String,
    /// Counterparty named on the transaction.
    pub counterparty_name: String,
    /// Day the transaction occurred.
    pub occurred_on: NaiveDate,
    /// Transaction amount.
    pub amount: Decimal,
    /// Owning agent's identifier.
    pub owner_id: String,
    /// Owning agent's display name.
    pub owner_name: String,
    /// Supervisor who approves this owner's transactions, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_id: Option<String>,
}

/// All facts sharing one group key. Unordered; aggregation must not depend
/// on insertion order.
pub type FactGroup = Vec<Fact>;

/// One display row of a group summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub document_id: String,
    pub counterparty_name: String,
    pub occurred_on: NaiveDate,
    pub amount: Decimal,
    pub document_link: String,
}

/// Aggregated, dispatch-ready representation of one fact group.
///
/// Derived once per group and consumed exactly once by the dispatcher
/// adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group_key: String,
    /// First approver found on any fact in the group, or [`UNKNOWN_APPROVER`].
    pub approver_id: String,
    pub owner_name: String,
    /// Rows in arrival order. Completeness is the correctness property here,
    /// not ordering.
    pub rows: Vec<SummaryRow>,
}

impl GroupSummary {
    /// Sum of all row amounts.
    pub fn total(&self) -> Decimal {
        self.rows.iter().map(|row| row.amount).sum()
    }

    /// Whether the group resolved to a real approver rather than the sentinel.
    pub fn has_known_approver(&self) -> bool {
        self.approver_id != UNKNOWN_APPROVER
    }
}
