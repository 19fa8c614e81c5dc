//! Shuffle stage: thread-safe keyed accumulation of facts
//!
//! Map workers append facts concurrently; once every worker has finished,
//! the coordinator drains the accumulator into per-key groups. Key equality
//! is exact case-sensitive string match on the owner identifier.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::pipeline::types::{Fact, FactGroup};

/// Concurrent accumulator partitioning facts by group key.
#[derive(Default)]
pub struct GroupingAccumulator {
    groups: Mutex<HashMap<String, FactGroup>>,
}

impl GroupingAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one fact to its group. Safe to call from any number of
    /// concurrent map workers.
    pub async fn add(&self, fact: Fact) {
        let mut groups = self.groups.lock().await;
        groups.entry(fact.group_key.clone()).or_default().push(fact);
    }

    pub async fn group_count(&self) -> usize {
        self.groups.lock().await.len()
    }

    /// Drain the accumulated groups. Callers must only invoke this after the
    /// map phase has fully completed: a fact arriving afterwards would be
    /// lost to the reduce stage.
    pub async fn take_groups(&self) -> HashMap<String, FactGroup> {
        std::mem::take(&mut *self.groups.lock().await)
    }
}
