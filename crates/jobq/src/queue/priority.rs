//! Score-ordered queue over a store sorted set.

use crate::error::QueueError;
use crate::queue::{Queue, QueueName};
use crate::store::AtomicStore;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

#[cfg(test)]
#[path = "priority_tests.rs"]
mod tests;

/// Priority queue delivering the lowest-scored token first.
///
/// Each token appears at most once: re-pushing an existing token moves its
/// score instead of adding a duplicate. Pops extract the minimum and remove
/// it in one scripted step, so two concurrent consumers can never both
/// receive the same token. The order of equal-scored tokens is whatever the
/// store's member ranking yields; callers must not rely on insertion order
/// between ties.
pub struct PriorityQueue {
    store: Arc<dyn AtomicStore>,
    name: QueueName,
}

impl PriorityQueue {
    /// Create a queue handle over the given store.
    pub fn new(store: Arc<dyn AtomicStore>, name: QueueName) -> Self {
        Self { store, name }
    }

    /// Add a token with an explicit score; lower scores pop first.
    ///
    /// Returns `true` when the token was newly queued and `false` when an
    /// already queued token had its score moved.
    pub async fn push_with_score(&self, token: Bytes, score: f64) -> Result<bool, QueueError> {
        let inserted = self
            .store
            .sorted_set_upsert(self.name.as_str(), &token, score)
            .await?;
        if inserted {
            debug!(queue = %self.name, score, "token added");
        } else {
            debug!(queue = %self.name, score, "token score updated");
        }
        Ok(inserted)
    }
}

#[async_trait]
impl Queue for PriorityQueue {
    /// Trait-level push scores by arrival time, so queues used through the
    /// common interface degrade to approximate insertion order.
    async fn push(&self, token: Bytes) -> Result<(), QueueError> {
        let score = Utc::now().timestamp_millis() as f64;
        self.push_with_score(token, score).await?;
        Ok(())
    }

    async fn pop(&self) -> Result<Option<Bytes>, QueueError> {
        Ok(self.store.sorted_set_pop_min(self.name.as_str()).await?)
    }

    async fn size(&self) -> Result<u64, QueueError> {
        Ok(self
            .store
            .sorted_set_cardinality(self.name.as_str())
            .await?)
    }

    fn name(&self) -> &QueueName {
        &self.name
    }
}
