//! Strict first-in-first-out queue over a store list.

use crate::error::QueueError;
use crate::queue::{Queue, QueueName};
use crate::store::AtomicStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

#[cfg(test)]
#[path = "fifo_tests.rs"]
mod tests;

/// First-in-first-out queue.
///
/// Tokens enter at the head of the backing list and leave from the tail, so
/// pops observe exact producer-insertion order across all clients.
pub struct FifoQueue {
    store: Arc<dyn AtomicStore>,
    name: QueueName,
}

impl FifoQueue {
    /// Create a queue handle over the given store.
    pub fn new(store: Arc<dyn AtomicStore>, name: QueueName) -> Self {
        Self { store, name }
    }
}

#[async_trait]
impl Queue for FifoQueue {
    async fn push(&self, token: Bytes) -> Result<(), QueueError> {
        let length = self
            .store
            .list_push_head(self.name.as_str(), &token)
            .await?;
        debug!(queue = %self.name, length, "token pushed");
        Ok(())
    }

    async fn pop(&self) -> Result<Option<Bytes>, QueueError> {
        Ok(self.store.list_pop_tail(self.name.as_str()).await?)
    }

    async fn size(&self) -> Result<u64, QueueError> {
        Ok(self.store.list_length(self.name.as_str()).await?)
    }

    fn name(&self) -> &QueueName {
        &self.name
    }
}
