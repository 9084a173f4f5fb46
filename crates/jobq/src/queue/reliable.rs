//! At-least-once delivery queue with claim timestamps and lazy completion.
//!
//! One store list acts as a ring: producers and requeues insert at the head,
//! consumers remove from the tail. A claimed-but-unacknowledged entry is
//! re-inserted at the head, so it must traverse the whole remaining ring
//! before it is offered again and every pending entry gets a turn first.
//! Completions are recorded in a side set and applied lazily: the completed
//! entry is physically dropped the next time it reaches the tail, not when
//! [`ReliableQueue::complete`] is called.

use crate::envelope::{self, Envelope};
use crate::error::{QueueError, StoreError};
use crate::queue::{Queue, QueueName};
use crate::store::{AtomicScript, AtomicStore, ScriptReply};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

#[cfg(test)]
#[path = "reliable_tests.rs"]
mod tests;

/// At-least-once delivery queue.
///
/// Every pushed payload stays in the ring until [`remove`](Self::remove)
/// deletes it explicitly or a pop retires it after
/// [`complete`](Self::complete); it is never silently dropped while
/// unacknowledged.
pub struct ReliableQueue {
    store: Arc<dyn AtomicStore>,
    name: QueueName,
    completion_key: String,
}

impl ReliableQueue {
    /// Create a queue handle over the given store.
    pub fn new(store: Arc<dyn AtomicStore>, name: QueueName) -> Self {
        let completion_key = format!("{}:completed", name.as_str());
        Self {
            store,
            name,
            completion_key,
        }
    }

    /// Take one envelope from the tail of the ring.
    ///
    /// Returns `None` when the ring is empty or when this call lazily
    /// retired a completed entry; a retiring pop does not look further even
    /// if other entries remain. An envelope without a claim stamp was
    /// claimed by this very call: the ring copy now carries the current
    /// instant and the caller should begin processing. An envelope with a
    /// stamp is a redelivery of an entry someone claimed at that instant;
    /// the caller decides via [`Envelope::is_stale`] whether to keep
    /// waiting, [`remove`](Self::remove) it, or
    /// [`reprocess`](Self::reprocess) it.
    pub async fn pop_envelope(&self) -> Result<Option<Envelope>, QueueError> {
        let stamp = Bytes::from(Utc::now().timestamp().to_string());
        let reply = self
            .store
            .run_atomic(
                AtomicScript::ReliablePop,
                &[self.name.as_str(), &self.completion_key],
                &[stamp],
            )
            .await?;
        match reply {
            ScriptReply::Nil => Ok(None),
            ScriptReply::Items(items) => match items.as_slice() {
                [payload, stamp] => {
                    let envelope = match envelope::parse_stamp(stamp)? {
                        Some(claimed_at) => Envelope::claimed(payload.clone(), claimed_at),
                        None => Envelope::unclaimed(payload.clone()),
                    };
                    Ok(Some(envelope))
                }
                _ => Err(QueueError::Store(StoreError::unexpected_reply(
                    AtomicScript::ReliablePop.name(),
                    format!("expected a payload and stamp pair, got {} items", items.len()),
                ))),
            },
            other => Err(QueueError::Store(StoreError::unexpected_reply(
                AtomicScript::ReliablePop.name(),
                format!("{other:?}"),
            ))),
        }
    }

    /// Mark a payload as done.
    ///
    /// The ring is not touched here; the entry is dropped the next time it
    /// reaches the tail during a pop.
    pub async fn complete(&self, payload: &[u8]) -> Result<(), QueueError> {
        self.store.set_add(&self.completion_key, payload).await?;
        debug!(queue = %self.name, "payload marked complete");
        Ok(())
    }

    /// Delete every ring entry exactly matching this envelope, stamp
    /// included, and clear the payload's completion mark. Returns the
    /// number of entries deleted; clearing an absent completion mark is a
    /// no-op, so the call is idempotent.
    pub async fn remove(&self, envelope: &Envelope) -> Result<u64, QueueError> {
        let reply = self
            .store
            .run_atomic(
                AtomicScript::ReliableRemove,
                &[self.name.as_str(), &self.completion_key],
                &[envelope.encode(), envelope.payload().clone()],
            )
            .await?;
        match reply {
            ScriptReply::Count(removed) => {
                debug!(queue = %self.name, removed, "envelope removed");
                Ok(removed.max(0) as u64)
            }
            other => Err(QueueError::Store(StoreError::unexpected_reply(
                AtomicScript::ReliableRemove.name(),
                format!("{other:?}"),
            ))),
        }
    }

    /// Reclaim an abandoned entry: delete the envelope carrying
    /// `(payload, claimed_at)`, clear any stale completion mark for the
    /// payload, and insert a copy stamped with the current instant at the
    /// head. Returns the payload.
    ///
    /// The fresh copy is inserted even when no envelope matched the old
    /// stamp, so racing a concurrent `remove` can resurrect the entry.
    pub async fn reprocess(&self, payload: Bytes, claimed_at: i64) -> Result<Bytes, QueueError> {
        let stale = Envelope::claimed(payload.clone(), claimed_at).encode();
        let fresh = Envelope::claimed(payload.clone(), Utc::now().timestamp()).encode();
        let reply = self
            .store
            .run_atomic(
                AtomicScript::ReliableReprocess,
                &[self.name.as_str(), &self.completion_key],
                &[stale, payload, fresh],
            )
            .await?;
        match reply {
            ScriptReply::Data(payload) => {
                debug!(queue = %self.name, "envelope requeued with fresh claim");
                Ok(payload)
            }
            other => Err(QueueError::Store(StoreError::unexpected_reply(
                AtomicScript::ReliableReprocess.name(),
                format!("{other:?}"),
            ))),
        }
    }

    /// Snapshot of the full ring, head first. Diagnostic only; the ring
    /// can change before the result is read.
    pub async fn items(&self) -> Result<Vec<Envelope>, QueueError> {
        let entries = self.store.list_range(self.name.as_str(), 0, -1).await?;
        let mut envelopes = Vec::with_capacity(entries.len());
        for entry in entries {
            envelopes.push(Envelope::decode(&entry)?);
        }
        Ok(envelopes)
    }
}

#[async_trait]
impl Queue for ReliableQueue {
    async fn push(&self, token: Bytes) -> Result<(), QueueError> {
        let envelope = Envelope::unclaimed(token);
        let length = self
            .store
            .list_push_head(self.name.as_str(), &envelope.encode())
            .await?;
        debug!(queue = %self.name, length, "envelope pushed");
        Ok(())
    }

    /// Claim-blind pop: the payload without its claim metadata. Consumers
    /// that honor visibility timeouts use
    /// [`pop_envelope`](ReliableQueue::pop_envelope) instead.
    async fn pop(&self) -> Result<Option<Bytes>, QueueError> {
        Ok(self.pop_envelope().await?.map(Envelope::into_payload))
    }

    /// Ring length, counting claimed and completed-but-unretired entries.
    async fn size(&self) -> Result<u64, QueueError> {
        Ok(self.store.list_length(self.name.as_str()).await?)
    }

    fn name(&self) -> &QueueName {
        &self.name
    }
}
