//! Store contract consumed by the queue implementations.
//!
//! Every trait method is one atomic step against the backing store.
//! Multi-step sequences go through [`AtomicStore::run_atomic`], which
//! executes a whole scripted transaction with no other client's operations
//! interleaved; the reliable queue's delivery protocol and the priority
//! queue's pop both depend on that isolation.

use crate::error::StoreError;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;

// ============================================================================
// Scripted Transactions
// ============================================================================

/// Multi-step transactions the store executes in strict isolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicScript {
    /// Tail-remove with claim stamping and lazy retirement of completed
    /// entries. Keys: ring list, completion set. Args: claim stamp.
    ReliablePop,
    /// Exact-envelope delete plus completion-mark cleanup.
    /// Keys: ring list, completion set. Args: envelope, payload.
    ReliableRemove,
    /// Swap a stale envelope for a freshly stamped copy at the head.
    /// Keys: ring list, completion set. Args: old envelope, payload,
    /// new envelope.
    ReliableReprocess,
}

impl AtomicScript {
    /// Stable name used in logs and error reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReliablePop => "reliable_pop",
            Self::ReliableRemove => "reliable_remove",
            Self::ReliableReprocess => "reliable_reprocess",
        }
    }
}

impl std::fmt::Display for AtomicScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Reply delivered whole from a scripted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptReply {
    /// The script produced nothing.
    Nil,
    /// An integer result, such as a removal count.
    Count(i64),
    /// A single binary value.
    Data(Bytes),
    /// An ordered list of binary values.
    Items(Vec<Bytes>),
}

// ============================================================================
// AtomicStore
// ============================================================================

/// Atomic key-value store with list, sorted-set, set, and hash primitives.
///
/// Keys are UTF-8 strings; values and members are opaque byte sequences.
/// Implementations must guarantee that each method is a single atomic step
/// and that [`run_atomic`](Self::run_atomic) isolates its whole sequence.
#[async_trait]
pub trait AtomicStore: Send + Sync {
    // --- lists ---

    /// Insert a value at the head of a list; returns the new length.
    async fn list_push_head(&self, key: &str, value: &[u8]) -> Result<u64, StoreError>;

    /// Remove and return the value at the tail of a list.
    async fn list_pop_tail(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Current length of a list; 0 when the key does not exist.
    async fn list_length(&self, key: &str) -> Result<u64, StoreError>;

    /// Read a range of list entries, head first. Negative indices count
    /// from the tail, -1 being the last entry.
    async fn list_range(&self, key: &str, start: i64, stop: i64)
        -> Result<Vec<Bytes>, StoreError>;

    /// Remove every list entry exactly equal to `value`; returns how many
    /// were removed.
    async fn list_remove_exact(&self, key: &str, value: &[u8]) -> Result<u64, StoreError>;

    // --- sorted sets ---

    /// Insert a member with a score, or update the score of an existing
    /// member. Returns `true` when the member was newly inserted.
    async fn sorted_set_upsert(
        &self,
        key: &str,
        member: &[u8],
        score: f64,
    ) -> Result<bool, StoreError>;

    /// Atomically remove and return the lowest-scored member.
    async fn sorted_set_pop_min(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Number of members in a sorted set.
    async fn sorted_set_cardinality(&self, key: &str) -> Result<u64, StoreError>;

    // --- sets ---

    /// Add a member to a set; returns `true` when it was not already present.
    async fn set_add(&self, key: &str, member: &[u8]) -> Result<bool, StoreError>;

    /// Remove a member from a set; returns `true` when it was present.
    async fn set_remove(&self, key: &str, member: &[u8]) -> Result<bool, StoreError>;

    /// Membership test.
    async fn set_is_member(&self, key: &str, member: &[u8]) -> Result<bool, StoreError>;

    // --- hashes ---

    /// Write multiple hash fields, creating the hash if needed.
    async fn hash_set_fields(
        &self,
        key: &str,
        fields: &[(String, Bytes)],
    ) -> Result<(), StoreError>;

    /// Read a single hash field.
    async fn hash_get_field(&self, key: &str, field: &str) -> Result<Option<Bytes>, StoreError>;

    /// Read all fields of a hash; empty when the key does not exist.
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, Bytes>, StoreError>;

    // --- keys ---

    /// Delete a key of any type; returns `true` when it existed.
    async fn delete_key(&self, key: &str) -> Result<bool, StoreError>;

    // --- scripted transactions ---

    /// Execute a scripted transaction with the isolation guarantee: no other
    /// client's operations interleave with the script's steps, and the reply
    /// is delivered whole.
    async fn run_atomic(
        &self,
        script: AtomicScript,
        keys: &[&str],
        args: &[Bytes],
    ) -> Result<ScriptReply, StoreError>;
}
