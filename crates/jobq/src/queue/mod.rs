//! Queue variants and the common queue trait.
//!
//! Each variant wraps the same store handle under a validated name:
//! [`FifoQueue`] for strict insertion order, [`PriorityQueue`] for
//! lowest-score-first delivery, and [`ReliableQueue`] for at-least-once
//! delivery with claim timestamps. [`QueueKind`] selects a variant at
//! construction time behind the common [`Queue`] trait.

use crate::error::{QueueError, ValidationError};
use crate::store::AtomicStore;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

pub mod fifo;
pub mod priority;
pub mod reliable;

pub use fifo::FifoQueue;
pub use priority::PriorityQueue;
pub use reliable::ReliableQueue;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

// ============================================================================
// QueueName
// ============================================================================

/// Validated queue name with length and character restrictions.
///
/// The name doubles as the store key of the queue's main structure, and
/// derived keys are built by suffixing it, so delimiter characters are
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueName(String);

impl QueueName {
    /// Create new queue name with validation
    pub fn new(name: String) -> Result<Self, ValidationError> {
        // Validate length
        if name.is_empty() || name.len() > 260 {
            return Err(ValidationError::OutOfRange {
                field: "queue_name".to_string(),
                message: "must be 1-260 characters".to_string(),
            });
        }

        // Validate characters (ASCII alphanumeric, hyphens, underscores)
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "only ASCII alphanumeric, hyphens, and underscores allowed".to_string(),
            });
        }

        // Validate no consecutive hyphens or leading/trailing hyphens
        if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "no leading/trailing hyphens or consecutive hyphens".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

// ============================================================================
// Queue Trait
// ============================================================================

/// Operations every queue variant exposes.
///
/// Tokens are opaque byte sequences, typically job ids. Variant-specific
/// behavior beyond this contract lives on the concrete types:
/// [`PriorityQueue::push_with_score`] for explicit priorities and
/// [`ReliableQueue::pop_envelope`] for claim-aware consumption.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Add a token to the queue.
    async fn push(&self, token: Bytes) -> Result<(), QueueError>;

    /// Take the next token, or `None` when nothing is deliverable right now.
    async fn pop(&self) -> Result<Option<Bytes>, QueueError>;

    /// Number of entries currently stored.
    async fn size(&self) -> Result<u64, QueueError>;

    /// Name this queue was created with.
    fn name(&self) -> &QueueName;
}

// ============================================================================
// QueueKind
// ============================================================================

/// Queue variants selectable at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    Fifo,
    Priority,
    Reliable,
}

impl QueueKind {
    /// Build a queue of this kind over the given store.
    pub fn build(self, store: Arc<dyn AtomicStore>, name: QueueName) -> Box<dyn Queue> {
        match self {
            Self::Fifo => Box::new(FifoQueue::new(store, name)),
            Self::Priority => Box::new(PriorityQueue::new(store, name)),
            Self::Reliable => Box::new(ReliableQueue::new(store, name)),
        }
    }

    /// Stable name used in logs and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fifo => "fifo",
            Self::Priority => "priority",
            Self::Reliable => "reliable",
        }
    }
}

impl std::fmt::Display for QueueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QueueKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fifo" => Ok(Self::Fifo),
            "priority" => Ok(Self::Priority),
            "reliable" => Ok(Self::Reliable),
            other => Err(ValidationError::InvalidFormat {
                field: "queue_kind".to_string(),
                message: format!("unknown queue kind '{other}'"),
            }),
        }
    }
}
