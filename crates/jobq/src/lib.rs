//! # Jobq
//!
//! Job queues layered over an atomic key-value store, with a blocking
//! submit client for request/response style dispatch.
//!
//! This library provides:
//! - FIFO, priority, and reliable queue flavours behind one trait
//! - At-least-once delivery with lazy completion for the reliable queue
//! - A client that persists a job, enqueues its id, and polls the outcome
//! - Redis and in-memory store backends
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for store, queue, and codec failures
//! - [`store`] - The atomic store trait queues are built on
//! - [`stores`] - Redis and in-memory store backends
//! - [`envelope`] - Wire format for reliable queue entries
//! - [`queue`] - Queue flavours and the shared [`queue::Queue`] trait
//! - [`job`] - Job records and their lifecycle states
//! - [`client`] - The blocking submit client

// Module declarations
pub mod client;
pub mod envelope;
pub mod error;
pub mod job;
pub mod queue;
pub mod store;
pub mod stores;

// Re-export commonly used types at crate root for convenience
pub use client::{JobClient, JobClientConfig};
pub use envelope::Envelope;
pub use error::{CodecError, QueueError, StoreError, ValidationError};
pub use job::{Job, JobStatus};
pub use queue::{FifoQueue, PriorityQueue, Queue, QueueKind, QueueName, ReliableQueue};
pub use store::{AtomicScript, AtomicStore, ScriptReply};
pub use stores::{InMemoryStore, RedisStore, RedisStoreConfig};
