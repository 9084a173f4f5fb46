//! Blocking submit client: persist a job, enqueue its id, poll for the
//! outcome.

use crate::error::QueueError;
use crate::job::{Job, JobStatus};
use crate::queue::{Queue, QueueKind, QueueName};
use crate::store::AtomicStore;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

// ============================================================================
// JobClientConfig
// ============================================================================

/// Polling behaviour for [`JobClient::send`].
#[derive(Debug, Clone)]
pub struct JobClientConfig {
    /// Longest a submission waits for a terminal status when the caller
    /// gives no per-job timeout.
    pub max_poll_time: Duration,
    /// Pause between status reads.
    pub poll_freq: Duration,
}

impl Default for JobClientConfig {
    fn default() -> Self {
        Self {
            max_poll_time: Duration::from_secs(120),
            poll_freq: Duration::from_secs(1),
        }
    }
}

// ============================================================================
// JobClient
// ============================================================================

/// Submits jobs through a queue and waits for workers to resolve them.
///
/// `send` writes the job record as a hash keyed by the job id, pushes the id
/// onto the queue, and polls the record's `status` field until it turns
/// terminal or the deadline passes. On deadline the client marks the record
/// `expire` itself. The finished record is read back, deleted from the
/// store, and returned.
///
/// The expiry write does not coordinate with workers. A worker finishing
/// right at the deadline races the client's `expire` write and the last
/// writer wins, so a returned `expire` record can shadow a result the
/// worker produced moments later.
pub struct JobClient {
    store: Arc<dyn AtomicStore>,
    queue: Box<dyn Queue>,
    config: JobClientConfig,
}

impl JobClient {
    /// Client with default polling behaviour.
    pub fn new(store: Arc<dyn AtomicStore>, name: QueueName, kind: QueueKind) -> Self {
        Self::with_config(store, name, kind, JobClientConfig::default())
    }

    /// Client with explicit polling behaviour.
    pub fn with_config(
        store: Arc<dyn AtomicStore>,
        name: QueueName,
        kind: QueueKind,
        config: JobClientConfig,
    ) -> Self {
        let queue = kind.build(Arc::clone(&store), name);
        Self {
            store,
            queue,
            config,
        }
    }

    /// Number of tokens currently queued.
    pub async fn qsize(&self) -> Result<u64, QueueError> {
        self.queue.size().await
    }

    /// Submit a payload and wait for the outcome.
    ///
    /// Blocks for up to `timeout` (or the configured `max_poll_time`) and
    /// returns the final record, which carries the worker's result or
    /// errors, or status `expire` when the deadline passed first. The
    /// record is removed from the store before returning.
    pub async fn send(&self, payload: Bytes, timeout: Option<Duration>) -> Result<Job, QueueError> {
        let job = Job::new(payload, timeout);
        let key = job.id.clone();

        self.store.hash_set_fields(&key, &job.to_fields()).await?;
        self.queue.push(Bytes::from(key.clone())).await?;
        debug!(queue = %self.queue.name(), key, "job submitted");

        self.poll(&key, timeout).await?;

        let fields = self.store.hash_get_all(&key).await?;
        let job = Job::from_fields(&key, &fields)?;
        self.store.delete_key(&key).await?;
        Ok(job)
    }

    /// Poll the record until its status is terminal or the deadline passes.
    async fn poll(&self, key: &str, timeout: Option<Duration>) -> Result<(), QueueError> {
        let deadline = Instant::now() + timeout.unwrap_or(self.config.max_poll_time);
        loop {
            if Instant::now() >= deadline {
                warn!(queue = %self.queue.name(), key, "deadline passed, marking job expired");
                self.store
                    .hash_set_fields(
                        key,
                        &[(
                            "status".to_string(),
                            Bytes::from(JobStatus::Expire.as_str()),
                        )],
                    )
                    .await?;
                return Ok(());
            }

            if let Some(status) = self.read_status(key).await? {
                if status.is_terminal() {
                    debug!(queue = %self.queue.name(), key, %status, "job finished");
                    return Ok(());
                }
            }

            sleep(self.config.poll_freq).await;
        }
    }

    /// Current status of the record, or `None` while no status is readable.
    async fn read_status(&self, key: &str) -> Result<Option<JobStatus>, QueueError> {
        let raw = match self.store.hash_get_field(key, "status").await? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let text = std::str::from_utf8(&raw)
            .map_err(|_| QueueError::malformed_record(key, "field 'status' is not valid UTF-8"))?;
        let status = text
            .parse::<JobStatus>()
            .map_err(|err| QueueError::malformed_record(key, err.to_string()))?;
        Ok(Some(status))
    }
}
