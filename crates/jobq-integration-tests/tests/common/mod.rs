//! Common test utilities for jobq integration tests
//!
//! This module provides:
//! - Fresh in-memory stores and collision-free queue names
//! - A minimal worker that resolves one submitted job

use bytes::Bytes;
use chrono::Utc;
use jobq::{AtomicStore, InMemoryStore, Job, JobStatus, QueueKind, QueueName};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use uuid::Uuid;

/// Fresh store shared by the handles under test.
#[allow(dead_code)]
pub fn test_store() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::new())
}

/// Queue name that cannot collide across tests sharing a store.
#[allow(dead_code)]
pub fn unique_name(prefix: &str) -> QueueName {
    QueueName::new(format!("{prefix}_{}", Uuid::new_v4().simple())).unwrap()
}

/// Raw store key that cannot collide across tests.
#[allow(dead_code)]
pub fn unique_key(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

/// Worker that resolves the first submitted job by echoing its payload
/// back as the result.
#[allow(dead_code)]
pub fn spawn_echo_worker(
    store: Arc<InMemoryStore>,
    name: QueueName,
    kind: QueueKind,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let queue = kind.build(store.clone(), name);
        loop {
            let Some(token) = queue.pop().await.unwrap() else {
                sleep(Duration::from_millis(20)).await;
                continue;
            };

            let key = String::from_utf8(token.to_vec()).unwrap();
            let record = store.hash_get_all(&key).await.unwrap();
            let job = Job::from_fields(&key, &record).unwrap();

            store
                .hash_set_fields(
                    &key,
                    &[
                        (
                            "status".to_string(),
                            Bytes::from(JobStatus::Complete.as_str()),
                        ),
                        ("result".to_string(), job.msg.clone()),
                        (
                            "finish_time".to_string(),
                            Bytes::from(Utc::now().timestamp().to_string()),
                        ),
                    ],
                )
                .await
                .unwrap();
            return;
        }
    })
}
