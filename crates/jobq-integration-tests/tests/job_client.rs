//! End-to-end submit and worker round trips
//!
//! These tests verify:
//! - A submitted job returning with the worker's result
//! - Client-side expiry when nobody works the queue
//! - The submit protocol running over a reliable queue

mod common;

use bytes::Bytes;
use common::{spawn_echo_worker, test_store, unique_name};
use jobq::{AtomicStore, JobClient, JobClientConfig, JobStatus, Queue, QueueKind, ReliableQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

fn fast_config() -> JobClientConfig {
    JobClientConfig {
        max_poll_time: Duration::from_secs(5),
        poll_freq: Duration::from_secs(1),
    }
}

/// Verify that a submitted job comes back resolved with the worker's result
/// and leaves no record behind.
#[tokio::test(start_paused = true)]
async fn test_round_trip_through_fifo_queue() {
    // Arrange
    let store = test_store();
    let name = unique_name("jobs");
    let client = JobClient::with_config(
        store.clone(),
        name.clone(),
        QueueKind::Fifo,
        fast_config(),
    );
    let worker = spawn_echo_worker(Arc::clone(&store), name, QueueKind::Fifo);

    // Act
    let job = client.send(Bytes::from("ping"), None).await.unwrap();
    worker.await.unwrap();

    // Assert: the echo worker copied the payload into the result.
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(job.result, Some(Bytes::from("ping")));
    assert!(job.finish_time.is_some());
    assert!(store.hash_get_all(&job.id).await.unwrap().is_empty());
}

/// Verify that an unworked job expires after the polling budget and that
/// its token stays queued.
#[tokio::test(start_paused = true)]
async fn test_unworked_job_expires_on_schedule() {
    let store = test_store();
    let client = JobClient::with_config(
        store.clone(),
        unique_name("jobs"),
        QueueKind::Fifo,
        fast_config(),
    );

    let started = Instant::now();
    let job = client
        .send(Bytes::from("nobody listens"), None)
        .await
        .unwrap();
    let waited = started.elapsed();

    assert_eq!(job.status, JobStatus::Expire);
    assert!(
        waited >= Duration::from_secs(5) && waited < Duration::from_secs(6),
        "expired after {waited:?}"
    );
    assert!(store.hash_get_all(&job.id).await.unwrap().is_empty());
    assert_eq!(client.qsize().await.unwrap(), 1);
}

/// Verify the submit protocol over a reliable queue: the worker claims the
/// token, resolves the record, completes, and the ring drains.
#[tokio::test(start_paused = true)]
async fn test_round_trip_through_reliable_queue() {
    // Arrange
    let store = test_store();
    let name = unique_name("jobs");
    let client = JobClient::with_config(
        store.clone(),
        name.clone(),
        QueueKind::Reliable,
        fast_config(),
    );

    let worker_store = Arc::clone(&store);
    let worker_name = name.clone();
    let worker = tokio::spawn(async move {
        let ring = ReliableQueue::new(worker_store.clone(), worker_name);
        loop {
            let Some(envelope) = ring.pop_envelope().await.unwrap() else {
                sleep(Duration::from_millis(20)).await;
                continue;
            };
            let key = String::from_utf8(envelope.payload().to_vec()).unwrap();
            worker_store
                .hash_set_fields(
                    &key,
                    &[
                        ("status".to_string(), Bytes::from("complete")),
                        ("result".to_string(), Bytes::from("done")),
                    ],
                )
                .await
                .unwrap();
            ring.complete(envelope.payload()).await.unwrap();
            return;
        }
    });

    // Act
    let job = client.send(Bytes::from("work"), None).await.unwrap();
    worker.await.unwrap();

    // Assert
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(job.result, Some(Bytes::from("done")));

    // The completed token retires from the ring on its next visit.
    let ring = ReliableQueue::new(store.clone(), name);
    assert_eq!(ring.pop_envelope().await.unwrap(), None);
    assert_eq!(ring.size().await.unwrap(), 0);
}
