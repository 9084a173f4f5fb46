//! Tests for the blocking submit client.

use super::*;
use crate::queue::FifoQueue;
use crate::stores::InMemoryStore;

fn config(max_poll_secs: u64, poll_freq_secs: u64) -> JobClientConfig {
    JobClientConfig {
        max_poll_time: Duration::from_secs(max_poll_secs),
        poll_freq: Duration::from_secs(poll_freq_secs),
    }
}

/// Worker that takes the first queued token and finishes its record.
fn spawn_worker(
    store: Arc<InMemoryStore>,
    name: &str,
    fields: Vec<(String, Bytes)>,
) -> tokio::task::JoinHandle<()> {
    let queue = FifoQueue::new(store.clone(), name.parse().unwrap());
    tokio::spawn(async move {
        loop {
            if let Some(token) = queue.pop().await.unwrap() {
                let key = String::from_utf8(token.to_vec()).unwrap();
                store.hash_set_fields(&key, &fields).await.unwrap();
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
}

#[test]
fn test_config_defaults() {
    let config = JobClientConfig::default();
    assert_eq!(config.max_poll_time, Duration::from_secs(120));
    assert_eq!(config.poll_freq, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_send_expires_when_nobody_works() {
    let store = Arc::new(InMemoryStore::new());
    let client = JobClient::with_config(
        store.clone(),
        "jobs".parse().unwrap(),
        QueueKind::Fifo,
        config(5, 1),
    );

    let started = Instant::now();
    let job = client.send(Bytes::from("work"), None).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(job.status, JobStatus::Expire);
    assert_eq!(job.msg, Bytes::from("work"));
    assert!(job.result.is_none());
    assert!(
        elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6),
        "expired after {elapsed:?}"
    );

    // The record is gone, but the unworked token stays queued.
    assert!(store.hash_get_all(&job.id).await.unwrap().is_empty());
    assert_eq!(client.qsize().await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_send_honors_per_job_timeout() {
    let store = Arc::new(InMemoryStore::new());
    let client = JobClient::with_config(
        store.clone(),
        "jobs".parse().unwrap(),
        QueueKind::Fifo,
        config(100, 1),
    );

    let started = Instant::now();
    let job = client
        .send(Bytes::from("work"), Some(Duration::from_secs(2)))
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Expire);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_send_returns_worker_result() {
    let store = Arc::new(InMemoryStore::new());
    let client = JobClient::with_config(
        store.clone(),
        "jobs".parse().unwrap(),
        QueueKind::Fifo,
        config(30, 1),
    );

    let worker = spawn_worker(
        Arc::clone(&store),
        "jobs",
        vec![
            ("status".to_string(), Bytes::from("complete")),
            ("result".to_string(), Bytes::from("output")),
            ("finish_time".to_string(), Bytes::from("1700000000")),
        ],
    );

    let job = client.send(Bytes::from("work"), None).await.unwrap();
    worker.await.unwrap();

    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(job.result, Some(Bytes::from("output")));
    assert_eq!(job.finish_time, Some(1_700_000_000));
    assert!(job.errors.is_none());

    // Retrieval removes the record.
    assert!(store.hash_get_all(&job.id).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_send_returns_worker_failure() {
    let store = Arc::new(InMemoryStore::new());
    let client = JobClient::with_config(
        store.clone(),
        "jobs".parse().unwrap(),
        QueueKind::Fifo,
        config(30, 1),
    );

    let worker = spawn_worker(
        Arc::clone(&store),
        "jobs",
        vec![
            ("status".to_string(), Bytes::from("fail")),
            ("errors".to_string(), Bytes::from("worker crashed")),
        ],
    );

    let job = client.send(Bytes::from("work"), None).await.unwrap();
    worker.await.unwrap();

    assert_eq!(job.status, JobStatus::Fail);
    assert_eq!(job.errors, Some("worker crashed".to_string()));
    assert!(job.result.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_send_surfaces_malformed_status() {
    let store = Arc::new(InMemoryStore::new());
    let client = JobClient::with_config(
        store.clone(),
        "jobs".parse().unwrap(),
        QueueKind::Fifo,
        config(30, 1),
    );

    let worker = spawn_worker(
        Arc::clone(&store),
        "jobs",
        vec![("status".to_string(), Bytes::from("done"))],
    );

    let result = client.send(Bytes::from("work"), None).await;
    worker.await.unwrap();

    assert!(matches!(result, Err(QueueError::MalformedRecord { .. })));
}

#[tokio::test]
async fn test_qsize_reports_queue_depth() {
    let store = Arc::new(InMemoryStore::new());
    let client = JobClient::new(store.clone(), "jobs".parse().unwrap(), QueueKind::Fifo);
    assert_eq!(client.qsize().await.unwrap(), 0);

    let queue = FifoQueue::new(store, "jobs".parse().unwrap());
    queue.push(Bytes::from("token")).await.unwrap();
    assert_eq!(client.qsize().await.unwrap(), 1);
}
