//! Tests for the FIFO queue.

use super::*;
use crate::stores::InMemoryStore;

fn queue() -> FifoQueue {
    let store = Arc::new(InMemoryStore::new());
    FifoQueue::new(store, "jobs".parse().unwrap())
}

#[tokio::test]
async fn test_pop_observes_push_order() {
    let queue = queue();
    queue.push(Bytes::from("first")).await.unwrap();
    queue.push(Bytes::from("second")).await.unwrap();
    queue.push(Bytes::from("third")).await.unwrap();

    assert_eq!(queue.pop().await.unwrap(), Some(Bytes::from("first")));
    assert_eq!(queue.pop().await.unwrap(), Some(Bytes::from("second")));
    assert_eq!(queue.pop().await.unwrap(), Some(Bytes::from("third")));
    assert_eq!(queue.pop().await.unwrap(), None);
}

#[tokio::test]
async fn test_size_tracks_entries() {
    let queue = queue();
    assert_eq!(queue.size().await.unwrap(), 0);

    queue.push(Bytes::from("a")).await.unwrap();
    queue.push(Bytes::from("b")).await.unwrap();
    assert_eq!(queue.size().await.unwrap(), 2);

    queue.pop().await.unwrap();
    assert_eq!(queue.size().await.unwrap(), 1);
}

#[tokio::test]
async fn test_duplicate_tokens_are_kept() {
    let queue = queue();
    queue.push(Bytes::from("same")).await.unwrap();
    queue.push(Bytes::from("same")).await.unwrap();

    assert_eq!(queue.size().await.unwrap(), 2);
    assert_eq!(queue.pop().await.unwrap(), Some(Bytes::from("same")));
    assert_eq!(queue.pop().await.unwrap(), Some(Bytes::from("same")));
}

#[tokio::test]
async fn test_queues_with_different_names_are_independent() {
    let store: Arc<dyn AtomicStore> = Arc::new(InMemoryStore::new());
    let first = FifoQueue::new(Arc::clone(&store), "first".parse().unwrap());
    let second = FifoQueue::new(Arc::clone(&store), "second".parse().unwrap());

    first.push(Bytes::from("token")).await.unwrap();

    assert_eq!(second.size().await.unwrap(), 0);
    assert_eq!(second.pop().await.unwrap(), None);
    assert_eq!(first.pop().await.unwrap(), Some(Bytes::from("token")));
}
