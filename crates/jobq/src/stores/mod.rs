//! Store bindings implementing [`AtomicStore`](crate::store::AtomicStore).

pub mod memory;
pub mod redis;

pub use memory::InMemoryStore;
pub use redis::{RedisStore, RedisStoreConfig};
