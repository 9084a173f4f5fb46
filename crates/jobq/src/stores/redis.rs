//! Redis store binding.
//!
//! Single operations map one-to-one onto Redis commands over a multiplexed
//! [`ConnectionManager`]. Scripted transactions run as Lua via `EVALSHA`
//! (with automatic script loading), so the whole step sequence executes with
//! no other client's commands interleaved.

use crate::error::StoreError;
use crate::store::{AtomicScript, AtomicStore, ScriptReply};
use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::ConnectionManager;
use redis::{Script, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[cfg(test)]
#[path = "redis_tests.rs"]
mod tests;

// ============================================================================
// Lua Scripts
// ============================================================================

/// Read and remove the lowest-ranked sorted-set member as one step.
/// KEYS[1] = sorted set.
const POP_MIN: &str = r#"
local member = redis.call('ZRANGE', KEYS[1], 0, 0)
if not member[1] then
    return false
end
redis.call('ZREM', KEYS[1], member[1])
return member[1]
"#;

/// Tail-remove one ring envelope, stamping or retiring it.
/// KEYS[1] = ring list, KEYS[2] = completion set, ARGV[1] = claim stamp.
/// Returns {payload, ''} for a fresh claim, {payload, stamp} for a
/// redelivery, or nil when the ring is empty or the entry was retired.
/// The envelope layout is length:payload:stamp; the payload is sliced by
/// its declared length, never pattern-matched.
const RELIABLE_POP: &str = r#"
local elem = redis.call('RPOP', KEYS[1])
if not elem then
    return false
end
local sep = string.find(elem, ':', 1, true)
if not sep then
    return redis.error_reply('malformed envelope: missing length prefix')
end
local len = tonumber(string.sub(elem, 1, sep - 1))
if not len then
    return redis.error_reply('malformed envelope: length prefix is not a number')
end
local payload_end = sep + len
if #elem < payload_end + 1 or string.sub(elem, payload_end + 1, payload_end + 1) ~= ':' then
    return redis.error_reply('malformed envelope: truncated or missing delimiter')
end
local payload = string.sub(elem, sep + 1, payload_end)
local stamp = string.sub(elem, payload_end + 2)
if stamp == '' then
    redis.call('LPUSH', KEYS[1], string.sub(elem, 1, payload_end + 1) .. ARGV[1])
    return {payload, ''}
end
if redis.call('SISMEMBER', KEYS[2], payload) == 1 then
    redis.call('SREM', KEYS[2], payload)
    return false
end
redis.call('LPUSH', KEYS[1], elem)
return {payload, stamp}
"#;

/// Delete an exact envelope and clear the payload's completion mark.
/// KEYS[1] = ring list, KEYS[2] = completion set, ARGV[1] = envelope,
/// ARGV[2] = payload. Returns the number of ring entries removed.
const RELIABLE_REMOVE: &str = r#"
local removed = redis.call('LREM', KEYS[1], 0, ARGV[1])
redis.call('SREM', KEYS[2], ARGV[2])
return removed
"#;

/// Replace a stale envelope with a freshly stamped copy at the head.
/// KEYS[1] = ring list, KEYS[2] = completion set, ARGV[1] = old envelope,
/// ARGV[2] = payload, ARGV[3] = new envelope. Returns the payload.
const RELIABLE_REPROCESS: &str = r#"
redis.call('LREM', KEYS[1], 0, ARGV[1])
redis.call('SREM', KEYS[2], ARGV[2])
redis.call('LPUSH', KEYS[1], ARGV[3])
return ARGV[2]
"#;

// ============================================================================
// Configuration
// ============================================================================

/// Connection settings for [`RedisStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisStoreConfig {
    pub host: String,
    pub port: u16,
    pub database: i64,
    pub password: Option<String>,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            database: 0,
            password: None,
        }
    }
}

impl RedisStoreConfig {
    /// Connection URL in the `redis://` scheme.
    pub fn connection_url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.database
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.database),
        }
    }
}

// ============================================================================
// RedisStore
// ============================================================================

/// Redis-backed [`AtomicStore`] implementation.
pub struct RedisStore {
    manager: ConnectionManager,
    pop_min: Script,
    reliable_pop: Script,
    reliable_remove: Script,
    reliable_reprocess: Script,
}

impl RedisStore {
    /// Connect using a raw `redis://` URL.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        debug!("redis store connected");
        Ok(Self::with_manager(manager))
    }

    /// Connect using structured settings.
    pub async fn connect_with(config: &RedisStoreConfig) -> Result<Self, StoreError> {
        Self::connect(&config.connection_url()).await
    }

    /// Wrap an already established connection manager.
    pub fn with_manager(manager: ConnectionManager) -> Self {
        Self {
            manager,
            pop_min: Script::new(POP_MIN),
            reliable_pop: Script::new(RELIABLE_POP),
            reliable_remove: Script::new(RELIABLE_REMOVE),
            reliable_reprocess: Script::new(RELIABLE_REPROCESS),
        }
    }

    // The manager multiplexes one connection; clones share it.
    fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl AtomicStore for RedisStore {
    async fn list_push_head(&self, key: &str, value: &[u8]) -> Result<u64, StoreError> {
        let mut conn = self.connection();
        let length: u64 = redis::cmd("LPUSH")
            .arg(key)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(length)
    }

    async fn list_pop_tail(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let mut conn = self.connection();
        let value: Option<Vec<u8>> = redis::cmd("RPOP").arg(key).query_async(&mut conn).await?;
        Ok(value.map(Bytes::from))
    }

    async fn list_length(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.connection();
        let length: u64 = redis::cmd("LLEN").arg(key).query_async(&mut conn).await?;
        Ok(length)
    }

    async fn list_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<Bytes>, StoreError> {
        let mut conn = self.connection();
        let values: Vec<Vec<u8>> = redis::cmd("LRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await?;
        Ok(values.into_iter().map(Bytes::from).collect())
    }

    async fn list_remove_exact(&self, key: &str, value: &[u8]) -> Result<u64, StoreError> {
        let mut conn = self.connection();
        let removed: u64 = redis::cmd("LREM")
            .arg(key)
            .arg(0)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(removed)
    }

    async fn sorted_set_upsert(
        &self,
        key: &str,
        member: &[u8],
        score: f64,
    ) -> Result<bool, StoreError> {
        let mut conn = self.connection();
        let inserted: u64 = redis::cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(inserted == 1)
    }

    async fn sorted_set_pop_min(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let mut conn = self.connection();
        let member: Option<Vec<u8>> = self.pop_min.key(key).invoke_async(&mut conn).await?;
        Ok(member.map(Bytes::from))
    }

    async fn sorted_set_cardinality(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.connection();
        let count: u64 = redis::cmd("ZCARD").arg(key).query_async(&mut conn).await?;
        Ok(count)
    }

    async fn set_add(&self, key: &str, member: &[u8]) -> Result<bool, StoreError> {
        let mut conn = self.connection();
        let added: u64 = redis::cmd("SADD")
            .arg(key)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(added == 1)
    }

    async fn set_remove(&self, key: &str, member: &[u8]) -> Result<bool, StoreError> {
        let mut conn = self.connection();
        let removed: u64 = redis::cmd("SREM")
            .arg(key)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(removed == 1)
    }

    async fn set_is_member(&self, key: &str, member: &[u8]) -> Result<bool, StoreError> {
        let mut conn = self.connection();
        let present: u64 = redis::cmd("SISMEMBER")
            .arg(key)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(present == 1)
    }

    async fn hash_set_fields(
        &self,
        key: &str,
        fields: &[(String, Bytes)],
    ) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection();
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(field.as_str()).arg(value.as_ref());
        }
        let _: u64 = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn hash_get_field(&self, key: &str, field: &str) -> Result<Option<Bytes>, StoreError> {
        let mut conn = self.connection();
        let value: Option<Vec<u8>> = redis::cmd("HGET")
            .arg(key)
            .arg(field)
            .query_async(&mut conn)
            .await?;
        Ok(value.map(Bytes::from))
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, Bytes>, StoreError> {
        let mut conn = self.connection();
        let fields: HashMap<String, Vec<u8>> =
            redis::cmd("HGETALL").arg(key).query_async(&mut conn).await?;
        Ok(fields
            .into_iter()
            .map(|(field, value)| (field, Bytes::from(value)))
            .collect())
    }

    async fn delete_key(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection();
        let deleted: u64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(deleted == 1)
    }

    async fn run_atomic(
        &self,
        script: AtomicScript,
        keys: &[&str],
        args: &[Bytes],
    ) -> Result<ScriptReply, StoreError> {
        let lua = match script {
            AtomicScript::ReliablePop => &self.reliable_pop,
            AtomicScript::ReliableRemove => &self.reliable_remove,
            AtomicScript::ReliableReprocess => &self.reliable_reprocess,
        };
        let mut invocation = lua.prepare_invoke();
        for key in keys {
            invocation.key(*key);
        }
        for arg in args {
            invocation.arg(arg.as_ref());
        }
        let mut conn = self.connection();
        let value: Value = invocation.invoke_async(&mut conn).await?;
        script_reply(script, value)
    }
}

/// Map a raw script reply onto [`ScriptReply`].
fn script_reply(script: AtomicScript, value: Value) -> Result<ScriptReply, StoreError> {
    match value {
        Value::Nil => Ok(ScriptReply::Nil),
        Value::Int(count) => Ok(ScriptReply::Count(count)),
        Value::BulkString(data) => Ok(ScriptReply::Data(Bytes::from(data))),
        Value::Array(values) => {
            let mut items = Vec::with_capacity(values.len());
            for value in values {
                match value {
                    Value::BulkString(data) => items.push(Bytes::from(data)),
                    other => {
                        return Err(StoreError::unexpected_reply(
                            script.name(),
                            format!("non-binary array item: {other:?}"),
                        ));
                    }
                }
            }
            Ok(ScriptReply::Items(items))
        }
        other => Err(StoreError::unexpected_reply(
            script.name(),
            format!("{other:?}"),
        )),
    }
}
