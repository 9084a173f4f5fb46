//! In-memory store binding for testing and development.
//!
//! State lives in process memory behind a read-write lock. Single
//! operations take the lock once; a scripted transaction holds the write
//! guard for its whole sequence, which is the isolation guarantee here.

use crate::envelope::Envelope;
use crate::error::StoreError;
use crate::store::{AtomicScript, AtomicStore, ScriptReply};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// All keyed state, split by structure kind the way store commands are.
/// List heads sit at the front of their deque.
#[derive(Debug, Default)]
struct StoreState {
    lists: HashMap<String, VecDeque<Bytes>>,
    sorted_sets: HashMap<String, HashMap<Bytes, f64>>,
    sets: HashMap<String, HashSet<Bytes>>,
    hashes: HashMap<String, HashMap<String, Bytes>>,
}

impl StoreState {
    fn list_push_head(&mut self, key: &str, value: Bytes) -> u64 {
        let list = self.lists.entry(key.to_string()).or_default();
        list.push_front(value);
        list.len() as u64
    }

    fn list_pop_tail(&mut self, key: &str) -> Option<Bytes> {
        let list = self.lists.get_mut(key)?;
        let value = list.pop_back();
        if list.is_empty() {
            self.lists.remove(key);
        }
        value
    }

    fn list_length(&self, key: &str) -> u64 {
        self.lists.get(key).map_or(0, |list| list.len() as u64)
    }

    fn list_range(&self, key: &str, start: i64, stop: i64) -> Vec<Bytes> {
        let Some(list) = self.lists.get(key) else {
            return Vec::new();
        };
        let length = list.len() as i64;
        let resolve = |index: i64| if index < 0 { index + length } else { index };
        let start = resolve(start).max(0);
        let stop = resolve(stop).min(length - 1);
        if start > stop {
            return Vec::new();
        }
        list.iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect()
    }

    fn list_remove_exact(&mut self, key: &str, value: &[u8]) -> u64 {
        let Some(list) = self.lists.get_mut(key) else {
            return 0;
        };
        let before = list.len();
        list.retain(|entry| entry.as_ref() != value);
        let removed = (before - list.len()) as u64;
        if list.is_empty() {
            self.lists.remove(key);
        }
        removed
    }

    fn sorted_set_upsert(&mut self, key: &str, member: &[u8], score: f64) -> bool {
        self.sorted_sets
            .entry(key.to_string())
            .or_default()
            .insert(Bytes::copy_from_slice(member), score)
            .is_none()
    }

    /// Lowest score wins; equal scores fall back to the lexicographically
    /// smallest member, mirroring the rank order of the production store.
    fn sorted_set_pop_min(&mut self, key: &str) -> Option<Bytes> {
        let members = self.sorted_sets.get_mut(key)?;
        let mut lowest: Option<(Bytes, f64)> = None;
        for (member, score) in members.iter() {
            let better = match &lowest {
                None => true,
                Some((lowest_member, lowest_score)) => {
                    *score < *lowest_score
                        || (*score == *lowest_score && member < lowest_member)
                }
            };
            if better {
                lowest = Some((member.clone(), *score));
            }
        }
        let (member, _) = lowest?;
        members.remove(&member);
        if members.is_empty() {
            self.sorted_sets.remove(key);
        }
        Some(member)
    }

    fn sorted_set_cardinality(&self, key: &str) -> u64 {
        self.sorted_sets
            .get(key)
            .map_or(0, |members| members.len() as u64)
    }

    fn set_add(&mut self, key: &str, member: &[u8]) -> bool {
        self.sets
            .entry(key.to_string())
            .or_default()
            .insert(Bytes::copy_from_slice(member))
    }

    fn set_remove(&mut self, key: &str, member: &[u8]) -> bool {
        let Some(members) = self.sets.get_mut(key) else {
            return false;
        };
        let removed = members.remove(member);
        if members.is_empty() {
            self.sets.remove(key);
        }
        removed
    }

    fn set_is_member(&self, key: &str, member: &[u8]) -> bool {
        self.sets
            .get(key)
            .is_some_and(|members| members.contains(member))
    }

    fn hash_set_fields(&mut self, key: &str, fields: &[(String, Bytes)]) {
        let hash = self.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert(field.clone(), value.clone());
        }
    }

    fn hash_get_field(&self, key: &str, field: &str) -> Option<Bytes> {
        self.hashes.get(key)?.get(field).cloned()
    }

    fn hash_get_all(&self, key: &str) -> HashMap<String, Bytes> {
        self.hashes.get(key).cloned().unwrap_or_default()
    }

    fn delete_key(&mut self, key: &str) -> bool {
        let mut deleted = self.lists.remove(key).is_some();
        deleted |= self.sorted_sets.remove(key).is_some();
        deleted |= self.sets.remove(key).is_some();
        deleted |= self.hashes.remove(key).is_some();
        deleted
    }

    // ------------------------------------------------------------------
    // Scripted transactions, run under one write guard
    // ------------------------------------------------------------------

    fn run_script(
        &mut self,
        script: AtomicScript,
        keys: &[&str],
        args: &[Bytes],
    ) -> Result<ScriptReply, StoreError> {
        match script {
            AtomicScript::ReliablePop => {
                check_shape(script, keys, 2, args, 1)?;
                self.reliable_pop(keys[0], keys[1], &args[0])
            }
            AtomicScript::ReliableRemove => {
                check_shape(script, keys, 2, args, 2)?;
                let removed = self.list_remove_exact(keys[0], &args[0]);
                self.set_remove(keys[1], &args[1]);
                Ok(ScriptReply::Count(removed as i64))
            }
            AtomicScript::ReliableReprocess => {
                check_shape(script, keys, 2, args, 3)?;
                self.list_remove_exact(keys[0], &args[0]);
                self.set_remove(keys[1], &args[1]);
                self.list_push_head(keys[0], args[2].clone());
                Ok(ScriptReply::Data(args[1].clone()))
            }
        }
    }

    fn reliable_pop(
        &mut self,
        ring: &str,
        completion: &str,
        stamp: &[u8],
    ) -> Result<ScriptReply, StoreError> {
        let stamp: i64 = std::str::from_utf8(stamp)
            .ok()
            .and_then(|text| text.parse().ok())
            .ok_or_else(|| {
                StoreError::unexpected_reply("reliable_pop", "claim stamp is not a number")
            })?;
        let Some(raw) = self.list_pop_tail(ring) else {
            return Ok(ScriptReply::Nil);
        };
        let envelope = Envelope::decode(&raw)
            .map_err(|err| StoreError::unexpected_reply("reliable_pop", err.to_string()))?;
        match envelope.claimed_at() {
            None => {
                let stamped = Envelope::claimed(envelope.payload().clone(), stamp);
                self.list_push_head(ring, stamped.encode());
                Ok(ScriptReply::Items(vec![envelope.into_payload(), Bytes::new()]))
            }
            Some(claimed_at) => {
                if self.set_remove(completion, envelope.payload()) {
                    // Completed while claimed: retired, nothing re-inserted.
                    Ok(ScriptReply::Nil)
                } else {
                    self.list_push_head(ring, raw);
                    Ok(ScriptReply::Items(vec![
                        envelope.into_payload(),
                        Bytes::from(claimed_at.to_string()),
                    ]))
                }
            }
        }
    }
}

fn check_shape(
    script: AtomicScript,
    keys: &[&str],
    expected_keys: usize,
    args: &[Bytes],
    expected_args: usize,
) -> Result<(), StoreError> {
    if keys.len() != expected_keys || args.len() != expected_args {
        return Err(StoreError::unexpected_reply(
            script.name(),
            format!(
                "expected {} keys and {} arguments, got {} and {}",
                expected_keys,
                expected_args,
                keys.len(),
                args.len()
            ),
        ));
    }
    Ok(())
}

// ============================================================================
// InMemoryStore
// ============================================================================

/// In-memory [`AtomicStore`] implementation.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning only means a holder panicked; the state itself stays usable.
    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AtomicStore for InMemoryStore {
    async fn list_push_head(&self, key: &str, value: &[u8]) -> Result<u64, StoreError> {
        Ok(self
            .write_state()
            .list_push_head(key, Bytes::copy_from_slice(value)))
    }

    async fn list_pop_tail(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        Ok(self.write_state().list_pop_tail(key))
    }

    async fn list_length(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self.read_state().list_length(key))
    }

    async fn list_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<Bytes>, StoreError> {
        Ok(self.read_state().list_range(key, start, stop))
    }

    async fn list_remove_exact(&self, key: &str, value: &[u8]) -> Result<u64, StoreError> {
        Ok(self.write_state().list_remove_exact(key, value))
    }

    async fn sorted_set_upsert(
        &self,
        key: &str,
        member: &[u8],
        score: f64,
    ) -> Result<bool, StoreError> {
        Ok(self.write_state().sorted_set_upsert(key, member, score))
    }

    async fn sorted_set_pop_min(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        Ok(self.write_state().sorted_set_pop_min(key))
    }

    async fn sorted_set_cardinality(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self.read_state().sorted_set_cardinality(key))
    }

    async fn set_add(&self, key: &str, member: &[u8]) -> Result<bool, StoreError> {
        Ok(self.write_state().set_add(key, member))
    }

    async fn set_remove(&self, key: &str, member: &[u8]) -> Result<bool, StoreError> {
        Ok(self.write_state().set_remove(key, member))
    }

    async fn set_is_member(&self, key: &str, member: &[u8]) -> Result<bool, StoreError> {
        Ok(self.read_state().set_is_member(key, member))
    }

    async fn hash_set_fields(
        &self,
        key: &str,
        fields: &[(String, Bytes)],
    ) -> Result<(), StoreError> {
        self.write_state().hash_set_fields(key, fields);
        Ok(())
    }

    async fn hash_get_field(&self, key: &str, field: &str) -> Result<Option<Bytes>, StoreError> {
        Ok(self.read_state().hash_get_field(key, field))
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, Bytes>, StoreError> {
        Ok(self.read_state().hash_get_all(key))
    }

    async fn delete_key(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.write_state().delete_key(key))
    }

    async fn run_atomic(
        &self,
        script: AtomicScript,
        keys: &[&str],
        args: &[Bytes],
    ) -> Result<ScriptReply, StoreError> {
        self.write_state().run_script(script, keys, args)
    }
}
