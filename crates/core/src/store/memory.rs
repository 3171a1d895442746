//! In-process implementation of [`ProgressStore`].
//!
//! Mirrors the semantics of a Redis-style stream-and-hash store closely
//! enough for the engine: monotonic `<ms>-<seq>` entry ids, oldest-first
//! trimming, typed keys and lazy expiry.

use crate::store::{MonotonicGuard, ProgressStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use ingest_protocol::event_models::{EntryId, Fields, StreamEntry};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
enum Value {
    Stream(VecDeque<StreamEntry>),
    Hash(Fields),
    Set(BTreeSet<String>),
    Text(String),
}

#[derive(Debug)]
struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct Inner {
    slots: HashMap<String, Slot>,
    last_id: EntryId,
}

impl Inner {
    /// Drops `key` if its expiry has passed.
    fn purge_expired(&mut self, key: &str) {
        let now = Instant::now();
        let expired = self
            .slots
            .get(key)
            .and_then(|slot| slot.expires_at)
            .is_some_and(|at| at <= now);
        if expired {
            self.slots.remove(key);
        }
    }

    fn live(&mut self, key: &str) -> Option<&mut Slot> {
        self.purge_expired(key);
        self.slots.get_mut(key)
    }

    fn live_or_insert(&mut self, key: &str, empty: fn() -> Value) -> &mut Slot {
        self.purge_expired(key);
        self.slots.entry(key.to_string()).or_insert_with(|| Slot {
            value: empty(),
            expires_at: None,
        })
    }

    /// Next stream id: wall-clock milliseconds, or the previous id plus one
    /// sequence step when the clock has not moved forward.
    fn next_id(&mut self) -> EntryId {
        let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let id = if now_ms > self.last_id.ms {
            EntryId::new(now_ms, 0)
        } else {
            EntryId::new(self.last_id.ms, self.last_id.seq + 1)
        };
        self.last_id = id;
        id
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
    }
}

/// Thread-safe in-memory store.
///
/// All commands take a single short-lived lock; none is held across an
/// await point.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held by the stream at `key`.
    pub async fn stream_len(&self, key: &str) -> usize {
        let mut inner = self.inner.lock().await;
        match inner.live(key) {
            Some(Slot {
                value: Value::Stream(entries),
                ..
            }) => entries.len(),
            _ => 0,
        }
    }

    /// Whether `key` currently exists.
    pub async fn exists(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().await;
        inner.live(key).is_some()
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn append(&self, key: &str, fields: Fields, maxlen: usize) -> StoreResult<EntryId> {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id();
        let slot = inner.live_or_insert(key, || Value::Stream(VecDeque::new()));
        let Value::Stream(entries) = &mut slot.value else {
            return Err(wrong_type(key));
        };
        entries.push_back(StreamEntry { id, fields });
        if maxlen > 0 {
            while entries.len() > maxlen {
                entries.pop_front();
            }
        }
        Ok(id)
    }

    async fn rev_range(&self, key: &str, count: usize) -> StoreResult<Vec<StreamEntry>> {
        let mut inner = self.inner.lock().await;
        match inner.live(key) {
            None => Ok(Vec::new()),
            Some(Slot {
                value: Value::Stream(entries),
                ..
            }) => Ok(entries.iter().rev().take(count).cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn range_after(
        &self,
        key: &str,
        after: Option<EntryId>,
        count: usize,
    ) -> StoreResult<Vec<StreamEntry>> {
        let mut inner = self.inner.lock().await;
        match inner.live(key) {
            None => Ok(Vec::new()),
            Some(Slot {
                value: Value::Stream(entries),
                ..
            }) => Ok(entries
                .iter()
                .filter(|entry| after.map_or(true, |after| entry.id > after))
                .take(count)
                .cloned()
                .collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<Fields> {
        let mut inner = self.inner.lock().await;
        match inner.live(key) {
            None => Ok(Fields::new()),
            Some(Slot {
                value: Value::Hash(fields),
                ..
            }) => Ok(fields.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn hash_set(&self, key: &str, fields: Fields) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let slot = inner.live_or_insert(key, || Value::Hash(Fields::new()));
        let Value::Hash(existing) = &mut slot.value else {
            return Err(wrong_type(key));
        };
        existing.extend(fields);
        Ok(())
    }

    async fn hash_set_monotonic(
        &self,
        key: &str,
        fields: Fields,
        guard: MonotonicGuard<'_>,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let slot = inner.live_or_insert(key, || Value::Hash(Fields::new()));
        let Value::Hash(existing) = &mut slot.value else {
            return Err(wrong_type(key));
        };
        match guard.merge(existing, fields) {
            Some(merged) => {
                *existing = merged;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let slot = inner.live_or_insert(key, || Value::Set(BTreeSet::new()));
        let Value::Set(members) = &mut slot.value else {
            return Err(wrong_type(key));
        };
        Ok(members.insert(member.to_string()))
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let (removed, now_empty) = match inner.live(key) {
            None => return Ok(false),
            Some(Slot {
                value: Value::Set(members),
                ..
            }) => (members.remove(member), members.is_empty()),
            Some(_) => return Err(wrong_type(key)),
        };
        // Empty sets vanish, as they do in Redis.
        if now_empty {
            inner.slots.remove(key);
        }
        Ok(removed)
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut inner = self.inner.lock().await;
        match inner.live(key) {
            None => Ok(Vec::new()),
            Some(Slot {
                value: Value::Set(members),
                ..
            }) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut inner = self.inner.lock().await;
        match inner.live(key) {
            None => Ok(None),
            Some(Slot {
                value: Value::Text(text),
                ..
            }) => Ok(Some(text.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        // A plain SET replaces whatever was there and clears any expiry.
        inner.slots.insert(
            key.to_string(),
            Slot {
                value: Value::Text(value.to_string()),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn incr_by(&self, key: &str, by: i64) -> StoreResult<i64> {
        let mut inner = self.inner.lock().await;
        let slot = inner.live_or_insert(key, || Value::Text("0".to_string()));
        let Value::Text(text) = &mut slot.value else {
            return Err(wrong_type(key));
        };
        let current: i64 = text
            .parse()
            .map_err(|_| StoreError::Backend(format!("value at {key} is not an integer")))?;
        let next = current
            .checked_add(by)
            .ok_or_else(|| StoreError::Backend(format!("increment of {key} overflows")))?;
        *text = next.to_string();
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner.live(key) {
            None => Ok(false),
            Some(slot) => {
                slot.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
        }
    }
}
