//! Stream-and-hash store boundary.
//!
//! Progress data lives in an external key-value store offering append-only
//! streams, hashes, sets and plain strings. [`ProgressStore`] is the seam
//! the engine talks to; [`memory::MemoryStore`] is the in-process backend.
//!
//! Appends are atomic, so concurrent producers never race on a log. The
//! only read-modify-write target is a run's meta hash, written through
//! [`ProgressStore::hash_set_monotonic`] so that a writer holding a stale
//! view can never move it backwards.

pub mod keys;
pub mod memory;

use async_trait::async_trait;
use ingest_protocol::event_models::{EntryId, Fields, StreamEntry};
use std::time::Duration;
use thiserror::Error;

pub use memory::MemoryStore;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The key exists but holds a different kind of value.
    #[error("key {key} holds a value of the wrong type")]
    WrongType { key: String },

    /// The backend failed to carry out the command.
    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Ordering rule for [`ProgressStore::hash_set_monotonic`].
///
/// A hash in a final state only accepts writes that are final too. A
/// non-final write must not lower `rank_field`; a final write always lands
/// but keeps the higher stored rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonotonicGuard<'a> {
    pub rank_field: &'a str,
    pub state_field: &'a str,
    pub final_states: &'a [&'a str],
}

impl MonotonicGuard<'_> {
    /// The hash after writing `incoming` over `stored`, or `None` when the
    /// write is rejected.
    pub fn merge(&self, stored: &Fields, incoming: Fields) -> Option<Fields> {
        let incoming_final = self.is_final(&incoming);
        if self.is_final(stored) && !incoming_final {
            return None;
        }

        let kept_rank = match (self.rank(stored), self.rank(&incoming)) {
            (Some(old), Some(new)) if new < old => {
                if !incoming_final {
                    return None;
                }
                stored.get(self.rank_field).cloned()
            }
            _ => None,
        };

        let mut merged = stored.clone();
        merged.extend(incoming);
        if let Some(rank) = kept_rank {
            merged.insert(self.rank_field.to_string(), rank);
        }
        Some(merged)
    }

    fn is_final(&self, fields: &Fields) -> bool {
        fields
            .get(self.state_field)
            .is_some_and(|state| self.final_states.contains(&state.as_str()))
    }

    fn rank(&self, fields: &Fields) -> Option<f64> {
        fields
            .get(self.rank_field)
            .and_then(|value| value.trim().parse::<f64>().ok())
    }
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Appends an entry to the stream at `key` and trims the stream to
    /// roughly `maxlen` entries, oldest first. `maxlen == 0` disables
    /// trimming.
    async fn append(&self, key: &str, fields: Fields, maxlen: usize) -> StoreResult<EntryId>;

    /// Up to `count` most recent entries, newest first.
    async fn rev_range(&self, key: &str, count: usize) -> StoreResult<Vec<StreamEntry>>;

    /// Up to `count` entries strictly after `after` (from the start when
    /// `None`), oldest first.
    async fn range_after(
        &self,
        key: &str,
        after: Option<EntryId>,
        count: usize,
    ) -> StoreResult<Vec<StreamEntry>>;

    /// All fields of the hash at `key`; empty when the key does not exist.
    async fn hash_get_all(&self, key: &str) -> StoreResult<Fields>;

    /// Merges `fields` into the hash at `key`.
    async fn hash_set(&self, key: &str, fields: Fields) -> StoreResult<()>;

    /// Merges `fields` into the hash at `key` unless `guard` rejects the
    /// write against what is stored. Check and write are one atomic step.
    ///
    /// Returns `true` if the hash was written.
    async fn hash_set_monotonic(
        &self,
        key: &str,
        fields: Fields,
        guard: MonotonicGuard<'_>,
    ) -> StoreResult<bool>;

    /// Returns `true` if the member was newly added.
    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Returns `true` if the member was present.
    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool>;

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Atomically increments the integer at `key` and returns the new value.
    async fn incr_by(&self, key: &str, by: i64) -> StoreResult<i64>;

    /// Schedules `key` for removal after `ttl`. Returns `false` if the key
    /// does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;
}
