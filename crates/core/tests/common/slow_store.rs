//! A store whose first snapshot write stalls, to interleave settles.

use async_trait::async_trait;
use ingest_core::store::{MemoryStore, MonotonicGuard, ProgressStore, StoreResult};
use ingest_protocol::event_models::{EntryId, Fields, StreamEntry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Delegates to a [`MemoryStore`], sleeping `delay` before the first
/// guarded hash write.
#[allow(dead_code)]
pub struct SlowFirstWriteStore {
    inner: Arc<MemoryStore>,
    delay: Duration,
    stalled: AtomicBool,
}

#[allow(dead_code)]
impl SlowFirstWriteStore {
    pub fn new(inner: Arc<MemoryStore>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            stalled: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ProgressStore for SlowFirstWriteStore {
    async fn append(&self, key: &str, fields: Fields, maxlen: usize) -> StoreResult<EntryId> {
        self.inner.append(key, fields, maxlen).await
    }

    async fn rev_range(&self, key: &str, count: usize) -> StoreResult<Vec<StreamEntry>> {
        self.inner.rev_range(key, count).await
    }

    async fn range_after(
        &self,
        key: &str,
        after: Option<EntryId>,
        count: usize,
    ) -> StoreResult<Vec<StreamEntry>> {
        self.inner.range_after(key, after, count).await
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<Fields> {
        self.inner.hash_get_all(key).await
    }

    async fn hash_set(&self, key: &str, fields: Fields) -> StoreResult<()> {
        self.inner.hash_set(key, fields).await
    }

    async fn hash_set_monotonic(
        &self,
        key: &str,
        fields: Fields,
        guard: MonotonicGuard<'_>,
    ) -> StoreResult<bool> {
        if !self.stalled.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.hash_set_monotonic(key, fields, guard).await
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.inner.set_add(key, member).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.inner.set_remove(key, member).await
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        self.inner.set_members(key).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.inner.set(key, value).await
    }

    async fn incr_by(&self, key: &str, by: i64) -> StoreResult<i64> {
        self.inner.incr_by(key, by).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        self.inner.expire(key, ttl).await
    }
}
