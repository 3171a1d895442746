//! Live feed of appended stream entries.
//!
//! Every entry the ingestion service appends to a log is also published
//! here so dashboards can follow all runs without polling the store. The
//! feed never applies backpressure: a subscriber that falls behind skips
//! the entries it missed.

use async_stream::stream;
use ingest_protocol::event_models::{FeedEntry, StreamEntry};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::Stream;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ProgressFeed {
    tx: broadcast::Sender<FeedEntry>,
}

impl ProgressFeed {
    /// Create a feed buffering up to `capacity` entries per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an entry appended to the stream at `key`.
    ///
    /// Publishing without subscribers is not an error.
    pub fn publish(&self, key: &str, entry: StreamEntry) {
        let _ = self.tx.send(FeedEntry {
            key: key.to_string(),
            entry,
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Stream of every entry published from now on.
    ///
    /// The stream ends when the feed is dropped.
    pub fn subscribe(&self) -> impl Stream<Item = FeedEntry> + Send + 'static {
        let mut rx = self.tx.subscribe();
        stream! {
            loop {
                match rx.recv().await {
                    Ok(entry) => yield entry,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "progress feed subscriber lagged, entries dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    /// Like [`ProgressFeed::subscribe`], limited to entries of one stream.
    pub fn subscribe_key(&self, key: &str) -> impl Stream<Item = FeedEntry> + Send + 'static {
        let key = key.to_string();
        let entries = self.subscribe();
        stream! {
            for await entry in entries {
                if entry.key == key {
                    yield entry;
                }
            }
        }
    }
}
