//! In-memory [`ProgressSink`] recording every delivered request.

use async_trait::async_trait;
use ingest_core::pusher::{ProgressSink, PushError};
use ingest_protocol::event_models::ProgressEventRequest;
use std::sync::Mutex;

#[derive(Default)]
pub struct RecordingSink {
    requests: Mutex<Vec<(ProgressEventRequest, Option<String>)>>,
    failing: bool,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that records and then fails every request.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<ProgressEventRequest> {
        self.requests
            .lock()
            .expect("Failed to lock recorded requests")
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    pub fn user_ids(&self) -> Vec<Option<String>> {
        self.requests
            .lock()
            .expect("Failed to lock recorded requests")
            .iter()
            .map(|(_, user)| user.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.requests
            .lock()
            .expect("Failed to lock recorded requests")
            .len()
    }
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn send(
        &self,
        request: &ProgressEventRequest,
        user_id: Option<&str>,
    ) -> Result<(), PushError> {
        self.requests
            .lock()
            .expect("Failed to lock recorded requests")
            .push((request.clone(), user_id.map(str::to_string)));
        if self.failing {
            return Err(PushError::Rejected("sink unavailable".to_string()));
        }
        Ok(())
    }
}
