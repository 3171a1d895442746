//! Destinations for pushed progress events.

use crate::config::models::PusherConfig;
use crate::ingest::ProgressService;
use async_trait::async_trait;
use ingest_protocol::event_models::ProgressEventRequest;
use std::time::Duration;
use thiserror::Error;

/// Header carrying the user id when the body has none.
pub const USER_HEADER: &str = "x-user-uuid";

#[derive(Error, Debug)]
pub enum PushError {
    /// Transport failure, timeout or non-success status.
    #[error("progress request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The ingestion service refused the event.
    #[error("progress event rejected: {0}")]
    Rejected(String),
}

/// Where a pusher delivers its events.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn send(
        &self,
        request: &ProgressEventRequest,
        user_id: Option<&str>,
    ) -> Result<(), PushError>;
}

/// Posts events as JSON to the ingestion endpoint.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSink {
    pub fn new(config: &PusherConfig) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ProgressSink for HttpSink {
    async fn send(
        &self,
        request: &ProgressEventRequest,
        user_id: Option<&str>,
    ) -> Result<(), PushError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(user_id) = user_id {
            builder = builder.header(USER_HEADER, user_id);
        }
        builder.send().await?.error_for_status()?;
        Ok(())
    }
}

/// Delivers events to an in-process [`ProgressService`].
#[derive(Clone)]
pub struct LocalSink {
    service: ProgressService,
}

impl LocalSink {
    pub fn new(service: ProgressService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ProgressSink for LocalSink {
    async fn send(
        &self,
        request: &ProgressEventRequest,
        user_id: Option<&str>,
    ) -> Result<(), PushError> {
        self.service
            .push_event(request.clone(), user_id)
            .await
            .map(|_| ())
            .map_err(|err| PushError::Rejected(err.to_string()))
    }
}
