//! Route handlers.
//!
//! Handlers only decode the request, call into [`ProgressService`] and
//! encode the result. All semantics live in `ingest-core`.

use crate::error::ApiError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use ingest_core::ingest::ProgressService;
use ingest_core::pusher::USER_HEADER;
use ingest_core::store::keys;
use ingest_protocol::event_models::{EntryId, ProgressEventRequest};
use ingest_protocol::http_models::{
    ActiveRunsResponse, EventsResponse, IngestAck, RegisterRunRequest, RegisterRunResponse,
};
use ingest_protocol::run_models::RunSnapshot;
use serde::Deserialize;
use tokio_stream::{Stream, StreamExt};

/// Page size of the events endpoint when `count` is absent.
pub const DEFAULT_EVENTS_PAGE: usize = 100;

/// Upper bound on `count` for the events endpoint.
pub const MAX_EVENTS_PAGE: usize = 1000;

fn user_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn bad_json(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

pub async fn push_progress(
    State(service): State<ProgressService>,
    headers: HeaderMap,
    body: Result<Json<ProgressEventRequest>, JsonRejection>,
) -> Result<Json<IngestAck>, ApiError> {
    let Json(request) = body.map_err(bad_json)?;
    let ack = service.push_event(request, user_header(&headers)).await?;
    Ok(Json(ack))
}

pub async fn register_run(
    State(service): State<ProgressService>,
    headers: HeaderMap,
    body: Result<Json<RegisterRunRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterRunResponse>), ApiError> {
    let Json(request) = body.map_err(bad_json)?;
    let user_id = if request.user_id.trim().is_empty() {
        user_header(&headers).unwrap_or_default()
    } else {
        request.user_id.as_str()
    };
    let run_id = service
        .register_run(user_id, &request.file_no, request.file_name.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(RegisterRunResponse { run_id })))
}

pub async fn get_run(
    State(service): State<ProgressService>,
    Path(run_id): Path<String>,
) -> Result<Json<RunSnapshot>, ApiError> {
    service
        .snapshot(&run_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("run {run_id} not found")))
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    /// Entry id to resume after, `<ms>-<seq>`.
    pub after: Option<String>,
    pub count: Option<usize>,
}

pub async fn get_run_events(
    State(service): State<ProgressService>,
    Path(run_id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let after = query
        .after
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(|raw| {
            raw.parse::<EntryId>()
                .map_err(|err| ApiError::BadRequest(err.to_string()))
        })
        .transpose()?;
    let count = query
        .count
        .unwrap_or(DEFAULT_EVENTS_PAGE)
        .clamp(1, MAX_EVENTS_PAGE);

    let entries = service.events_after(&run_id, after, count).await?;
    Ok(Json(EventsResponse { run_id, entries }))
}

pub async fn get_user_runs(
    State(service): State<ProgressService>,
    Path(user_id): Path<String>,
) -> Result<Json<ActiveRunsResponse>, ApiError> {
    let mut run_ids = service.active_runs(&user_id).await?;
    run_ids.sort();
    Ok(Json(ActiveRunsResponse { user_id, run_ids }))
}

/// Server-sent events for every entry appended to a run's log.
pub async fn stream_run(
    State(service): State<ProgressService>,
    Path(run_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = service
        .feed()
        .subscribe_key(&keys::run_events(&run_id))
        .map(|feed_entry| {
            Event::default()
                .id(feed_entry.entry.id.to_string())
                .event("progress")
                .json_data(&feed_entry.entry.fields)
        });
    Sse::new(events).keep_alive(KeepAlive::default())
}
