//! Validation and normalization of raw progress requests.

use crate::ingest::error::{IngestError, IngestResult};
use ingest_protocol::event_models::{ProgressEvent, ProgressEventRequest};
use ingest_protocol::step_models::{EventType, Parsed, ProgressStatus, Step};

/// Canonical form of a file number: 32 lowercase hex digits, dashes removed.
///
/// Returns `None` for anything that is not a 128-bit hex identifier.
pub fn normalize_file_no(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '-')
        .collect::<String>()
        .to_lowercase();
    (cleaned.len() == 32 && cleaned.chars().all(|c| c.is_ascii_hexdigit())).then_some(cleaned)
}

/// Keys a file's latest run id may be stored under, most canonical first.
pub fn file_key_candidates(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    let mut candidates: Vec<String> = Vec::with_capacity(3);
    for candidate in [normalize_file_no(raw), Some(raw.to_lowercase()), Some(raw.to_string())]
        .into_iter()
        .flatten()
    {
        if !candidate.is_empty() && !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Builds the event that will be appended to the logs.
///
/// `run_id` is the already resolved run id. The body's `userId` wins over
/// `user_header`. An unrecognized status is dropped, an unrecognized or
/// missing event type is inferred from the status, and a missing timestamp
/// is replaced by `now_ms`.
pub fn build_event(
    request: &ProgressEventRequest,
    run_id: &str,
    user_header: Option<&str>,
    now_ms: i64,
) -> IngestResult<ProgressEvent> {
    let run_id = run_id.trim();
    if run_id.is_empty() {
        return Err(IngestError::MissingRunId);
    }

    let raw_step = request.current_step.as_deref().unwrap_or_default();
    let current_step = match Step::parse(raw_step) {
        Parsed::Known(step) => step,
        Parsed::Unrecognized(raw) => return Err(IngestError::InvalidStep(raw)),
    };

    let status = trimmed(request.status.as_deref()).and_then(|s| ProgressStatus::parse(s).known());
    let event_type = trimmed(request.event_type.as_deref())
        .and_then(|t| EventType::parse(t).known())
        .unwrap_or_else(|| EventType::infer(status));

    Ok(ProgressEvent {
        event_type,
        run_id: run_id.to_string(),
        user_id: trimmed(request.user_id.as_deref())
            .or_else(|| trimmed(user_header))
            .map(str::to_string),
        file_no: trimmed(request.file_no.as_deref()).map(str::to_string),
        current_step,
        status,
        processed: request.processed,
        total: request.total,
        ts: request.ts.unwrap_or(now_ms),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(step: &str) -> ProgressEventRequest {
        ProgressEventRequest {
            run_id: Some("42".into()),
            current_step: Some(step.into()),
            ..ProgressEventRequest::default()
        }
    }

    #[test]
    fn test_normalize_file_no() {
        assert_eq!(
            normalize_file_no(" 0123ABCD-0123-abcd-0123-0123456789ab "),
            Some("0123abcd0123abcd01230123456789ab".to_string())
        );
        assert_eq!(normalize_file_no("1234"), None);
        assert_eq!(normalize_file_no("zz23abcd0123abcd01230123456789ab"), None);
    }

    #[test]
    fn test_file_key_candidates_deduplicate() {
        let raw = "0123ABCD-0123-ABCD-0123-0123456789AB";
        assert_eq!(
            file_key_candidates(raw),
            vec![
                "0123abcd0123abcd01230123456789ab".to_string(),
                "0123abcd-0123-abcd-0123-0123456789ab".to_string(),
                raw.to_string(),
            ]
        );
        assert_eq!(file_key_candidates("7"), vec!["7".to_string()]);
    }

    #[test]
    fn test_build_event_infers_missing_fields() {
        let mut req = request("embedding");
        req.status = Some("completed".into());
        let event = build_event(&req, "42", Some("header-user"), 1_000).unwrap();

        assert_eq!(event.current_step, Step::Embedding);
        assert_eq!(event.status, Some(ProgressStatus::Completed));
        assert_eq!(event.event_type, EventType::StepEnd);
        assert_eq!(event.user_id.as_deref(), Some("header-user"));
        assert_eq!(event.ts, 1_000);
    }

    #[test]
    fn test_build_event_prefers_body_user_and_timestamp() {
        let mut req = request("UPLOAD");
        req.user_id = Some("body-user".into());
        req.ts = Some(7);
        req.event_type = Some("step-start".into());
        let event = build_event(&req, "42", Some("header-user"), 1_000).unwrap();

        assert_eq!(event.user_id.as_deref(), Some("body-user"));
        assert_eq!(event.ts, 7);
        assert_eq!(event.event_type, EventType::StepStart);
    }

    #[test]
    fn test_build_event_drops_unknown_status() {
        let mut req = request("UPLOAD");
        req.status = Some("WEIRD".into());
        let event = build_event(&req, "42", None, 0).unwrap();
        assert_eq!(event.status, None);
        assert_eq!(event.event_type, EventType::StepUpdate);
    }

    #[test]
    fn test_build_event_rejects_invalid_input() {
        assert_eq!(
            build_event(&request("BOGUS"), "42", None, 0),
            Err(IngestError::InvalidStep("BOGUS".into()))
        );
        assert_eq!(
            build_event(&request("UPLOAD"), "  ", None, 0),
            Err(IngestError::MissingRunId)
        );

        let missing_step = ProgressEventRequest::default();
        assert!(matches!(
            build_event(&missing_step, "42", None, 0),
            Err(IngestError::InvalidStep(_))
        ));
    }
}
