//! Broadcast publish endpoint
//!
//! `POST /api/broadcast` fans one event out to every subscriber of a stream.
//! The same path answers `GET` with a subscription so a producer and its
//! overlay can share one URL.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::get,
    Json, Router,
};
use predlive_core::models::StreamId;
use predlive_hub::{BroadcastMessage, PublishReport};
use serde::{Deserialize, Serialize};

use crate::http::{events, AppError, AppResult, AppState};

pub fn create_broadcast_router() -> Router<AppState> {
    Router::new().route(
        "/api/broadcast",
        get(events::subscribe_by_query).post(publish),
    )
}

/// Publish request body
///
/// Every field is optional at the parsing layer so a missing field produces
/// a message naming it instead of a generic deserialization error.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub stream_id: Option<String>,
    pub event: Option<String>,
    pub payload: Option<serde_json::Value>,
}

impl PublishRequest {
    /// Split into validated parts, naming every absent or empty field
    ///
    /// `payload` may be any JSON value except `null`, so `0`, `false` and `""`
    /// are valid payloads.
    pub fn into_parts(self) -> AppResult<(StreamId, String, serde_json::Value)> {
        let stream_id = self.stream_id.filter(|s| !s.is_empty());
        let event = self.event.filter(|e| !e.is_empty());
        let payload = self.payload;

        match (stream_id, event, payload) {
            (Some(stream_id), Some(event), Some(payload)) => {
                Ok((StreamId::parse(stream_id)?, event, payload))
            }
            (stream_id, event, payload) => {
                let missing: Vec<&str> = [
                    ("streamId", stream_id.is_none()),
                    ("event", event.is_none()),
                    ("payload", payload.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, is_missing)| is_missing.then_some(name))
                .collect();

                Err(AppError::bad_request(format!(
                    "Missing required fields: {}",
                    missing.join(", ")
                )))
            }
        }
    }
}

/// Publish response body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub message: String,
    pub sent_count: usize,
    pub failed_count: usize,
    pub event_type: String,
    pub stream_id: StreamId,
}

impl PublishResponse {
    fn from_report(stream_id: StreamId, event_type: String, report: PublishReport) -> Self {
        let message = if report == PublishReport::default() {
            "No active connections".to_string()
        } else {
            format!("Broadcast sent to {} connections", report.sent_count)
        };

        Self {
            message,
            sent_count: report.sent_count,
            failed_count: report.failed_count,
            event_type,
            stream_id,
        }
    }
}

/// Publish an event to every subscriber of `streamId`
pub async fn publish(
    State(state): State<AppState>,
    body: Result<Json<PublishRequest>, JsonRejection>,
) -> AppResult<Json<PublishResponse>> {
    let Json(request) = body?;
    let (stream_id, event_type, payload) = request.into_parts()?;

    let response = publish_event(&state, stream_id, event_type, payload)?;
    Ok(Json(response))
}

/// Shared by the publish endpoint and the diagnostic producers
pub(crate) fn publish_event(
    state: &AppState,
    stream_id: StreamId,
    event_type: String,
    payload: serde_json::Value,
) -> AppResult<PublishResponse> {
    let message = BroadcastMessage::new(event_type.clone(), payload);
    let report = state.hub.publish(&stream_id, &message)?;

    Ok(PublishResponse::from_report(stream_id, event_type, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    fn request(value: serde_json::Value) -> PublishRequest {
        serde_json::from_value(value).unwrap()
    }

    fn missing_message(value: serde_json::Value) -> String {
        let err = request(value).into_parts().unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        err.message
    }

    #[test]
    fn test_complete_request() {
        let (stream_id, event, payload) = request(json!({
            "streamId": "abc",
            "event": "challenge:new",
            "payload": { "id": "x" }
        }))
        .into_parts()
        .unwrap();

        assert_eq!(stream_id.as_str(), "abc");
        assert_eq!(event, "challenge:new");
        assert_eq!(payload, json!({ "id": "x" }));
    }

    #[test]
    fn test_missing_fields_are_named() {
        assert_eq!(
            missing_message(json!({})),
            "Missing required fields: streamId, event, payload"
        );
        assert_eq!(
            missing_message(json!({ "event": "e", "payload": {} })),
            "Missing required fields: streamId"
        );
        assert_eq!(
            missing_message(json!({ "streamId": "", "event": "e", "payload": null })),
            "Missing required fields: streamId, payload"
        );
    }

    #[test]
    fn test_falsy_payloads_are_accepted() {
        for payload in [json!(0), json!(false), json!(""), json!([])] {
            let parts = request(json!({ "streamId": "s", "event": "e", "payload": payload }))
                .into_parts();
            assert!(parts.is_ok());
        }
    }

    #[test]
    fn test_response_message() {
        let stream_id = StreamId::parse("s").unwrap();

        let empty =
            PublishResponse::from_report(stream_id.clone(), "e".into(), PublishReport::default());
        assert_eq!(empty.message, "No active connections");

        let sent = PublishResponse::from_report(
            stream_id,
            "e".into(),
            PublishReport {
                sent_count: 3,
                failed_count: 1,
            },
        );
        assert_eq!(sent.message, "Broadcast sent to 3 connections");
        assert_eq!(sent.failed_count, 1);
    }
}
