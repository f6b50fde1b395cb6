//! Diagnostic producers
//!
//! Each endpoint publishes a canned event to a stream so an overlay can be
//! checked end to end without a real producer.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use predlive_core::models::{event, Challenge, ChallengeOption, ChallengeWinnerEvent, StreamId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::http::{
    broadcast::{publish_event, PublishResponse},
    AppError, AppResult, AppState,
};

pub fn create_diagnostics_router() -> Router<AppState> {
    Router::new()
        .route("/api/test-broadcast", post(test_broadcast))
        .route("/api/test-simple-broadcast", post(test_simple_broadcast))
        .route("/api/test-challenge", post(test_challenge))
        .route("/api/test-winner", post(test_winner))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticRequest {
    pub stream_id: Option<String>,
    /// Custom text for `test:message`; ignored by the other producers
    pub message: Option<String>,
    /// Winning option for `test-winner`, defaults to the first option
    pub winner_option_id: Option<String>,
}

impl DiagnosticRequest {
    fn stream_id(&self, missing_message: &str) -> AppResult<StreamId> {
        match self.stream_id.as_deref() {
            Some(id) if !id.is_empty() => Ok(StreamId::parse(id)?),
            _ => Err(AppError::bad_request(missing_message)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DiagnosticResponse {
    pub success: bool,
    pub result: PublishResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge: Option<Challenge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<ChallengeWinnerEvent>,
}

impl DiagnosticResponse {
    fn published(result: PublishResponse) -> Self {
        Self {
            success: true,
            result,
            message: None,
            challenge: None,
            winner: None,
        }
    }
}

/// Publish `test:message` with optional custom text
pub async fn test_broadcast(
    State(state): State<AppState>,
    body: Result<Json<DiagnosticRequest>, JsonRejection>,
) -> AppResult<Json<DiagnosticResponse>> {
    let Json(request) = body?;
    let stream_id = request.stream_id("Stream ID is required")?;
    let now = Utc::now();

    info!(stream_id = %stream_id, "Test broadcast requested");

    let text = request
        .message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("Test message at {}", now.to_rfc3339()));
    let payload = json!({ "message": text, "timestamp": now });

    let result = publish_event(&state, stream_id, event::TEST_MESSAGE.to_string(), payload)?;
    Ok(Json(DiagnosticResponse::published(result)))
}

/// Publish `test:simple`
pub async fn test_simple_broadcast(
    State(state): State<AppState>,
    body: Result<Json<DiagnosticRequest>, JsonRejection>,
) -> AppResult<Json<DiagnosticResponse>> {
    let Json(request) = body?;
    let stream_id = request.stream_id("Missing required field: streamId")?;
    let now = Utc::now();

    info!(stream_id = %stream_id, "Simple test broadcast requested");

    let payload = json!({
        "message": format!("Simple test message at {}", now.to_rfc3339()),
        "test": true,
        "timestamp": now,
    });

    let result = publish_event(&state, stream_id, event::TEST_SIMPLE.to_string(), payload)?;
    Ok(Json(DiagnosticResponse {
        message: Some("Simple test message sent successfully".to_string()),
        ..DiagnosticResponse::published(result)
    }))
}

/// Publish a two-option dummy `challenge:new`
pub async fn test_challenge(
    State(state): State<AppState>,
    body: Result<Json<DiagnosticRequest>, JsonRejection>,
) -> AppResult<Json<DiagnosticResponse>> {
    let Json(request) = body?;
    let stream_id = request.stream_id("Missing required field: streamId")?;

    info!(stream_id = %stream_id, "Test challenge broadcast requested");

    let challenge = dummy_challenge(stream_id.clone(), Utc::now());
    let payload = serde_json::to_value(&challenge).map_err(predlive_core::Error::from)?;

    let result = publish_event(&state, stream_id, event::CHALLENGE_NEW.to_string(), payload)?;
    Ok(Json(DiagnosticResponse {
        challenge: Some(challenge),
        ..DiagnosticResponse::published(result)
    }))
}

/// Resolve the dummy challenge and publish `challenge:winner`
pub async fn test_winner(
    State(state): State<AppState>,
    body: Result<Json<DiagnosticRequest>, JsonRejection>,
) -> AppResult<Json<DiagnosticResponse>> {
    let Json(request) = body?;
    let stream_id = request.stream_id("Missing required field: streamId")?;
    let winner_option_id = request
        .winner_option_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| "option-1".to_string());

    info!(
        stream_id = %stream_id,
        winner_option_id = %winner_option_id,
        "Test winner broadcast requested"
    );

    let now = Utc::now();
    let challenge = dummy_challenge(stream_id.clone(), now);
    let winner = ChallengeWinnerEvent::resolve(&challenge, &winner_option_id, now)?;
    let payload = serde_json::to_value(&winner).map_err(predlive_core::Error::from)?;

    let result = publish_event(&state, stream_id, event::CHALLENGE_WINNER.to_string(), payload)?;
    Ok(Json(DiagnosticResponse {
        winner: Some(winner),
        ..DiagnosticResponse::published(result)
    }))
}

fn dummy_challenge(stream_id: StreamId, now: DateTime<Utc>) -> Challenge {
    let option = |id: &str, key: &str, name: &str, odds: f64| ChallengeOption {
        id: id.to_string(),
        challenge_id: None,
        option_key: key.to_string(),
        display_name: name.to_string(),
        token_name: key.to_uppercase(),
        odds: Some(odds),
        created_at: None,
    };

    Challenge::open(
        format!("test-challenge-{}", now.timestamp_millis()),
        stream_id,
        "Test Challenge - Who will win?",
        "test_event",
        vec![
            option("option-1", "team_a", "Team A", 2.0),
            option("option-2", "team_b", "Team B", 1.5),
        ],
        now,
    )
}
