//! Challenge payloads broadcast to the overlay
//!
//! Field names are snake_case on the wire because the extension reads them
//! directly from the `data` field of `challenge:new` and `challenge:winner`
//! frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::StreamId;
use crate::{Error, Result};

/// Lifecycle state of a challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeState {
    Open,
    Resolved,
}

/// One option a viewer can wager on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeOption {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_id: Option<String>,
    pub option_key: String,
    pub display_name: String,
    pub token_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeMetadata {
    pub total_options: usize,
    pub stream_id: StreamId,
    pub event_type: String,
    pub broadcast_timestamp: DateTime<Utc>,
}

/// `challenge:new` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub title: String,
    pub event_type: String,
    pub stream_id: StreamId,
    pub state: ChallengeState,
    pub created_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub options: Vec<ChallengeOption>,
    pub metadata: ChallengeMetadata,
    pub timestamp: DateTime<Utc>,
}

impl Challenge {
    /// Build an open challenge, stamping every option with the challenge id
    #[must_use]
    pub fn open(
        id: impl Into<String>,
        stream_id: StreamId,
        title: impl Into<String>,
        event_type: impl Into<String>,
        options: Vec<ChallengeOption>,
        now: DateTime<Utc>,
    ) -> Self {
        let id = id.into();
        let event_type = event_type.into();
        let options: Vec<ChallengeOption> = options
            .into_iter()
            .map(|option| ChallengeOption {
                challenge_id: Some(id.clone()),
                created_at: option.created_at.or(Some(now)),
                ..option
            })
            .collect();

        Self {
            metadata: ChallengeMetadata {
                total_options: options.len(),
                stream_id: stream_id.clone(),
                event_type: event_type.clone(),
                broadcast_timestamp: now,
            },
            id,
            title: title.into(),
            event_type,
            stream_id,
            state: ChallengeState::Open,
            created_at: now,
            started_at: now,
            options,
            timestamp: now,
        }
    }

    #[must_use]
    pub fn option(&self, option_id: &str) -> Option<&ChallengeOption> {
        self.options.iter().find(|option| option.id == option_id)
    }
}

/// The winning option of a resolved challenge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerSelection {
    pub option_id: String,
    pub option_key: String,
    pub display_name: String,
    pub token_name: String,
}

/// An option as listed in a winner event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedOption {
    pub id: String,
    pub option_key: String,
    pub display_name: String,
    pub token_name: String,
    pub is_winner: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinnerMetadata {
    pub total_options: usize,
    pub stream_id: StreamId,
    pub event_type: String,
    pub winner_selected_at: DateTime<Utc>,
}

/// `challenge:winner` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeWinnerEvent {
    pub id: String,
    pub title: String,
    pub event_type: String,
    pub stream_id: StreamId,
    pub state: ChallengeState,
    pub winner: WinnerSelection,
    pub options: Vec<ResolvedOption>,
    pub metadata: WinnerMetadata,
    pub timestamp: DateTime<Utc>,
}

impl ChallengeWinnerEvent {
    /// Resolve `challenge` with the option identified by `winner_option_id`
    ///
    /// Fails with `InvalidInput` when the option does not belong to the challenge.
    pub fn resolve(
        challenge: &Challenge,
        winner_option_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let winner = challenge.option(winner_option_id).ok_or_else(|| {
            Error::InvalidInput("Invalid winner option for this challenge".to_string())
        })?;

        Ok(Self {
            id: challenge.id.clone(),
            title: challenge.title.clone(),
            event_type: challenge.event_type.clone(),
            stream_id: challenge.stream_id.clone(),
            state: ChallengeState::Resolved,
            winner: WinnerSelection {
                option_id: winner.id.clone(),
                option_key: winner.option_key.clone(),
                display_name: winner.display_name.clone(),
                token_name: winner.token_name.clone(),
            },
            options: challenge
                .options
                .iter()
                .map(|option| ResolvedOption {
                    id: option.id.clone(),
                    option_key: option.option_key.clone(),
                    display_name: option.display_name.clone(),
                    token_name: option.token_name.clone(),
                    is_winner: option.id == winner_option_id,
                })
                .collect(),
            metadata: WinnerMetadata {
                total_options: challenge.options.len(),
                stream_id: challenge.stream_id.clone(),
                event_type: challenge.event_type.clone(),
                winner_selected_at: now,
            },
            timestamp: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: &str, key: &str, name: &str) -> ChallengeOption {
        ChallengeOption {
            id: id.to_string(),
            challenge_id: None,
            option_key: key.to_string(),
            display_name: name.to_string(),
            token_name: key.to_uppercase(),
            odds: Some(2.0),
            created_at: None,
        }
    }

    fn sample_challenge() -> Challenge {
        Challenge::open(
            "ch1",
            StreamId::parse("stream-1").unwrap(),
            "Who takes the first tower?",
            "first_tower",
            vec![option("o1", "blue", "Blue side"), option("o2", "red", "Red side")],
            Utc::now(),
        )
    }

    #[test]
    fn test_open_challenge_fills_metadata() {
        let challenge = sample_challenge();

        assert_eq!(challenge.state, ChallengeState::Open);
        assert_eq!(challenge.metadata.total_options, 2);
        assert_eq!(challenge.metadata.event_type, "first_tower");
        assert!(challenge
            .options
            .iter()
            .all(|o| o.challenge_id.as_deref() == Some("ch1") && o.created_at.is_some()));
    }

    #[test]
    fn test_challenge_wire_shape() {
        let json = serde_json::to_value(sample_challenge()).unwrap();

        assert_eq!(json["state"], "open");
        assert_eq!(json["stream_id"], "stream-1");
        assert_eq!(json["options"][0]["option_key"], "blue");
        assert_eq!(json["options"][0]["token_name"], "BLUE");
        assert_eq!(json["metadata"]["total_options"], 2);
    }

    #[test]
    fn test_resolve_winner() {
        let challenge = sample_challenge();
        let event = ChallengeWinnerEvent::resolve(&challenge, "o2", Utc::now()).unwrap();

        assert_eq!(event.state, ChallengeState::Resolved);
        assert_eq!(event.winner.option_id, "o2");
        assert_eq!(event.winner.display_name, "Red side");
        assert_eq!(
            event.options.iter().filter(|o| o.is_winner).count(),
            1,
            "exactly one option is the winner"
        );
        assert!(event.options[1].is_winner);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["state"], "resolved");
        assert_eq!(json["winner"]["option_key"], "red");
        assert!(json["metadata"]["winner_selected_at"].is_string());
    }

    #[test]
    fn test_resolve_rejects_foreign_option() {
        let challenge = sample_challenge();
        let result = ChallengeWinnerEvent::resolve(&challenge, "not-an-option", Utc::now());

        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
