//! Broadcast frames and their wire encoding
//!
//! Every frame is one server-push text event: `data: <json>\n\n`.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use predlive_core::models::StreamId;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Envelope delivered to every subscriber of a stream on publish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl BroadcastMessage {
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn to_frame(&self) -> Result<Bytes> {
        encode_frame(self)
    }
}

/// Frames generated by the subscription itself rather than by a publisher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Greeting written once when a subscription opens
    Connected {
        #[serde(rename = "streamId")]
        stream_id: StreamId,
        timestamp: DateTime<Utc>,
    },

    /// Keep-alive for intermediaries that close idle connections
    Ping { timestamp: DateTime<Utc> },
}

impl ControlMessage {
    #[must_use]
    pub fn connected(stream_id: StreamId) -> Self {
        Self::Connected {
            stream_id,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn ping() -> Self {
        Self::Ping {
            timestamp: Utc::now(),
        }
    }

    pub fn to_frame(&self) -> Result<Bytes> {
        encode_frame(self)
    }
}

/// Serialize `value` once into a complete `data: ...\n\n` frame
pub fn encode_frame<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    let json = serde_json::to_vec(value)?;
    let mut frame = Vec::with_capacity(json.len() + 8);
    frame.extend_from_slice(b"data: ");
    frame.extend_from_slice(&json);
    frame.extend_from_slice(b"\n\n");
    Ok(Bytes::from(frame))
}
