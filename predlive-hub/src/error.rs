//! Error types for the broadcast hub

use thiserror::Error;

/// Hub error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a single write to a subscriber channel was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("channel closed: subscriber disconnected")]
    Closed,

    #[error("channel full: subscriber too slow to consume frames")]
    Full,
}

/// Result type for hub operations
pub type Result<T> = std::result::Result<T, Error>;
