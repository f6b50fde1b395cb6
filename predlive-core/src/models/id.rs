use nanoid::nanoid;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Generate a 12-character nanoid for entity IDs
#[must_use]
pub fn generate_id() -> String {
    nanoid!(12)
}

/// Stream ID: opaque key naming one broadcast topic
///
/// In the application this is a stream's database identifier, but the
/// broadcast layer places no format constraint on it beyond being non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    /// Validate and wrap a caller-supplied stream identifier
    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidInput("Stream ID is required".to_string()));
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
