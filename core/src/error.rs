//! Error types for the EnreachVoice client.
//!
//! # Design
//! Server-side failures are classified into three buckets that callers act on
//! differently: `Authentication` (credentials or discovery rejected),
//! `RateLimit` (back off and retry) and `Api` (everything else, with the raw
//! status and server message). Local validation failures are `Parameter` and
//! are always raised before any request leaves the process.

use std::time::Duration;

use thiserror::Error;

/// Discriminant of an [`EnreachError`], for callers that only need to branch
/// on the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    RateLimit,
    Api,
    Parameter,
    TranscriptTimeout,
    Transport,
    Decode,
    Serialization,
    Io,
}

/// Errors returned by every fallible client operation.
#[derive(Debug, Error)]
pub enum EnreachError {
    /// Discovery, password grant or identity exchange was rejected, or any
    /// endpoint answered 401.
    #[error("authentication failed: {message}")]
    Authentication { status: Option<u16>, message: String },

    /// The server answered 429.
    #[error("API rate limit exceeded: {message}")]
    RateLimit {
        retry_after: Option<Duration>,
        message: String,
    },

    /// Any other non-2xx response.
    #[error("API request failed with HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// A required argument was missing, malformed or contradictory.
    #[error("invalid parameter: {0}")]
    Parameter(String),

    /// A transcript was still `Pending` when the polling budget ran out.
    #[error("transcript {transcript_id} still pending after {waited:?}")]
    TranscriptTimeout {
        transcript_id: String,
        waited: Duration,
    },

    /// The request never produced an HTTP response.
    #[error("network error: {0}")]
    Transport(String),

    /// The response body could not be deserialized into the expected type.
    #[error("invalid response body: {0}")]
    Decode(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EnreachError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::Api { .. } => ErrorKind::Api,
            Self::Parameter(_) => ErrorKind::Parameter,
            Self::TranscriptTimeout { .. } => ErrorKind::TranscriptTimeout,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// HTTP status code that caused this error, if it came from a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } => *status,
            Self::RateLimit { .. } => Some(429),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn parameter(message: impl Into<String>) -> Self {
        Self::Parameter(message.into())
    }
}
