//! Domain errors for the composer.

use serde::Serialize;
use thiserror::Error;

use crate::domain::models::action::ActionKind;
use crate::domain::models::document::Position;

/// Errors reported by a document collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("Position {position} is outside the document (length {len})")]
    OutOfBounds { position: Position, len: usize },

    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange { start: Position, end: Position },
}

/// Errors raised by a transformation service while opening or consuming a stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// Request rejected as malformed (HTTP 400, 422)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or rejected credentials (HTTP 401, 403)
    #[error("Unauthorized - the service rejected the credentials")]
    Unauthorized,

    /// Endpoint or model not found (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Too many requests (HTTP 429)
    #[error("Rate limit exceeded - too many requests")]
    RateLimited,

    /// Server-side failure (HTTP 5xx)
    #[error("Server error ({status}): {body}")]
    Server { status: u16, body: String },

    /// Any other non-success status
    #[error("Unexpected status ({status}): {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The service did not answer in time
    #[error("Request timeout")]
    Timeout,

    /// The response body violated the streaming protocol
    #[error("Malformed stream: {0}")]
    Protocol(String),

    /// The backend signalled an error inside the stream
    #[error("Backend error: {0}")]
    Backend(String),

    /// The caller cancelled the stream
    #[error("Stream cancelled")]
    Cancelled,
}

impl TransformError {
    /// Returns true if this error is transient and establishing the stream may be retried
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Server { .. } | Self::Network(_) | Self::Timeout
        )
    }
}

/// Errors surfaced by the rewrite pipeline.
///
/// Every failure of an action ends up as one of these on the orchestrator's
/// observable channel; nothing propagates into the host uncaught.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComposerError {
    #[error("The captured scope no longer matches the document")]
    StaleScope,

    #[error("Nothing to rewrite: the scoped text is empty")]
    EmptyInput,

    #[error("Failed to establish the transform stream after {attempts} attempt(s): {source}")]
    StreamEstablish {
        attempts: u32,
        #[source]
        source: TransformError,
    },

    #[error("Transform stream failed after {chunks_applied} chunk(s): {source}")]
    StreamMid {
        chunks_applied: usize,
        #[source]
        source: TransformError,
    },

    #[error("Another action is already running: {active}")]
    Busy { active: ActionKind },

    #[error("Action cancelled")]
    Cancelled,

    #[error("Action '{0}' is not available")]
    UnsupportedAction(ActionKind),

    #[error("Invalid action parameters: {0}")]
    InvalidParameters(String),

    #[error("The rewrite target was removed by a concurrent edit")]
    PatchTargetLost,

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),
}

/// Serializable discriminant of [`ComposerError`] for notification channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    StaleScope,
    EmptyInput,
    StreamEstablish,
    StreamMid,
    Busy,
    Cancelled,
    UnsupportedAction,
    InvalidParameters,
    PatchTargetLost,
    Document,
}

impl ComposerError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::StaleScope => ErrorKind::StaleScope,
            Self::EmptyInput => ErrorKind::EmptyInput,
            Self::StreamEstablish { .. } => ErrorKind::StreamEstablish,
            Self::StreamMid { .. } => ErrorKind::StreamMid,
            Self::Busy { .. } => ErrorKind::Busy,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::UnsupportedAction(_) => ErrorKind::UnsupportedAction,
            Self::InvalidParameters(_) => ErrorKind::InvalidParameters,
            Self::PatchTargetLost => ErrorKind::PatchTargetLost,
            Self::Document(_) => ErrorKind::Document,
        }
    }

    /// Errors that happen before anything is written to the document
    pub const fn is_pre_mutation(&self) -> bool {
        matches!(
            self,
            Self::StaleScope
                | Self::EmptyInput
                | Self::Busy { .. }
                | Self::UnsupportedAction(_)
                | Self::InvalidParameters(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(TransformError::RateLimited.is_transient());
        assert!(TransformError::Server {
            status: 503,
            body: "unavailable".to_string()
        }
        .is_transient());
        assert!(TransformError::Timeout.is_transient());
        assert!(TransformError::Network("reset".to_string()).is_transient());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(!TransformError::InvalidRequest("bad".to_string()).is_transient());
        assert!(!TransformError::Unauthorized.is_transient());
        assert!(!TransformError::Backend("model refused".to_string()).is_transient());
        assert!(!TransformError::Cancelled.is_transient());
    }

    #[test]
    fn test_error_kind_mapping() {
        let err = ComposerError::StreamMid {
            chunks_applied: 2,
            source: TransformError::Backend("boom".to_string()),
        };
        assert_eq!(err.kind(), ErrorKind::StreamMid);
        assert!(!err.is_pre_mutation());
        assert!(ComposerError::StaleScope.is_pre_mutation());
        assert_eq!(
            serde_json::to_value(ErrorKind::StreamEstablish).unwrap(),
            serde_json::json!("stream_establish")
        );
    }

    #[test]
    fn test_display_includes_attempts() {
        let err = ComposerError::StreamEstablish {
            attempts: 3,
            source: TransformError::Timeout,
        };
        assert_eq!(
            err.to_string(),
            "Failed to establish the transform stream after 3 attempt(s): Request timeout"
        );
    }
}
