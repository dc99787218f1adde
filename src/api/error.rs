//! Errors raised at the remote-call boundary.

use thiserror::Error;

/// A failed remote call, before it is converted into the crate taxonomy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// Connection refused, reset, DNS failure, and similar.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The server answered but the body could not be decoded.
    #[error("failed to decode response: {message}")]
    Decode { message: String },
}

impl ApiError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Whether the outcome of the request is unknown or the failure may go
    /// away on its own.
    ///
    /// Decode failures count as transient: the server accepted the request,
    /// so its effect must be re-read rather than assumed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } | Self::Decode { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
        }
    }

    /// HTTP status, when the server answered.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for a 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.http_status() == Some(404)
    }
}
