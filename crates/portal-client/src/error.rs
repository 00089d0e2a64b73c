//! Error types for the portal client crate.
//!
//! This module provides:
//! - [`ErrorKind`]: the closed taxonomy every transport failure is mapped onto
//! - [`ClassifiedError`]: a failure plus its retryability verdict
//! - [`PortalError`]: the error returned by every public operation

use std::fmt;

use thiserror::Error;

/// Result type alias for portal client operations.
pub type Result<T> = std::result::Result<T, PortalError>;

/// Classification of a failed remote call.
///
/// Downstream logic (retry, refresh, fallback) switches on this kind only,
/// never on raw transport shapes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// No response was received (connection refused, DNS, timeout).
    Network,
    /// HTTP 401. The credentials are expired or invalid.
    AuthExpired,
    /// HTTP 403.
    Forbidden,
    /// HTTP 404. Advances a fallback chain instead of retrying locally.
    NotFound,
    /// HTTP 429.
    RateLimited,
    /// Retryable 5xx.
    Server,
    /// Any other non-success status.
    ClientOther,
    /// Anything that could not be recognized, e.g. an undecodable body.
    Unknown,
}

impl ErrorKind {
    /// Human-readable message suitable for showing to the user.
    pub fn user_message(&self, status: Option<u16>) -> String {
        match self {
            Self::Network => {
                "Could not reach the portal. Check your network connection and try again.".into()
            }
            Self::AuthExpired => "Your session has expired. Please log in again.".into(),
            Self::Forbidden => "You do not have permission to perform this operation.".into(),
            Self::NotFound => "The requested resource was not found.".into(),
            Self::RateLimited => "Too many requests. Please wait a moment and try again.".into(),
            Self::Server => match status {
                Some(code) => format!(
                    "A server error occurred ({}). Please try again later.",
                    code
                ),
                None => "A server error occurred. Please try again later.".into(),
            },
            Self::ClientOther | Self::Unknown => {
                "An error occurred while calling the portal API.".into()
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "NETWORK",
            Self::AuthExpired => "AUTH_EXPIRED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::RateLimited => "RATE_LIMITED",
            Self::Server => "SERVER",
            Self::ClientOther => "CLIENT_OTHER",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// A transport failure mapped onto [`ErrorKind`] with a retry verdict.
///
/// Produced only by [`classify`](crate::classifier::classify) and never
/// persisted beyond the decision for one attempt.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{kind}: {message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub http_status: Option<u16>,
    pub retryable: bool,
    pub message: String,
}

impl ClassifiedError {
    /// Message for the notification sink, derived from the kind.
    pub fn user_message(&self) -> String {
        self.kind.user_message(self.http_status)
    }
}

/// Errors that can occur during portal operations.
#[derive(Debug, Error)]
pub enum PortalError {
    /// The remote call failed terminally
    #[error("API error ({0})")]
    Api(#[from] ClassifiedError),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The owning caller cancelled the call
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid request (bad URL, missing required data, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PortalError {
    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// The classified kind, if this error came from a remote call.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Api(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Message for the notification sink.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            Self::Cancelled => "The operation was cancelled.".into(),
            Self::InvalidRequest(msg) => format!("Invalid request: {}", msg),
            Self::Http(_) | Self::Json(_) => ErrorKind::Unknown.user_message(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classified(kind: ErrorKind, status: Option<u16>) -> ClassifiedError {
        ClassifiedError {
            kind,
            http_status: status,
            retryable: false,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_error_display() {
        let error = PortalError::from(classified(ErrorKind::NotFound, Some(404)));
        assert_eq!(format!("{}", error), "API error (NOT_FOUND: boom)");

        assert_eq!(format!("{}", PortalError::Cancelled), "Operation cancelled");
        assert_eq!(
            format!("{}", PortalError::invalid_request("missing token")),
            "Invalid request: missing token"
        );
    }

    #[test]
    fn test_server_message_includes_status() {
        let error = classified(ErrorKind::Server, Some(502));
        assert_eq!(
            error.user_message(),
            "A server error occurred (502). Please try again later."
        );
    }

    #[test]
    fn test_kind_only_for_api_errors() {
        let error = PortalError::from(classified(ErrorKind::Forbidden, Some(403)));
        assert_eq!(error.kind(), Some(ErrorKind::Forbidden));
        assert_eq!(PortalError::Cancelled.kind(), None);
    }
}
