//! Maps raw transport outcomes onto [`ErrorKind`].
//!
//! This is the only place that looks at raw status codes. Everything after it
//! switches on the classified kind.
//!
//! | Outcome | Kind | Retryable |
//! |---------|------|-----------|
//! | no response | `Network` | yes |
//! | status in policy set (401 excluded) | `RateLimited` (429) / `Server` | yes |
//! | 401 | `AuthExpired` | only if the policy lists 401 |
//! | 403 | `Forbidden` | no |
//! | 404 | `NotFound` | no |
//! | other status | `ClientOther` | no |
//! | anything else | `Unknown` | no |

use crate::error::{ClassifiedError, ErrorKind};
use crate::policy::OperationPolicy;
use crate::transport::TransportError;

/// Classify a failed outcome under `policy`.
pub fn classify(outcome: &TransportError, policy: &OperationPolicy) -> ClassifiedError {
    match outcome {
        TransportError::NoResponse(message) => ClassifiedError {
            kind: ErrorKind::Network,
            http_status: None,
            retryable: true,
            message: message.clone(),
        },
        TransportError::Status { status, message } => {
            classify_status(*status, message.clone(), policy)
        }
        TransportError::Other(message) => ClassifiedError {
            kind: ErrorKind::Unknown,
            http_status: None,
            retryable: false,
            message: message.clone(),
        },
    }
}

fn classify_status(status: u16, message: String, policy: &OperationPolicy) -> ClassifiedError {
    let retryable_by_policy = policy.is_retryable_status(status);

    // A 401 keeps its auth meaning even when the policy makes it retryable
    let (kind, retryable) = match status {
        401 => (ErrorKind::AuthExpired, retryable_by_policy),
        429 if retryable_by_policy => (ErrorKind::RateLimited, true),
        _ if retryable_by_policy => (ErrorKind::Server, true),
        403 => (ErrorKind::Forbidden, false),
        404 => (ErrorKind::NotFound, false),
        _ => (ErrorKind::ClientOther, false),
    };

    ClassifiedError {
        kind,
        http_status: Some(status),
        retryable,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> TransportError {
        TransportError::status(code, "failed")
    }

    #[test]
    fn test_no_response_is_retryable_network() {
        let error = classify(
            &TransportError::NoResponse("connection refused".to_string()),
            &OperationPolicy::default(),
        );
        assert_eq!(error.kind, ErrorKind::Network);
        assert!(error.retryable);
        assert_eq!(error.http_status, None);
    }

    #[test]
    fn test_default_retryable_statuses() {
        let policy = OperationPolicy::default();
        let error = classify(&status(429), &policy);
        assert_eq!(error.kind, ErrorKind::RateLimited);
        assert!(error.retryable);

        for code in [500, 502, 503, 504] {
            let error = classify(&status(code), &policy);
            assert_eq!(error.kind, ErrorKind::Server, "status {}", code);
            assert!(error.retryable, "status {}", code);
            assert_eq!(error.http_status, Some(code));
        }
    }

    #[test]
    fn test_unlisted_server_status_is_not_retried() {
        let error = classify(&status(501), &OperationPolicy::default());
        assert_eq!(error.kind, ErrorKind::ClientOther);
        assert!(!error.retryable);
    }

    #[test]
    fn test_custom_retryable_status_is_server() {
        let policy = OperationPolicy::default().with_retryable_status(408);
        let error = classify(&status(408), &policy);
        assert_eq!(error.kind, ErrorKind::Server);
        assert!(error.retryable);
    }

    #[test]
    fn test_unauthorized_is_auth_expired() {
        let error = classify(&status(401), &OperationPolicy::default());
        assert_eq!(error.kind, ErrorKind::AuthExpired);
        assert!(!error.retryable);

        let error = classify(&status(401), &OperationPolicy::telemetry());
        assert_eq!(error.kind, ErrorKind::AuthExpired);
        assert!(error.retryable);
    }

    #[test]
    fn test_terminal_statuses() {
        let policy = OperationPolicy::default();
        assert_eq!(classify(&status(403), &policy).kind, ErrorKind::Forbidden);
        assert_eq!(classify(&status(404), &policy).kind, ErrorKind::NotFound);
        assert_eq!(classify(&status(400), &policy).kind, ErrorKind::ClientOther);
        assert_eq!(classify(&status(422), &policy).kind, ErrorKind::ClientOther);
        for code in [400, 403, 404, 422] {
            assert!(!classify(&status(code), &policy).retryable);
        }
    }

    #[test]
    fn test_unrecognized_outcome_is_unknown() {
        let error = classify(
            &TransportError::Other("bad body".to_string()),
            &OperationPolicy::default(),
        );
        assert_eq!(error.kind, ErrorKind::Unknown);
        assert!(!error.retryable);
        assert_eq!(error.message, "bad body");
    }
}
