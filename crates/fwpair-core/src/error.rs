// ── Core error types ──
//
// Run-level errors from fwpair-core. Stages record per-entity failures in
// the domain model and only surface a `CoreError` when the run cannot go on
// or a single call failed. The `From<fwpair_api::Error>` impl translates
// transport-layer errors into these variants.

use std::time::Duration;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to controller at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if the controller answered).
        status: Option<u16>,
    },

    // ── Waiting ──────────────────────────────────────────────────────
    #[error("Timed out waiting for {operation} after {}s", waited.as_secs())]
    Timeout { operation: String, waited: Duration },

    // ── Input errors ─────────────────────────────────────────────────
    #[error("Template error: {message}")]
    Template { message: String },

    #[error("Invalid object plan: {message}")]
    Plan { message: String },

    #[error("Precondition not met: {message}")]
    Precondition { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Errors after which no further call against the controller can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::ConnectionFailed { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub(crate) fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<fwpair_api::Error> for CoreError {
    fn from(err: fwpair_api::Error) -> Self {
        match err {
            fwpair_api::Error::Authentication { message } => CoreError::Authentication { message },
            fwpair_api::Error::Transport(ref e) => {
                if e.is_connect() || e.is_timeout() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), |u| u.origin().ascii_serialization()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            fwpair_api::Error::InvalidUrl(e) => CoreError::ConnectionFailed {
                url: "<invalid>".into(),
                reason: e.to_string(),
            },
            fwpair_api::Error::Tls(reason) => CoreError::ConnectionFailed {
                url: "<tls>".into(),
                reason,
            },
            fwpair_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            fwpair_api::Error::Deserialization { message, .. } => CoreError::Api {
                message: format!("unexpected response: {message}"),
                status: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_keep_status_and_description() {
        let err: CoreError = fwpair_api::Error::Api {
            status: 422,
            message: "Invalid interface".into(),
        }
        .into();
        assert!(matches!(
            err,
            CoreError::Api {
                status: Some(422),
                ..
            }
        ));
        assert!(!err.is_fatal());
    }

    #[test]
    fn authentication_is_fatal() {
        let err: CoreError = fwpair_api::Error::Authentication {
            message: "rejected".into(),
        }
        .into();
        assert!(err.is_fatal());
    }
}
