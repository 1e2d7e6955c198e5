//! Classified errors surfaced to the caller as fatal envelope entries

use serde::Serialize;
use thiserror::Error;

pub const INVALID_ARGUMENT: &str = "invalid argument";
pub const PERMISSION_DENIED: &str = "permission denied";
pub const UNKNOWN: &str = "unknown";
pub const TOO_MANY_REQUESTS: &str = "too many requests";
pub const UNAUTHORIZED: &str = "unauthorized";
pub const NOT_FOUND: &str = "not found";
pub const AUTH_ERROR: &str = "authorization error";
pub const KEY_ERROR: &str = "key error";

/// Everything that can go wrong while serving a request.
///
/// Each variant maps to exactly one `{type, code, message}` entry in the
/// response envelope; callers never see stack traces or nested causes.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Invalid JSON payload received. {0}")]
    InvalidPayload(String),

    #[error("Unsupported observable error: {0}")]
    UnsupportedObservableType(String),

    #[error("Unable to verify SSL certificate: {0}")]
    SslVerification(String),

    #[error("Unable to connect to Farsight DNSDB: {0}")]
    Transport(String),

    /// Upstream answered with a status the relay cannot treat as empty
    /// results. Classified by status code when building the envelope.
    #[error("Unexpected response from Farsight DNSDB: {body}")]
    UpstreamResponse { status: u16, body: String },

    #[error("The data structure of Farsight DNSDB has changed. The module is broken.")]
    SchemaDrift,
}

impl RelayError {
    /// Envelope error code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Authorization(_) => AUTH_ERROR,
            RelayError::InvalidPayload(_) | RelayError::UnsupportedObservableType(_) => {
                INVALID_ARGUMENT
            }
            RelayError::SslVerification(_) | RelayError::Transport(_) => UNKNOWN,
            RelayError::UpstreamResponse { status, .. } => match status {
                400 | 416 => INVALID_ARGUMENT,
                401 => UNAUTHORIZED,
                403 => PERMISSION_DENIED,
                404 => NOT_FOUND,
                429 => TOO_MANY_REQUESTS,
                _ => UNKNOWN,
            },
            RelayError::SchemaDrift => KEY_ERROR,
        }
    }
}

/// One fatal entry in the `errors` list of the response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    #[serde(rename = "type")]
    pub error_type: &'static str,
    pub code: &'static str,
    pub message: String,
}

impl From<&RelayError> for ErrorPayload {
    fn from(error: &RelayError) -> Self {
        Self {
            error_type: "fatal",
            code: error.code(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_codes_classify() {
        let cases = [
            (400, INVALID_ARGUMENT),
            (401, UNAUTHORIZED),
            (403, PERMISSION_DENIED),
            (404, NOT_FOUND),
            (416, INVALID_ARGUMENT),
            (429, TOO_MANY_REQUESTS),
            (500, UNKNOWN),
            (503, UNKNOWN),
        ];

        for (status, code) in cases {
            let error = RelayError::UpstreamResponse {
                status,
                body: String::new(),
            };
            assert_eq!(error.code(), code, "status {status}");
        }
    }

    #[test]
    fn schema_drift_payload() {
        let payload = ErrorPayload::from(&RelayError::SchemaDrift);
        assert_eq!(payload.error_type, "fatal");
        assert_eq!(payload.code, KEY_ERROR);
        assert_eq!(
            payload.message,
            "The data structure of Farsight DNSDB has changed. The module is broken."
        );
    }
}
