//! Error types for the snippets client.
//!
//! # Design
//! `ApiError` is what a gateway `failure` callback receives. The status-based
//! kinds carry the raw body because that body is the payload the caller
//! shows to the user. Descriptor problems are caught before any request is
//! built and surface as `OperationError`.

use thiserror::Error;

/// Errors delivered to gateway failure callbacks and returned by
/// `ApiClient::parse_response`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The transport could not complete the exchange.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a 4xx status.
    #[error("HTTP {status}: {body}")]
    ClientError { status: u16, body: String },

    /// The server answered with a 5xx status or an unexpected non-2xx status.
    #[error("HTTP {status}: {body}")]
    ServerError { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),

    /// The request payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    InvalidOperation(#[from] OperationError),
}

impl ApiError {
    /// HTTP status for status-based failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ClientError { status, .. } | ApiError::ServerError { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Raw response body for status-based failures.
    pub fn body(&self) -> Option<&str> {
        match self {
            ApiError::ClientError { body, .. } | ApiError::ServerError { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Classify a non-2xx status.
    pub(crate) fn from_status(status: u16, body: String) -> Self {
        if (400..500).contains(&status) {
            ApiError::ClientError { status, body }
        } else {
            ApiError::ServerError { status, body }
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::Network(err.to_string())
    }
}

/// Descriptor validation and URL template resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("operation kind {kind} does not accept this payload shape")]
    KindMismatch { kind: &'static str },

    #[error("multipart operation requires at least one part")]
    MissingMultipartParts,

    #[error("custom operation requires a body")]
    MissingCustomBody,

    #[error("params source `{0}` has no matching param")]
    UnknownParamSource(String),

    #[error("unresolved placeholder `{{{0}}}` in url template")]
    UnresolvedPlaceholder(String),

    #[error("unterminated placeholder in url template `{0}`")]
    MalformedTemplate(String),

    #[error("value for `{{{0}}}` is a dot segment")]
    DotSegment(String),
}

/// Failures reported by a `Transport` implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Io(String),
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

/// Failures loading `GatewayConfig` from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid timeout `{0}`: expected whole seconds")]
    InvalidTimeout(String),

    #[error("base url must not be empty")]
    EmptyBaseUrl,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            ApiError::from_status(404, String::new()),
            ApiError::ClientError { status: 404, .. }
        ));
        assert!(matches!(
            ApiError::from_status(503, String::new()),
            ApiError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            ApiError::from_status(304, String::new()),
            ApiError::ServerError { status: 304, .. }
        ));
    }

    #[test]
    fn body_and_status_accessors() {
        let err = ApiError::from_status(401, "denied".to_string());
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.body(), Some("denied"));
        assert_eq!(err.to_string(), "HTTP 401: denied");

        let err = ApiError::Network("refused".to_string());
        assert_eq!(err.status(), None);
        assert_eq!(err.body(), None);
    }

    #[test]
    fn placeholder_message_keeps_braces() {
        let err = OperationError::UnresolvedPlaceholder("event-id".to_string());
        assert_eq!(err.to_string(), "unresolved placeholder `{event-id}` in url template");
    }
}
