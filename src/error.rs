//! Error types for the ailoop SDK.
//!
//! Every failed call surfaces exactly one [`Error`] variant. The message model
//! only ever produces [`Error::Validation`]; the HTTP and WebSocket layers
//! classify transport failures into [`Error::Connection`] and
//! [`Error::Timeout`] and annotate them with the endpoint and status code
//! through [`Origin`].

use std::fmt;

/// Where a transport error came from: the endpoint and, when the server
/// answered, the HTTP status code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Origin {
    /// Endpoint in `METHOD /path` form.
    pub endpoint: Option<String>,
    /// HTTP status code returned by the server.
    pub status: Option<u16>,
}

impl Origin {
    /// Origin with only an endpoint.
    pub fn endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            status: None,
        }
    }

    /// Attach a status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns `true` if neither endpoint nor status is known.
    pub fn is_empty(&self) -> bool {
        self.endpoint.is_none() && self.status.is_none()
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.endpoint, self.status) {
            (Some(endpoint), Some(status)) => write!(f, " ({endpoint}, status {status})"),
            (Some(endpoint), None) => write!(f, " ({endpoint})"),
            (None, Some(status)) => write!(f, " (status {status})"),
            (None, None) => Ok(()),
        }
    }
}

/// Errors surfaced by the SDK.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server was unreachable, the connection dropped, or the server
    /// answered with a non-2xx status other than 400/404.
    #[error("connection error: {message}{origin}")]
    Connection {
        /// Human-readable description.
        message: String,
        /// Endpoint and status, when known.
        origin: Origin,
    },

    /// The payload shape or a business rule was violated. Also used for
    /// 400 and 404 responses.
    #[error("validation error: {message}{origin}")]
    Validation {
        /// Which field or value was invalid.
        message: String,
        /// Endpoint and status, when the failure came from the server.
        origin: Origin,
    },

    /// The request exceeded its deadline.
    #[error("timeout: {message}{origin}")]
    Timeout {
        /// Human-readable description.
        message: String,
        /// Endpoint, when known.
        origin: Origin,
    },
}

/// Discriminant of [`Error`], for matching without destructuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::Connection`].
    Connection,
    /// See [`Error::Validation`].
    Validation,
    /// See [`Error::Timeout`].
    Timeout,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::Validation => write!(f, "validation"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

impl Error {
    /// Connection error without origin.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            origin: Origin::default(),
        }
    }

    /// Validation error without origin.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            origin: Origin::default(),
        }
    }

    /// Timeout error without origin.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
            origin: Origin::default(),
        }
    }

    /// Replace the origin of this error.
    pub fn with_origin(mut self, new_origin: Origin) -> Self {
        match &mut self {
            Self::Connection { origin, .. }
            | Self::Validation { origin, .. }
            | Self::Timeout { origin, .. } => *origin = new_origin,
        }
        self
    }

    /// Which of the error kinds this is.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// The description without the origin suffix.
    pub fn message(&self) -> &str {
        match self {
            Self::Connection { message, .. }
            | Self::Validation { message, .. }
            | Self::Timeout { message, .. } => message,
        }
    }

    /// Endpoint and status attached to this error.
    pub fn origin(&self) -> &Origin {
        match self {
            Self::Connection { origin, .. }
            | Self::Validation { origin, .. }
            | Self::Timeout { origin, .. } => origin,
        }
    }

    /// HTTP status code, if the server answered.
    pub fn status(&self) -> Option<u16> {
        self.origin().status
    }

    /// Returns `true` for [`Error::Validation`].
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// Returns `true` for [`Error::Connection`].
    pub fn is_connection(&self) -> bool {
        self.kind() == ErrorKind::Connection
    }

    /// Returns `true` for [`Error::Timeout`].
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// Classify a [`reqwest::Error`] raised while talking to `endpoint`.
    pub fn classify_reqwest(err: &reqwest::Error, endpoint: &str) -> Self {
        let origin = Origin::endpoint(endpoint);
        if err.is_timeout() {
            Self::timeout(format!("request timed out: {err}")).with_origin(origin)
        } else if err.is_decode() {
            Self::validation(format!("invalid response body: {err}")).with_origin(origin)
        } else if let Some(status) = err.status() {
            Self::connection(err.to_string()).with_origin(origin.with_status(status.as_u16()))
        } else {
            Self::connection(err.to_string()).with_origin(origin)
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map(|url| url.path().to_string())
            .unwrap_or_default();
        Self::classify_reqwest(&err, &endpoint)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::connection(format!("websocket error: {err}"))
    }
}

/// Result alias used across the SDK.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_without_origin() {
        let err = Error::validation("text must not be empty");
        assert_eq!(err.to_string(), "validation error: text must not be empty");
    }

    #[test]
    fn display_with_endpoint_and_status() {
        let err = Error::connection("HTTP error 500: boom")
            .with_origin(Origin::endpoint("POST /api/v1/messages").with_status(500));
        assert_eq!(
            err.to_string(),
            "connection error: HTTP error 500: boom (POST /api/v1/messages, status 500)"
        );
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.message(), "HTTP error 500: boom");
    }

    #[test]
    fn display_with_endpoint_only() {
        let err = Error::timeout("request timed out")
            .with_origin(Origin::endpoint("GET /api/v1/health"));
        assert_eq!(
            err.to_string(),
            "timeout: request timed out (GET /api/v1/health)"
        );
        assert!(err.status().is_none());
    }

    #[test]
    fn kinds() {
        assert_eq!(Error::connection("x").kind(), ErrorKind::Connection);
        assert_eq!(Error::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(Error::timeout("x").kind(), ErrorKind::Timeout);
        assert!(Error::validation("x").is_validation());
        assert!(Error::connection("x").is_connection());
        assert!(Error::timeout("x").is_timeout());
        assert_eq!(ErrorKind::Timeout.to_string(), "timeout");
    }

    #[test]
    fn json_errors_are_validation() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(err.is_validation());
        assert!(err.origin().is_empty());
    }
}
