//! HTTP request execution and status mapping.
//!
//! [`HttpTransport`] wraps a pooled [`reqwest::Client`] bound to one server.
//! Every call names its endpoint in `METHOD /path` form; that string ends up
//! in the [`Origin`] of any error raised for the call.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::error::{Error, Origin, Result};

/// Messages used when the server rejects a call with 400 or 404.
///
/// Unset messages fall back to a generic text followed by the response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusMessages {
    /// Prefix of the 400 message; the response body follows it.
    pub bad_request: Option<String>,
    /// Full 404 message.
    pub not_found: Option<String>,
}

impl StatusMessages {
    /// Generic messages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the 400 prefix.
    pub fn bad_request(mut self, prefix: impl Into<String>) -> Self {
        self.bad_request = Some(prefix.into());
        self
    }

    /// Set the 404 message.
    pub fn not_found(mut self, message: impl Into<String>) -> Self {
        self.not_found = Some(message.into());
        self
    }
}

/// Map a non-2xx status to an error.
///
/// 400 and 404 are [`Error::Validation`]; every other status is
/// [`Error::Connection`].
pub fn status_error(
    status: StatusCode,
    body: &str,
    endpoint: &str,
    messages: &StatusMessages,
) -> Error {
    let origin = Origin::endpoint(endpoint).with_status(status.as_u16());
    let error = match status {
        StatusCode::BAD_REQUEST => {
            let prefix = messages.bad_request.as_deref().unwrap_or("Invalid request");
            Error::validation(format!("{prefix}: {body}"))
        },
        StatusCode::NOT_FOUND => match &messages.not_found {
            Some(message) => Error::validation(message.clone()),
            None => Error::validation(format!("Not found: {body}")),
        },
        _ => Error::connection(format!("HTTP error {}: {body}", status.as_u16())),
    };
    error.with_origin(origin)
}

/// JSON-over-HTTP transport for one ailoop server.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base: String,
}

impl HttpTransport {
    /// Build a transport for `base_url` with a per-request `timeout`.
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ailoop-sdk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::connection(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Server base URL without a trailing slash.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// `GET path?query` and decode the JSON body.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        messages: &StatusMessages,
    ) -> Result<T> {
        let endpoint = endpoint(&Method::GET, path);
        let response = self
            .execute(Method::GET, path, &endpoint, messages, |request| {
                if query.is_empty() {
                    request
                } else {
                    request.query(query)
                }
            })
            .await?;
        decode(response, &endpoint).await
    }

    /// `POST path` with a JSON body and decode the JSON response.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        messages: &StatusMessages,
    ) -> Result<T> {
        let endpoint = endpoint(&Method::POST, path);
        let response = self
            .execute(Method::POST, path, &endpoint, messages, |request| request.json(body))
            .await?;
        decode(response, &endpoint).await
    }

    /// `POST path` with a JSON body, ignoring the response body.
    pub async fn post_unit<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        messages: &StatusMessages,
    ) -> Result<()> {
        let endpoint = endpoint(&Method::POST, path);
        self.execute(Method::POST, path, &endpoint, messages, |request| request.json(body))
            .await?;
        Ok(())
    }

    /// `PUT path` with a JSON body and decode the JSON response.
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        messages: &StatusMessages,
    ) -> Result<T> {
        let endpoint = endpoint(&Method::PUT, path);
        let response = self
            .execute(Method::PUT, path, &endpoint, messages, |request| request.json(body))
            .await?;
        decode(response, &endpoint).await
    }

    /// `DELETE path`, ignoring the response body.
    pub async fn delete(&self, path: &str, messages: &StatusMessages) -> Result<()> {
        let endpoint = endpoint(&Method::DELETE, path);
        self.execute(Method::DELETE, path, &endpoint, messages, |request| request)
            .await?;
        Ok(())
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        endpoint: &str,
        messages: &StatusMessages,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response> {
        let url = format!("{}{path}", self.base);
        tracing::debug!(endpoint, "HTTP {method} {url}");

        let request = build(self.client.request(method, &url));
        let response = request
            .send()
            .await
            .map_err(|e| Error::classify_reqwest(&e, endpoint))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!(endpoint, status = status.as_u16(), "HTTP request rejected");
        Err(status_error(status, &body, endpoint, messages))
    }
}

fn endpoint(method: &Method, path: &str) -> String {
    let path = path.split('?').next().unwrap_or(path);
    format!("{method} {path}")
}

async fn decode<T: DeserializeOwned>(response: Response, endpoint: &str) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| Error::classify_reqwest(&e, endpoint))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_is_validation_with_prefix() {
        let messages = StatusMessages::new().bad_request("Invalid dependency");
        let err = status_error(
            StatusCode::BAD_REQUEST,
            "cycle detected",
            "POST /api/v1/tasks/a/dependencies",
            &messages,
        );
        assert!(err.is_validation());
        assert_eq!(err.message(), "Invalid dependency: cycle detected");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn not_found_uses_operation_message() {
        let messages = StatusMessages::new().not_found("Task not found: t1");
        let err = status_error(StatusCode::NOT_FOUND, "", "GET /api/v1/tasks/t1", &messages);
        assert!(err.is_validation());
        assert_eq!(err.message(), "Task not found: t1");
        assert_eq!(
            err.origin().endpoint.as_deref(),
            Some("GET /api/v1/tasks/t1")
        );
    }

    #[test]
    fn other_statuses_are_connection_errors() {
        for status in [
            StatusCode::UNAUTHORIZED,
            StatusCode::CONFLICT,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            let err = status_error(status, "boom", "GET /api/v1/health", &StatusMessages::new());
            assert!(err.is_connection(), "{status} should be a connection error");
            assert_eq!(err.status(), Some(status.as_u16()));
        }
    }

    #[test]
    fn endpoint_drops_query() {
        assert_eq!(
            endpoint(&Method::GET, "/api/v1/tasks?channel=public"),
            "GET /api/v1/tasks"
        );
    }

    #[test]
    fn base_has_no_trailing_slash() {
        let url = Url::parse("http://localhost:8080/").unwrap();
        let transport = HttpTransport::new(&url, Duration::from_secs(1)).unwrap();
        assert_eq!(transport.base(), "http://localhost:8080");
    }
}
