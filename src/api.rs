//! Restaurant admin API client.
//!
//! Provides bearer-authenticated HTTP communication with the remote REST
//! API used for the product catalog and order creation. Response bodies
//! are parsed into `serde_json::Value` here; endpoint modules validate
//! the shapes they need and treat mismatches as serialization errors
//! rather than crashes.

use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::db::DbState;
use crate::session;

/// Default timeout for API requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Errors surfaced by remote API calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Transport-level failure: DNS, refused connection, timeout.
    #[error("{0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("{message} (HTTP {code})")]
    Status { code: u16, message: String },

    /// The response arrived but its shape did not match the endpoint
    /// contract.
    #[error("Unexpected response shape: {0}")]
    Serialization(String),

    /// No bearer token is stored; the call was never attempted.
    #[error("Not authenticated")]
    NotAuthenticated,
}

impl ApiError {
    /// True for failures worth retrying on the next reconnect: transport
    /// errors, server-side 5xx, and throttling.
    pub fn is_network_like(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Status { code, .. } => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the API base URL:
/// - strip trailing slashes
/// - strip a trailing `/api` segment (endpoint paths carry it)
/// - ensure a scheme is present (https, or http for localhost)
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    // Ensure scheme
    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    // Strip trailing slashes
    while url.ends_with('/') {
        url.pop();
    }

    // Strip trailing /api
    if url.ends_with("/api") {
        url.truncate(url.len() - 4);
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach the restaurant API at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid API URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Convert an HTTP status code into a user-friendly message.
fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        401 => "Session expired, please log in again".to_string(),
        403 => "Not authorized for this operation".to_string(),
        404 => "API endpoint not found".to_string(),
        s if s >= 500 => format!("Server error (HTTP {s})"),
        s => format!("Unexpected response from server (HTTP {s})"),
    }
}

/// Pull a human-readable error message out of a JSON error body, falling
/// back to the status-derived message.
fn body_error_message(body: &Value, status: StatusCode) -> String {
    body.get("message")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| status_error(status))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Authenticated HTTP client for the restaurant admin API.
///
/// Holds the normalized base URL and reads the bearer token from the
/// local store on every call, so a re-login takes effect without
/// rebuilding the client.
pub struct ApiClient {
    http: Client,
    base_url: String,
    db: Arc<DbState>,
}

impl ApiClient {
    pub fn new(base_url: &str, db: Arc<DbState>) -> Result<Self, String> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

        Ok(Self {
            http,
            base_url: normalize_base_url(base_url),
            db,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform an authenticated request against the API.
    ///
    /// `path` should include the leading slash, e.g. `/api/orders`.
    /// Returns the parsed JSON body of a 2xx response (`Value::Null` for
    /// an empty body).
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let token = session::token(&self.db).ok_or(ApiError::NotAuthenticated)?;
        let full_url = format!("{}{}", self.base_url, path);

        let mut req = self
            .http
            .request(method.clone(), &full_url)
            .header("Authorization", format!("Bearer {token}"));
        if let Some(b) = body {
            req = req.json(b);
        }

        debug!(method = %method, path, "api request");

        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::Network(friendly_error(&self.base_url, &e)))?;

        let status = resp.status();
        let raw = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(friendly_error(&self.base_url, &e)))?;

        let parsed: Option<Value> = if raw.trim().is_empty() {
            Some(Value::Null)
        } else {
            serde_json::from_str(&raw).ok()
        };

        if !status.is_success() {
            let message = body_error_message(parsed.as_ref().unwrap_or(&Value::Null), status);
            warn!(path, code = status.as_u16(), %message, "api request failed");
            return Err(ApiError::Status {
                code: status.as_u16(),
                message,
            });
        }

        parsed.ok_or_else(|| {
            ApiError::Serialization(format!("response from {path} is not valid JSON"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://api.example.com/"),
            "https://api.example.com"
        );
        assert_eq!(
            normalize_base_url("api.example.com/api/"),
            "https://api.example.com"
        );
        assert_eq!(
            normalize_base_url("localhost:5000"),
            "http://localhost:5000"
        );
        assert_eq!(
            normalize_base_url("  https://api.example.com/api  "),
            "https://api.example.com"
        );
    }

    #[test]
    fn test_status_error_messages() {
        assert_eq!(
            status_error(StatusCode::UNAUTHORIZED),
            "Session expired, please log in again"
        );
        assert_eq!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR),
            "Server error (HTTP 500)"
        );
    }

    #[test]
    fn test_body_error_message_prefers_body() {
        let body = serde_json::json!({ "message": "Product out of stock" });
        assert_eq!(
            body_error_message(&body, StatusCode::BAD_REQUEST),
            "Product out of stock"
        );

        let empty = serde_json::json!({});
        assert_eq!(
            body_error_message(&empty, StatusCode::BAD_REQUEST),
            "Unexpected response from server (HTTP 400)"
        );
    }

    #[test]
    fn test_network_like_classification() {
        assert!(ApiError::Network("boom".into()).is_network_like());
        assert!(ApiError::Status {
            code: 503,
            message: "down".into()
        }
        .is_network_like());
        assert!(ApiError::Status {
            code: 429,
            message: "slow down".into()
        }
        .is_network_like());
        assert!(!ApiError::Status {
            code: 400,
            message: "bad".into()
        }
        .is_network_like());
        assert!(!ApiError::Serialization("shape".into()).is_network_like());
    }
}
