//! Outbound HEAD requests to the canary endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

use crate::watcher::ChangeEvent;

/// Header carrying the changed path.
pub const PATH_HEADER: &str = "X-Canary-Path-Name";
/// Header carrying the operation name.
pub const OPERATION_HEADER: &str = "X-Canary-Path-Op";

/// Errors from a single request.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request failed: {reason}")]
    Request { reason: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Failed to build HTTP client: {reason}")]
    Client { reason: String },

    #[error("Invalid value for header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Request {
                reason: e.to_string(),
            }
        }
    }
}

/// A fully built alert, reused for every attempt of one delivery.
#[derive(Debug, Clone)]
pub struct AlertRequest {
    pub endpoint: Url,
    pub headers: HeaderMap,
}

impl AlertRequest {
    /// Build the request announcing `event`.
    ///
    /// A path that cannot travel verbatim in a header (control characters)
    /// is sent percent-encoded, so a hostile filename still raises the alert.
    pub fn for_event(endpoint: Url, event: &ChangeEvent) -> Result<Self, TransportError> {
        let path = event.path.to_string_lossy();

        let mut headers = HeaderMap::with_capacity(2);
        headers.insert(
            HeaderName::from_static("x-canary-path-name"),
            path_value(&path)?,
        );
        headers.insert(
            HeaderName::from_static("x-canary-path-op"),
            header_value(OPERATION_HEADER, event.operation.as_str().as_bytes())?,
        );

        Ok(Self { endpoint, headers })
    }
}

fn path_value(path: &str) -> Result<HeaderValue, TransportError> {
    match HeaderValue::from_bytes(path.as_bytes()) {
        Ok(value) => Ok(value),
        Err(_) => header_value(PATH_HEADER, urlencoding::encode(path).as_bytes()),
    }
}

fn header_value(name: &str, bytes: &[u8]) -> Result<HeaderValue, TransportError> {
    HeaderValue::from_bytes(bytes).map_err(|e| TransportError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Sends alert requests and reports the response status.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one HEAD request. Returns the HTTP status code on any response.
    async fn head(&self, request: &AlertRequest) -> Result<u16, TransportError>;
}

/// [`Transport`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("canary-watch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Client {
                reason: e.to_string(),
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn head(&self, request: &AlertRequest) -> Result<u16, TransportError> {
        let response = self
            .client
            .head(request.endpoint.clone())
            .headers(request.headers.clone())
            .send()
            .await?;

        Ok(response.status().as_u16())
    }
}
