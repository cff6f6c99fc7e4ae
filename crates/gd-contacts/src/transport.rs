//! HTTP transport abstraction
//!
//! The directory client never talks to the network itself. It hands every
//! request to an [`HttpTransport`], which is expected to already carry
//! credentials (OAuth2 token refresh, service-account impersonation and
//! connection pooling all live behind it).

use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use reqwest::Client;
use tracing::debug;

use crate::config::DirectoryConfig;
use crate::error::{ContactsError, Result};

/// Outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Response as seen by the client: status, headers and the full body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

/// Anything that can perform one HTTP exchange.
///
/// Implementations must be safe to share between tasks; the client may be
/// used concurrently.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send the request and return the response. Transport failures
    /// (DNS, TLS, timeouts) are reported as [`ContactsError::Connection`].
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`HttpTransport`] backed by a `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Wrap an already authenticated client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client that sends a static bearer token on every request.
    ///
    /// Token acquisition and refresh are up to the caller.
    pub fn from_config(config: &DirectoryConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = config.access_token.as_deref().filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ContactsError::Configuration(format!("invalid access token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ContactsError::Configuration(e.to_string()))?;

        Ok(Self::new(client))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!("{} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ContactsError::Connection(e.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ContactsError::Connection(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}
