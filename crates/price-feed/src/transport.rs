//! HTTP transport seam
//!
//! The price and aggregator clients talk to the network only through
//! [`HttpTransport`], so every outbound request can be counted and every
//! failure mode simulated.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use ngo_core::{PriceFeedError, PriceFeedResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            body: None,
            timeout,
        }
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response: status and body text
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> PriceFeedResult<T> {
        serde_json::from_str(&self.body).map_err(|e| PriceFeedError::Malformed(e.to_string()))
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> PriceFeedResult<HttpResponse>;
}

/// reqwest-backed transport; the per-request timeout is enforced by the client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> PriceFeedResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ngo-price-feed/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PriceFeedError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> PriceFeedError {
    if e.is_timeout() {
        PriceFeedError::Timeout
    } else {
        PriceFeedError::Transport(e.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> PriceFeedResult<HttpResponse> {
        debug!("{} {}", request.method, request.url);

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
        };

        builder = builder.timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse { status, body })
    }
}
