//! Request signing for the authenticated aggregator endpoints
//!
//! signature = base64(HMAC-SHA256(secret, timestamp + method + request_path + body))
//!
//! `request_path` carries the query string for GET requests and `body` is
//! empty for GET, the JSON payload for POST.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use ngo_core::{ApiCredentials, PriceFeedError, PriceFeedResult};

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_ACCESS_KEY: &str = "OK-ACCESS-KEY";
pub const HEADER_ACCESS_SIGN: &str = "OK-ACCESS-SIGN";
pub const HEADER_ACCESS_TIMESTAMP: &str = "OK-ACCESS-TIMESTAMP";
pub const HEADER_ACCESS_PASSPHRASE: &str = "OK-ACCESS-PASSPHRASE";

/// ISO-8601 UTC timestamp with millisecond precision, e.g. `2024-01-15T10:30:00.000Z`
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Compute the request signature
pub fn sign(
    secret: &str,
    timestamp: &str,
    method: &str,
    request_path: &str,
    body: &str,
) -> PriceFeedResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PriceFeedError::InvalidRequest(format!("bad signing key: {}", e)))?;

    mac.update(timestamp.as_bytes());
    mac.update(method.as_bytes());
    mac.update(request_path.as_bytes());
    mac.update(body.as_bytes());

    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Produces the four authentication headers for a request
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: ApiCredentials,
}

impl RequestSigner {
    pub fn new(credentials: ApiCredentials) -> Self {
        Self { credentials }
    }

    pub fn key_hint(&self) -> String {
        self.credentials.key_hint()
    }

    /// Headers for a request sent now
    pub fn headers(
        &self,
        method: &str,
        request_path: &str,
        body: &str,
    ) -> PriceFeedResult<Vec<(String, String)>> {
        self.headers_at(Utc::now(), method, request_path, body)
    }

    pub fn headers_at(
        &self,
        now: DateTime<Utc>,
        method: &str,
        request_path: &str,
        body: &str,
    ) -> PriceFeedResult<Vec<(String, String)>> {
        let timestamp = timestamp(now);
        let signature = sign(&self.credentials.secret_key, &timestamp, method, request_path, body)?;

        Ok(vec![
            (HEADER_ACCESS_KEY.to_string(), self.credentials.api_key.clone()),
            (HEADER_ACCESS_SIGN.to_string(), signature),
            (HEADER_ACCESS_TIMESTAMP.to_string(), timestamp),
            (HEADER_ACCESS_PASSPHRASE.to_string(), self.credentials.passphrase.clone()),
        ])
    }
}
