//! Error types

use thiserror::Error;

use crate::FallbackReason;

/// Price and quote client errors
///
/// None of these escape the price service; they are mapped to a
/// [`FallbackReason`] and replaced with synthetic data.
#[derive(Debug, Clone, Error)]
pub enum PriceFeedError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Rate limited")]
    RateLimited,

    #[error("Unauthorized (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Upstream error {code}: {msg}")]
    Upstream { code: String, msg: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("API credentials not configured")]
    MissingCredentials,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl PriceFeedError {
    pub fn fallback_reason(&self) -> FallbackReason {
        match self {
            PriceFeedError::RateLimited => FallbackReason::RateLimited,
            PriceFeedError::Unauthorized { .. } => FallbackReason::Unauthorized,
            PriceFeedError::MissingCredentials => FallbackReason::MissingCredentials,
            PriceFeedError::Timeout => FallbackReason::Unavailable("timeout".to_string()),
            PriceFeedError::Transport(e) => FallbackReason::Unavailable(e.clone()),
            PriceFeedError::Http { status, .. } => {
                FallbackReason::Unavailable(format!("HTTP {}", status))
            }
            PriceFeedError::Upstream { code, msg } => {
                FallbackReason::Malformed(format!("code {}: {}", code, msg))
            }
            PriceFeedError::Malformed(e) => FallbackReason::Malformed(e.clone()),
            PriceFeedError::InvalidRequest(e) => FallbackReason::Malformed(e.clone()),
        }
    }

    /// Whether upstream asked us to back off
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, PriceFeedError::RateLimited)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias
pub type PriceFeedResult<T> = Result<T, PriceFeedError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
