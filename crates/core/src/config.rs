//! Configuration types
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `config/ngo-ticker.{toml,yaml,json}` file, then `NGO_`-prefixed
//! environment variables (`NGO_PRICES__CACHE_DURATION_MS=60000`).
//! Aggregator credentials never have defaults.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::time::Duration;

use crate::{ConfigError, ConfigResult};

pub const DEFAULT_CONFIG_PATH: &str = "config/ngo-ticker";

/// Credentials for the signed aggregator endpoints
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiCredentials {
    pub api_key: String,
    pub secret_key: String,
    pub passphrase: String,
}

impl ApiCredentials {
    /// Read `OKX_API_KEY`, `OKX_SECRET_KEY` and `OKX_API_PASSPHRASE`
    pub fn from_env() -> Option<Self> {
        let read = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());
        Some(Self {
            api_key: read("OKX_API_KEY")?,
            secret_key: read("OKX_SECRET_KEY")?,
            passphrase: read("OKX_API_PASSPHRASE")?,
        })
    }

    pub fn is_complete(&self) -> bool {
        !self.api_key.trim().is_empty()
            && !self.secret_key.trim().is_empty()
            && !self.passphrase.trim().is_empty()
    }

    /// First 8 characters of the key, safe to log
    pub fn key_hint(&self) -> String {
        let hint: String = self.api_key.chars().take(8).collect();
        format!("{}...", hint)
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.key_hint())
            .field("secret_key", &"<redacted>")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

/// Cache and rate-limit thresholds for the token price lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceSettings {
    pub cache_duration_ms: u64,
    pub min_fetch_interval_ms: u64,
    /// How many watch-list tokens are requested live per fetch
    pub live_batch_size: usize,
    /// Maximum relative perturbation of synthetic prices
    pub max_synthetic_variation: f64,
}

impl Default for PriceSettings {
    fn default() -> Self {
        Self {
            cache_duration_ms: 120_000,
            min_fetch_interval_ms: 30_000,
            live_batch_size: 5,
            max_synthetic_variation: 0.01,  // ±1%
        }
    }
}

impl PriceSettings {
    pub fn cache_duration(&self) -> Duration {
        Duration::from_millis(self.cache_duration_ms)
    }

    pub fn min_fetch_interval(&self) -> Duration {
        Duration::from_millis(self.min_fetch_interval_ms)
    }
}

/// DEX aggregator endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorSettings {
    pub base_url: String,
    /// Timeout for signed requests
    pub request_timeout_ms: u64,
    /// Timeout for the public quote-compare endpoint
    pub public_timeout_ms: u64,
    pub credentials: Option<ApiCredentials>,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            base_url: "https://web3.okx.com".to_string(),
            request_timeout_ms: 10_000,
            public_timeout_ms: 5_000,
            credentials: None,
        }
    }
}

impl AggregatorSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn public_timeout(&self) -> Duration {
        Duration::from_millis(self.public_timeout_ms)
    }

    /// Credentials usable for signing, if any
    pub fn usable_credentials(&self) -> Option<&ApiCredentials> {
        self.credentials.as_ref().filter(|c| c.is_complete())
    }
}

/// Public market-data price endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataSettings {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for MarketDataSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            request_timeout_ms: 8_000,
        }
    }
}

impl MarketDataSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Refresh scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    /// Period of the refresh timer, 0 disables periodic refresh
    pub interval_ms: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self { interval_ms: 60_000 }
    }
}

impl RefreshSettings {
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_ms > 0).then(|| Duration::from_millis(self.interval_ms))
    }
}

/// Complete price feed configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceFeedConfig {
    pub prices: PriceSettings,
    pub aggregator: AggregatorSettings,
    pub market_data: MarketDataSettings,
    pub refresh: RefreshSettings,
}

impl PriceFeedConfig {
    /// Load from the default file location and the environment
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from(path: &str) -> ConfigResult<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("NGO")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config = Self::from_settings(settings)?;
        if config.aggregator.credentials.is_none() {
            config.aggregator.credentials = ApiCredentials::from_env();
        }
        Ok(config)
    }

    /// Deserialize and validate an already-built `config::Config`
    pub fn from_settings(settings: Config) -> ConfigResult<Self> {
        let config: PriceFeedConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.prices.cache_duration_ms == 0 {
            return Err(ConfigError::Invalid("prices.cache_duration_ms must be > 0".to_string()));
        }
        if self.prices.live_batch_size == 0 {
            return Err(ConfigError::Invalid("prices.live_batch_size must be > 0".to_string()));
        }
        let variation = self.prices.max_synthetic_variation;
        if !(variation > 0.0 && variation <= 0.5) {
            return Err(ConfigError::Invalid(format!(
                "prices.max_synthetic_variation must be in (0, 0.5], got {}",
                variation
            )));
        }
        if self.aggregator.request_timeout_ms == 0
            || self.aggregator.public_timeout_ms == 0
            || self.market_data.request_timeout_ms == 0
        {
            return Err(ConfigError::Invalid("request timeouts must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn has_credentials(&self) -> bool {
        self.aggregator.usable_credentials().is_some()
    }
}
