//! Public market-data price source
//!
//! Batched `simple/price` lookups keyed by market id, returning the USD
//! price and the 24h change percentage per id.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use ngo_core::{
    MarketDataSettings, PriceFeedError, PriceFeedResult, SnapshotProvenance, TokenPriceSnapshot,
    WatchedToken,
};

use crate::transport::{HttpRequest, HttpTransport};

/// Price entry for one market id
#[derive(Debug, Clone, Deserialize)]
pub struct SimplePrice {
    #[serde(default)]
    pub usd: Option<f64>,
    #[serde(default)]
    pub usd_24h_change: Option<f64>,
}

pub struct MarketDataClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    timeout: Duration,
}

impl MarketDataClient {
    pub fn new(transport: Arc<dyn HttpTransport>, settings: &MarketDataSettings) -> Self {
        Self {
            transport,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            timeout: settings.request_timeout(),
        }
    }

    pub fn simple_price_url(&self, ids: &[&str]) -> String {
        format!(
            "{}/simple/price?ids={}&vs_currencies=usd&include_24hr_change=true",
            self.base_url,
            ids.join(",")
        )
    }

    /// One batched request for all `ids`
    pub async fn simple_prices(&self, ids: &[&str]) -> PriceFeedResult<HashMap<String, SimplePrice>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        debug!("Fetching market prices for {}", ids.join(", "));

        let request = HttpRequest::get(self.simple_price_url(ids), self.timeout);
        let response = self.transport.send(request).await?;

        match response.status {
            429 => Err(PriceFeedError::RateLimited),
            _ if !response.is_success() => Err(PriceFeedError::Http {
                status: response.status,
                body: response.body.chars().take(200).collect(),
            }),
            _ => response.json(),
        }
    }
}

/// Live snapshot for `token`, or `None` if the entry has no usable price
pub fn live_snapshot(
    token: &WatchedToken,
    entry: &SimplePrice,
    observed_at: DateTime<Utc>,
) -> Option<TokenPriceSnapshot> {
    let price = entry
        .usd
        .filter(|p| p.is_finite() && *p > 0.0)
        .and_then(Decimal::from_f64)?;

    let change_pct = entry
        .usd_24h_change
        .filter(|c| c.is_finite())
        .and_then(Decimal::from_f64);

    let (change_24h, change_percentage_24h) = match change_pct {
        // an out-of-range change rejects the entry
        Some(pct) => (price.checked_mul(pct)?.checked_div(Decimal::ONE_HUNDRED)?, pct),
        None => (token.reference_change_24h, token.reference_change_percentage_24h),
    };

    Some(TokenPriceSnapshot {
        symbol: token.symbol.clone(),
        name: token.name.clone(),
        price,
        change_24h,
        change_percentage_24h,
        observed_at,
        provenance: SnapshotProvenance::Live,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use ngo_core::get_token;

    fn client(transport: Arc<MockTransport>) -> MarketDataClient {
        MarketDataClient::new(transport, &MarketDataSettings::default())
    }

    #[tokio::test]
    async fn test_simple_prices_parses_batch() {
        let transport = Arc::new(MockTransport::respond(
            200,
            r#"{"okb":{"usd":48.12,"usd_24h_change":2.5},"bitcoin":{"usd":97000.0}}"#,
        ));
        let prices = client(Arc::clone(&transport))
            .simple_prices(&["okb", "bitcoin"])
            .await
            .unwrap();

        assert_eq!(prices["okb"].usd, Some(48.12));
        assert_eq!(prices["bitcoin"].usd_24h_change, None);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].url,
            "https://api.coingecko.com/api/v3/simple/price?ids=okb,bitcoin&vs_currencies=usd&include_24hr_change=true"
        );
    }

    #[tokio::test]
    async fn test_rate_limit_status() {
        let transport = Arc::new(MockTransport::respond(429, "Too Many Requests"));
        let result = client(transport).simple_prices(&["okb"]).await;
        assert!(matches!(result, Err(PriceFeedError::RateLimited)));
    }

    #[tokio::test]
    async fn test_server_error_and_garbage() {
        let transport = Arc::new(MockTransport::respond(503, "down"));
        let result = client(transport).simple_prices(&["okb"]).await;
        assert!(matches!(result, Err(PriceFeedError::Http { status: 503, .. })));

        let transport = Arc::new(MockTransport::respond(200, "<html>"));
        let result = client(transport).simple_prices(&["okb"]).await;
        assert!(matches!(result, Err(PriceFeedError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_empty_ids_skip_request() {
        let transport = Arc::new(MockTransport::respond(500, ""));
        let prices = client(Arc::clone(&transport)).simple_prices(&[]).await.unwrap();
        assert!(prices.is_empty());
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn test_live_snapshot_derives_absolute_change() {
        let token = get_token("OKB").unwrap();
        let entry = SimplePrice { usd: Some(50.0), usd_24h_change: Some(2.0) };
        let snapshot = live_snapshot(token, &entry, Utc::now()).unwrap();

        assert_eq!(snapshot.price, Decimal::from(50));
        assert_eq!(snapshot.change_24h, Decimal::ONE);
        assert_eq!(snapshot.change_percentage_24h, Decimal::from(2));
        assert!(snapshot.is_live());
    }

    #[test]
    fn test_live_snapshot_falls_back_to_reference_change() {
        let token = get_token("OKB").unwrap();
        let entry = SimplePrice { usd: Some(50.0), usd_24h_change: None };
        let snapshot = live_snapshot(token, &entry, Utc::now()).unwrap();
        assert_eq!(snapshot.change_24h, token.reference_change_24h);

        let missing = SimplePrice { usd: None, usd_24h_change: Some(1.0) };
        assert!(live_snapshot(token, &missing, Utc::now()).is_none());
    }

    #[test]
    fn test_live_snapshot_rejects_overflowing_change() {
        let token = get_token("OKB").unwrap();
        let huge = SimplePrice { usd: Some(1e20), usd_24h_change: Some(1e20) };
        assert!(live_snapshot(token, &huge, Utc::now()).is_none());

        let unrepresentable = SimplePrice { usd: Some(1e40), usd_24h_change: Some(1.0) };
        assert!(live_snapshot(token, &unrepresentable, Utc::now()).is_none());
    }
}
