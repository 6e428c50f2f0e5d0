//! Price and quote service
//!
//! The one context object consumers share: it owns the cache, the rate
//! limiter, the upstream clients and the synthesizer. None of its lookups
//! fail; upstream problems are replaced with synthetic data whose origin is
//! tagged on the result.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use ngo_core::{
    get_token, watch_list, AggregatorToken, ChainId, DataOrigin, FallbackReason, PriceFeedConfig,
    PriceFeedError, PriceFeedResult, PriceSet, QuoteRequest, QuoteResult, SupportedChain,
};

use crate::aggregator::AggregatorClient;
use crate::cache::{CacheStats, CacheStatsSnapshot, FeedState, RefreshPlan};
use crate::market::{live_snapshot, MarketDataClient};
use crate::scheduler::PriceSource;
use crate::synthetic::Synthesizer;
use crate::transport::{HttpTransport, ReqwestTransport};

/// Bound a request future even if the transport does not enforce its timeout
async fn bounded<T>(
    limit: Duration,
    fut: impl Future<Output = PriceFeedResult<T>>,
) -> PriceFeedResult<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(PriceFeedError::Timeout),
    }
}

pub struct PriceService {
    config: PriceFeedConfig,
    market: MarketDataClient,
    aggregator: AggregatorClient,
    synthesizer: Synthesizer,
    state: Mutex<FeedState>,
    stats: CacheStats,
}

impl PriceService {
    /// Service backed by a real HTTP client
    pub fn new(config: PriceFeedConfig) -> PriceFeedResult<Self> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport(config: PriceFeedConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let synthesizer = Synthesizer::new(config.prices.max_synthetic_variation);
        Self::with_parts(config, transport, synthesizer)
    }

    pub fn with_parts(
        config: PriceFeedConfig,
        transport: Arc<dyn HttpTransport>,
        synthesizer: Synthesizer,
    ) -> Self {
        Self {
            market: MarketDataClient::new(Arc::clone(&transport), &config.market_data),
            aggregator: AggregatorClient::new(transport, &config.aggregator),
            synthesizer,
            state: Mutex::new(FeedState::new(&config.prices)),
            stats: CacheStats::default(),
            config,
        }
    }

    pub fn config(&self) -> &PriceFeedConfig {
        &self.config
    }

    pub fn has_credentials(&self) -> bool {
        self.aggregator.has_credentials()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Drop the cached price set; the rate limiter still applies
    pub fn invalidate_cache(&self) {
        self.state.lock().cache.invalidate();
    }

    /// Current prices for the whole watch-list
    pub async fn get_all_token_prices(&self) -> PriceSet {
        let plan = self.state.lock().plan(Instant::now());

        match plan {
            RefreshPlan::Cached(set) => {
                debug!("Price cache hit ({} tokens)", set.len());
                self.stats.record_hit();
                set
            }
            RefreshPlan::Synthesize => {
                let remaining = self.state.lock().rate_limit.cooldown_remaining(Instant::now());
                debug!("Live fetch on cooldown for {:?}, synthesizing prices", remaining);
                self.synthesize(FallbackReason::Cooldown)
            }
            RefreshPlan::FetchLive => match self.fetch_live().await {
                Ok(set) => {
                    info!(
                        "Live price fetch succeeded: {} live, {} backfilled",
                        set.live_count(),
                        set.len() - set.live_count()
                    );
                    self.stats.record_live_success();
                    self.state.lock().cache.store(set.clone(), Instant::now());
                    set
                }
                Err(e) => {
                    warn!("Live price fetch failed: {}", e);
                    self.stats.record_live_failure();
                    if e.is_rate_limit() {
                        self.state.lock().rate_limit.record_attempt(Instant::now());
                    }
                    self.synthesize(e.fallback_reason())
                }
            },
        }
    }

    fn synthesize(&self, reason: FallbackReason) -> PriceSet {
        debug!("Synthesizing watch-list prices ({})", reason);
        let now = Utc::now();
        let set = PriceSet::new(
            self.synthesizer.snapshots(now),
            DataOrigin::synthetic(reason),
            now,
        );

        self.stats.record_synthesized();
        self.state.lock().cache.store(set.clone(), Instant::now());
        set
    }

    /// One batched request for the head of the watch-list, the rest backfilled
    async fn fetch_live(&self) -> PriceFeedResult<PriceSet> {
        let tokens = watch_list();
        let batch_len = self.config.prices.live_batch_size.min(tokens.len());
        let ids: Vec<&str> = tokens[..batch_len]
            .iter()
            .map(|t| t.market_id.as_str())
            .collect();

        let prices = bounded(
            self.config.market_data.request_timeout(),
            self.market.simple_prices(&ids),
        )
        .await?;

        let now = Utc::now();
        let snapshots: Vec<_> = tokens
            .iter()
            .enumerate()
            .map(|(i, token)| {
                let live = if i < batch_len {
                    prices
                        .get(&token.market_id)
                        .and_then(|entry| live_snapshot(token, entry, now))
                } else {
                    None
                };
                live.unwrap_or_else(|| token.reference_snapshot(now))
            })
            .collect();

        let set = PriceSet::new(snapshots, DataOrigin::Live, now);
        if set.live_count() == 0 {
            return Err(PriceFeedError::Malformed(
                "response contained none of the requested ids".to_string(),
            ));
        }
        Ok(set)
    }

    /// Swap quote from the aggregator, or a bounded synthetic one
    pub async fn get_swap_quote(&self, request: QuoteRequest) -> QuoteResult {
        debug!(
            "Quote request on {}: {} -> {} amount {}",
            request.chain, request.from_token, request.to_token, request.amount
        );

        let live = bounded(
            self.config.aggregator.request_timeout(),
            self.aggregator.quote(&request),
        )
        .await;

        match live {
            Ok(quote) => {
                info!("Live quote received with {} routes", quote.routes.len());
                QuoteResult {
                    request,
                    quote,
                    origin: DataOrigin::Live,
                }
            }
            Err(e) => {
                warn!("Quote request failed, returning demo fallback: {}", e);
                let quote = self.synthesizer.quote(&request);
                QuoteResult {
                    request,
                    quote,
                    origin: DataOrigin::synthetic(e.fallback_reason()),
                }
            }
        }
    }

    pub async fn get_supported_chains(&self) -> Option<Vec<SupportedChain>> {
        let result = bounded(
            self.config.aggregator.request_timeout(),
            self.aggregator.supported_chains(),
        )
        .await;

        result
            .map_err(|e| warn!("Failed to fetch supported chains: {}", e))
            .ok()
    }

    pub async fn get_token_list(&self, chain: ChainId) -> Option<Vec<AggregatorToken>> {
        let result = bounded(
            self.config.aggregator.request_timeout(),
            self.aggregator.all_tokens(chain),
        )
        .await;

        result
            .map_err(|e| warn!("Failed to fetch token list for {}: {}", chain, e))
            .ok()
    }

    /// Unit price of a watched token from the public quote endpoint
    pub async fn get_token_price(&self, symbol: &str) -> Option<Decimal> {
        let token = get_token(symbol)?;
        let result = bounded(
            self.config.aggregator.public_timeout(),
            self.aggregator
                .token_unit_price(token.address, token.chain, token.one_unit()),
        )
        .await;

        match result {
            Ok(price) => price,
            Err(e) => {
                warn!("Failed to fetch unit price for {}: {}", token.symbol, e);
                None
            }
        }
    }
}

#[async_trait]
impl PriceSource for PriceService {
    async fn latest_prices(&self) -> PriceFeedResult<PriceSet> {
        Ok(self.get_all_token_prices().await)
    }
}
