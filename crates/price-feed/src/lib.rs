//! Watch-list prices and DEX swap quotes
//!
//! Features:
//! - Batched live prices with a TTL cache and a fetch rate limiter
//! - Signed DEX aggregator quotes, chain and token listings
//! - Synthetic fallback data tagged with the reason it was used
//! - Per-subscriber refresh tasks with cancellation

pub mod aggregator;
pub mod cache;
pub mod market;
pub mod scheduler;
pub mod service;
pub mod signing;
pub mod synthetic;
pub mod transport;

pub use aggregator::AggregatorClient;
pub use cache::{CacheStatsSnapshot, FeedState, RefreshPlan};
pub use market::MarketDataClient;
pub use scheduler::{PriceSource, RefreshScheduler, Subscription, TickerState};
pub use service::PriceService;
pub use signing::RequestSigner;
pub use synthetic::Synthesizer;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
