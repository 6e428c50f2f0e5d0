//! Price cache and fetch rate limiter
//!
//! Both live behind a single lock in the price service, so deciding what to
//! do next and recording the decision happen in one synchronous step.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use ngo_core::{PriceSet, PriceSettings};

/// The watch-list is cached under a single key
pub const PRICE_CACHE_KEY: &str = "prices";

/// Cached price set with insertion time
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub set: PriceSet,
    pub cached_at: Instant,
}

impl CacheEntry {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.cached_at)
    }

    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        self.age(now) < ttl
    }
}

#[derive(Debug)]
pub struct PriceCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Cached set if younger than the TTL
    pub fn fresh(&self, now: Instant) -> Option<&PriceSet> {
        self.entries
            .get(PRICE_CACHE_KEY)
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .map(|entry| &entry.set)
    }

    pub fn store(&mut self, set: PriceSet, now: Instant) {
        self.entries.insert(
            PRICE_CACHE_KEY.to_string(),
            CacheEntry { set, cached_at: now },
        );
    }

    pub fn entry(&self) -> Option<&CacheEntry> {
        self.entries.get(PRICE_CACHE_KEY)
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
    }
}

/// Tracks the last live fetch attempt
#[derive(Debug)]
pub struct RateLimitState {
    last_fetch_at: Option<Instant>,
    min_interval: Duration,
}

impl RateLimitState {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_fetch_at: None,
            min_interval,
        }
    }

    pub fn last_fetch_at(&self) -> Option<Instant> {
        self.last_fetch_at
    }

    pub fn may_fetch(&self, now: Instant) -> bool {
        match self.last_fetch_at {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
        }
    }

    pub fn record_attempt(&mut self, now: Instant) {
        self.last_fetch_at = Some(now);
    }

    /// Time until the next live attempt is allowed
    pub fn cooldown_remaining(&self, now: Instant) -> Duration {
        match self.last_fetch_at {
            None => Duration::ZERO,
            Some(last) => self
                .min_interval
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }
}

/// What a price lookup should do
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshPlan {
    Cached(PriceSet),
    Synthesize,
    FetchLive,
}

/// Cache and rate limiter guarded together
#[derive(Debug)]
pub struct FeedState {
    pub cache: PriceCache,
    pub rate_limit: RateLimitState,
}

impl FeedState {
    pub fn new(settings: &PriceSettings) -> Self {
        Self {
            cache: PriceCache::new(settings.cache_duration()),
            rate_limit: RateLimitState::new(settings.min_fetch_interval()),
        }
    }

    /// Decide the next step; a live fetch is recorded as attempted right away
    /// so concurrent callers fall through to synthesis instead of piling up.
    pub fn plan(&mut self, now: Instant) -> RefreshPlan {
        if let Some(set) = self.cache.fresh(now) {
            return RefreshPlan::Cached(set.clone());
        }
        if !self.rate_limit.may_fetch(now) {
            return RefreshPlan::Synthesize;
        }
        self.rate_limit.record_attempt(now);
        RefreshPlan::FetchLive
    }
}

/// Lookup counters
#[derive(Debug, Default)]
pub struct CacheStats {
    cache_hits: AtomicU64,
    synthesized: AtomicU64,
    live_success: AtomicU64,
    live_failed: AtomicU64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_synthesized(&self) {
        self.synthesized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_live_success(&self) {
        self.live_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_live_failure(&self) {
        self.live_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            synthesized: self.synthesized.load(Ordering::Relaxed),
            live_success: self.live_success.load(Ordering::Relaxed),
            live_failed: self.live_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStatsSnapshot {
    pub cache_hits: u64,
    pub synthesized: u64,
    pub live_success: u64,
    pub live_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ngo_core::DataOrigin;

    fn empty_set() -> PriceSet {
        PriceSet::new(vec![], DataOrigin::Live, Utc::now())
    }

    fn settings() -> PriceSettings {
        PriceSettings {
            cache_duration_ms: 120_000,
            min_fetch_interval_ms: 30_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_cache_expires_after_ttl() {
        let start = Instant::now();
        let mut cache = PriceCache::new(Duration::from_secs(120));
        cache.store(empty_set(), start);

        assert!(cache.fresh(start + Duration::from_secs(119)).is_some());
        assert!(cache.fresh(start + Duration::from_secs(120)).is_none());
    }

    #[test]
    fn test_invalidate() {
        let start = Instant::now();
        let mut cache = PriceCache::new(Duration::from_secs(120));
        cache.store(empty_set(), start);
        cache.invalidate();
        assert!(cache.fresh(start).is_none());
        assert!(cache.entry().is_none());
    }

    #[test]
    fn test_rate_limit_window() {
        let start = Instant::now();
        let mut limiter = RateLimitState::new(Duration::from_secs(30));
        assert!(limiter.may_fetch(start));

        limiter.record_attempt(start);
        assert!(!limiter.may_fetch(start + Duration::from_secs(10)));
        assert_eq!(
            limiter.cooldown_remaining(start + Duration::from_secs(10)),
            Duration::from_secs(20)
        );
        assert!(limiter.may_fetch(start + Duration::from_secs(30)));
    }

    #[test]
    fn test_plan_sequence() {
        let start = Instant::now();
        let mut state = FeedState::new(&settings());

        assert_eq!(state.plan(start), RefreshPlan::FetchLive);
        // second caller during the cooldown synthesizes instead of fetching
        assert_eq!(state.plan(start + Duration::from_secs(1)), RefreshPlan::Synthesize);

        state.cache.store(empty_set(), start);
        assert!(matches!(state.plan(start + Duration::from_secs(45)), RefreshPlan::Cached(_)));
        assert_eq!(state.plan(start + Duration::from_secs(130)), RefreshPlan::FetchLive);
    }

    #[test]
    fn test_stats() {
        let stats = CacheStats::default();
        stats.record_hit();
        stats.record_hit();
        stats.record_live_failure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.cache_hits, 2);
        assert_eq!(snapshot.live_failed, 1);
        assert_eq!(snapshot.live_success, 0);
    }
}
