//! Core type definitions

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric chain identifier as used by the aggregator API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    pub const ETHEREUM: ChainId = ChainId(1);
    pub const BSC: ChainId = ChainId(56);
    pub const POLYGON: ChainId = ChainId(137);
    pub const X_LAYER: ChainId = ChainId(196);
    pub const SOLANA: ChainId = ChainId(501);

    pub fn id(&self) -> u64 {
        self.0
    }

    pub fn name(&self) -> Option<&'static str> {
        match self.0 {
            1 => Some("ethereum"),
            56 => Some("bsc"),
            137 => Some("polygon"),
            196 => Some("xlayer"),
            501 => Some("solana"),
            _ => None,
        }
    }
}

impl Default for ChainId {
    fn default() -> Self {
        ChainId::X_LAYER
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "chain-{}", self.0),
        }
    }
}

/// Where a single snapshot's numbers came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotProvenance {
    /// Reported by the upstream price source
    Live,
    /// Static reference value, used to backfill tokens not fetched live
    Reference,
    /// Reference value with a small random perturbation
    Synthetic,
}

/// A single consistent read of a token's price and 24h statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPriceSnapshot {
    pub symbol: String,
    pub name: String,
    pub price: Decimal,
    pub change_24h: Decimal,
    pub change_percentage_24h: Decimal,
    pub observed_at: DateTime<Utc>,
    pub provenance: SnapshotProvenance,
}

impl TokenPriceSnapshot {
    pub fn is_live(&self) -> bool {
        self.provenance == SnapshotProvenance::Live
    }

    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.observed_at).num_milliseconds().max(0)
    }
}

/// Why a result was fabricated locally instead of coming from upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    /// The minimum interval between live fetches has not elapsed
    Cooldown,
    /// Upstream answered with 429 or a provider rate-limit code
    RateLimited,
    /// Upstream rejected the signed request
    Unauthorized,
    /// No credentials configured, so no authenticated request was sent
    MissingCredentials,
    /// Network error, timeout or 5xx
    Unavailable(String),
    /// Response could not be decoded or carried an error code
    Malformed(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::Cooldown => write!(f, "cooldown"),
            FallbackReason::RateLimited => write!(f, "rate limited"),
            FallbackReason::Unauthorized => write!(f, "unauthorized"),
            FallbackReason::MissingCredentials => write!(f, "missing credentials"),
            FallbackReason::Unavailable(detail) => write!(f, "unavailable: {}", detail),
            FallbackReason::Malformed(detail) => write!(f, "malformed response: {}", detail),
        }
    }
}

/// Real vs. locally fabricated data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "lowercase")]
pub enum DataOrigin {
    Live,
    Synthetic { reason: FallbackReason },
}

impl DataOrigin {
    pub fn synthetic(reason: FallbackReason) -> Self {
        DataOrigin::Synthetic { reason }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, DataOrigin::Live)
    }

    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        match self {
            DataOrigin::Live => None,
            DataOrigin::Synthetic { reason } => Some(reason),
        }
    }
}

/// An ordered set of snapshots produced by one price lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSet {
    pub snapshots: Vec<TokenPriceSnapshot>,
    pub origin: DataOrigin,
    pub produced_at: DateTime<Utc>,
}

impl PriceSet {
    pub fn new(snapshots: Vec<TokenPriceSnapshot>, origin: DataOrigin, produced_at: DateTime<Utc>) -> Self {
        Self { snapshots, origin, produced_at }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Option<&TokenPriceSnapshot> {
        self.snapshots
            .iter()
            .find(|s| s.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Number of snapshots that came from the upstream source
    pub fn live_count(&self) -> usize {
        self.snapshots.iter().filter(|s| s.is_live()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_ids() {
        assert_eq!(ChainId::ETHEREUM.id(), 1);
        assert_eq!(ChainId::X_LAYER.id(), 196);
        assert_eq!(ChainId::default(), ChainId::X_LAYER);
    }

    #[test]
    fn test_chain_display() {
        assert_eq!(ChainId::POLYGON.to_string(), "polygon");
        assert_eq!(ChainId(8453).to_string(), "chain-8453");
    }

    #[test]
    fn test_origin_serializes_with_tag() {
        let origin = DataOrigin::synthetic(FallbackReason::RateLimited);
        let json = serde_json::to_value(&origin).unwrap();
        assert_eq!(json["origin"], "synthetic");
        assert_eq!(json["reason"]["kind"], "rate_limited");
        assert!(!origin.is_live());
        assert_eq!(origin.fallback_reason(), Some(&FallbackReason::RateLimited));
    }

    #[test]
    fn test_price_set_lookup_is_case_insensitive() {
        let now = Utc::now();
        let set = PriceSet::new(
            vec![TokenPriceSnapshot {
                symbol: "OKB".to_string(),
                name: "OKB Token".to_string(),
                price: Decimal::new(4567, 2),
                change_24h: Decimal::new(89, 2),
                change_percentage_24h: Decimal::new(199, 2),
                observed_at: now,
                provenance: SnapshotProvenance::Live,
            }],
            DataOrigin::Live,
            now,
        );

        assert!(set.get("okb").is_some());
        assert!(set.get("ETH").is_none());
        assert_eq!(set.live_count(), 1);
    }
}
