//! Watched tokens and their reference market data
//!
//! The reference values double as backfill for tokens that are not fetched
//! live and as the anchor for synthetic prices. Order matters: the first
//! entries are the ones requested from the upstream price source.

use alloy_primitives::{address, Address};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::{ChainId, SnapshotProvenance, TokenPriceSnapshot};

/// USDC on X Layer
pub const XLAYER_USDC: Address = address!("a2dcee55cd951d809c0762574ed4016e31e18419");

/// USDC used as quote currency on every other chain
pub const GENERIC_USDC: Address = address!("a0b86a33e6441c5639a2b9e8d88b4e6c5e2c80cf");

/// A token on the price watch-list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedToken {
    pub symbol: String,
    pub name: String,
    pub address: Address,
    pub chain: ChainId,
    pub decimals: u8,
    /// Identifier used by the market-data price endpoint
    pub market_id: String,
    pub reference_price: Decimal,
    pub reference_change_24h: Decimal,
    pub reference_change_percentage_24h: Decimal,
}

impl WatchedToken {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: &str,
        name: &str,
        address: Address,
        chain: ChainId,
        decimals: u8,
        market_id: &str,
        reference_price: Decimal,
        reference_change_24h: Decimal,
        reference_change_percentage_24h: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            address,
            chain,
            decimals,
            market_id: market_id.to_string(),
            reference_price,
            reference_change_24h,
            reference_change_percentage_24h,
        }
    }

    /// Snapshot carrying the unmodified reference values
    pub fn reference_snapshot(&self, observed_at: DateTime<Utc>) -> TokenPriceSnapshot {
        TokenPriceSnapshot {
            symbol: self.symbol.clone(),
            name: self.name.clone(),
            price: self.reference_price,
            change_24h: self.reference_change_24h,
            change_percentage_24h: self.reference_change_percentage_24h,
            observed_at,
            provenance: SnapshotProvenance::Reference,
        }
    }

    /// One whole token in base units (10^decimals)
    pub fn one_unit(&self) -> alloy_primitives::U256 {
        alloy_primitives::U256::from(10u64).pow(alloy_primitives::U256::from(self.decimals))
    }
}

/// Tokens shown in the price ticker, OKB first
pub static WATCH_LIST: LazyLock<Vec<WatchedToken>> = LazyLock::new(|| {
    vec![
        WatchedToken::new(
            "OKB", "OKB Token",
            address!("75231f58b43240c9718dd58b4967c5114342a86c"),
            ChainId::ETHEREUM, 18, "okb",
            Decimal::new(4567, 2), Decimal::new(89, 2), Decimal::new(199, 2),
        ),
        WatchedToken::new(
            "USDC", "USD Coin",
            XLAYER_USDC,
            ChainId::X_LAYER, 6, "usd-coin",  // 6 decimals
            Decimal::new(1001, 3), Decimal::new(1, 3), Decimal::new(1, 1),
        ),
        WatchedToken::new(
            "WETH", "Wrapped Ethereum",
            address!("94117fd7961b2ddd56725dfd5ba2fccfc56f3282"),
            ChainId::X_LAYER, 18, "weth",
            Decimal::new(324782, 2), Decimal::new(-8734, 2), Decimal::new(-262, 2),
        ),
        WatchedToken::new(
            "ETH", "Ethereum",
            Address::ZERO,
            ChainId::X_LAYER, 18, "ethereum",
            Decimal::new(325145, 2), Decimal::new(-8567, 2), Decimal::new(-257, 2),
        ),
        WatchedToken::new(
            "BTC", "Bitcoin",
            address!("2260fac5e5542a773aa44fbcfedf7c193bc2c599"),
            ChainId::ETHEREUM, 8, "bitcoin",  // WBTC, 8 decimals
            Decimal::new(9684723, 2), Decimal::new(124789, 2), Decimal::new(131, 2),
        ),
        WatchedToken::new(
            "MATIC", "Polygon",
            address!("0000000000000000000000000000000000001010"),
            ChainId::POLYGON, 18, "matic-network",
            Decimal::new(4234, 4), Decimal::new(-87, 4), Decimal::new(-201, 2),
        ),
        WatchedToken::new(
            "BNB", "BNB",
            Address::ZERO,
            ChainId::BSC, 18, "binancecoin",
            Decimal::new(68945, 2), Decimal::new(1267, 2), Decimal::new(187, 2),
        ),
        WatchedToken::new(
            "SOL", "Solana",
            Address::ZERO,
            ChainId::SOLANA, 9, "solana",
            Decimal::new(18573, 2), Decimal::new(-421, 2), Decimal::new(-222, 2),
        ),
    ]
});

pub fn watch_list() -> &'static [WatchedToken] {
    &WATCH_LIST
}

/// Get a watched token by symbol
pub fn get_token(symbol: &str) -> Option<&'static WatchedToken> {
    WATCH_LIST.iter().find(|t| t.symbol.eq_ignore_ascii_case(symbol))
}

/// USDC address used as the quote side when pricing a token on `chain`
pub fn usdc_address(chain: ChainId) -> Address {
    if chain == ChainId::X_LAYER {
        XLAYER_USDC
    } else {
        GENERIC_USDC
    }
}

/// Check if token is a stablecoin
pub fn is_stablecoin(symbol: &str) -> bool {
    matches!(symbol.to_uppercase().as_str(), "USDC" | "USDT" | "DAI" | "FRAX" | "LUSD")
}
