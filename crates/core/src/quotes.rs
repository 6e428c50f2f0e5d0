//! Quote and swap route types

use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ChainId, DataOrigin};

/// Quote request parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub chain: ChainId,
    pub from_token: Address,
    pub to_token: Address,
    /// Input amount in base units of `from_token`
    pub amount: U256,
    /// Slippage tolerance in percent
    pub slippage: Decimal,
}

impl QuoteRequest {
    pub fn new(chain: ChainId, from_token: Address, to_token: Address, amount: U256) -> Self {
        Self {
            chain,
            from_token,
            to_token,
            amount,
            slippage: Decimal::new(5, 1),  // 0.5% default
        }
    }

    pub fn with_slippage(mut self, percent: Decimal) -> Self {
        self.slippage = percent;
        self
    }
}

/// One side of a route as reported by the aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteToken {
    pub address: Address,
    pub symbol: String,
    pub name: String,
    pub unit_price: Option<Decimal>,
}

/// A single aggregator route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DexRoute {
    pub router: String,
    pub router_name: String,
    pub from_token: RouteToken,
    pub to_token: RouteToken,
    pub from_token_amount: U256,
    pub to_token_amount: U256,
    pub trade_fee: Decimal,
}

impl DexRoute {
    /// Output per unit of input, in base units
    pub fn effective_rate(&self) -> f64 {
        if self.from_token_amount.is_zero() {
            return 0.0;
        }
        f64::from(self.to_token_amount) / f64::from(self.from_token_amount)
    }
}

/// Routes returned for one quote request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub chain: ChainId,
    pub routes: Vec<DexRoute>,
}

impl SwapQuote {
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Route with the largest output amount
    pub fn best_route(&self) -> Option<&DexRoute> {
        self.routes.iter().max_by_key(|r| r.to_token_amount)
    }

    pub fn best_output(&self) -> Option<U256> {
        self.best_route().map(|r| r.to_token_amount)
    }
}

/// Result of a swap quote lookup, live or fabricated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteResult {
    pub request: QuoteRequest,
    pub quote: SwapQuote,
    pub origin: DataOrigin,
}

impl QuoteResult {
    pub fn is_fallback(&self) -> bool {
        !self.origin.is_live()
    }
}

/// Chain entry from the aggregator's supported-chain listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedChain {
    pub chain_id: String,
    pub chain_name: String,
    #[serde(default)]
    pub dex_token_approve_address: Option<String>,
}

/// Token entry from the aggregator's token listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatorToken {
    pub token_contract_address: String,
    pub token_symbol: String,
    #[serde(default)]
    pub token_name: String,
    #[serde(default)]
    pub decimals: String,
    #[serde(default)]
    pub token_logo_url: Option<String>,
}
