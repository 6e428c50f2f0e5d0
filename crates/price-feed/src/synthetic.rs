//! Locally fabricated prices and quotes
//!
//! Synthetic prices stay within `max_variation` of the reference table and
//! synthetic quote outputs stay within 95%..103% of the input amount.

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::*;

use ngo_core::{
    watch_list, DexRoute, QuoteRequest, RouteToken, SnapshotProvenance, SwapQuote,
    TokenPriceSnapshot, WatchedToken,
};

pub const MIN_OUTPUT_BPS: u64 = 9_500;
pub const MAX_OUTPUT_BPS: u64 = 10_300;
const BPS_DENOMINATOR: u64 = 10_000;

pub const FALLBACK_ROUTER_NAME: &str = "OKX DEX Aggregator (demo fallback)";

/// `floor(amount * numerator / denominator)` without intermediate overflow
fn mul_div_floor(amount: U256, numerator: u64, denominator: u64) -> U256 {
    let den = U256::from(denominator);
    let num = U256::from(numerator);
    let quotient = amount / den;
    let remainder = amount % den;
    quotient
        .saturating_mul(num)
        .saturating_add(remainder * num / den)
}

/// Output for `amount` scaled by `bps`, never below 95% of the input
pub fn scale_output(amount: U256, bps: u64) -> U256 {
    let scaled = mul_div_floor(amount, bps, BPS_DENOMINATOR);
    let floor = mul_div_floor(amount, MIN_OUTPUT_BPS, BPS_DENOMINATOR);
    let exact_floor = (amount % U256::from(BPS_DENOMINATOR)) * U256::from(MIN_OUTPUT_BPS)
        % U256::from(BPS_DENOMINATOR);
    // ceil(0.95 * amount)
    let minimum = if exact_floor.is_zero() { floor } else { floor + U256::from(1u64) };
    scaled.max(minimum)
}

/// Reference snapshot perturbed by `variation` (relative, e.g. 0.005 = +0.5%)
pub fn perturbed_snapshot(
    token: &WatchedToken,
    variation: Decimal,
    observed_at: DateTime<Utc>,
) -> TokenPriceSnapshot {
    let price_delta = token.reference_price * variation;

    TokenPriceSnapshot {
        symbol: token.symbol.clone(),
        name: token.name.clone(),
        price: token.reference_price + price_delta,
        change_24h: token.reference_change_24h + price_delta * Decimal::new(1, 1),
        change_percentage_24h: token.reference_change_percentage_24h
            + variation * Decimal::ONE_HUNDRED,
        observed_at,
        provenance: SnapshotProvenance::Synthetic,
    }
}

/// Random source for synthetic data
#[derive(Debug)]
pub struct Synthesizer {
    rng: Mutex<StdRng>,
    max_variation: f64,
}

impl Synthesizer {
    pub fn new(max_variation: f64) -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            max_variation,
        }
    }

    /// Deterministic synthesizer for tests and reproducible demos
    pub fn seeded(seed: u64, max_variation: f64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            max_variation,
        }
    }

    pub fn max_variation(&self) -> f64 {
        self.max_variation
    }

    fn draw_variation(&self) -> Decimal {
        let max = Decimal::from_f64(self.max_variation).unwrap_or_default();
        let raw = self.rng.lock().gen_range(-self.max_variation..=self.max_variation);
        Decimal::from_f64(raw)
            .unwrap_or_default()
            .round_dp(6)
            .clamp(-max, max)
    }

    /// One synthetic snapshot per watched token
    pub fn snapshots(&self, observed_at: DateTime<Utc>) -> Vec<TokenPriceSnapshot> {
        self.snapshots_for(watch_list(), observed_at)
    }

    pub fn snapshots_for(
        &self,
        tokens: &[WatchedToken],
        observed_at: DateTime<Utc>,
    ) -> Vec<TokenPriceSnapshot> {
        tokens
            .iter()
            .map(|token| perturbed_snapshot(token, self.draw_variation(), observed_at))
            .collect()
    }

    /// A single-route quote with output in 95%..103% of the input
    pub fn quote(&self, request: &QuoteRequest) -> SwapQuote {
        let mut rng = self.rng.lock();

        let bps = rng.gen_range(MIN_OUTPUT_BPS..=MAX_OUTPUT_BPS);
        let router = Address::from(rng.gen::<[u8; 20]>());
        let trade_fee = Decimal::from_f64(rng.gen_range(0.1..0.6))
            .unwrap_or_default()
            .round_dp(2);
        let from_price = Decimal::from_f64(rng.gen_range(0.5..2.5)).map(|d| d.round_dp(6));
        let to_price = Decimal::from_f64(rng.gen_range(0.5..2.5)).map(|d| d.round_dp(6));

        let route = DexRoute {
            router: router.to_string(),
            router_name: FALLBACK_ROUTER_NAME.to_string(),
            from_token: route_token(request, request.from_token, "FROM", from_price),
            to_token: route_token(request, request.to_token, "TO", to_price),
            from_token_amount: request.amount,
            to_token_amount: scale_output(request.amount, bps),
            trade_fee,
        };

        SwapQuote {
            chain: request.chain,
            routes: vec![route],
        }
    }
}

fn route_token(
    request: &QuoteRequest,
    address: Address,
    placeholder: &str,
    unit_price: Option<Decimal>,
) -> RouteToken {
    let known = watch_list()
        .iter()
        .find(|t| t.chain == request.chain && t.address == address && !address.is_zero());

    match known {
        Some(token) => RouteToken {
            address,
            symbol: token.symbol.clone(),
            name: token.name.clone(),
            unit_price,
        },
        None => RouteToken {
            address,
            symbol: placeholder.to_string(),
            name: format!("{} Token", placeholder),
            unit_price,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ngo_core::{get_token, ChainId, XLAYER_USDC};
    use proptest::prelude::*;

    fn within_bounds(amount: U256, output: U256) -> bool {
        let hundred = U256::from(100u64);
        output.saturating_mul(hundred) >= amount.saturating_mul(U256::from(95u64))
            && output.saturating_mul(hundred) <= amount.saturating_mul(U256::from(103u64))
    }

    #[test]
    fn test_snapshots_cover_watch_list() {
        let synth = Synthesizer::seeded(7, 0.01);
        let now = Utc::now();
        let snapshots = synth.snapshots(now);

        assert_eq!(snapshots.len(), 8);
        for (snapshot, token) in snapshots.iter().zip(watch_list()) {
            assert_eq!(snapshot.symbol, token.symbol);
            assert_eq!(snapshot.provenance, SnapshotProvenance::Synthetic);
            assert_eq!(snapshot.observed_at, now);
        }
    }

    #[test]
    fn test_perturbation_math() {
        let token = get_token("OKB").unwrap();
        let snapshot = perturbed_snapshot(token, Decimal::new(1, 2), Utc::now());

        // 45.67 * 1.01
        assert_eq!(snapshot.price, Decimal::new(461267, 4));
        // 0.89 + 0.4567 * 0.1
        assert_eq!(snapshot.change_24h, Decimal::new(935670, 6));
        // 1.99 + 1
        assert_eq!(snapshot.change_percentage_24h, Decimal::new(299, 2));
    }

    #[test]
    fn test_scale_output_edges() {
        assert_eq!(scale_output(U256::ZERO, MIN_OUTPUT_BPS), U256::ZERO);
        // ceil(0.95) = 1
        assert_eq!(scale_output(U256::from(1u64), MIN_OUTPUT_BPS), U256::from(1u64));
        assert_eq!(scale_output(U256::from(10_000u64), MAX_OUTPUT_BPS), U256::from(10_300u64));
        assert_eq!(scale_output(U256::from(1_000_001u64), MIN_OUTPUT_BPS), U256::from(950_001u64));
    }

    #[test]
    fn test_quote_is_single_bounded_route() {
        let synth = Synthesizer::seeded(42, 0.01);
        let okb = get_token("OKB").unwrap();
        let request = QuoteRequest::new(
            ChainId::ETHEREUM,
            okb.address,
            XLAYER_USDC,
            U256::from(1_000_000_000_000_000_000u128),
        );

        let quote = synth.quote(&request);
        assert_eq!(quote.routes.len(), 1);

        let route = &quote.routes[0];
        assert_eq!(route.router_name, FALLBACK_ROUTER_NAME);
        assert_eq!(route.from_token.symbol, "OKB");
        assert_eq!(route.to_token.symbol, "TO");
        assert_eq!(route.from_token_amount, request.amount);
        assert!(within_bounds(request.amount, route.to_token_amount));
        assert!(route.trade_fee >= Decimal::new(1, 1) && route.trade_fee <= Decimal::new(6, 1));
    }

    proptest! {
        #[test]
        fn prop_synthetic_prices_within_one_percent(seed in any::<u64>()) {
            let synth = Synthesizer::seeded(seed, 0.01);
            let limit = Decimal::new(1, 2);
            for (snapshot, token) in synth.snapshots(Utc::now()).iter().zip(watch_list()) {
                let deviation = (snapshot.price - token.reference_price).abs();
                prop_assert!(deviation <= token.reference_price * limit);
            }
        }

        #[test]
        fn prop_synthetic_quote_output_bounded(seed in any::<u64>(), amount in any::<u128>()) {
            let synth = Synthesizer::seeded(seed, 0.01);
            let request = QuoteRequest::new(
                ChainId::X_LAYER,
                Address::ZERO,
                XLAYER_USDC,
                U256::from(amount),
            );
            let output = synth.quote(&request).best_output().unwrap();
            prop_assert!(within_bounds(request.amount, output));
        }

        #[test]
        fn prop_scale_output_bounded(amount in any::<u128>(), bps in MIN_OUTPUT_BPS..=MAX_OUTPUT_BPS) {
            let amount = U256::from(amount);
            prop_assert!(within_bounds(amount, scale_output(amount, bps)));
        }
    }
}
