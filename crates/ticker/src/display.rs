//! Price row formatting

use rust_decimal::{Decimal, RoundingStrategy};

use ngo_core::TokenPriceSnapshot;
use ngo_price_feed::TickerState;

fn round(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Insert `,` every three digits of the integer part
fn group_thousands(formatted: &str) -> String {
    let (sign, unsigned) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

/// Sub-dollar prices get 4 decimals, large prices get thousands separators
pub fn format_price(price: Decimal) -> String {
    if price < Decimal::ONE {
        format!("{:.4}", round(price, 4))
    } else if price < Decimal::ONE_HUNDRED {
        format!("{:.2}", round(price, 2))
    } else {
        group_thousands(&format!("{:.2}", round(price, 2)))
    }
}

/// Signed percentage, e.g. `+1.99%`
pub fn format_change(percentage: Decimal) -> String {
    let sign = if percentage > Decimal::ZERO {
        "+"
    } else if percentage < Decimal::ZERO {
        "-"
    } else {
        ""
    };
    format!("{}{:.2}%", sign, round(percentage.abs(), 2))
}

pub fn format_row(snapshot: &TokenPriceSnapshot) -> String {
    format!(
        "{:<6} ${:>12} {:>8}",
        snapshot.symbol,
        format_price(snapshot.price),
        format_change(snapshot.change_percentage_24h)
    )
}

/// Header line plus one row per token
pub fn format_state(state: &TickerState) -> String {
    let mut header = match state.last_updated {
        Some(at) => format!("Prices as of {}", at.format("%H:%M:%S UTC")),
        None if state.is_loading => "Loading prices".to_string(),
        None => "No prices yet".to_string(),
    };

    if let Some(reason) = state.origin.as_ref().and_then(|o| o.fallback_reason()) {
        header.push_str(&format!(" [synthetic: {}]", reason));
    }
    if let Some(error) = &state.error {
        header.push_str(&format!(" (last refresh failed: {})", error));
    }

    let mut lines = vec![header];
    lines.extend(state.prices.iter().map(format_row));
    lines.join("\n")
}
