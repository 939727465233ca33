//! Miscellaneous helper utilities.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};
use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize `tracing` subscriber with env-based filter.
///
/// If `RUST_LOG` is not set, defaults to `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Lenient amount parsing for user-typed input.
///
/// Anything but digits and `.` is dropped, extra decimal points are folded
/// into the fraction, and unparseable or empty input yields zero.
pub fn parse_token_input(input: &str) -> BigDecimal {
    let cleaned: String = input
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let normalized = match cleaned.split_once('.') {
        Some((whole, frac)) => format!("{whole}.{}", frac.replace('.', "")),
        None => cleaned,
    };
    let normalized = normalized.trim_end_matches('.');
    if normalized.is_empty() || normalized == "." {
        return BigDecimal::zero();
    }
    let padded = if normalized.starts_with('.') {
        format!("0{normalized}")
    } else {
        normalized.to_string()
    };
    BigDecimal::from_str(&padded).unwrap_or_else(|_| BigDecimal::zero())
}

/// Fixed-decimal rendering for logs; positive amounts too small to show are
/// rendered as `< 0.000…1`.
pub fn format_token_amount(amount: &BigDecimal, display_decimals: i64) -> String {
    let smallest = BigDecimal::new(BigInt::one(), display_decimals);
    if amount.is_positive() && *amount < smallest {
        let places = usize::try_from(display_decimals).unwrap_or(0);
        return match places {
            0 => "< 1".to_string(),
            n => format!("< 0.{}1", "0".repeat(n - 1)),
        };
    }
    amount
        .round(display_decimals)
        .with_scale(display_decimals)
        .to_string()
}
