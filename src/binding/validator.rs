use super::types::{BindingIssue, BindingPolicy, BindingResult};
use crate::errors::{AppError, Result};
use crate::models::{Balances, DepositMode, ExchangeRatio, Side};
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};
use tracing::debug;

/// Minimum decimal places kept when a conversion across the pool ratio does
/// not terminate. Finer inputs keep their own scale.
pub const RATIO_SCALE: i64 = 18;

/// Bind two requested amounts against the pool ratio and the requester's
/// balances.
///
/// Each side is capped by what the *other* side's input can match at the
/// ratio (`max_a = requested_b * n / d`, `max_b = requested_a * d / n`), so
/// whichever side is over-supplied is the one reduced. The remainder of each
/// side is reported as excess.
///
/// Requesting nothing on both sides is not an error: it yields an all-zero,
/// invalid result.
///
/// In single mode exactly one side may be non-zero. That side binds in full
/// and the other binds to zero; the ratio deviation does not apply.
pub fn bind(
    requested_a: &BigDecimal,
    requested_b: &BigDecimal,
    mode: DepositMode,
    ratio: &ExchangeRatio,
    balances: &Balances,
    policy: &BindingPolicy,
) -> Result<BindingResult> {
    if requested_a.is_negative() || requested_b.is_negative() {
        return Err(AppError::InvalidInput(format!(
            "requested amounts must be non-negative, got {requested_a} / {requested_b}"
        )));
    }
    ratio.validate()?;

    if requested_a.is_zero() && requested_b.is_zero() {
        return Ok(BindingResult::nothing_to_deposit(mode));
    }

    let max_a = convert_at_ratio(requested_b, ratio.numerator(), ratio.denominator());
    let max_b = convert_at_ratio(requested_a, ratio.denominator(), ratio.numerator());

    let result = match mode {
        DepositMode::Dual => {
            bind_dual(requested_a, requested_b, max_a, max_b, ratio, balances, policy)
        }
        DepositMode::Single => bind_single(requested_a, requested_b, max_a, max_b, balances)?,
    };

    debug!(
        ratio = %ratio,
        bound_a = %result.bound_a,
        bound_b = %result.bound_b,
        excess_a = %result.excess_a,
        excess_b = %result.excess_b,
        valid = result.is_valid,
        "[BIND] computed binding"
    );
    Ok(result)
}

fn bind_dual(
    requested_a: &BigDecimal,
    requested_b: &BigDecimal,
    max_a: BigDecimal,
    max_b: BigDecimal,
    ratio: &ExchangeRatio,
    balances: &Balances,
    policy: &BindingPolicy,
) -> BindingResult {
    let bound_a = requested_a.clone().min(max_a.clone());
    let bound_b = requested_b.clone().min(max_b.clone());
    let excess_a = requested_a - &bound_a;
    let excess_b = requested_b - &bound_b;
    let deviation_pct = deviation_pct(&bound_a, &bound_b, ratio);

    let mut issues = Vec::new();
    if !bound_a.is_positive() {
        issues.push(BindingIssue::NonPositiveAmount(Side::A));
    }
    if !bound_b.is_positive() {
        issues.push(BindingIssue::NonPositiveAmount(Side::B));
    }
    if bound_a > balances.token_a {
        issues.push(BindingIssue::InsufficientBalance(Side::A));
    }
    if bound_b > balances.token_b {
        issues.push(BindingIssue::InsufficientBalance(Side::B));
    }
    match &deviation_pct {
        None => issues.push(BindingIssue::UnboundedDeviation),
        Some(pct) if !policy.accepts(pct) => issues.push(BindingIssue::ExcessiveDeviation),
        Some(_) => {}
    }

    BindingResult {
        mode: DepositMode::Dual,
        max_a,
        max_b,
        bound_a,
        bound_b,
        excess_a,
        excess_b,
        deviation_pct,
        is_valid: issues.is_empty(),
        issues,
    }
}

fn bind_single(
    requested_a: &BigDecimal,
    requested_b: &BigDecimal,
    max_a: BigDecimal,
    max_b: BigDecimal,
    balances: &Balances,
) -> Result<BindingResult> {
    let supplied = match (requested_a.is_zero(), requested_b.is_zero()) {
        (false, true) => Side::A,
        (true, false) => Side::B,
        _ => {
            return Err(AppError::InvalidInput(
                "single mode takes exactly one token".to_string(),
            ));
        }
    };

    let mut issues = Vec::new();
    let (bound_a, bound_b) = match supplied {
        Side::A => (requested_a.clone(), BigDecimal::zero()),
        Side::B => (BigDecimal::zero(), requested_b.clone()),
    };
    let supplied_bound = match supplied {
        Side::A => &bound_a,
        Side::B => &bound_b,
    };
    if supplied_bound > balances.get(supplied) {
        issues.push(BindingIssue::InsufficientBalance(supplied));
    }

    Ok(BindingResult {
        mode: DepositMode::Single,
        max_a,
        max_b,
        bound_a,
        bound_b,
        excess_a: BigDecimal::zero(),
        excess_b: BigDecimal::zero(),
        deviation_pct: Some(BigDecimal::zero()),
        is_valid: issues.is_empty(),
        issues,
    })
}

/// Pair `amount` of `side` with the exact counter-amount the ratio asks for.
///
/// Performs no clamping and no balance checks; callers use it to pre-fill the
/// other input before calling [`bind`]. The counter-amount is rounded with the
/// same rule `bind` uses for its caps, so the returned pair binds without
/// excess on either side.
pub fn correct_to_ratio(
    amount: &BigDecimal,
    side: Side,
    ratio: &ExchangeRatio,
) -> (BigDecimal, BigDecimal) {
    if ratio.validate().is_err() {
        return match side {
            Side::A => (amount.clone(), BigDecimal::zero()),
            Side::B => (BigDecimal::zero(), amount.clone()),
        };
    }
    match side {
        Side::A => (
            amount.clone(),
            convert_at_ratio(amount, ratio.denominator(), ratio.numerator()),
        ),
        Side::B => (
            convert_at_ratio(amount, ratio.numerator(), ratio.denominator()),
            amount.clone(),
        ),
    }
}

/// `amount * mul / div`, multiplied first. An exact quotient is returned as
/// is; otherwise it is rounded up at `RATIO_SCALE` or the product's own
/// scale, whichever is finer. `div` must be positive.
fn convert_at_ratio(amount: &BigDecimal, mul: &BigDecimal, div: &BigDecimal) -> BigDecimal {
    let product = amount * mul;
    let quotient = &product / div;
    if &quotient * div == product {
        return quotient.normalized();
    }
    let (_, product_scale) = product.as_bigint_and_exponent();
    round_up(&quotient, &product, div, RATIO_SCALE.max(product_scale))
}

/// Smallest value at `scale` whose product with `div` reaches `product`.
fn round_up(
    quotient: &BigDecimal,
    product: &BigDecimal,
    div: &BigDecimal,
    scale: i64,
) -> BigDecimal {
    let truncated = quotient.with_scale(scale);
    let rounded = if &(&truncated * div) < product {
        truncated + BigDecimal::new(BigInt::one(), scale)
    } else {
        truncated
    };
    rounded.normalized()
}

/// `|actual - expected| / expected * 100` with `actual = bound_a / bound_b`
/// and `expected = n / d`, evaluated as `|bound_a*d - bound_b*n| * 100 / (bound_b*n)`
/// so that a binding exactly on the ratio reports exactly zero.
fn deviation_pct(
    bound_a: &BigDecimal,
    bound_b: &BigDecimal,
    ratio: &ExchangeRatio,
) -> Option<BigDecimal> {
    if bound_b.is_zero() {
        return bound_a.is_zero().then(BigDecimal::zero);
    }
    let expected_a = bound_b * ratio.numerator();
    let gap = (bound_a * ratio.denominator() - &expected_a).abs();
    Some(gap * BigDecimal::from(100) / expected_a)
}
