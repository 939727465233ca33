//! Share issuance for bound deposits.

use crate::errors::{AppError, Result};
use crate::models::ExchangeRatio;
use bigdecimal::BigDecimal;
use num_traits::Signed;

/// Share price used when the caller has no better quote: 1.05 token B.
pub fn default_reference_price() -> BigDecimal {
    BigDecimal::new(105.into(), 2)
}

/// Convert bound amounts into issued shares.
///
/// Token A is valued in token B at the ratio (`bound_a * d / n`), added to
/// `bound_b`, and divided by `reference_price`. Nothing is rounded here.
pub fn issued_shares(
    bound_a: &BigDecimal,
    bound_b: &BigDecimal,
    ratio: &ExchangeRatio,
    reference_price: &BigDecimal,
) -> Result<BigDecimal> {
    ratio.validate()?;
    if !reference_price.is_positive() {
        return Err(AppError::InvalidInput(format!(
            "reference price must be positive, got {reference_price}"
        )));
    }
    if bound_a.is_negative() || bound_b.is_negative() {
        return Err(AppError::InvalidInput(format!(
            "bound amounts must be non-negative, got {bound_a} / {bound_b}"
        )));
    }

    let a_in_b = (bound_a * ratio.denominator()) / ratio.numerator();
    Ok((a_in_b + bound_b) / reference_price)
}
