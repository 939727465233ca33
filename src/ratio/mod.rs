//! Pool exchange-ratio feed.
//!
//! Responsibilities:
//! • Fetch the current ratio between the two pool tokens.
//! • Keep a periodically refreshed copy that readers can take without waiting
//!   (see [`RatioCache`]).

use crate::errors::Result;
use crate::models::ExchangeRatio;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
#[cfg(test)]
use mockall::automock;

pub mod cache;

pub use cache::{RatioCache, RatioCacheConfig, SubscriptionId};

/// Supplies the current exchange ratio for a token pair, e.g. "SUI-USDC".
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RatioSource: Send + Sync {
    async fn fetch_ratio(&self, pair: &str) -> Result<ExchangeRatio>;
}

/// Ratio source that always reports the same ratio, stamped at fetch time.
#[derive(Debug, Clone)]
pub struct FixedRatioSource {
    numerator: BigDecimal,
    denominator: BigDecimal,
}

impl FixedRatioSource {
    pub fn new(numerator: BigDecimal, denominator: BigDecimal) -> Result<Self> {
        // fail at construction rather than on every fetch
        ExchangeRatio::new(numerator.clone(), denominator.clone())?;
        Ok(Self {
            numerator,
            denominator,
        })
    }
}

impl Default for FixedRatioSource {
    /// 2 SUI per 1 USDC.
    fn default() -> Self {
        Self {
            numerator: BigDecimal::from(2),
            denominator: BigDecimal::from(1),
        }
    }
}

#[async_trait]
impl RatioSource for FixedRatioSource {
    async fn fetch_ratio(&self, _pair: &str) -> Result<ExchangeRatio> {
        ExchangeRatio::new(self.numerator.clone(), self.denominator.clone())
    }
}
