//! Configuration loader and application settings.

use crate::binding::BindingPolicy;
use crate::deposit::DepositConfig;
use crate::errors::{AppError, Result};
use crate::ratio::RatioCacheConfig;
use bigdecimal::BigDecimal;
use num_traits::Signed;
use std::str::FromStr;
use std::time::Duration;

/// Consolidated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Pool pair whose ratio is tracked (e.g., "SUI-USDC").
    pub pair: String,
    /// Wallet used by the demo runner.
    pub wallet_address: String,
    /// Share price in token B.
    pub reference_price: BigDecimal,
    /// Exclusive upper bound on ratio deviation, in percent.
    pub max_deviation_pct: BigDecimal,
    pub default_slippage_pct: BigDecimal,
    pub max_slippage_pct: BigDecimal,
    pub ratio_cache: RatioCacheConfig,
    pub settlement_timeout: Duration,
    /// Delay of the simulated settlement gateway.
    pub settlement_delay: Duration,
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cfg = Self {
            pair: lookup("PAIR").unwrap_or_else(|| "SUI-USDC".into()),
            wallet_address: lookup("WALLET_ADDRESS")
                .unwrap_or_else(|| "0x1234567890123456789012345678901234567890".into()),
            reference_price: decimal(&lookup, "REFERENCE_PRICE", "1.05")?,
            max_deviation_pct: decimal(&lookup, "MAX_RATIO_DEVIATION_PCT", "1.0")?,
            default_slippage_pct: decimal(&lookup, "DEFAULT_SLIPPAGE_PCT", "0.5")?,
            max_slippage_pct: decimal(&lookup, "MAX_SLIPPAGE_PCT", "10")?,
            ratio_cache: RatioCacheConfig {
                refresh_interval: millis(&lookup, "RATIO_REFRESH_INTERVAL_MS", 30_000)?,
                stale_tolerance: millis(&lookup, "RATIO_STALE_TOLERANCE_MS", 90_000)?,
            },
            settlement_timeout: millis(&lookup, "SETTLEMENT_TIMEOUT_MS", 5_000)?,
            settlement_delay: millis(&lookup, "SETTLEMENT_DELAY_MS", 1_000)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if !self.reference_price.is_positive() {
            return Err(AppError::Config("REFERENCE_PRICE must be positive".into()));
        }
        if !self.max_deviation_pct.is_positive() {
            return Err(AppError::Config(
                "MAX_RATIO_DEVIATION_PCT must be positive".into(),
            ));
        }
        if self.default_slippage_pct.is_negative()
            || self.default_slippage_pct > self.max_slippage_pct
        {
            return Err(AppError::Config(
                "DEFAULT_SLIPPAGE_PCT must lie within [0, MAX_SLIPPAGE_PCT]".into(),
            ));
        }
        if self.ratio_cache.refresh_interval.is_zero() {
            return Err(AppError::Config(
                "RATIO_REFRESH_INTERVAL_MS must be non-zero".into(),
            ));
        }
        if self.ratio_cache.stale_tolerance < self.ratio_cache.refresh_interval {
            return Err(AppError::Config(
                "RATIO_STALE_TOLERANCE_MS must not be shorter than the refresh interval".into(),
            ));
        }
        Ok(())
    }

    /// Settings consumed by the deposit orchestrator.
    pub fn deposit_config(&self) -> DepositConfig {
        DepositConfig {
            reference_price: self.reference_price.clone(),
            binding: BindingPolicy {
                max_deviation_pct: self.max_deviation_pct.clone(),
            },
            default_slippage_pct: self.default_slippage_pct.clone(),
            max_slippage_pct: self.max_slippage_pct.clone(),
            settlement_timeout: self.settlement_timeout,
        }
    }
}

fn decimal<F>(lookup: &F, key: &str, default: &str) -> Result<BigDecimal>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    BigDecimal::from_str(raw.trim())
        .map_err(|e| AppError::Config(format!("{key}={raw:?} is not a decimal: {e}")))
}

fn millis<F>(lookup: &F, key: &str, default: u64) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(Duration::from_millis(default)),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| AppError::Config(format!("{key}={raw:?} is not a millisecond count: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = from_pairs(&[]).unwrap();
        assert_eq!(cfg.pair, "SUI-USDC");
        assert_eq!(cfg.reference_price, BigDecimal::from_str("1.05").unwrap());
        assert_eq!(cfg.max_deviation_pct, BigDecimal::from(1));
        assert_eq!(cfg.ratio_cache.refresh_interval, Duration::from_secs(30));
        assert_eq!(cfg.ratio_cache.stale_tolerance, Duration::from_secs(90));
        assert_eq!(cfg.settlement_timeout, Duration::from_secs(5));
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = from_pairs(&[
            ("PAIR", "USDC-SUI"),
            ("MAX_RATIO_DEVIATION_PCT", "2.5"),
            ("RATIO_REFRESH_INTERVAL_MS", "1000"),
            ("RATIO_STALE_TOLERANCE_MS", " 5000 "),
        ])
        .unwrap();
        assert_eq!(cfg.pair, "USDC-SUI");
        assert_eq!(
            cfg.deposit_config().binding.max_deviation_pct,
            BigDecimal::from_str("2.5").unwrap()
        );
        assert_eq!(cfg.ratio_cache.stale_tolerance, Duration::from_secs(5));
    }

    #[test]
    fn malformed_values_are_config_errors() {
        for pairs in [
            [("REFERENCE_PRICE", "abc")],
            [("SETTLEMENT_TIMEOUT_MS", "-1")],
            [("REFERENCE_PRICE", "0")],
            [("RATIO_REFRESH_INTERVAL_MS", "0")],
            [("RATIO_STALE_TOLERANCE_MS", "10")],
            [("DEFAULT_SLIPPAGE_PCT", "11")],
        ] {
            let err = from_pairs(&pairs).unwrap_err();
            assert!(matches!(err, AppError::Config(_)), "{pairs:?} gave {err}");
        }
    }
}
