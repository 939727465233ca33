//! Wallet balance lookup and default-mode selection.

use crate::errors::Result;
use crate::models::{Balances, DepositMode};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
#[cfg(test)]
use mockall::automock;
use num_traits::Signed;

/// Supplies a requester's holdings of both pool tokens.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn fetch_balances(&self, address: &str) -> Result<Balances>;
}

/// Balance source that reports the same holdings for every address.
#[derive(Debug, Clone)]
pub struct StaticBalanceSource {
    balances: Balances,
}

impl StaticBalanceSource {
    pub fn new(balances: Balances) -> Self {
        Self { balances }
    }
}

impl Default for StaticBalanceSource {
    /// 240 SUI and 129.84 USDC.
    fn default() -> Self {
        Self {
            balances: Balances {
                token_a: BigDecimal::from(240),
                token_b: BigDecimal::new(12984.into(), 2),
            },
        }
    }
}

#[async_trait]
impl BalanceSource for StaticBalanceSource {
    async fn fetch_balances(&self, _address: &str) -> Result<Balances> {
        Ok(self.balances.clone())
    }
}

/// Dual when the requester holds both tokens, single otherwise.
pub fn select_default_mode(balances: &Balances) -> DepositMode {
    if balances.token_a.is_positive() && balances.token_b.is_positive() {
        DepositMode::Dual
    } else {
        DepositMode::Single
    }
}
