//! Settlement hand-off.
//!
//! The deposit core never moves funds itself; it passes an accepted binding to
//! a [`SettlementGateway`] and records the reference it gets back.

use crate::errors::Result;
use crate::models::{DepositResult, SettlementReference};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::time::Duration;
use tracing::debug;

/// Everything settlement needs, already validated. Can be resubmitted after a
/// settlement failure without binding again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementOrder {
    pub requester: String,
    pub deployed_a: BigDecimal,
    pub deployed_b: BigDecimal,
    pub excess_a: BigDecimal,
    pub excess_b: BigDecimal,
    pub shares: BigDecimal,
    /// Price tolerance the gateway must honour when it swaps a single-mode
    /// deposit into the pool. `None` for dual deposits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slippage_pct: Option<BigDecimal>,
}

impl SettlementOrder {
    pub fn into_result(self, settlement: SettlementReference) -> DepositResult {
        DepositResult {
            deployed_a: self.deployed_a,
            deployed_b: self.deployed_b,
            excess_a: self.excess_a,
            excess_b: self.excess_b,
            shares_issued: self.shares,
            settlement,
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    async fn submit_settlement(&self, order: SettlementOrder) -> Result<SettlementReference>;
}

/// Stand-in gateway: waits `delay`, then returns a random transaction hash.
#[derive(Debug, Clone)]
pub struct SimulatedSettlement {
    delay: Duration,
}

impl SimulatedSettlement {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedSettlement {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl SettlementGateway for SimulatedSettlement {
    async fn submit_settlement(&self, order: SettlementOrder) -> Result<SettlementReference> {
        tokio::time::sleep(self.delay).await;
        let reference = random_tx_hash();
        debug!(requester = %order.requester, reference = %reference, "[SETTLE] simulated settlement");
        Ok(reference)
    }
}

fn random_tx_hash() -> SettlementReference {
    let bytes: [u8; 32] = rand::random();
    let mut hash = String::with_capacity(66);
    hash.push_str("0x");
    for b in bytes {
        let _ = write!(hash, "{b:02x}");
    }
    SettlementReference(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Zero;

    fn order() -> SettlementOrder {
        SettlementOrder {
            requester: "0xabc".into(),
            deployed_a: BigDecimal::from(100),
            deployed_b: BigDecimal::from(50),
            excess_a: BigDecimal::zero(),
            excess_b: BigDecimal::zero(),
            shares: BigDecimal::from(95),
            slippage_pct: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_settlement_returns_tx_hash() {
        let gateway = SimulatedSettlement::default();
        let reference = gateway.submit_settlement(order()).await.unwrap();
        assert_eq!(reference.0.len(), 66);
        assert!(reference.0.starts_with("0x"));
        assert!(reference.0[2..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn order_converts_into_result() {
        let result = order().into_result(SettlementReference("0xfeed".into()));
        assert_eq!(result.deployed_a, BigDecimal::from(100));
        assert_eq!(result.shares_issued, BigDecimal::from(95));
        assert_eq!(result.settlement.to_string(), "0xfeed");
    }
}
