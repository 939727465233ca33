//! Deposit orchestration: ratio snapshot → balances → binding → shares →
//! settlement.

use crate::binding::{BindingPolicy, BindingResult, bind};
use crate::errors::{AppError, Result};
use crate::models::{
    Balances, DepositMode, DepositRequest, DepositResult, ExchangeRatio, SettlementReference,
};
use crate::ratio::RatioCache;
use crate::settlement::{SettlementGateway, SettlementOrder};
use crate::shares::{default_reference_price, issued_shares};
use crate::wallet::{BalanceSource, select_default_mode};
use bigdecimal::BigDecimal;
use num_traits::{Signed, Zero};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Settings for [`DepositOrchestrator`].
#[derive(Debug, Clone)]
pub struct DepositConfig {
    pub reference_price: BigDecimal,
    pub binding: BindingPolicy,
    /// Applied to single-mode requests that carry no slippage of their own.
    pub default_slippage_pct: BigDecimal,
    pub max_slippage_pct: BigDecimal,
    pub settlement_timeout: Duration,
}

impl Default for DepositConfig {
    fn default() -> Self {
        Self {
            reference_price: default_reference_price(),
            binding: BindingPolicy::default(),
            default_slippage_pct: BigDecimal::new(5.into(), 1),
            max_slippage_pct: BigDecimal::from(10),
            settlement_timeout: Duration::from_secs(5),
        }
    }
}

/// Preview of a deposit: what would be bound and issued right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepositQuote {
    pub ratio: ExchangeRatio,
    pub binding: BindingResult,
    /// Zero whenever the binding is invalid.
    pub shares: BigDecimal,
    /// Effective slippage tolerance; single mode only.
    pub slippage_pct: Option<BigDecimal>,
}

pub struct DepositOrchestrator {
    ratio_cache: Arc<RatioCache>,
    balances: Arc<dyn BalanceSource>,
    settlement: Arc<dyn SettlementGateway>,
    config: DepositConfig,
}

impl DepositOrchestrator {
    pub fn new(
        ratio_cache: Arc<RatioCache>,
        balances: Arc<dyn BalanceSource>,
        settlement: Arc<dyn SettlementGateway>,
        config: DepositConfig,
    ) -> Self {
        Self {
            ratio_cache,
            balances,
            settlement,
            config,
        }
    }

    /// Bind and price a request without settling it. An invalid binding is
    /// reported in the quote, not as an error.
    pub async fn quote(&self, request: &DepositRequest) -> Result<DepositQuote> {
        let ratio = self.ratio_cache.snapshot()?;
        self.quote_at(request, ratio).await
    }

    /// Validate, bind, issue shares and settle.
    ///
    /// The ratio is read once on entry and that snapshot is used for both
    /// binding and share issuance.
    pub async fn process(&self, request: &DepositRequest) -> Result<DepositResult> {
        let ratio = self.ratio_cache.snapshot()?;
        let quote = self.quote_at(request, ratio).await?;

        if !quote.binding.is_valid {
            warn!(
                requester = %request.requester,
                issues = %quote.binding.describe_issues(),
                "[DEPOSIT] rejected"
            );
            return Err(AppError::ValidationFailed(Box::new(quote.binding)));
        }

        let order = SettlementOrder {
            requester: request.requester.clone(),
            deployed_a: quote.binding.bound_a,
            deployed_b: quote.binding.bound_b,
            excess_a: quote.binding.excess_a,
            excess_b: quote.binding.excess_b,
            shares: quote.shares,
            slippage_pct: quote.slippage_pct,
        };
        self.settle(order).await
    }

    /// Submit an already validated order. Also the retry path after
    /// [`AppError::SettlementUnavailable`].
    ///
    /// The submission runs on its own task: once issued it is never cancelled,
    /// even when `settlement_timeout` expires first. A reference that arrives
    /// after the timeout is logged under `[SETTLE]`.
    pub async fn settle(&self, order: SettlementOrder) -> Result<DepositResult> {
        let timeout = self.config.settlement_timeout;
        let gateway = self.settlement.clone();
        let submission = order.clone();
        let mut handle =
            tokio::spawn(async move { gateway.submit_settlement(submission).await });

        let reason = match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(Ok(reference))) => {
                info!(
                    requester = %order.requester,
                    deployed_a = %order.deployed_a,
                    deployed_b = %order.deployed_b,
                    shares = %order.shares,
                    reference = %reference,
                    "[DEPOSIT] settled"
                );
                return Ok(order.into_result(reference));
            }
            Ok(Ok(Err(e))) => e.to_string(),
            Ok(Err(e)) => format!("settlement task failed: {e}"),
            Err(_) => {
                tokio::spawn(report_late_settlement(order.requester.clone(), handle));
                format!(
                    "timed out after {} ms, submission still in flight",
                    timeout.as_millis()
                )
            }
        };

        warn!(requester = %order.requester, reason = %reason, "[SETTLE] settlement failed");
        Err(AppError::SettlementUnavailable {
            reason,
            order: Box::new(order),
        })
    }

    /// Mode a requester's deposit form should start in.
    pub async fn default_mode_for(&self, address: &str) -> Result<DepositMode> {
        let balances = self.fetch_balances(address).await?;
        Ok(select_default_mode(&balances))
    }

    async fn quote_at(&self, request: &DepositRequest, ratio: ExchangeRatio) -> Result<DepositQuote> {
        let slippage_pct = self.effective_slippage(request)?;
        let balances = self.fetch_balances(&request.requester).await?;
        let binding = bind(
            &request.token_a,
            &request.token_b,
            request.mode,
            &ratio,
            &balances,
            &self.config.binding,
        )?;
        let shares = if binding.is_valid {
            issued_shares(
                &binding.bound_a,
                &binding.bound_b,
                &ratio,
                &self.config.reference_price,
            )?
        } else {
            BigDecimal::zero()
        };
        Ok(DepositQuote {
            ratio,
            binding,
            shares,
            slippage_pct,
        })
    }

    async fn fetch_balances(&self, address: &str) -> Result<Balances> {
        self.balances
            .fetch_balances(address)
            .await
            .map_err(|e| match e {
                AppError::BalanceUnavailable(_) => e,
                other => AppError::BalanceUnavailable(other.to_string()),
            })
    }

    fn effective_slippage(&self, request: &DepositRequest) -> Result<Option<BigDecimal>> {
        if let Some(pct) = &request.slippage_pct {
            if pct.is_negative() || *pct > self.config.max_slippage_pct {
                return Err(AppError::InvalidInput(format!(
                    "slippage {pct}% outside [0, {}]%",
                    self.config.max_slippage_pct
                )));
            }
        }
        Ok(match request.mode {
            DepositMode::Single => Some(
                request
                    .slippage_pct
                    .clone()
                    .unwrap_or_else(|| self.config.default_slippage_pct.clone()),
            ),
            DepositMode::Dual => None,
        })
    }
}

async fn report_late_settlement(
    requester: String,
    handle: JoinHandle<Result<SettlementReference>>,
) {
    match handle.await {
        Ok(Ok(reference)) => {
            info!(requester = %requester, reference = %reference, "[SETTLE] settled after timeout")
        }
        Ok(Err(e)) => {
            warn!(requester = %requester, error = %e, "[SETTLE] late settlement failed")
        }
        Err(e) => warn!(requester = %requester, error = %e, "[SETTLE] settlement task failed"),
    }
}
