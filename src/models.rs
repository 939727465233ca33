//! Shared data structures used throughout the deposit pipeline.

use crate::errors::{AppError, Result};
use bigdecimal::BigDecimal;
use num_traits::{Signed, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// One of the two pool tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => f.write_str("token A"),
            Side::B => f.write_str("token B"),
        }
    }
}

/// How a deposit supplies liquidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositMode {
    /// Both tokens bound jointly against the pool ratio.
    Dual,
    /// Only one token supplied, the other is implicitly zero.
    Single,
}

/// "`numerator` units of token A per `denominator` units of token B".
///
/// Never mutated after construction; a refresh replaces the whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRatio {
    numerator: BigDecimal,
    denominator: BigDecimal,
    last_updated: SystemTime,
}

impl ExchangeRatio {
    pub fn new(numerator: BigDecimal, denominator: BigDecimal) -> Result<Self> {
        Self::with_timestamp(numerator, denominator, SystemTime::now())
    }

    pub fn with_timestamp(
        numerator: BigDecimal,
        denominator: BigDecimal,
        last_updated: SystemTime,
    ) -> Result<Self> {
        let ratio = Self {
            numerator,
            denominator,
            last_updated,
        };
        ratio.validate()?;
        Ok(ratio)
    }

    /// Re-checks the positivity invariant. Values built through `new` always
    /// pass; deserialized ones might not.
    pub fn validate(&self) -> Result<()> {
        if !self.numerator.is_positive() || !self.denominator.is_positive() {
            return Err(AppError::InvalidInput(format!(
                "ratio components must be positive, got {}:{}",
                self.numerator, self.denominator
            )));
        }
        Ok(())
    }

    pub fn numerator(&self) -> &BigDecimal {
        &self.numerator
    }

    pub fn denominator(&self) -> &BigDecimal {
        &self.denominator
    }

    pub fn last_updated(&self) -> SystemTime {
        self.last_updated
    }

    /// Units of token A per single unit of token B.
    pub fn a_per_b(&self) -> BigDecimal {
        &self.numerator / &self.denominator
    }
}

impl fmt::Display for ExchangeRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.numerator, self.denominator)
    }
}

/// Read-only snapshot of a requester's holdings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    pub token_a: BigDecimal,
    pub token_b: BigDecimal,
}

impl Balances {
    pub fn new(token_a: BigDecimal, token_b: BigDecimal) -> Result<Self> {
        if token_a.is_negative() || token_b.is_negative() {
            return Err(AppError::InvalidInput(format!(
                "balances must be non-negative, got {token_a} / {token_b}"
            )));
        }
        Ok(Self { token_a, token_b })
    }

    pub fn get(&self, side: Side) -> &BigDecimal {
        match side {
            Side::A => &self.token_a,
            Side::B => &self.token_b,
        }
    }
}

/// Inbound deposit as handed over by the request layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositRequest {
    /// Opaque requester identity (wallet address).
    pub requester: String,
    pub token_a: BigDecimal,
    pub token_b: BigDecimal,
    pub mode: DepositMode,
    /// Slippage tolerance in percent, single mode only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slippage_pct: Option<BigDecimal>,
}

impl DepositRequest {
    pub fn dual(requester: impl Into<String>, token_a: BigDecimal, token_b: BigDecimal) -> Self {
        Self {
            requester: requester.into(),
            token_a,
            token_b,
            mode: DepositMode::Dual,
            slippage_pct: None,
        }
    }

    pub fn single(requester: impl Into<String>, side: Side, amount: BigDecimal) -> Self {
        let (token_a, token_b) = match side {
            Side::A => (amount, BigDecimal::zero()),
            Side::B => (BigDecimal::zero(), amount),
        };
        Self {
            requester: requester.into(),
            token_a,
            token_b,
            mode: DepositMode::Single,
            slippage_pct: None,
        }
    }

    pub fn with_slippage(mut self, slippage_pct: BigDecimal) -> Self {
        self.slippage_pct = Some(slippage_pct);
        self
    }
}

/// Opaque reference handed back by the settlement collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettlementReference(pub String);

impl fmt::Display for SettlementReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of an accepted and settled deposit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositResult {
    pub deployed_a: BigDecimal,
    pub deployed_b: BigDecimal,
    pub excess_a: BigDecimal,
    pub excess_b: BigDecimal,
    pub shares_issued: BigDecimal,
    pub settlement: SettlementReference,
}
