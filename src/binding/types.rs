use crate::models::{DepositMode, Side};
use bigdecimal::BigDecimal;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerances applied when judging a binding.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingPolicy {
    /// Bound amounts must deviate from the pool ratio by strictly less than
    /// this many percent.
    pub max_deviation_pct: BigDecimal,
}

impl BindingPolicy {
    pub fn accepts(&self, deviation_pct: &BigDecimal) -> bool {
        *deviation_pct < self.max_deviation_pct
    }
}

impl Default for BindingPolicy {
    fn default() -> Self {
        Self {
            max_deviation_pct: BigDecimal::from(1),
        }
    }
}

/// A single failed constraint of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingIssue {
    /// Both requested amounts were zero.
    NothingToDeposit,
    NonPositiveAmount(Side),
    InsufficientBalance(Side),
    ExcessiveDeviation,
    /// Token B bound to zero while token A did not.
    UnboundedDeviation,
}

impl fmt::Display for BindingIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingIssue::NothingToDeposit => f.write_str("nothing to deposit"),
            BindingIssue::NonPositiveAmount(side) => write!(f, "bound {side} is not positive"),
            BindingIssue::InsufficientBalance(side) => write!(f, "insufficient {side} balance"),
            BindingIssue::ExcessiveDeviation => f.write_str("ratio deviation too high"),
            BindingIssue::UnboundedDeviation => f.write_str("ratio deviation is unbounded"),
        }
    }
}

/// Outcome of binding two requested amounts against the pool ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingResult {
    pub mode: DepositMode,
    /// Token A that the requested token B can match at the ratio.
    pub max_a: BigDecimal,
    /// Token B that the requested token A can match at the ratio.
    pub max_b: BigDecimal,
    pub bound_a: BigDecimal,
    pub bound_b: BigDecimal,
    /// Requested but not deployed; stays idle with the requester.
    pub excess_a: BigDecimal,
    pub excess_b: BigDecimal,
    /// `None` when the deviation is unbounded.
    pub deviation_pct: Option<BigDecimal>,
    pub issues: Vec<BindingIssue>,
    pub is_valid: bool,
}

impl BindingResult {
    pub(crate) fn nothing_to_deposit(mode: DepositMode) -> Self {
        Self {
            mode,
            max_a: BigDecimal::zero(),
            max_b: BigDecimal::zero(),
            bound_a: BigDecimal::zero(),
            bound_b: BigDecimal::zero(),
            excess_a: BigDecimal::zero(),
            excess_b: BigDecimal::zero(),
            deviation_pct: Some(BigDecimal::zero()),
            issues: vec![BindingIssue::NothingToDeposit],
            is_valid: false,
        }
    }

    pub fn bound(&self, side: Side) -> &BigDecimal {
        match side {
            Side::A => &self.bound_a,
            Side::B => &self.bound_b,
        }
    }

    pub fn excess(&self, side: Side) -> &BigDecimal {
        match side {
            Side::A => &self.excess_a,
            Side::B => &self.excess_b,
        }
    }

    pub fn has_issue(&self, issue: BindingIssue) -> bool {
        self.issues.contains(&issue)
    }

    pub fn describe_issues(&self) -> String {
        if self.issues.is_empty() {
            return "none".to_string();
        }
        self.issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
