//! Pure rule evaluation for challenge outcomes.
//!
//! No I/O, no clock access, no randomness. Rules run in strict priority
//! order and the first firing rule wins:
//! 1. Max daily drawdown (failure)
//! 2. Max total drawdown (failure)
//! 3. Profit target (success)

use crate::domain::challenge::model::{Challenge, ChallengeStatus, FailureReason};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Rule that triggered a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RuleReason {
    MaxDailyDrawdown,
    MaxTotalDrawdown,
    ProfitTarget,
}

impl fmt::Display for RuleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleReason::MaxDailyDrawdown => write!(f, "MAX_DAILY_DRAWDOWN"),
            RuleReason::MaxTotalDrawdown => write!(f, "MAX_TOTAL_DRAWDOWN"),
            RuleReason::ProfitTarget => write!(f, "PROFIT_TARGET"),
        }
    }
}

impl From<RuleReason> for Option<FailureReason> {
    fn from(reason: RuleReason) -> Self {
        match reason {
            RuleReason::MaxDailyDrawdown => Some(FailureReason::MaxDailyDrawdown),
            RuleReason::MaxTotalDrawdown => Some(FailureReason::MaxTotalDrawdown),
            RuleReason::ProfitTarget => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleEvaluationResult {
    pub new_status: ChallengeStatus,
    pub reason: Option<RuleReason>,
}

impl RuleEvaluationResult {
    fn keep(status: ChallengeStatus) -> Self {
        Self {
            new_status: status,
            reason: None,
        }
    }
}

/// Snapshot of the challenge fields the rules read.
#[derive(Debug, Clone, Copy)]
pub struct RuleInputs {
    pub status: ChallengeStatus,
    pub current_equity: Decimal,
    pub max_equity_ever: Decimal,
    pub daily_start_equity: Decimal,
    pub initial_balance: Decimal,
    pub max_daily_drawdown_percent: Decimal,
    pub max_total_drawdown_percent: Decimal,
    pub profit_target_percent: Decimal,
}

impl From<&Challenge> for RuleInputs {
    fn from(challenge: &Challenge) -> Self {
        Self {
            status: challenge.status,
            current_equity: challenge.current_equity,
            max_equity_ever: challenge.max_equity_ever,
            daily_start_equity: challenge.daily_start_equity,
            initial_balance: challenge.initial_balance,
            max_daily_drawdown_percent: challenge.max_daily_drawdown_percent,
            max_total_drawdown_percent: challenge.max_total_drawdown_percent,
            profit_target_percent: challenge.profit_target_percent,
        }
    }
}

/// Evaluate all challenge rules against the given snapshot.
///
/// Only ACTIVE challenges are evaluated; any other status is returned
/// unchanged. Drawdown rules use strict `>`, the profit rule uses `>=`,
/// and any rule whose denominator is not positive does not fire.
pub fn evaluate(inputs: &RuleInputs) -> RuleEvaluationResult {
    if inputs.status != ChallengeStatus::Active {
        return RuleEvaluationResult::keep(inputs.status);
    }

    let daily_dd = daily_drawdown_percent(inputs.current_equity, inputs.daily_start_equity);
    if daily_dd > inputs.max_daily_drawdown_percent {
        return RuleEvaluationResult {
            new_status: ChallengeStatus::Failed,
            reason: Some(RuleReason::MaxDailyDrawdown),
        };
    }

    let total_dd = total_drawdown_percent(inputs.current_equity, inputs.max_equity_ever);
    if total_dd > inputs.max_total_drawdown_percent {
        return RuleEvaluationResult {
            new_status: ChallengeStatus::Failed,
            reason: Some(RuleReason::MaxTotalDrawdown),
        };
    }

    if inputs.initial_balance > Decimal::ZERO {
        let profit = profit_percent(inputs.current_equity, inputs.initial_balance);
        if profit > Decimal::ZERO && profit >= inputs.profit_target_percent {
            return RuleEvaluationResult {
                new_status: ChallengeStatus::Funded,
                reason: Some(RuleReason::ProfitTarget),
            };
        }
    }

    RuleEvaluationResult::keep(ChallengeStatus::Active)
}

/// Daily drawdown in percent of the daily start equity. Zero when equity is
/// at or above the daily start, or when the baseline is not positive.
pub fn daily_drawdown_percent(current_equity: Decimal, daily_start_equity: Decimal) -> Decimal {
    loss_percent(current_equity, daily_start_equity)
}

/// Total drawdown in percent of the all-time equity peak.
pub fn total_drawdown_percent(current_equity: Decimal, max_equity_ever: Decimal) -> Decimal {
    loss_percent(current_equity, max_equity_ever)
}

/// Profit in percent of the initial balance. Zero when under water.
pub fn profit_percent(current_equity: Decimal, initial_balance: Decimal) -> Decimal {
    if initial_balance <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let profit = current_equity - initial_balance;
    if profit <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    profit / initial_balance * Decimal::ONE_HUNDRED
}

fn loss_percent(current_equity: Decimal, reference: Decimal) -> Decimal {
    if reference <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let loss = reference - current_equity;
    if loss <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    loss / reference * Decimal::ONE_HUNDRED
}
