//! Feature engineering over a challenge's trade history.
//!
//! Pure and deterministic: the caller supplies the observation time, so the
//! same inputs always produce the same feature set. Floats appear only at
//! the statistics boundary and every output is normalized back to `Decimal`
//! with two fractional digits (half-up).

use crate::domain::events::OrderSide;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Assumed account balance used to normalize drawdown features.
///
/// The feature layer is deliberately decoupled from live equity; this is a
/// modeling constant, not the challenge's actual balance.
pub const REFERENCE_BALANCE: Decimal = dec!(10000);

/// One finished trade, as read back from storage by the cold path.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub trade_id: String,
    pub challenge_id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub realized_pnl: Decimal,
    pub executed_at: DateTime<Utc>,
}

impl TradeRecord {
    pub fn is_profit(&self) -> bool {
        self.realized_pnl > Decimal::ZERO
    }

    pub fn is_loss(&self) -> bool {
        self.realized_pnl < Decimal::ZERO
    }

    /// Notional value (quantity x price) for position-sizing comparisons.
    pub fn notional(&self) -> Decimal {
        self.quantity * self.price
    }
}

/// Derived numeric summary of a trade history, input to the scorer.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FeatureSet {
    // Performance
    pub avg_trade_pnl: Decimal,
    /// Population standard deviation of per-trade PnL; zero below two trades.
    pub pnl_volatility: Decimal,
    /// Percentage of profitable trades, 0-100.
    pub win_rate: Decimal,
    /// Gross profit over gross loss; 1 when there are no losing trades.
    pub profit_factor: Decimal,

    // Risk
    pub max_intraday_drawdown: Decimal,
    pub drawdown_speed: Decimal,
    /// Trailing run of consecutive losing trades.
    pub loss_streak: u32,

    // Behavior
    pub trades_per_hour: Decimal,
    pub overtrading_score: Decimal,
    pub revenge_trading_score: Decimal,

    // Metadata
    pub total_trades: u64,
    pub analysis_period_hours: Decimal,
    pub computed_at: DateTime<Utc>,
}

/// Computes [`FeatureSet`]s from chronological trade histories.
#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    reference_balance: Decimal,
}

impl Default for FeatureEngineer {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureEngineer {
    pub fn new() -> Self {
        Self {
            reference_balance: REFERENCE_BALANCE,
        }
    }

    pub fn with_reference_balance(reference_balance: Decimal) -> Self {
        Self { reference_balance }
    }

    /// Compute the full feature set for a trade history.
    ///
    /// `now` is the observation time; the analysis window ends at the later
    /// of the last trade and `now`. An empty history yields the documented
    /// default set.
    pub fn compute(
        &self,
        trades: &[TradeRecord],
        challenge_started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> FeatureSet {
        if trades.is_empty() {
            return self.default_features(now);
        }

        let mut sorted: Vec<&TradeRecord> = trades.iter().collect();
        sorted.sort_by_key(|t| t.executed_at);

        let period_hours = analysis_period_hours(challenge_started_at, &sorted, now);

        let pnls: Vec<f64> = sorted
            .iter()
            .map(|t| t.realized_pnl.to_f64().unwrap_or(0.0))
            .collect();

        let avg_trade_pnl = Statistics::mean(&pnls);
        let pnl_volatility = if pnls.len() > 1 {
            Statistics::population_std_dev(&pnls)
        } else {
            0.0
        };

        let winners = sorted.iter().filter(|t| t.is_profit()).count();
        let win_fraction = winners as f64 / sorted.len() as f64;

        let gross_profit: Decimal = sorted
            .iter()
            .filter(|t| t.is_profit())
            .map(|t| t.realized_pnl)
            .sum();
        let gross_loss: Decimal = sorted
            .iter()
            .filter(|t| t.is_loss())
            .map(|t| t.realized_pnl.abs())
            .sum();
        let profit_factor = if gross_loss > Decimal::ZERO {
            gross_profit / gross_loss
        } else {
            Decimal::ONE
        };

        let trades_per_hour = sorted.len() as f64 / period_hours;
        let overtrading = (trades_per_hour / 10.0).min(1.0) * (1.0 - win_fraction) * 100.0;

        FeatureSet {
            avg_trade_pnl: round2(decimal_from_f64(avg_trade_pnl)),
            pnl_volatility: round2(decimal_from_f64(pnl_volatility)),
            win_rate: round2(decimal_from_f64(win_fraction * 100.0)),
            profit_factor: round2(profit_factor),
            max_intraday_drawdown: self.max_intraday_drawdown(&sorted),
            drawdown_speed: self.drawdown_speed(&sorted),
            loss_streak: loss_streak(&sorted),
            trades_per_hour: round2(decimal_from_f64(trades_per_hour)),
            overtrading_score: round2(decimal_from_f64(overtrading)),
            revenge_trading_score: revenge_trading_score(&sorted),
            total_trades: sorted.len() as u64,
            analysis_period_hours: round2(decimal_from_f64(period_hours)),
            computed_at: now,
        }
    }

    /// Safe defaults for a challenge with no trades yet.
    pub fn default_features(&self, now: DateTime<Utc>) -> FeatureSet {
        FeatureSet {
            avg_trade_pnl: Decimal::ZERO,
            pnl_volatility: Decimal::ZERO,
            win_rate: Decimal::ZERO,
            profit_factor: Decimal::ONE,
            max_intraday_drawdown: Decimal::ZERO,
            drawdown_speed: Decimal::ZERO,
            loss_streak: 0,
            trades_per_hour: Decimal::ZERO,
            overtrading_score: Decimal::ZERO,
            revenge_trading_score: Decimal::ZERO,
            total_trades: 0,
            analysis_period_hours: Decimal::ONE,
            computed_at: now,
        }
    }

    /// Largest single-day equity decline, in percent of that day's first
    /// recorded equity. The running equity is seeded once with the reference
    /// balance and carried across days; days with fewer than two recorded
    /// points are skipped.
    fn max_intraday_drawdown(&self, sorted: &[&TradeRecord]) -> Decimal {
        let mut daily_equity: BTreeMap<NaiveDate, Vec<Decimal>> = BTreeMap::new();
        let mut running = self.reference_balance;

        for trade in sorted {
            running += trade.realized_pnl;
            daily_equity
                .entry(trade.executed_at.date_naive())
                .or_default()
                .push(running);
        }

        let mut max_drawdown = Decimal::ZERO;
        for points in daily_equity.values() {
            if points.len() < 2 {
                continue;
            }
            let day_start = points[0];
            let day_low = points.iter().copied().min().unwrap_or(day_start);
            if day_start > Decimal::ZERO && day_low < day_start {
                let drawdown = (day_start - day_low) / day_start * Decimal::ONE_HUNDRED;
                max_drawdown = max_drawdown.max(drawdown);
            }
        }

        round2(max_drawdown)
    }

    /// Mean absolute loss per losing trade, in percent of the reference
    /// balance. Zero when there are no losing trades.
    fn drawdown_speed(&self, sorted: &[&TradeRecord]) -> Decimal {
        let losses: Vec<Decimal> = sorted
            .iter()
            .filter(|t| t.is_loss())
            .map(|t| t.realized_pnl.abs())
            .collect();
        if losses.is_empty() {
            return Decimal::ZERO;
        }

        let avg_loss = losses.iter().copied().sum::<Decimal>() / Decimal::from(losses.len());
        round2(avg_loss / self.reference_balance * Decimal::ONE_HUNDRED)
    }
}

fn analysis_period_hours(
    challenge_started_at: DateTime<Utc>,
    sorted: &[&TradeRecord],
    now: DateTime<Utc>,
) -> f64 {
    let first = sorted[0].executed_at;
    let last = sorted[sorted.len() - 1].executed_at;

    let start = challenge_started_at.min(first);
    let end = last.max(now);

    let hours = (end - start).num_milliseconds() as f64 / 3_600_000.0;
    hours.max(1.0)
}

fn loss_streak(sorted: &[&TradeRecord]) -> u32 {
    sorted.iter().rev().take_while(|t| t.is_loss()).count() as u32
}

/// Fraction of losses followed by a trade whose notional exceeds the losing
/// trade's by more than 20%, as a 0-100 score. Needs at least three trades.
fn revenge_trading_score(sorted: &[&TradeRecord]) -> Decimal {
    if sorted.len() < 3 {
        return Decimal::ZERO;
    }

    let mut revenge = 0u32;
    let mut sequences = 0u32;

    for pair in sorted.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        if current.is_loss() {
            sequences += 1;
            if next.notional() > current.notional() * dec!(1.2) {
                revenge += 1;
            }
        }
    }

    if sequences == 0 {
        return Decimal::ZERO;
    }

    round2(Decimal::from(revenge) / Decimal::from(sequences) * Decimal::ONE_HUNDRED)
}

fn decimal_from_f64(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
