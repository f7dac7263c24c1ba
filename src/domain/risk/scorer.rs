//! Weighted heuristic risk scoring.
//!
//! Score = volatility x 0.30 + drawdown x 0.25 + behavior x 0.20
//!       + loss streak x 0.15 + overtrading x 0.10,
//! each component normalized to 0-100. Fully deterministic for a given
//! feature set; extreme inputs are clamped, never rejected.

use crate::domain::risk::features::FeatureSet;
use crate::domain::risk::thresholds::RiskLevel;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;

const WEIGHT_VOLATILITY: Decimal = dec!(0.30);
const WEIGHT_DRAWDOWN: Decimal = dec!(0.25);
const WEIGHT_BEHAVIOR: Decimal = dec!(0.20);
const WEIGHT_LOSS_STREAK: Decimal = dec!(0.15);
const WEIGHT_OVERTRADING: Decimal = dec!(0.10);

/// One scored component, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreComponent {
    pub raw_score: Decimal,
    pub weight: Decimal,
    pub contribution: Decimal,
    pub explanation: &'static str,
}

impl ScoreComponent {
    fn new(raw_score: Decimal, weight: Decimal, explanation: &'static str) -> Self {
        Self {
            raw_score,
            weight,
            contribution: raw_score * weight,
            explanation,
        }
    }
}

/// Per-component breakdown of a risk score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub volatility: ScoreComponent,
    pub drawdown: ScoreComponent,
    pub behavior: ScoreComponent,
    pub loss_streak: ScoreComponent,
    pub overtrading: ScoreComponent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskScore {
    /// 0-100, two fractional digits.
    pub score: Decimal,
    pub level: RiskLevel,
    pub breakdown: ScoreBreakdown,
    pub computed_at: DateTime<Utc>,
}

impl RiskScore {
    /// Human-readable rendering for audit reports.
    pub fn explain(&self) -> String {
        let mut out = format!("Risk score: {}/100 ({})\n", self.score, self.level);
        for (name, component) in [
            ("Volatility", &self.breakdown.volatility),
            ("Drawdown", &self.breakdown.drawdown),
            ("Behavior", &self.breakdown.behavior),
            ("Loss streak", &self.breakdown.loss_streak),
            ("Overtrading", &self.breakdown.overtrading),
        ] {
            out.push_str(&format!(
                "- {} ({}%): {} points ({})\n",
                name,
                component.weight * Decimal::ONE_HUNDRED,
                component.contribution,
                component.explanation
            ));
        }
        out
    }
}

pub struct RiskScorer;

impl RiskScorer {
    /// Score a feature set. `computed_at` is recorded verbatim so repeated
    /// runs over the same features are bitwise identical.
    pub fn compute(features: &FeatureSet, computed_at: DateTime<Utc>) -> RiskScore {
        let breakdown = ScoreBreakdown {
            volatility: ScoreComponent::new(
                volatility_score(features),
                WEIGHT_VOLATILITY,
                "Return consistency and predictability",
            ),
            drawdown: ScoreComponent::new(
                drawdown_score(features),
                WEIGHT_DRAWDOWN,
                "Risk-taking patterns and loss tolerance",
            ),
            behavior: ScoreComponent::new(
                behavior_score(features),
                WEIGHT_BEHAVIOR,
                "Trading frequency and market participation",
            ),
            loss_streak: ScoreComponent::new(
                loss_streak_score(features),
                WEIGHT_LOSS_STREAK,
                "Current losing momentum and streak risk",
            ),
            overtrading: ScoreComponent::new(
                features.overtrading_score,
                WEIGHT_OVERTRADING,
                "Excessive trading relative to profitability",
            ),
        };

        let total = breakdown.volatility.contribution
            + breakdown.drawdown.contribution
            + breakdown.behavior.contribution
            + breakdown.loss_streak.contribution
            + breakdown.overtrading.contribution;

        let score = clamp_0_100(total)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        RiskScore {
            score,
            level: RiskLevel::for_score(score),
            breakdown,
            computed_at,
        }
    }
}

/// Ratio of PnL stdev to |mean PnL|, capped at 5 and mapped onto 0-100.
/// Neutral 50 below two trades; a zero mean counts as infinite ratio.
fn volatility_score(features: &FeatureSet) -> Decimal {
    if features.total_trades < 2 {
        return dec!(50);
    }

    let ratio = if features.avg_trade_pnl == Decimal::ZERO {
        dec!(5)
    } else {
        (features.pnl_volatility / features.avg_trade_pnl.abs()).min(dec!(5))
    };

    clamp_0_100(ratio / dec!(5) * Decimal::ONE_HUNDRED)
}

/// 70% weight on max intraday drawdown (doubled, capped), 30% on drawdown
/// speed (x10, capped).
fn drawdown_score(features: &FeatureSet) -> Decimal {
    let depth = (features.max_intraday_drawdown * dec!(2)).min(Decimal::ONE_HUNDRED);
    let speed = (features.drawdown_speed * dec!(10)).min(Decimal::ONE_HUNDRED);
    clamp_0_100(depth * dec!(0.7) + speed * dec!(0.3))
}

/// Piecewise score over trading frequency; 1-5 trades per hour is the
/// baseline band.
fn behavior_score(features: &FeatureSet) -> Decimal {
    let tph = features.trades_per_hour;
    if tph < Decimal::ONE {
        dec!(30)
    } else if tph <= dec!(5) {
        dec!(10)
    } else if tph <= dec!(10) {
        dec!(40)
    } else {
        dec!(80)
    }
}

fn loss_streak_score(features: &FeatureSet) -> Decimal {
    match features.loss_streak {
        0 => dec!(0),
        1 => dec!(20),
        2 => dec!(40),
        3 => dec!(65),
        4..=5 => dec!(80),
        _ => dec!(100),
    }
}

fn clamp_0_100(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO).min(Decimal::ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn features() -> FeatureSet {
        FeatureSet {
            avg_trade_pnl: dec!(25),
            pnl_volatility: dec!(75),
            win_rate: dec!(50),
            profit_factor: dec!(2),
            max_intraday_drawdown: dec!(5),
            drawdown_speed: dec!(2),
            loss_streak: 0,
            trades_per_hour: dec!(2),
            overtrading_score: dec!(10),
            revenge_trading_score: dec!(0),
            total_trades: 4,
            analysis_period_hours: dec!(2),
            computed_at: now(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_score_composition() {
        let score = RiskScorer::compute(&features(), now());

        // volatility: ratio 3 -> 60; drawdown: 0.7*10 + 0.3*20 = 13;
        // behavior: 10; streak: 0; overtrading: 10.
        assert_eq!(score.breakdown.volatility.raw_score, dec!(60));
        assert_eq!(score.breakdown.drawdown.raw_score, dec!(13));
        assert_eq!(score.breakdown.behavior.raw_score, dec!(10));
        assert_eq!(score.breakdown.loss_streak.raw_score, dec!(0));
        assert_eq!(score.breakdown.overtrading.raw_score, dec!(10));

        // 18 + 3.25 + 2 + 0 + 1 = 24.25
        assert_eq!(score.score, dec!(24.25));
        assert_eq!(score.level, RiskLevel::Stable);
    }

    #[test]
    fn test_volatility_neutral_below_two_trades() {
        let mut f = features();
        f.total_trades = 1;
        let score = RiskScorer::compute(&f, now());
        assert_eq!(score.breakdown.volatility.raw_score, dec!(50));
    }

    #[test]
    fn test_volatility_infinite_ratio_maxes_out() {
        let mut f = features();
        f.avg_trade_pnl = dec!(0);
        f.pnl_volatility = dec!(30);
        let score = RiskScorer::compute(&f, now());
        assert_eq!(score.breakdown.volatility.raw_score, dec!(100));
    }

    #[test]
    fn test_behavior_bands() {
        let mut f = features();
        for (tph, expected) in [
            (dec!(0.5), dec!(30)),
            (dec!(1), dec!(10)),
            (dec!(5), dec!(10)),
            (dec!(7), dec!(40)),
            (dec!(10), dec!(40)),
            (dec!(11), dec!(80)),
        ] {
            f.trades_per_hour = tph;
            let score = RiskScorer::compute(&f, now());
            assert_eq!(score.breakdown.behavior.raw_score, expected, "tph={}", tph);
        }
    }

    #[test]
    fn test_loss_streak_bands() {
        let mut f = features();
        for (streak, expected) in [
            (0, dec!(0)),
            (1, dec!(20)),
            (2, dec!(40)),
            (3, dec!(65)),
            (4, dec!(80)),
            (5, dec!(80)),
            (6, dec!(100)),
            (12, dec!(100)),
        ] {
            f.loss_streak = streak;
            let score = RiskScorer::compute(&f, now());
            assert_eq!(
                score.breakdown.loss_streak.raw_score,
                expected,
                "streak={}",
                streak
            );
        }
    }

    #[test]
    fn test_score_is_bounded_and_deterministic() {
        let mut f = features();
        f.max_intraday_drawdown = dec!(500);
        f.drawdown_speed = dec!(500);
        f.loss_streak = 50;
        f.trades_per_hour = dec!(100);
        f.overtrading_score = dec!(100);
        f.pnl_volatility = dec!(100000);
        f.avg_trade_pnl = dec!(0.01);

        let first = RiskScorer::compute(&f, now());
        let second = RiskScorer::compute(&f, now());
        assert_eq!(first, second);
        assert!(first.score <= dec!(100));
        assert!(first.score >= dec!(0));
        assert_eq!(first.level, RiskLevel::Critical);
    }

    #[test]
    fn test_explain_mentions_every_component() {
        let score = RiskScorer::compute(&features(), now());
        let text = score.explain();
        for name in [
            "Volatility",
            "Drawdown",
            "Behavior",
            "Loss streak",
            "Overtrading",
        ] {
            assert!(text.contains(name), "missing {}", name);
        }
    }
}
