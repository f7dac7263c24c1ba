//! Hot-path trade processing.
//!
//! One call handles one `TradeExecuted` event against one challenge, inside
//! the caller's transaction: load under the write lock, validate against the
//! state machine, apply the daily reset and the equity update, evaluate the
//! rules, apply the resulting transition, save, and emit domain events.
//! `EquityUpdated` is always emitted after equity is fully consistent and
//! before any `ChallengeStatusChanged`.

use crate::domain::challenge::model::{Challenge, ChallengeStatus};
use crate::domain::challenge::rules::{self, RuleEvaluationResult, RuleInputs};
use crate::domain::errors::ChallengeError;
use crate::domain::events::{
    AlertSeverity, ChallengeStatusChanged, DomainEvent, EquityUpdated, RiskAlert, TradeExecuted,
    topics,
};
use crate::domain::repositories::ChallengeRepository;
use crate::infrastructure::event_bus::EventBus;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::SqliteConnection;
use std::sync::Arc;
use tracing::info;

/// Fraction of a drawdown limit at which an advisory alert fires.
const APPROACH_ALERT_FRACTION: Decimal = dec!(0.8);

pub struct ChallengeEngine {
    challenges: Arc<dyn ChallengeRepository>,
    bus: EventBus,
}

impl ChallengeEngine {
    pub fn new(challenges: Arc<dyn ChallengeRepository>, bus: EventBus) -> Self {
        Self { challenges, bus }
    }

    /// Process one trade execution. All storage access runs on `tx`; the
    /// caller owns commit and rollback.
    pub async fn handle_trade_executed(
        &self,
        event: &TradeExecuted,
        tx: &mut SqliteConnection,
    ) -> Result<(), ChallengeError> {
        // The transport layer validates inbound payloads; these only guard
        // against programming errors in callers.
        debug_assert!(event.quantity > Decimal::ZERO, "quantity must be positive");
        debug_assert!(event.price > Decimal::ZERO, "price must be positive");

        let mut challenge = self
            .challenges
            .load_for_update(tx, event.challenge_id)
            .await?
            .ok_or(ChallengeError::NotFound(event.challenge_id))?;

        let entry_status = challenge.status;
        let loaded_version = challenge.version;

        validate_trade_allowed(&mut challenge, event)?;
        apply_daily_reset(&mut challenge, event.executed_at);

        let equity_update = apply_trade(&mut challenge, event);
        self.bus.publish(
            topics::EQUITY_UPDATED,
            &DomainEvent::EquityUpdated(equity_update),
        );

        let result = rules::evaluate(&RuleInputs::from(&challenge));
        self.emit_approach_alerts(&challenge);

        if result.new_status != challenge.status {
            apply_status_transition(&mut challenge, &result, event.executed_at)?;
        }

        self.challenges.save(tx, &challenge, loaded_version).await?;

        if challenge.status != entry_status {
            info!(
                challenge_id = %challenge.id,
                from = %entry_status,
                to = %challenge.status,
                reason = ?result.reason,
                "challenge status changed"
            );
            self.bus.publish(
                topics::CHALLENGE_STATUS_CHANGED,
                &DomainEvent::ChallengeStatusChanged(ChallengeStatusChanged {
                    challenge_id: challenge.id,
                    user_id: challenge.user_id,
                    old_status: entry_status,
                    new_status: challenge.status,
                    reason: result.reason,
                    changed_at: event.executed_at,
                }),
            );
        }

        Ok(())
    }

    /// Advisory alerts when a drawdown reaches 80% of its limit. Not part
    /// of the outcome decision.
    fn emit_approach_alerts(&self, challenge: &Challenge) {
        let daily = rules::daily_drawdown_percent(
            challenge.current_equity,
            challenge.daily_start_equity,
        );
        if daily >= challenge.max_daily_drawdown_percent * APPROACH_ALERT_FRACTION {
            self.publish_drawdown_alert(
                challenge,
                "HIGH_DAILY_DRAWDOWN",
                AlertSeverity::Medium,
                "High Daily Drawdown Warning",
                "Daily drawdown",
                daily,
                challenge.max_daily_drawdown_percent,
                serde_json::json!({
                    "current_equity": challenge.current_equity,
                    "daily_start_equity": challenge.daily_start_equity,
                }),
            );
        }

        let total =
            rules::total_drawdown_percent(challenge.current_equity, challenge.max_equity_ever);
        if total >= challenge.max_total_drawdown_percent * APPROACH_ALERT_FRACTION {
            self.publish_drawdown_alert(
                challenge,
                "HIGH_TOTAL_DRAWDOWN",
                AlertSeverity::High,
                "High Total Drawdown Warning",
                "Total drawdown",
                total,
                challenge.max_total_drawdown_percent,
                serde_json::json!({
                    "current_equity": challenge.current_equity,
                    "max_equity_ever": challenge.max_equity_ever,
                }),
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn publish_drawdown_alert(
        &self,
        challenge: &Challenge,
        alert_type: &str,
        severity: AlertSeverity,
        title: &str,
        metric: &str,
        drawdown_percent: Decimal,
        limit_percent: Decimal,
        mut context: serde_json::Value,
    ) {
        if let Some(object) = context.as_object_mut() {
            object.insert(
                "drawdown_percentage".to_string(),
                serde_json::json!(drawdown_percent),
            );
            object.insert(
                "threshold_percentage".to_string(),
                serde_json::json!(limit_percent),
            );
            object.insert(
                "alert_timestamp".to_string(),
                serde_json::json!(challenge.last_trade_at),
            );
        }

        self.bus.publish(
            topics::RISK_ALERT,
            &DomainEvent::RiskAlert(RiskAlert {
                challenge_id: challenge.id,
                user_id: challenge.user_id,
                alert_type: alert_type.to_string(),
                severity,
                title: title.to_string(),
                message: format!(
                    "{} at {}% (limit: {}%)",
                    metric,
                    drawdown_percent.round_dp(1),
                    limit_percent.round_dp(1),
                ),
                context,
            }),
        );
    }
}

/// Step 2: reject trades on terminal challenges; activate PENDING ones.
fn validate_trade_allowed(
    challenge: &mut Challenge,
    event: &TradeExecuted,
) -> Result<(), ChallengeError> {
    match challenge.status {
        ChallengeStatus::Failed | ChallengeStatus::Funded => Err(ChallengeError::TradeRejected {
            challenge_id: challenge.id,
            status: challenge.status,
        }),
        ChallengeStatus::Pending => {
            // First accepted trade activates the challenge.
            challenge.status = ChallengeStatus::Active;
            challenge.started_at = Some(event.executed_at);
            Ok(())
        }
        ChallengeStatus::Active => Ok(()),
    }
}

/// Step 3: re-baseline daily tracking at the first trade of a new UTC day.
/// The baseline is the equity before this trade's PnL is applied.
fn apply_daily_reset(challenge: &mut Challenge, executed_at: DateTime<Utc>) {
    let trade_date = executed_at.date_naive();
    if trade_date != challenge.current_date {
        challenge.current_date = trade_date;
        challenge.daily_start_equity = challenge.current_equity;
        challenge.daily_max_equity = challenge.current_equity;
        challenge.daily_min_equity = challenge.current_equity;
    }
}

/// Step 4: apply the trade's PnL. Equity is floored at zero and the
/// all-time maximum never decreases.
fn apply_trade(challenge: &mut Challenge, event: &TradeExecuted) -> EquityUpdated {
    let previous_equity = challenge.current_equity;

    let new_equity = (challenge.current_equity + event.realized_pnl).max(Decimal::ZERO);
    challenge.current_equity = new_equity;

    challenge.max_equity_ever = challenge.max_equity_ever.max(new_equity);
    challenge.daily_max_equity = challenge.daily_max_equity.max(new_equity);
    challenge.daily_min_equity = challenge.daily_min_equity.min(new_equity);

    challenge.total_trades += 1;
    challenge.total_pnl += event.realized_pnl;
    challenge.last_trade_at = Some(event.executed_at);

    EquityUpdated {
        challenge_id: challenge.id,
        user_id: challenge.user_id,
        previous_equity,
        current_equity: challenge.current_equity,
        max_equity_ever: challenge.max_equity_ever,
        daily_start_equity: challenge.daily_start_equity,
        daily_max_equity: challenge.daily_max_equity,
        daily_min_equity: challenge.daily_min_equity,
        total_pnl: challenge.total_pnl,
        total_trades: challenge.total_trades,
        trade_pnl: event.realized_pnl,
        trade_symbol: event.symbol.clone(),
        executed_at: event.executed_at,
    }
}

/// Step 6: apply a rule-driven transition after checking it against the
/// state machine. An illegal transition is a programming error and aborts
/// the transaction.
fn apply_status_transition(
    challenge: &mut Challenge,
    result: &RuleEvaluationResult,
    executed_at: DateTime<Utc>,
) -> Result<(), ChallengeError> {
    validate_status_transition(challenge.status, result.new_status)?;

    challenge.status = result.new_status;

    if result.new_status.is_terminal() {
        challenge.ended_at = Some(executed_at);
        if result.new_status == ChallengeStatus::Funded {
            challenge.funded_at = Some(executed_at);
        }
    }
    if result.new_status == ChallengeStatus::Failed {
        challenge.failure_reason = result.reason.and_then(Into::into);
    }

    challenge.version += 1;
    Ok(())
}

fn validate_status_transition(
    from: ChallengeStatus,
    to: ChallengeStatus,
) -> Result<(), ChallengeError> {
    let allowed = match from {
        ChallengeStatus::Pending => to == ChallengeStatus::Active,
        ChallengeStatus::Active => {
            to == ChallengeStatus::Failed || to == ChallengeStatus::Funded
        }
        // Terminal states never transition.
        ChallengeStatus::Failed | ChallengeStatus::Funded => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(ChallengeError::InvalidStateTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::challenge::model::FailureReason;
    use crate::domain::challenge::rules::RuleReason;
    use crate::domain::events::OrderSide;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn active_challenge() -> Challenge {
        let mut challenge = Challenge::new(
            Uuid::new_v4(),
            "evaluation",
            dec!(10000),
            dec!(5),
            dec!(10),
            dec!(10),
            Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
        )
        .unwrap();
        challenge.status = ChallengeStatus::Active;
        challenge
    }

    fn trade(pnl: Decimal, executed_at: DateTime<Utc>) -> TradeExecuted {
        TradeExecuted {
            challenge_id: Uuid::new_v4(),
            trade_id: "ext-1".to_string(),
            symbol: "EURUSD".to_string(),
            side: OrderSide::Buy,
            quantity: dec!(1),
            price: dec!(100),
            realized_pnl: pnl,
            executed_at,
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_daily_reset_rebaselines_before_pnl() {
        let mut challenge = active_challenge();
        challenge.current_equity = dec!(10100);
        challenge.daily_start_equity = dec!(10000);
        challenge.daily_max_equity = dec!(10100);
        challenge.daily_min_equity = dec!(9900);

        apply_daily_reset(&mut challenge, at(2, 0));

        assert_eq!(challenge.current_date, at(2, 0).date_naive());
        assert_eq!(challenge.daily_start_equity, dec!(10100));
        assert_eq!(challenge.daily_max_equity, dec!(10100));
        assert_eq!(challenge.daily_min_equity, dec!(10100));
    }

    #[test]
    fn test_same_day_trade_does_not_reset() {
        let mut challenge = active_challenge();
        challenge.daily_min_equity = dec!(9900);
        apply_daily_reset(&mut challenge, at(1, 12));
        assert_eq!(challenge.daily_min_equity, dec!(9900));
    }

    #[test]
    fn test_apply_trade_floors_equity_at_zero() {
        let mut challenge = active_challenge();
        let update = apply_trade(&mut challenge, &trade(dec!(-1000000), at(1, 12)));

        assert_eq!(challenge.current_equity, dec!(0));
        assert_eq!(challenge.daily_min_equity, dec!(0));
        assert_eq!(challenge.max_equity_ever, dec!(10000));
        assert_eq!(update.previous_equity, dec!(10000));
        assert_eq!(update.current_equity, dec!(0));
        // total_pnl records the full loss even though equity floored.
        assert_eq!(challenge.total_pnl, dec!(-1000000));
    }

    #[test]
    fn test_apply_trade_tracks_peaks() {
        let mut challenge = active_challenge();
        apply_trade(&mut challenge, &trade(dec!(300), at(1, 12)));
        apply_trade(&mut challenge, &trade(dec!(-100), at(1, 12)));

        assert_eq!(challenge.current_equity, dec!(10200));
        assert_eq!(challenge.max_equity_ever, dec!(10300));
        assert_eq!(challenge.daily_max_equity, dec!(10300));
        assert_eq!(challenge.daily_min_equity, dec!(10000));
        assert_eq!(challenge.total_trades, 2);
    }

    #[test]
    fn test_terminal_transition_sets_lifecycle_fields() {
        let mut challenge = active_challenge();
        let result = RuleEvaluationResult {
            new_status: ChallengeStatus::Failed,
            reason: Some(RuleReason::MaxDailyDrawdown),
        };
        apply_status_transition(&mut challenge, &result, at(1, 12)).unwrap();

        assert_eq!(challenge.status, ChallengeStatus::Failed);
        assert_eq!(challenge.ended_at, Some(at(1, 12)));
        assert_eq!(challenge.failure_reason, Some(FailureReason::MaxDailyDrawdown));
        assert_eq!(challenge.funded_at, None);
        assert_eq!(challenge.version, 2);
    }

    #[test]
    fn test_funded_transition_sets_funded_at() {
        let mut challenge = active_challenge();
        let result = RuleEvaluationResult {
            new_status: ChallengeStatus::Funded,
            reason: Some(RuleReason::ProfitTarget),
        };
        apply_status_transition(&mut challenge, &result, at(1, 14)).unwrap();

        assert_eq!(challenge.status, ChallengeStatus::Funded);
        assert_eq!(challenge.funded_at, Some(at(1, 14)));
        assert_eq!(challenge.ended_at, Some(at(1, 14)));
        assert_eq!(challenge.failure_reason, None);
    }

    #[test]
    fn test_transition_table() {
        use ChallengeStatus::*;
        let legal = [(Pending, Active), (Active, Failed), (Active, Funded)];
        for (from, to) in legal {
            validate_status_transition(from, to).unwrap();
        }

        let illegal = [
            (Pending, Failed),
            (Pending, Funded),
            (Active, Pending),
            (Failed, Active),
            (Failed, Funded),
            (Funded, Active),
            (Funded, Failed),
        ];
        for (from, to) in illegal {
            assert!(
                matches!(
                    validate_status_transition(from, to),
                    Err(ChallengeError::InvalidStateTransition { .. })
                ),
                "{:?} -> {:?} should be illegal",
                from,
                to
            );
        }
    }

    #[test]
    fn test_rejects_trades_on_terminal_challenges() {
        for status in [ChallengeStatus::Failed, ChallengeStatus::Funded] {
            let mut challenge = active_challenge();
            challenge.status = status;
            let err = validate_trade_allowed(&mut challenge, &trade(dec!(10), at(1, 12)))
                .unwrap_err();
            assert!(matches!(err, ChallengeError::TradeRejected { .. }));
            assert_eq!(challenge.status, status);
        }
    }

    #[test]
    fn test_first_trade_activates_pending_challenge() {
        let mut challenge = active_challenge();
        challenge.status = ChallengeStatus::Pending;
        validate_trade_allowed(&mut challenge, &trade(dec!(10), at(1, 10))).unwrap();
        assert_eq!(challenge.status, ChallengeStatus::Active);
        assert_eq!(challenge.started_at, Some(at(1, 10)));
    }
}
