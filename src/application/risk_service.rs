//! Cold-path risk assessment orchestration: features -> score -> threshold
//! -> action plan. Stateless; storage and scheduling live in the worker.

use crate::domain::events::{AlertSeverity, RiskAlert};
use crate::domain::risk::assessment::RiskAssessment;
use crate::domain::risk::features::{FeatureEngineer, TradeRecord};
use crate::domain::risk::scorer::RiskScorer;
use crate::domain::risk::thresholds::{self, RiskLevel};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Whether a score is high enough to alert on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDecision {
    None,
    Warning,
    Critical,
}

pub struct RiskAssessmentService {
    engineer: FeatureEngineer,
    warning_threshold: Decimal,
    critical_threshold: Decimal,
    assessment_version: String,
}

impl RiskAssessmentService {
    pub fn new(
        warning_threshold: Decimal,
        critical_threshold: Decimal,
        assessment_version: String,
    ) -> Self {
        Self {
            engineer: FeatureEngineer::new(),
            warning_threshold,
            critical_threshold,
            assessment_version,
        }
    }

    /// Assess one challenge from its trade history.
    ///
    /// Total: the scorer clamps extreme inputs instead of failing, so every
    /// call yields an assessment. `now` is the observation time threaded
    /// through for deterministic feature computation.
    pub fn assess_challenge_risk(
        &self,
        challenge_id: Uuid,
        trader_id: Uuid,
        trades: &[TradeRecord],
        challenge_started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RiskAssessment {
        let features = self.engineer.compute(trades, challenge_started_at, now);
        let score = RiskScorer::compute(&features, now);
        let threshold = thresholds::classify(score.score);
        let action_plan = thresholds::generate_action_plan(score.score);

        RiskAssessment {
            id: Uuid::new_v4(),
            challenge_id,
            trader_id,
            score,
            threshold,
            features,
            action_plan,
            assessed_at: now,
            assessment_version: self.assessment_version.clone(),
        }
    }

    /// Map a score to the configured alert bands (critical wins).
    pub fn should_emit_alert(&self, score: Decimal) -> AlertDecision {
        if score >= self.critical_threshold {
            AlertDecision::Critical
        } else if score >= self.warning_threshold {
            AlertDecision::Warning
        } else {
            AlertDecision::None
        }
    }

    /// Build the advisory alert payload for an assessment. Includes the full
    /// breakdown and guidance so risk teams can act without a second lookup.
    pub fn build_alert(&self, assessment: &RiskAssessment, decision: AlertDecision) -> RiskAlert {
        let severity = match decision {
            AlertDecision::Critical => AlertSeverity::Critical,
            _ => AlertSeverity::Warning,
        };

        RiskAlert {
            challenge_id: assessment.challenge_id,
            user_id: assessment.trader_id,
            alert_type: "BEHAVIORAL_RISK".to_string(),
            severity,
            title: "Behavioral risk threshold crossed".to_string(),
            message: format!(
                "Risk score {}/100 ({})",
                assessment.score.score, assessment.score.level
            ),
            context: serde_json::json!({
                "assessment_id": assessment.id,
                "risk_score": assessment.score.score,
                "risk_level": assessment.score.level,
                "score_breakdown": assessment.score.breakdown,
                "features": assessment.features,
                "action_required": assessment.threshold.action_required,
                "monitoring_frequency": assessment.threshold.monitoring_frequency,
                "escalation_criteria": assessment.threshold.escalation_criteria,
                "recommended_actions": assessment.action_plan.immediate_actions,
                "timeline": assessment.action_plan.timeline,
                "escalation_contacts": assessment.action_plan.escalation_contacts,
                "business_impact": business_impact(assessment.score.level),
                "assessed_at": assessment.assessed_at,
                "assessment_version": assessment.assessment_version,
            }),
        }
    }
}

/// Qualitative impact tag used by risk teams to prioritize response.
fn business_impact(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Critical => "HIGH_IMPACT",
        RiskLevel::HighRisk => "MODERATE_IMPACT",
        RiskLevel::Monitor => "LOW_IMPACT",
        RiskLevel::Stable => "MINIMAL_IMPACT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::OrderSide;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn service() -> RiskAssessmentService {
        RiskAssessmentService::new(dec!(60), dec!(80), "1.0".to_string())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap()
    }

    fn trade(pnl: Decimal, minute: u32) -> TradeRecord {
        TradeRecord {
            trade_id: format!("t-{}", minute),
            challenge_id: Uuid::nil(),
            symbol: "EURUSD".to_string(),
            side: OrderSide::Sell,
            quantity: dec!(1),
            price: dec!(100),
            realized_pnl: pnl,
            executed_at: Utc.with_ymd_and_hms(2024, 2, 1, 10, minute, 0).unwrap(),
        }
    }

    #[test]
    fn test_alert_decision_bands() {
        let service = service();
        assert_eq!(service.should_emit_alert(dec!(0)), AlertDecision::None);
        assert_eq!(service.should_emit_alert(dec!(59.99)), AlertDecision::None);
        assert_eq!(service.should_emit_alert(dec!(60)), AlertDecision::Warning);
        assert_eq!(service.should_emit_alert(dec!(79.99)), AlertDecision::Warning);
        assert_eq!(service.should_emit_alert(dec!(80)), AlertDecision::Critical);
        assert_eq!(service.should_emit_alert(dec!(100)), AlertDecision::Critical);
    }

    #[test]
    fn test_assessment_is_internally_consistent() {
        let service = service();
        let trades = vec![trade(dec!(50), 0), trade(dec!(-30), 10), trade(dec!(-20), 20)];
        let assessment = service.assess_challenge_risk(
            Uuid::new_v4(),
            Uuid::new_v4(),
            &trades,
            now() - chrono::Duration::hours(2),
            now(),
        );

        assert_eq!(assessment.score.level, assessment.threshold.level);
        assert_eq!(assessment.score.level, assessment.action_plan.risk_level);
        assert_eq!(assessment.features.total_trades, 3);
        assert_eq!(assessment.assessment_version, "1.0");
        assert!(assessment.threshold.contains(assessment.score.score));
    }

    #[test]
    fn test_alert_payload_carries_breakdown_and_plan() {
        let service = service();
        let assessment = service.assess_challenge_risk(
            Uuid::new_v4(),
            Uuid::new_v4(),
            &[trade(dec!(-10), 0), trade(dec!(-10), 5), trade(dec!(-10), 9)],
            now() - chrono::Duration::hours(1),
            now(),
        );

        let alert = service.build_alert(&assessment, AlertDecision::Critical);
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(alert.alert_type, "BEHAVIORAL_RISK");
        assert_eq!(alert.challenge_id, assessment.challenge_id);

        let context = alert.context.as_object().unwrap();
        assert!(context.contains_key("assessment_id"));
        assert!(context.contains_key("score_breakdown"));
        assert!(context.contains_key("features"));
        assert!(context.contains_key("recommended_actions"));
        // Impact tag follows the classified level, not the alert band.
        assert_eq!(
            context["business_impact"],
            business_impact(assessment.score.level)
        );
    }
}
