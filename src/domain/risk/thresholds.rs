//! Risk level classification and the operational guidance attached to each
//! band. The threshold table is static data; `validate` is called at
//! startup to guarantee it covers 0-100 contiguously.

use crate::domain::errors::RiskError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    Stable,
    Monitor,
    HighRisk,
    Critical,
}

impl RiskLevel {
    /// Classify a (clamped) score: [0,30] stable, (30,60] monitor,
    /// (60,80] high risk, (80,100] critical.
    pub fn for_score(score: Decimal) -> Self {
        if score <= dec!(30) {
            RiskLevel::Stable
        } else if score <= dec!(60) {
            RiskLevel::Monitor
        } else if score <= dec!(80) {
            RiskLevel::HighRisk
        } else {
            RiskLevel::Critical
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Stable => write!(f, "STABLE"),
            RiskLevel::Monitor => write!(f, "MONITOR"),
            RiskLevel::HighRisk => write!(f, "HIGH_RISK"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// One classification band with its operational guidance.
#[derive(Debug, Clone, Serialize)]
pub struct RiskThreshold {
    pub level: RiskLevel,
    pub min_score: Decimal,
    pub max_score: Decimal,
    pub description: &'static str,
    pub action_required: &'static str,
    pub monitoring_frequency: &'static str,
    pub escalation_criteria: &'static [&'static str],
}

impl RiskThreshold {
    pub fn contains(&self, score: Decimal) -> bool {
        self.min_score <= score && score <= self.max_score
    }

    pub fn score_range(&self) -> String {
        format!("{}-{}", self.min_score, self.max_score)
    }
}

pub static THRESHOLDS: [RiskThreshold; 4] = [
    RiskThreshold {
        level: RiskLevel::Stable,
        min_score: dec!(0),
        max_score: dec!(30),
        description: "Low risk trader with consistent, profitable performance",
        action_required: "Standard monitoring - no intervention needed",
        monitoring_frequency: "Weekly review",
        escalation_criteria: &[],
    },
    RiskThreshold {
        level: RiskLevel::Monitor,
        min_score: dec!(30),
        max_score: dec!(60),
        description: "Moderate risk requiring enhanced oversight",
        action_required: "Increased monitoring frequency and trend analysis",
        monitoring_frequency: "Daily review",
        escalation_criteria: &[
            "Risk score increases by 10+ points in 24 hours",
            "Multiple consecutive losing days",
            "Significant increase in trading frequency",
        ],
    },
    RiskThreshold {
        level: RiskLevel::HighRisk,
        min_score: dec!(60),
        max_score: dec!(80),
        description: "High risk trader requiring active risk management",
        action_required: "Immediate risk mitigation and position limits consideration",
        monitoring_frequency: "Real-time monitoring",
        escalation_criteria: &[
            "Risk score reaches 75+ points",
            "Large position sizes detected",
            "Extended losing streaks (>5 consecutive losses)",
            "Significant drawdown events",
        ],
    },
    RiskThreshold {
        level: RiskLevel::Critical,
        min_score: dec!(80),
        max_score: dec!(100),
        description: "Critical risk requiring immediate intervention",
        action_required: "Immediate account suspension and manual review required",
        monitoring_frequency: "Immediate intervention",
        escalation_criteria: &[
            "Any score reaching 90+ points",
            "Extreme drawdown events (>50% intraday)",
            "Evidence of revenge trading patterns",
            "System-detected manipulation attempts",
        ],
    },
];

/// Find the band containing a score. Out-of-range inputs are clamped so the
/// lookup is total.
pub fn classify(score: Decimal) -> &'static RiskThreshold {
    let clamped = score.max(dec!(0)).min(dec!(100));
    THRESHOLDS
        .iter()
        .find(|t| t.contains(clamped))
        .unwrap_or(&THRESHOLDS[0])
}

/// Startup check: bands must cover [0, 100] contiguously in order.
pub fn validate() -> Result<(), RiskError> {
    if THRESHOLDS[0].min_score != dec!(0) {
        return Err(RiskError::ThresholdConfig(
            "coverage must start at 0".to_string(),
        ));
    }
    if THRESHOLDS[THRESHOLDS.len() - 1].max_score != dec!(100) {
        return Err(RiskError::ThresholdConfig(
            "coverage must end at 100".to_string(),
        ));
    }
    for pair in THRESHOLDS.windows(2) {
        if pair[0].max_score != pair[1].min_score {
            return Err(RiskError::ThresholdConfig(format!(
                "gap between {} and {}",
                pair[0].level, pair[1].level
            )));
        }
    }
    Ok(())
}

/// Actionable plan for a given score, derived from its band.
#[derive(Debug, Clone, Serialize)]
pub struct ActionPlan {
    pub risk_level: RiskLevel,
    pub immediate_actions: &'static [&'static str],
    pub monitoring_actions: &'static [&'static str],
    pub timeline: &'static str,
    pub escalation_contacts: &'static [&'static str],
}

pub fn generate_action_plan(score: Decimal) -> ActionPlan {
    match classify(score).level {
        RiskLevel::Stable => ActionPlan {
            risk_level: RiskLevel::Stable,
            immediate_actions: &["Continue standard monitoring"],
            monitoring_actions: &["Weekly performance review"],
            timeline: "Ongoing",
            escalation_contacts: &[],
        },
        RiskLevel::Monitor => ActionPlan {
            risk_level: RiskLevel::Monitor,
            immediate_actions: &[
                "Increase monitoring frequency",
                "Review recent trading patterns",
            ],
            monitoring_actions: &[
                "Daily risk score checks",
                "Weekly strategy review with trader",
            ],
            timeline: "Next 24-48 hours",
            escalation_contacts: &["Risk Analyst"],
        },
        RiskLevel::HighRisk => ActionPlan {
            risk_level: RiskLevel::HighRisk,
            immediate_actions: &[
                "Implement position size limits",
                "Require pre-trade approval for large positions",
                "Schedule urgent strategy review",
            ],
            monitoring_actions: &[
                "Real-time position monitoring",
                "Daily risk committee review",
                "Enhanced drawdown monitoring",
            ],
            timeline: "Immediate - within 1 hour",
            escalation_contacts: &["Risk Manager", "Trading Supervisor"],
        },
        RiskLevel::Critical => ActionPlan {
            risk_level: RiskLevel::Critical,
            immediate_actions: &[
                "Suspend trading activity immediately",
                "Freeze account pending review",
                "Initiate formal risk incident process",
            ],
            monitoring_actions: &[
                "Complete account audit",
                "Review all recent trades",
                "Assess capital adequacy",
            ],
            timeline: "Immediate - account suspended",
            escalation_contacts: &["Chief Risk Officer", "Compliance Team", "Legal"],
        },
    }
}

/// Human-readable summary of all bands, for documentation and reporting.
pub fn threshold_summary() -> String {
    let mut out = String::from("Risk threshold definitions:\n");
    for threshold in &THRESHOLDS {
        out.push_str(&format!(
            "{} ({}): {}\n  Action: {}\n  Monitoring: {}\n",
            threshold.level,
            threshold.score_range(),
            threshold.description,
            threshold.action_required,
            threshold.monitoring_frequency,
        ));
        for criterion in threshold.escalation_criteria {
            out.push_str(&format!("  Escalates on: {}\n", criterion));
        }
    }
    out
}
