//! Domain events flowing in and out of the evaluation core.
//!
//! `TradeExecuted` is the single inbound event. The outbound events are
//! published on the in-process event bus; field names and semantics are the
//! contract, field order is not.

use crate::domain::challenge::model::ChallengeStatus;
use crate::domain::challenge::rules::RuleReason;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Well-known event bus topics.
pub mod topics {
    pub const EQUITY_UPDATED: &str = "EQUITY_UPDATED";
    pub const CHALLENGE_STATUS_CHANGED: &str = "CHALLENGE_STATUS_CHANGED";
    /// Hot-path approach-to-limit alerts.
    pub const RISK_ALERT: &str = "RISK_ALERT";
    /// Cold-path behavioral risk alerts.
    pub const RISK_ASSESSMENT_ALERT: &str = "RISK_ASSESSMENT_ALERT";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for OrderSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(OrderSide::Buy),
            "SELL" => Ok(OrderSide::Sell),
            other => Err(format!("unknown order side: {}", other)),
        }
    }
}

/// Inbound event: a trade landed on a challenge account.
///
/// The transport layer validates `quantity > 0`, `price > 0` and the UTC
/// timestamp before constructing this; the engine only asserts them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeExecuted {
    pub challenge_id: Uuid,
    /// External execution id, opaque to the core.
    pub trade_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub realized_pnl: Decimal,
    pub executed_at: DateTime<Utc>,
}

/// Outbound: equity state after a trade was applied.
#[derive(Debug, Clone, Serialize)]
pub struct EquityUpdated {
    pub challenge_id: Uuid,
    pub user_id: Uuid,
    pub previous_equity: Decimal,
    pub current_equity: Decimal,
    pub max_equity_ever: Decimal,
    pub daily_start_equity: Decimal,
    pub daily_max_equity: Decimal,
    pub daily_min_equity: Decimal,
    pub total_pnl: Decimal,
    pub total_trades: i64,
    pub trade_pnl: Decimal,
    pub trade_symbol: String,
    pub executed_at: DateTime<Utc>,
}

/// Outbound: a challenge moved to a new lifecycle status.
#[derive(Debug, Clone, Serialize)]
pub struct ChallengeStatusChanged {
    pub challenge_id: Uuid,
    pub user_id: Uuid,
    pub old_status: ChallengeStatus,
    pub new_status: ChallengeStatus,
    pub reason: Option<RuleReason>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertSeverity {
    Medium,
    High,
    Warning,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Medium => write!(f, "MEDIUM"),
            AlertSeverity::High => write!(f, "HIGH"),
            AlertSeverity::Warning => write!(f, "WARNING"),
            AlertSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Outbound, advisory only: never coupled to challenge outcome decisions.
#[derive(Debug, Clone, Serialize)]
pub struct RiskAlert {
    pub challenge_id: Uuid,
    pub user_id: Uuid,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    /// Snapshot of whatever state motivated the alert.
    pub context: serde_json::Value,
}

/// Envelope published on the event bus.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum DomainEvent {
    EquityUpdated(EquityUpdated),
    ChallengeStatusChanged(ChallengeStatusChanged),
    RiskAlert(RiskAlert),
}

impl DomainEvent {
    pub fn challenge_id(&self) -> Uuid {
        match self {
            DomainEvent::EquityUpdated(e) => e.challenge_id,
            DomainEvent::ChallengeStatusChanged(e) => e.challenge_id,
            DomainEvent::RiskAlert(e) => e.challenge_id,
        }
    }
}
