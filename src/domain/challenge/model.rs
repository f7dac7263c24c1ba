use crate::domain::errors::ChallengeError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeStatus {
    Pending,
    Active,
    Failed,
    Funded,
}

impl ChallengeStatus {
    /// Terminal states never transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChallengeStatus::Failed | ChallengeStatus::Funded)
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeStatus::Pending => write!(f, "PENDING"),
            ChallengeStatus::Active => write!(f, "ACTIVE"),
            ChallengeStatus::Failed => write!(f, "FAILED"),
            ChallengeStatus::Funded => write!(f, "FUNDED"),
        }
    }
}

impl FromStr for ChallengeStatus {
    type Err = ChallengeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ChallengeStatus::Pending),
            "ACTIVE" => Ok(ChallengeStatus::Active),
            "FAILED" => Ok(ChallengeStatus::Failed),
            "FUNDED" => Ok(ChallengeStatus::Funded),
            other => Err(ChallengeError::InvalidConfiguration(format!(
                "unknown challenge status: {}",
                other
            ))),
        }
    }
}

/// Rule that moved a challenge into FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    MaxDailyDrawdown,
    MaxTotalDrawdown,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::MaxDailyDrawdown => write!(f, "MAX_DAILY_DRAWDOWN"),
            FailureReason::MaxTotalDrawdown => write!(f, "MAX_TOTAL_DRAWDOWN"),
        }
    }
}

impl FromStr for FailureReason {
    type Err = ChallengeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MAX_DAILY_DRAWDOWN" => Ok(FailureReason::MaxDailyDrawdown),
            "MAX_TOTAL_DRAWDOWN" => Ok(FailureReason::MaxTotalDrawdown),
            other => Err(ChallengeError::InvalidConfiguration(format!(
                "unknown failure reason: {}",
                other
            ))),
        }
    }
}

/// Aggregate root for one evaluation challenge.
///
/// Configuration fields are immutable after creation. Equity, daily tracking,
/// and lifecycle fields are mutated only by the challenge engine, inside the
/// transaction that holds the row lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: Uuid,
    pub user_id: Uuid,

    // Configuration (immutable after creation)
    pub challenge_type: String,
    pub initial_balance: Decimal,
    pub max_daily_drawdown_percent: Decimal,
    pub max_total_drawdown_percent: Decimal,
    pub profit_target_percent: Decimal,

    // Equity state
    pub current_equity: Decimal,
    pub max_equity_ever: Decimal,

    // Daily tracking (reset at the first trade of each UTC day)
    pub daily_start_equity: Decimal,
    pub daily_max_equity: Decimal,
    pub daily_min_equity: Decimal,
    pub current_date: NaiveDate,

    // Performance tracking
    pub total_trades: i64,
    pub total_pnl: Decimal,

    // Lifecycle
    pub status: ChallengeStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_trade_at: Option<DateTime<Utc>>,
    pub funded_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<FailureReason>,

    // Optimistic locking
    pub version: i64,
}

impl Challenge {
    /// Create a new PENDING challenge with validated configuration.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: Uuid,
        challenge_type: &str,
        initial_balance: Decimal,
        max_daily_drawdown_percent: Decimal,
        max_total_drawdown_percent: Decimal,
        profit_target_percent: Decimal,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ChallengeError> {
        if initial_balance <= Decimal::ZERO {
            return Err(ChallengeError::InvalidConfiguration(format!(
                "initial_balance must be positive, got {}",
                initial_balance
            )));
        }
        for (name, pct) in [
            ("max_daily_drawdown_percent", max_daily_drawdown_percent),
            ("max_total_drawdown_percent", max_total_drawdown_percent),
            ("profit_target_percent", profit_target_percent),
        ] {
            if pct <= Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
                return Err(ChallengeError::InvalidConfiguration(format!(
                    "{} must be in (0, 100], got {}",
                    name, pct
                )));
            }
        }

        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            challenge_type: challenge_type.to_string(),
            initial_balance,
            max_daily_drawdown_percent,
            max_total_drawdown_percent,
            profit_target_percent,
            current_equity: initial_balance,
            max_equity_ever: initial_balance,
            daily_start_equity: initial_balance,
            daily_max_equity: initial_balance,
            daily_min_equity: initial_balance,
            current_date: created_at.date_naive(),
            total_trades: 0,
            total_pnl: Decimal::ZERO,
            status: ChallengeStatus::Pending,
            created_at,
            started_at: None,
            ended_at: None,
            last_trade_at: None,
            funded_at: None,
            failure_reason: None,
            version: 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_new_challenge_starts_pending() {
        let challenge = Challenge::new(
            Uuid::new_v4(),
            "evaluation",
            dec!(10000),
            dec!(5),
            dec!(10),
            dec!(10),
            created_at(),
        )
        .unwrap();

        assert_eq!(challenge.status, ChallengeStatus::Pending);
        assert_eq!(challenge.current_equity, dec!(10000));
        assert_eq!(challenge.max_equity_ever, dec!(10000));
        assert_eq!(challenge.daily_start_equity, dec!(10000));
        assert_eq!(challenge.current_date, created_at().date_naive());
        assert_eq!(challenge.total_trades, 0);
        assert_eq!(challenge.version, 1);
        assert!(challenge.started_at.is_none());
    }

    #[test]
    fn test_new_challenge_rejects_non_positive_balance() {
        let result = Challenge::new(
            Uuid::new_v4(),
            "evaluation",
            dec!(0),
            dec!(5),
            dec!(10),
            dec!(10),
            created_at(),
        );
        assert!(matches!(
            result,
            Err(ChallengeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_new_challenge_rejects_out_of_range_percent() {
        let result = Challenge::new(
            Uuid::new_v4(),
            "evaluation",
            dec!(10000),
            dec!(101),
            dec!(10),
            dec!(10),
            created_at(),
        );
        assert!(matches!(
            result,
            Err(ChallengeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_terminal_status() {
        assert!(ChallengeStatus::Failed.is_terminal());
        assert!(ChallengeStatus::Funded.is_terminal());
        assert!(!ChallengeStatus::Pending.is_terminal());
        assert!(!ChallengeStatus::Active.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            ChallengeStatus::Pending,
            ChallengeStatus::Active,
            ChallengeStatus::Failed,
            ChallengeStatus::Funded,
        ] {
            assert_eq!(
                status.to_string().parse::<ChallengeStatus>().unwrap(),
                status
            );
        }
    }
}
