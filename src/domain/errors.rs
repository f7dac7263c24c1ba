use crate::domain::challenge::model::ChallengeStatus;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("version conflict for challenge {challenge_id}: persisted row no longer at v{expected}")]
    VersionConflict { challenge_id: Uuid, expected: i64 },

    #[error("storage contention, retry with back-off: {0}")]
    Contention(#[source] sqlx::Error),

    #[error("malformed {entity} row: bad {field}")]
    Malformed {
        entity: &'static str,
        field: &'static str,
    },

    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StorageError {
    /// Classify lock/serialization failures so callers can retry them.
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let msg = db_err.message();
            if msg.contains("database is locked") || msg.contains("database table is locked") {
                return StorageError::Contention(err);
            }
        }
        StorageError::Database(err)
    }
}

/// Errors raised by the hot-path challenge engine.
#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error("challenge {0} not found")]
    NotFound(Uuid),

    #[error("trade rejected: challenge {challenge_id} already {status}")]
    TradeRejected {
        challenge_id: Uuid,
        status: ChallengeStatus,
    },

    #[error("invalid status transition: {from} -> {to}")]
    InvalidStateTransition {
        from: ChallengeStatus,
        to: ChallengeStatus,
    },

    #[error("invalid challenge configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors raised by the risk assessment pipeline.
#[derive(Debug, Error)]
pub enum RiskError {
    #[error("risk thresholds misconfigured: {0}")]
    ThresholdConfig(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_rejected_formatting() {
        let err = ChallengeError::TradeRejected {
            challenge_id: Uuid::nil(),
            status: ChallengeStatus::Failed,
        };
        let msg = err.to_string();
        assert!(msg.contains("already FAILED"));
        assert!(msg.contains(&Uuid::nil().to_string()));
    }

    #[test]
    fn test_invalid_transition_formatting() {
        let err = ChallengeError::InvalidStateTransition {
            from: ChallengeStatus::Funded,
            to: ChallengeStatus::Active,
        };
        assert_eq!(
            err.to_string(),
            "invalid status transition: FUNDED -> ACTIVE"
        );
    }
}
