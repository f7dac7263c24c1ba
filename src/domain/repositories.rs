//! Repository traits consumed by the engine and the risk worker.
//!
//! Every method runs against a caller-supplied connection so that the hot
//! path can keep all of its work inside one exclusive transaction. The
//! implementations live in `infrastructure::persistence`.

use crate::domain::challenge::model::Challenge;
use crate::domain::errors::StorageError;
use crate::domain::risk::assessment::RiskAssessment;
use crate::domain::risk::features::TradeRecord;
use async_trait::async_trait;
use sqlx::SqliteConnection;
use uuid::Uuid;

/// Persistence capabilities for the challenge aggregate.
#[async_trait]
pub trait ChallengeRepository: Send + Sync {
    /// Insert a freshly created challenge.
    async fn insert(
        &self,
        conn: &mut SqliteConnection,
        challenge: &Challenge,
    ) -> Result<(), StorageError>;

    /// Fetch a challenge for exclusive mutation inside the current
    /// transaction. SQLite's single-writer transaction lock stands in for a
    /// per-row `SELECT ... FOR UPDATE`.
    async fn load_for_update(
        &self,
        conn: &mut SqliteConnection,
        id: Uuid,
    ) -> Result<Option<Challenge>, StorageError>;

    /// Write all fields back. Fails with `VersionConflict` when the
    /// persisted row is no longer at `expected_version` (optimistic check,
    /// second line of defense behind the transaction lock).
    async fn save(
        &self,
        conn: &mut SqliteConnection,
        challenge: &Challenge,
        expected_version: i64,
    ) -> Result<(), StorageError>;

    /// All ACTIVE challenges, for cold-path monitoring. Read-only.
    async fn list_active(&self, conn: &mut SqliteConnection)
    -> Result<Vec<Challenge>, StorageError>;
}

/// Read/write access to the per-challenge trade history.
#[async_trait]
pub trait TradeRepository: Send + Sync {
    async fn insert(
        &self,
        conn: &mut SqliteConnection,
        trade: &TradeRecord,
    ) -> Result<(), StorageError>;

    /// Trade history for one challenge in execution order. Read-only.
    async fn list_for_challenge(
        &self,
        conn: &mut SqliteConnection,
        challenge_id: Uuid,
    ) -> Result<Vec<TradeRecord>, StorageError>;
}

/// Append-only store for risk assessments.
#[async_trait]
pub trait RiskAssessmentRepository: Send + Sync {
    async fn insert(
        &self,
        conn: &mut SqliteConnection,
        assessment: &RiskAssessment,
    ) -> Result<(), StorageError>;

    async fn count_for_challenge(
        &self,
        conn: &mut SqliteConnection,
        challenge_id: Uuid,
    ) -> Result<i64, StorageError>;
}
