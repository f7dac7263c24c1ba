use crate::domain::errors::StorageError;
use crate::domain::repositories::RiskAssessmentRepository;
use crate::domain::risk::assessment::RiskAssessment;
use async_trait::async_trait;
use sqlx::SqliteConnection;
use uuid::Uuid;

/// Append-only writer for risk assessment rows. No updates, no deletes;
/// retention is handled outside the core.
#[derive(Debug, Clone, Default)]
pub struct SqliteRiskAssessmentRepository;

impl SqliteRiskAssessmentRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RiskAssessmentRepository for SqliteRiskAssessmentRepository {
    async fn insert(
        &self,
        conn: &mut SqliteConnection,
        assessment: &RiskAssessment,
    ) -> Result<(), StorageError> {
        let breakdown = serde_json::to_string(&assessment.score.breakdown)
            .map_err(|_| malformed("score_breakdown"))?;
        let features = serde_json::to_string(&assessment.features)
            .map_err(|_| malformed("feature_snapshot"))?;
        let action_plan = serde_json::to_string(&assessment.action_plan)
            .map_err(|_| malformed("action_plan"))?;

        sqlx::query(
            r#"
            INSERT INTO risk_assessments (
                id, challenge_id, trader_id,
                risk_score, risk_level, score_breakdown, feature_snapshot, action_plan,
                assessed_at, assessment_version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(assessment.id.to_string())
        .bind(assessment.challenge_id.to_string())
        .bind(assessment.trader_id.to_string())
        .bind(assessment.score.score.to_string())
        .bind(assessment.score.level.to_string())
        .bind(breakdown)
        .bind(features)
        .bind(action_plan)
        .bind(assessment.assessed_at)
        .bind(&assessment.assessment_version)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn count_for_challenge(
        &self,
        conn: &mut SqliteConnection,
        challenge_id: Uuid,
    ) -> Result<i64, StorageError> {
        let (count,): (i64,) =
            sqlx::query_as(r#"SELECT COUNT(*) FROM risk_assessments WHERE challenge_id = $1"#)
                .bind(challenge_id.to_string())
                .fetch_one(&mut *conn)
                .await?;

        Ok(count)
    }
}

fn malformed(field: &'static str) -> StorageError {
    StorageError::Malformed {
        entity: "risk_assessment",
        field,
    }
}
