use crate::domain::risk::features::FeatureSet;
use crate::domain::risk::scorer::RiskScore;
use crate::domain::risk::thresholds::{ActionPlan, RiskThreshold};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Complete outcome of one cold-path risk assessment run.
///
/// Persisted append-only; never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub id: Uuid,
    pub challenge_id: Uuid,
    pub trader_id: Uuid,
    pub score: RiskScore,
    pub threshold: &'static RiskThreshold,
    pub features: FeatureSet,
    pub action_plan: ActionPlan,
    pub assessed_at: DateTime<Utc>,
    pub assessment_version: String,
}
