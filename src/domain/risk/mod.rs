pub mod assessment;
pub mod features;
pub mod scorer;
pub mod thresholds;

pub use assessment::RiskAssessment;
pub use features::{FeatureEngineer, FeatureSet, TradeRecord};
pub use scorer::{RiskScore, RiskScorer, ScoreBreakdown};
pub use thresholds::{RiskLevel, RiskThreshold};
