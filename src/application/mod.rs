pub mod challenge_engine;
pub mod risk_service;
pub mod risk_worker;

pub use challenge_engine::ChallengeEngine;
pub use risk_service::{AlertDecision, RiskAssessmentService};
pub use risk_worker::{RiskWorker, RiskWorkerConfig};
