pub mod challenge_repository;
pub mod risk_assessment_repository;
pub mod trade_repository;

pub use challenge_repository::SqliteChallengeRepository;
pub use risk_assessment_repository::SqliteRiskAssessmentRepository;
pub use trade_repository::SqliteTradeRepository;
