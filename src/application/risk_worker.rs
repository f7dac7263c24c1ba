//! Background risk monitoring worker (the cold path).
//!
//! Scans ACTIVE challenges on a fixed cadence and performs the checks that
//! do not belong in synchronous trade processing: behavioral risk scoring,
//! inactivity alerts, and operational sanity warnings. Challenges are only
//! ever read here; the single write is the append-only assessment row.

use crate::application::risk_service::{AlertDecision, RiskAssessmentService};
use crate::config::Config;
use crate::domain::challenge::model::Challenge;
use crate::domain::events::{AlertSeverity, DomainEvent, RiskAlert, topics};
use crate::domain::repositories::{ChallengeRepository, RiskAssessmentRepository, TradeRepository};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::persistence::Database;
use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct RiskWorkerConfig {
    pub interval: Duration,
    pub max_runtime: Duration,
    pub inactive_threshold: ChronoDuration,
    pub high_activity_threshold: i64,
}

impl From<&Config> for RiskWorkerConfig {
    fn from(config: &Config) -> Self {
        Self {
            interval: Duration::from_secs(config.worker_interval_seconds),
            max_runtime: Duration::from_secs(config.worker_max_runtime_hours * 3600),
            inactive_threshold: ChronoDuration::minutes(config.inactive_threshold_minutes),
            high_activity_threshold: config.high_activity_threshold,
        }
    }
}

/// Outcome of one monitoring cycle, for logging and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleReport {
    pub challenges_scanned: usize,
    pub assessments_written: usize,
    pub alerts_emitted: usize,
}

pub struct RiskWorker {
    database: Database,
    challenges: Arc<dyn ChallengeRepository>,
    trades: Arc<dyn TradeRepository>,
    assessments: Arc<dyn RiskAssessmentRepository>,
    service: RiskAssessmentService,
    bus: EventBus,
    config: RiskWorkerConfig,
}

impl RiskWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        database: Database,
        challenges: Arc<dyn ChallengeRepository>,
        trades: Arc<dyn TradeRepository>,
        assessments: Arc<dyn RiskAssessmentRepository>,
        service: RiskAssessmentService,
        bus: EventBus,
        config: RiskWorkerConfig,
    ) -> Self {
        Self {
            database,
            challenges,
            trades,
            assessments,
            service,
            bus,
            config,
        }
    }

    /// Main loop. Returns when the max runtime is reached; the supervisor
    /// restarts the process.
    pub async fn run(&self) {
        let started = Instant::now();
        info!(
            interval_secs = self.config.interval.as_secs(),
            max_runtime_secs = self.config.max_runtime.as_secs(),
            "risk worker started"
        );

        loop {
            if started.elapsed() >= self.config.max_runtime {
                info!("max runtime reached, exiting for supervisor restart");
                return;
            }

            let cycle_started = Instant::now();
            match self.run_cycle(Utc::now()).await {
                Ok(report) => debug!(
                    scanned = report.challenges_scanned,
                    assessed = report.assessments_written,
                    alerts = report.alerts_emitted,
                    "monitoring cycle complete"
                ),
                Err(err) => error!(error = %err, "monitoring cycle failed"),
            }

            let elapsed = cycle_started.elapsed();
            if elapsed >= self.config.interval {
                warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    interval_ms = self.config.interval.as_millis() as u64,
                    "cycle overran its interval, starting next cycle immediately"
                );
                continue;
            }
            tokio::time::sleep(self.config.interval - elapsed).await;
        }
    }

    /// One monitoring pass over all ACTIVE challenges. A failure on one
    /// challenge is logged and does not stop the others.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let mut conn = self.database.pool.acquire().await?;
        let active = self.challenges.list_active(&mut conn).await?;

        let mut report = CycleReport {
            challenges_scanned: active.len(),
            ..CycleReport::default()
        };

        if active.is_empty() {
            debug!("no active challenges to monitor");
            return Ok(report);
        }

        for challenge in &active {
            self.check_inactivity(challenge, now, &mut report);
            self.check_high_activity(challenge);
            self.check_stale_daily_reset(challenge, now);

            match self.assess_challenge(challenge, now, &mut conn).await {
                Ok(outcome) => {
                    if outcome.assessed {
                        report.assessments_written += 1;
                    }
                    if outcome.alerted {
                        report.alerts_emitted += 1;
                    }
                }
                Err(err) => {
                    error!(
                        challenge_id = %challenge.id,
                        error = %err,
                        "risk assessment failed for challenge"
                    );
                }
            }
        }

        Ok(report)
    }

    async fn assess_challenge(
        &self,
        challenge: &Challenge,
        now: DateTime<Utc>,
        conn: &mut sqlx::SqliteConnection,
    ) -> Result<AssessmentOutcome> {
        let trades = self.trades.list_for_challenge(conn, challenge.id).await?;
        if trades.is_empty() {
            return Ok(AssessmentOutcome::default());
        }

        let started_at = challenge.started_at.unwrap_or(challenge.created_at);
        let assessment = self.service.assess_challenge_risk(
            challenge.id,
            challenge.user_id,
            &trades,
            started_at,
            now,
        );

        self.assessments.insert(conn, &assessment).await?;

        info!(
            challenge_id = %challenge.id,
            risk_score = %assessment.score.score,
            risk_level = %assessment.score.level,
            total_trades = trades.len(),
            "risk assessment completed"
        );

        let decision = self.service.should_emit_alert(assessment.score.score);
        let alerted = decision != AlertDecision::None;
        if alerted {
            let alert = self.service.build_alert(&assessment, decision);
            warn!(
                challenge_id = %challenge.id,
                risk_score = %assessment.score.score,
                risk_level = %assessment.score.level,
                severity = %alert.severity,
                "behavioral risk alert triggered"
            );
            self.bus
                .publish(topics::RISK_ASSESSMENT_ALERT, &DomainEvent::RiskAlert(alert));
        }

        Ok(AssessmentOutcome {
            assessed: true,
            alerted,
        })
    }

    /// Alert when an active challenge has gone quiet.
    fn check_inactivity(&self, challenge: &Challenge, now: DateTime<Utc>, report: &mut CycleReport) {
        let Some(last_trade_at) = challenge.last_trade_at else {
            return;
        };

        let idle = now - last_trade_at;
        if idle <= self.config.inactive_threshold {
            return;
        }

        let idle_minutes = idle.num_minutes();
        info!(
            challenge_id = %challenge.id,
            idle_minutes,
            "inactive trading alert"
        );
        self.bus.publish(
            topics::RISK_ALERT,
            &DomainEvent::RiskAlert(RiskAlert {
                challenge_id: challenge.id,
                user_id: challenge.user_id,
                alert_type: "INACTIVE_TRADING".to_string(),
                severity: AlertSeverity::Medium,
                title: "Inactive Trading Detected".to_string(),
                message: format!("No trades for {} minutes", idle_minutes),
                context: serde_json::json!({
                    "current_equity": challenge.current_equity,
                    "last_trade_at": last_trade_at,
                    "alert_timestamp": now,
                }),
            }),
        );
        report.alerts_emitted += 1;
    }

    /// Unusually high trade counts may indicate automation or system stress.
    fn check_high_activity(&self, challenge: &Challenge) {
        if challenge.total_trades > self.config.high_activity_threshold {
            warn!(
                challenge_id = %challenge.id,
                total_trades = challenge.total_trades,
                "high activity challenge detected"
            );
        }
    }

    /// The daily baseline only moves on the first trade of a day; a lagging
    /// date here is expected for idle challenges but worth surfacing.
    fn check_stale_daily_reset(&self, challenge: &Challenge, now: DateTime<Utc>) {
        if challenge.current_date != now.date_naive() {
            warn!(
                challenge_id = %challenge.id,
                tracked_date = %challenge.current_date,
                actual_date = %now.date_naive(),
                "stale daily reset detected"
            );
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct AssessmentOutcome {
    assessed: bool,
    alerted: bool,
}
