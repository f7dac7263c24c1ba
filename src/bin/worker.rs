//! Risk worker - background monitoring process
//!
//! Runs the cold-path risk scoring pipeline over active challenges on a
//! fixed cadence. Exits cleanly once the configured max runtime is reached
//! so a supervisor (systemd, Docker, k8s) can restart it.
//!
//! # Usage
//! ```sh
//! WORKER_INTERVAL_SECONDS=60 cargo run --bin risk-worker
//! ```

use anyhow::Result;
use clap::Parser;
use propeval::application::risk_service::RiskAssessmentService;
use propeval::application::risk_worker::{RiskWorker, RiskWorkerConfig};
use propeval::config::Config;
use propeval::domain::risk::thresholds;
use propeval::infrastructure::event_bus::EventBus;
use propeval::infrastructure::persistence::Database;
use propeval::infrastructure::persistence::repositories::{
    SqliteChallengeRepository, SqliteRiskAssessmentRepository, SqliteTradeRepository,
};
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "risk-worker", about = "Background risk scoring worker")]
struct Args {
    /// Override DATABASE_URL from the environment.
    #[arg(long)]
    database_url: Option<String>,

    /// Run a single monitoring cycle and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    let args = Args::parse();

    info!("Risk worker {} starting...", env!("CARGO_PKG_VERSION"));

    // Static threshold table must cover 0-100 before anything runs.
    thresholds::validate()?;

    let mut config = Config::from_env()?;
    if let Some(database_url) = args.database_url {
        config.database_url = database_url;
    }

    let database = Database::new(&config.database_url).await?;

    let bus = EventBus::new();
    // Alerts have no outbound transport in this process; surface them in the
    // structured log so operators still see them.
    bus.subscribe(
        propeval::domain::events::topics::RISK_ASSESSMENT_ALERT,
        0,
        |event| {
            if let propeval::domain::events::DomainEvent::RiskAlert(alert) = event {
                warn!(
                    challenge_id = %alert.challenge_id,
                    severity = %alert.severity,
                    alert_type = %alert.alert_type,
                    "{}",
                    alert.message
                );
            }
        },
    );
    bus.subscribe(propeval::domain::events::topics::RISK_ALERT, 0, |event| {
        if let propeval::domain::events::DomainEvent::RiskAlert(alert) = event {
            warn!(
                challenge_id = %alert.challenge_id,
                severity = %alert.severity,
                alert_type = %alert.alert_type,
                "{}",
                alert.message
            );
        }
    });

    let service = RiskAssessmentService::new(
        config.alert_warning_threshold,
        config.alert_critical_threshold,
        config.assessment_version.clone(),
    );

    let worker = RiskWorker::new(
        database,
        Arc::new(SqliteChallengeRepository::new()),
        Arc::new(SqliteTradeRepository::new()),
        Arc::new(SqliteRiskAssessmentRepository::new()),
        service,
        bus,
        RiskWorkerConfig::from(&config),
    );

    if args.once {
        let report = worker.run_cycle(chrono::Utc::now()).await?;
        info!(
            scanned = report.challenges_scanned,
            assessed = report.assessments_written,
            alerts = report.alerts_emitted,
            "single cycle complete"
        );
        return Ok(());
    }

    worker.run().await;
    info!("Risk worker shutting down.");
    Ok(())
}
