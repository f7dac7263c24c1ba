use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Shared database handle.
///
/// Monetary columns are stored as TEXT and parsed into `rust_decimal`
/// values at the repository boundary, so no precision is lost in transit.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Ensure the directory exists if it's a file path
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal); // Better for concurrency

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// Single-connection in-memory database for tests and local tooling.
    /// One connection only: every SQLite `:memory:` handle is its own
    /// database, so a larger pool would see different schemas.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to open in-memory SQLite database")?;

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        // 1. Challenges table. CHECK constraints mirror the aggregate
        // invariants as a schema-level backstop.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS challenges (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                challenge_type TEXT NOT NULL,
                initial_balance TEXT NOT NULL,
                max_daily_drawdown_percent TEXT NOT NULL,
                max_total_drawdown_percent TEXT NOT NULL,
                profit_target_percent TEXT NOT NULL,
                current_equity TEXT NOT NULL,
                max_equity_ever TEXT NOT NULL,
                daily_start_equity TEXT NOT NULL,
                daily_max_equity TEXT NOT NULL,
                daily_min_equity TEXT NOT NULL,
                "current_date" DATE NOT NULL,
                total_trades INTEGER NOT NULL DEFAULT 0,
                total_pnl TEXT NOT NULL DEFAULT '0',
                status TEXT NOT NULL DEFAULT 'PENDING',
                created_at DATETIME NOT NULL,
                started_at DATETIME,
                ended_at DATETIME,
                last_trade_at DATETIME,
                funded_at DATETIME,
                failure_reason TEXT,
                version INTEGER NOT NULL DEFAULT 1,
                CHECK (status IN ('PENDING', 'ACTIVE', 'FAILED', 'FUNDED')),
                CHECK (CAST(initial_balance AS REAL) > 0),
                CHECK (CAST(current_equity AS REAL) >= 0),
                CHECK (CAST(max_equity_ever AS REAL) >= CAST(initial_balance AS REAL)),
                CHECK (CAST(max_daily_drawdown_percent AS REAL) BETWEEN 0 AND 100),
                CHECK (CAST(max_total_drawdown_percent AS REAL) BETWEEN 0 AND 100),
                CHECK (CAST(profit_target_percent AS REAL) BETWEEN 0 AND 100),
                CHECK (total_trades >= 0),
                CHECK (CAST(daily_min_equity AS REAL) <= CAST(daily_max_equity AS REAL)),
                CHECK ((status IN ('FAILED', 'FUNDED')) = (ended_at IS NOT NULL)),
                CHECK ((status = 'FUNDED') = (funded_at IS NOT NULL)),
                CHECK (ended_at IS NULL OR started_at IS NULL OR ended_at >= started_at),
                CHECK (last_trade_at IS NULL OR started_at IS NULL OR last_trade_at >= started_at)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create challenges table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_challenges_status
            ON challenges (status);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create challenge status index")?;

        // 2. Trades table (read by the cold path, scoped to a challenge)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                trade_id TEXT PRIMARY KEY,
                challenge_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL CHECK (side IN ('BUY', 'SELL')),
                quantity TEXT NOT NULL CHECK (CAST(quantity AS REAL) > 0),
                price TEXT NOT NULL CHECK (CAST(price AS REAL) > 0),
                realized_pnl TEXT NOT NULL,
                executed_at DATETIME NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create trades table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_trades_challenge_time
            ON trades (challenge_id, executed_at);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create trade index")?;

        // 3. Risk assessments table (append-only)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS risk_assessments (
                id TEXT PRIMARY KEY,
                challenge_id TEXT NOT NULL,
                trader_id TEXT NOT NULL,
                risk_score TEXT NOT NULL CHECK (CAST(risk_score AS REAL) BETWEEN 0 AND 100),
                risk_level TEXT NOT NULL CHECK (risk_level IN ('STABLE', 'MONITOR', 'HIGH_RISK', 'CRITICAL')),
                score_breakdown TEXT NOT NULL,
                feature_snapshot TEXT NOT NULL,
                action_plan TEXT NOT NULL,
                assessed_at DATETIME NOT NULL,
                assessment_version TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create risk_assessments table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_risk_assessments_challenge_time
            ON risk_assessments (challenge_id, assessed_at DESC);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create risk assessment index")?;

        info!("Database schema initialized.");
        Ok(())
    }
}
