use crate::domain::challenge::model::{Challenge, ChallengeStatus, FailureReason};
use crate::domain::errors::StorageError;
use crate::domain::repositories::ChallengeRepository;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct SqliteChallengeRepository;

impl SqliteChallengeRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChallengeRepository for SqliteChallengeRepository {
    async fn insert(
        &self,
        conn: &mut SqliteConnection,
        challenge: &Challenge,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO challenges (
                id, user_id, challenge_type,
                initial_balance, max_daily_drawdown_percent, max_total_drawdown_percent, profit_target_percent,
                current_equity, max_equity_ever,
                daily_start_equity, daily_max_equity, daily_min_equity, "current_date",
                total_trades, total_pnl, status,
                created_at, started_at, ended_at, last_trade_at, funded_at,
                failure_reason, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23)
            "#,
        )
        .bind(challenge.id.to_string())
        .bind(challenge.user_id.to_string())
        .bind(&challenge.challenge_type)
        .bind(challenge.initial_balance.to_string())
        .bind(challenge.max_daily_drawdown_percent.to_string())
        .bind(challenge.max_total_drawdown_percent.to_string())
        .bind(challenge.profit_target_percent.to_string())
        .bind(challenge.current_equity.to_string())
        .bind(challenge.max_equity_ever.to_string())
        .bind(challenge.daily_start_equity.to_string())
        .bind(challenge.daily_max_equity.to_string())
        .bind(challenge.daily_min_equity.to_string())
        .bind(challenge.current_date)
        .bind(challenge.total_trades)
        .bind(challenge.total_pnl.to_string())
        .bind(challenge.status.to_string())
        .bind(challenge.created_at)
        .bind(challenge.started_at)
        .bind(challenge.ended_at)
        .bind(challenge.last_trade_at)
        .bind(challenge.funded_at)
        .bind(challenge.failure_reason.map(|r| r.to_string()))
        .bind(challenge.version)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn load_for_update(
        &self,
        conn: &mut SqliteConnection,
        id: Uuid,
    ) -> Result<Option<Challenge>, StorageError> {
        // SQLite takes a database-wide write lock for the enclosing
        // transaction; there is no per-row FOR UPDATE to issue here.
        let row = sqlx::query(r#"SELECT * FROM challenges WHERE id = $1"#)
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await?;

        row.map(|r| challenge_from_row(&r)).transpose()
    }

    async fn save(
        &self,
        conn: &mut SqliteConnection,
        challenge: &Challenge,
        expected_version: i64,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE challenges SET
                current_equity = $1,
                max_equity_ever = $2,
                daily_start_equity = $3,
                daily_max_equity = $4,
                daily_min_equity = $5,
                "current_date" = $6,
                total_trades = $7,
                total_pnl = $8,
                status = $9,
                started_at = $10,
                ended_at = $11,
                last_trade_at = $12,
                funded_at = $13,
                failure_reason = $14,
                version = $15
            WHERE id = $16 AND version = $17
            "#,
        )
        .bind(challenge.current_equity.to_string())
        .bind(challenge.max_equity_ever.to_string())
        .bind(challenge.daily_start_equity.to_string())
        .bind(challenge.daily_max_equity.to_string())
        .bind(challenge.daily_min_equity.to_string())
        .bind(challenge.current_date)
        .bind(challenge.total_trades)
        .bind(challenge.total_pnl.to_string())
        .bind(challenge.status.to_string())
        .bind(challenge.started_at)
        .bind(challenge.ended_at)
        .bind(challenge.last_trade_at)
        .bind(challenge.funded_at)
        .bind(challenge.failure_reason.map(|r| r.to_string()))
        .bind(challenge.version)
        .bind(challenge.id.to_string())
        .bind(expected_version)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::VersionConflict {
                challenge_id: challenge.id,
                expected: expected_version,
            });
        }

        Ok(())
    }

    async fn list_active(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<Challenge>, StorageError> {
        let rows = sqlx::query(r#"SELECT * FROM challenges WHERE status = 'ACTIVE'"#)
            .fetch_all(&mut *conn)
            .await?;

        rows.iter().map(challenge_from_row).collect()
    }
}

fn challenge_from_row(row: &SqliteRow) -> Result<Challenge, StorageError> {
    Ok(Challenge {
        id: uuid_column(row, "id")?,
        user_id: uuid_column(row, "user_id")?,
        challenge_type: row.try_get("challenge_type")?,
        initial_balance: decimal_column(row, "initial_balance")?,
        max_daily_drawdown_percent: decimal_column(row, "max_daily_drawdown_percent")?,
        max_total_drawdown_percent: decimal_column(row, "max_total_drawdown_percent")?,
        profit_target_percent: decimal_column(row, "profit_target_percent")?,
        current_equity: decimal_column(row, "current_equity")?,
        max_equity_ever: decimal_column(row, "max_equity_ever")?,
        daily_start_equity: decimal_column(row, "daily_start_equity")?,
        daily_max_equity: decimal_column(row, "daily_max_equity")?,
        daily_min_equity: decimal_column(row, "daily_min_equity")?,
        current_date: row.try_get::<NaiveDate, _>("current_date")?,
        total_trades: row.try_get("total_trades")?,
        total_pnl: decimal_column(row, "total_pnl")?,
        status: row
            .try_get::<String, _>("status")?
            .parse::<ChallengeStatus>()
            .map_err(|_| malformed("status"))?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        started_at: row.try_get::<Option<DateTime<Utc>>, _>("started_at")?,
        ended_at: row.try_get::<Option<DateTime<Utc>>, _>("ended_at")?,
        last_trade_at: row.try_get::<Option<DateTime<Utc>>, _>("last_trade_at")?,
        funded_at: row.try_get::<Option<DateTime<Utc>>, _>("funded_at")?,
        failure_reason: row
            .try_get::<Option<String>, _>("failure_reason")?
            .map(|raw| raw.parse::<FailureReason>().map_err(|_| malformed("failure_reason")))
            .transpose()?,
        version: row.try_get("version")?,
    })
}

fn uuid_column(row: &SqliteRow, field: &'static str) -> Result<Uuid, StorageError> {
    let raw: String = row.try_get(field)?;
    Uuid::parse_str(&raw).map_err(|_| malformed(field))
}

fn decimal_column(row: &SqliteRow, field: &'static str) -> Result<Decimal, StorageError> {
    let raw: String = row.try_get(field)?;
    Decimal::from_str(&raw).map_err(|_| malformed(field))
}

fn malformed(field: &'static str) -> StorageError {
    StorageError::Malformed {
        entity: "challenge",
        field,
    }
}
