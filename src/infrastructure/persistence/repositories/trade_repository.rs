use crate::domain::errors::StorageError;
use crate::domain::events::OrderSide;
use crate::domain::repositories::TradeRepository;
use crate::domain::risk::features::TradeRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct SqliteTradeRepository;

impl SqliteTradeRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TradeRepository for SqliteTradeRepository {
    async fn insert(
        &self,
        conn: &mut SqliteConnection,
        trade: &TradeRecord,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO trades (trade_id, challenge_id, symbol, side, quantity, price, realized_pnl, executed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&trade.trade_id)
        .bind(trade.challenge_id.to_string())
        .bind(&trade.symbol)
        .bind(trade.side.to_string())
        .bind(trade.quantity.to_string())
        .bind(trade.price.to_string())
        .bind(trade.realized_pnl.to_string())
        .bind(trade.executed_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn list_for_challenge(
        &self,
        conn: &mut SqliteConnection,
        challenge_id: Uuid,
    ) -> Result<Vec<TradeRecord>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT trade_id, challenge_id, symbol, side, quantity, price, realized_pnl, executed_at
            FROM trades
            WHERE challenge_id = $1
            ORDER BY executed_at
            "#,
        )
        .bind(challenge_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(trade_from_row).collect()
    }
}

fn trade_from_row(row: &SqliteRow) -> Result<TradeRecord, StorageError> {
    Ok(TradeRecord {
        trade_id: row.try_get("trade_id")?,
        challenge_id: {
            let raw: String = row.try_get("challenge_id")?;
            Uuid::parse_str(&raw).map_err(|_| malformed("challenge_id"))?
        },
        symbol: row.try_get("symbol")?,
        side: row
            .try_get::<String, _>("side")?
            .parse::<OrderSide>()
            .map_err(|_| malformed("side"))?,
        quantity: decimal_column(row, "quantity")?,
        price: decimal_column(row, "price")?,
        realized_pnl: decimal_column(row, "realized_pnl")?,
        executed_at: row.try_get::<DateTime<Utc>, _>("executed_at")?,
    })
}

fn decimal_column(row: &SqliteRow, field: &'static str) -> Result<Decimal, StorageError> {
    let raw: String = row.try_get(field)?;
    Decimal::from_str(&raw).map_err(|_| malformed(field))
}

fn malformed(field: &'static str) -> StorageError {
    StorageError::Malformed {
        entity: "trade",
        field,
    }
}
