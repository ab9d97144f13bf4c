//! Per-user token ledger for model calls.

pub mod handlers;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::usage::TokenUsageRow;

/// Rough token count for budgeting: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub used_tokens: u64,
    pub max_tokens: u64,
    pub percentage: f64,
}

impl TokenUsage {
    pub fn new(used_tokens: u64, max_tokens: u64) -> Self {
        let percentage = if max_tokens == 0 {
            100.0
        } else {
            (used_tokens as f64 / max_tokens as f64 * 100.0).min(100.0)
        };
        Self {
            used_tokens,
            max_tokens,
            percentage,
        }
    }
}

#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Zero for a user with no recorded usage.
    async fn used_tokens(&self, user_id: Uuid) -> Result<u64, AppError>;

    /// Adds `tokens` to the user's counter and returns the new total.
    async fn record(&self, user_id: Uuid, tokens: u64) -> Result<u64, AppError>;
}

pub struct PgUsageLedger {
    pool: PgPool,
}

impl PgUsageLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_db(tokens: u64) -> i64 {
    i64::try_from(tokens).unwrap_or(i64::MAX)
}

fn from_db(tokens: i64) -> u64 {
    u64::try_from(tokens).unwrap_or(0)
}

#[async_trait]
impl UsageLedger for PgUsageLedger {
    async fn used_tokens(&self, user_id: Uuid) -> Result<u64, AppError> {
        let row: Option<TokenUsageRow> =
            sqlx::query_as("SELECT * FROM token_usage WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| from_db(r.used_tokens)).unwrap_or(0))
    }

    async fn record(&self, user_id: Uuid, tokens: u64) -> Result<u64, AppError> {
        let row: TokenUsageRow = sqlx::query_as(
            r#"
            INSERT INTO token_usage (user_id, used_tokens, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (user_id)
            DO UPDATE SET used_tokens = token_usage.used_tokens + EXCLUDED.used_tokens,
                          updated_at = now()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(to_db(tokens))
        .fetch_one(&self.pool)
        .await?;
        tracing::debug!(
            "User {} token usage now {} (updated {})",
            row.user_id,
            row.used_tokens,
            row.updated_at
        );
        Ok(from_db(row.used_tokens))
    }
}
