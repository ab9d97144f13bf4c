use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct TokenUsageRow {
    pub user_id: Uuid,
    pub used_tokens: i64,
    pub updated_at: DateTime<Utc>,
}
