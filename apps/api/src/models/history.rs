use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct AnalysisHistoryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub insights: Value,
    pub file_ref: String,
    pub created_at: DateTime<Utc>,
}
