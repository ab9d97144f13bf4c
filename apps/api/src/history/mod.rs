//! History Store: one row per completed analysis, written once and read back
//! verbatim.

pub mod handlers;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::record::AnalysisRecord;
use crate::errors::AppError;
use crate::models::history::AnalysisHistoryRow;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub insights: AnalysisRecord,
    pub file_ref: String,
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<AnalysisHistoryRow> for HistoryEntry {
    type Error = AppError;

    fn try_from(row: AnalysisHistoryRow) -> Result<Self, Self::Error> {
        let insights = serde_json::from_value(row.insights).map_err(|e| {
            AppError::Persistence(format!("history entry {} is unreadable: {e}", row.id))
        })?;
        Ok(HistoryEntry {
            id: row.id,
            insights,
            file_ref: row.file_ref,
            timestamp: row.created_at,
        })
    }
}

/// Converts listed rows, logging and skipping any that no longer decode.
fn readable_entries(rows: Vec<AnalysisHistoryRow>) -> Vec<HistoryEntry> {
    rows.into_iter()
        .filter_map(|row| match HistoryEntry::try_from(row) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping history row: {e}");
                None
            }
        })
        .collect()
}

/// Reads and writes are always scoped to one user.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn save(
        &self,
        user_id: Uuid,
        record: &AnalysisRecord,
        file_ref: &str,
    ) -> Result<Uuid, AppError>;

    /// Newest first.
    async fn list(&self, user_id: Uuid) -> Result<Vec<HistoryEntry>, AppError>;

    /// `NotFound` when the entry does not exist or belongs to someone else.
    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<HistoryEntry, AppError>;
}

pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn save(
        &self,
        user_id: Uuid,
        record: &AnalysisRecord,
        file_ref: &str,
    ) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();
        let insights = serde_json::to_value(record)
            .map_err(|e| AppError::Persistence(format!("history encode: {e}")))?;

        sqlx::query(
            "INSERT INTO analysis_history (id, user_id, insights, file_ref) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(user_id)
        .bind(insights)
        .bind(file_ref)
        .execute(&self.pool)
        .await?;

        info!("Inserted analysis history {id} for user {user_id}");
        Ok(id)
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<HistoryEntry>, AppError> {
        let rows: Vec<AnalysisHistoryRow> = sqlx::query_as(
            "SELECT * FROM analysis_history WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(readable_entries(rows))
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<HistoryEntry, AppError> {
        let row: Option<AnalysisHistoryRow> = sqlx::query_as(
            "SELECT * FROM analysis_history WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::NotFound(format!("Analysis {id} not found")))?
            .try_into()
    }
}
