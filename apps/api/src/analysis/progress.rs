use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::pipeline::AnalysisState;
use crate::errors::AppError;

const PROGRESS_TTL_SECS: u64 = 60 * 60;

/// Latest published state of one analysis job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    pub user_id: Uuid,
    pub state: AnalysisState,
    pub updated_at: DateTime<Utc>,
}

/// Where in-flight analysis state is published so clients can poll it.
#[async_trait]
pub trait ProgressTracker: Send + Sync {
    async fn publish(&self, job_id: &str, entry: &ProgressEntry) -> Result<(), AppError>;
    async fn fetch(&self, user_id: Uuid, job_id: &str) -> Result<Option<ProgressEntry>, AppError>;
}

/// Job ids are chosen by clients, so the key is scoped to the owning user.
pub fn progress_key(user_id: Uuid, job_id: &str) -> String {
    format!("analysis:progress:{user_id}:{job_id}")
}

/// Job ids come from the client, so keep them to a safe key alphabet.
pub fn is_valid_job_id(job_id: &str) -> bool {
    (1..=64).contains(&job_id.len())
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Redis-backed tracker. Each job is one JSON value with a one hour TTL.
#[derive(Clone)]
pub struct RedisProgressTracker {
    client: redis::Client,
}

impl RedisProgressTracker {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProgressTracker for RedisProgressTracker {
    async fn publish(&self, job_id: &str, entry: &ProgressEntry) -> Result<(), AppError> {
        let payload = serde_json::to_string(entry)
            .map_err(|e| AppError::Persistence(format!("progress encode: {e}")))?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(progress_key(entry.user_id, job_id), payload, PROGRESS_TTL_SECS)
            .await?;
        Ok(())
    }

    async fn fetch(&self, user_id: Uuid, job_id: &str) -> Result<Option<ProgressEntry>, AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(progress_key(user_id, job_id)).await?;
        payload
            .map(|p| {
                serde_json::from_str(&p)
                    .map_err(|e| AppError::Persistence(format!("progress decode: {e}")))
            })
            .transpose()
    }
}
