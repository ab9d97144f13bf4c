use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;

const FALLBACK_FILE_NAME: &str = "deck.pdf";

/// Keeps the original uploaded deck; the returned reference is stored with
/// the history record.
#[async_trait]
pub trait DeckStore: Send + Sync {
    async fn put(
        &self,
        user_id: Uuid,
        job_id: &str,
        file_name: &str,
        bytes: Bytes,
    ) -> Result<String, AppError>;
}

/// Object key for an uploaded deck: `decks/{user}/{job}/{file}`.
pub fn deck_key(user_id: Uuid, job_id: &str, file_name: &str) -> String {
    format!("decks/{user_id}/{job_id}/{}", sanitize_file_name(file_name))
}

fn sanitize_file_name(name: &str) -> String {
    // Browsers may send a full client path.
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(['.', '_']).is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        cleaned
    }
}

pub struct S3DeckStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3DeckStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl DeckStore for S3DeckStore {
    async fn put(
        &self,
        user_id: Uuid,
        job_id: &str,
        file_name: &str,
        bytes: Bytes,
    ) -> Result<String, AppError> {
        let key = deck_key(user_id, job_id, file_name);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type("application/pdf")
            .send()
            .await
            .map_err(|e| AppError::Persistence(format!("S3 upload failed: {e}")))?;

        let file_ref = format!("s3://{}/{}", self.bucket, key);
        info!("Uploaded deck to {file_ref}");
        Ok(file_ref)
    }
}
