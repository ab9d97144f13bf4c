use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::analysis::extract::is_pdf;
use crate::analysis::pipeline::{run_analysis, stage_label, AnalysisOutcome, AnalysisState, DeckUpload};
use crate::analysis::progress::is_valid_job_id;
use crate::auth::extract::CurrentUser;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub job_id: String,
    pub state: AnalysisState,
    pub progress: u8,
    pub stage: &'static str,
    pub finished: bool,
    pub updated_at: DateTime<Utc>,
}

struct UploadForm {
    file_name: String,
    bytes: Bytes,
    job_id: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut file = None;
    let mut job_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("deck.pdf").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;
                file = Some((file_name, bytes));
            }
            Some("job_id") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read job_id: {e}")))?;
                job_id = Some(value.trim().to_string());
            }
            _ => {}
        }
    }

    let (file_name, bytes) =
        file.ok_or_else(|| AppError::Validation("A PDF file is required in the 'file' field".into()))?;
    Ok(UploadForm {
        file_name,
        bytes,
        job_id,
    })
}

/// POST /api/v1/analyses
pub async fn handle_create_analysis(
    State(state): State<AppState>,
    current: CurrentUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<AnalysisOutcome>), AppError> {
    let form = read_upload(multipart).await?;

    if form.bytes.is_empty() {
        return Err(AppError::Validation("The uploaded file is empty".into()));
    }
    if !is_pdf(&form.bytes) {
        return Err(AppError::Validation("Only PDF files are supported".into()));
    }
    let job_id = match form.job_id.filter(|j| !j.is_empty()) {
        Some(job_id) if is_valid_job_id(&job_id) => job_id,
        Some(_) => {
            return Err(AppError::Validation(
                "job_id may only contain letters, digits, '-' and '_' (max 64)".into(),
            ))
        }
        None => Uuid::new_v4().to_string(),
    };

    let outcome = run_analysis(
        &state,
        DeckUpload {
            user_id: current.user.id,
            job_id,
            file_name: form.file_name,
            bytes: form.bytes,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /api/v1/analyses/:job_id/progress
pub async fn handle_get_progress(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(job_id): Path<String>,
) -> Result<Json<ProgressResponse>, AppError> {
    let not_found = || AppError::NotFound(format!("No analysis job '{job_id}'"));
    if !is_valid_job_id(&job_id) {
        return Err(not_found());
    }
    let entry = state
        .progress
        .fetch(current.user.id, &job_id)
        .await?
        .ok_or_else(not_found)?;

    let progress = entry.state.progress();
    Ok(Json(ProgressResponse {
        job_id,
        progress,
        stage: stage_label(progress),
        finished: entry.state.is_terminal(),
        state: entry.state,
        updated_at: entry.updated_at,
    }))
}
