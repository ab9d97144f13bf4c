use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::analysis::display::ReportView;
use crate::analysis::report::render_report_md;
use crate::auth::extract::CurrentUser;
use crate::errors::AppError;
use crate::history::HistoryEntry;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HistoryDetail {
    #[serde(flatten)]
    pub entry: HistoryEntry,
    pub view: ReportView,
}

/// GET /api/v1/history
pub async fn handle_list_history(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    Ok(Json(state.history.list(current.user.id).await?))
}

/// GET /api/v1/history/:id
pub async fn handle_get_history(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<HistoryDetail>, AppError> {
    let entry = state.history.get(current.user.id, id).await?;
    let view = ReportView::from_record(&entry.insights);
    Ok(Json(HistoryDetail { entry, view }))
}

/// GET /api/v1/history/:id/report
pub async fn handle_download_report(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let entry = state.history.get(current.user.id, id).await?;
    let body = render_report_md(&entry.insights);
    let disposition = format!("attachment; filename=\"analysis-{id}.md\"");
    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
