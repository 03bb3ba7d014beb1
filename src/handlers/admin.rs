use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::report::issues_csv_string;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct IssueQuery {
    #[serde(default)]
    pub include_resolved: bool,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub note: String,
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/reconciliation/issues", get(list_issues))
        .route("/reconciliation/issues.csv", get(export_issues_csv))
        .route("/reconciliation/issues/:id/resolve", post(resolve_issue))
}

pub async fn list_issues(
    State(state): State<AppState>,
    Query(query): Query<IssueQuery>,
) -> Result<impl IntoResponse, AppError> {
    let issues = state.store.list_issues(query.include_resolved).await?;
    Ok(Json(issues))
}

pub async fn export_issues_csv(
    State(state): State<AppState>,
    Query(query): Query<IssueQuery>,
) -> Result<impl IntoResponse, AppError> {
    let issues = state.store.list_issues(query.include_resolved).await?;
    let csv = issues_csv_string(&issues).map_err(|e| AppError::Internal(e.to_string()))?;
    let filename = format!(
        "attachment; filename=\"reconciliation_issues_{}.csv\"",
        chrono::Utc::now().format("%Y-%m-%d")
    );
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, filename),
        ],
        csv,
    ))
}

pub async fn resolve_issue(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ResolveRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.note.trim().is_empty() {
        return Err(AppError::Validation("note must not be empty".to_string()));
    }
    let issue = state.store.resolve_issue(id, request.note.trim()).await?;
    tracing::info!(issue_id = %id, order_code = %issue.provider_order_code, "Reconciliation issue resolved");
    Ok(Json(issue))
}
