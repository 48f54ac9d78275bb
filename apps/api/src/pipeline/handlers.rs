//! Axum route handlers for the Search API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::document::{Comment, DocumentRow};
use crate::models::search::SearchRun;
use crate::pipeline::{PipelineError, RunOutcome, RunReport, SearchRequest};
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 10;
const DEFAULT_TOP_DAYS: i64 = 7;
const DEFAULT_TOP_LIMIT: i64 = 20;
const DEFAULT_COMMENT_LIMIT: i64 = 10;
const MAX_PAGE: i64 = 100;
const MAX_TOP_DAYS: i64 = 3650;

// ────────────────────────────────────────────────────────────────────────────
// Query types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CommentsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    pub days: Option<i64>,
    pub limit: Option<i64>,
}

fn page_limit(limit: Option<i64>, default: i64) -> Result<i64, AppError> {
    let limit = limit.unwrap_or(default);
    if !(1..=MAX_PAGE).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_PAGE}"
        )));
    }
    Ok(limit)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/searches
///
/// Runs the full pipeline for one keyword/community configuration.
pub async fn handle_create_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<(StatusCode, Json<RunReport>), AppError> {
    let outcome = state.pipeline.run(request).await;
    debug!("Search request finished in state {}", outcome.stage());
    match outcome {
        RunOutcome::Succeeded(report) => Ok((StatusCode::CREATED, Json(report))),
        RunOutcome::Failed {
            error: PipelineError::InvalidInput(msg),
            ..
        } => Err(AppError::Validation(msg)),
        RunOutcome::Failed { failed_at, error } => Err(AppError::RunFailed {
            stage: failed_at,
            message: error.to_string(),
        }),
    }
}

/// GET /api/v1/searches
pub async fn handle_recent_searches(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<SearchRun>>, AppError> {
    let limit = page_limit(params.limit, DEFAULT_HISTORY_LIMIT)?;
    Ok(Json(state.store.recent_runs(limit).await?))
}

/// GET /api/v1/searches/:id/documents
pub async fn handle_search_documents(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DocumentRow>>, AppError> {
    Ok(Json(state.store.documents_for_run(id).await?))
}

/// GET /api/v1/documents/top
pub async fn handle_top_documents(
    State(state): State<AppState>,
    Query(params): Query<TopQuery>,
) -> Result<Json<Vec<DocumentRow>>, AppError> {
    let days = params.days.unwrap_or(DEFAULT_TOP_DAYS);
    if !(1..=MAX_TOP_DAYS).contains(&days) {
        return Err(AppError::Validation(format!(
            "days must be between 1 and {MAX_TOP_DAYS}"
        )));
    }
    let limit = page_limit(params.limit, DEFAULT_TOP_LIMIT)?;
    Ok(Json(state.store.top_documents(days, limit).await?))
}

/// GET /api/v1/comments/:external_id
///
/// Reads the comment thread live from the source; nothing is persisted.
pub async fn handle_document_comments(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
    Query(params): Query<CommentsQuery>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let limit = page_limit(params.limit, DEFAULT_COMMENT_LIMIT)?;
    Ok(Json(state.source.comments(&external_id, limit as u32).await?))
}
