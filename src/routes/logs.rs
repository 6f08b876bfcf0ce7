//! Audit log browsing.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use std::sync::Arc;

use crate::api::pagination::{Paginated, PaginationParams};
use crate::app::AppState;
use crate::domain::logs::AiLogEntry;
use crate::error::ApiResult;

/// GET /ai-logs
///
/// Newest-first listing of analysis invocations. The pipeline itself
/// never reads these back; this endpoint exists for operators.
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<impl IntoResponse> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ai_logs")
        .fetch_one(&state.db)
        .await?;

    let rows = sqlx::query_as::<_, AiLogEntry>(
        r#"
        SELECT id, user_email, mode, prompt, urls, model, response_text, usage, created_at
        FROM ai_logs
        ORDER BY created_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(pagination.limit() as i64)
    .bind(pagination.offset() as i64)
    .fetch_all(&state.db)
    .await?;

    Ok(Paginated::new(rows, &pagination, total as u64))
}
