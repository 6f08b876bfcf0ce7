//! Prompt template administration.
//!
//! Simple keyed CRUD over the prompt store: last write wins, uniqueness
//! on key. Mutations invalidate the resolver's local cache so this
//! process observes edits immediately; other processes converge within
//! the cache TTL.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::{Paginated, PaginationParams};
use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::domain::prompts::{
    CreatePromptRequest, PromptQuery, PromptTemplate, UpdatePromptRequest,
};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize, Default)]
pub struct PromptQueryParams {
    #[serde(flatten)]
    pub pagination: PaginationParams,
    #[serde(flatten)]
    pub filter: PromptQuery,
}

/// GET /prompts
pub async fn list_prompts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PromptQueryParams>,
) -> ApiResult<impl IntoResponse> {
    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM prompts
        WHERE ($1::text IS NULL OR key ILIKE '%' || $1 || '%')
        "#,
    )
    .bind(&query.filter.search)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, PromptTemplate>(
        r#"
        SELECT id, key, text, model, supports_images, context_config,
               created_at, updated_at
        FROM prompts
        WHERE ($1::text IS NULL OR key ILIKE '%' || $1 || '%')
        ORDER BY key
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(&query.filter.search)
    .bind(query.pagination.limit() as i64)
    .bind(query.pagination.offset() as i64)
    .fetch_all(&state.db)
    .await?;

    Ok(Paginated::new(rows, &query.pagination, total as u64))
}

/// POST /prompts
pub async fn create_prompt(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreatePromptRequest>,
) -> ApiResult<impl IntoResponse> {
    if input.key.trim().is_empty() {
        return Err(ApiError::BadRequest("key must not be empty".to_string()));
    }

    let row = sqlx::query_as::<_, PromptTemplate>(
        r#"
        INSERT INTO prompts (id, key, text, model, supports_images, context_config)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, key, text, model, supports_images, context_config,
                  created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&input.key)
    .bind(&input.text)
    .bind(&input.model)
    .bind(input.supports_images.unwrap_or(false))
    .bind(&input.context_config)
    .fetch_one(&state.db)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            ApiError::Conflict(format!("Prompt key already exists: {}", input.key))
        }
        _ => ApiError::Database(e),
    })?;

    Ok(Json(DataResponse::new(row)))
}

/// GET /prompts/:key
pub async fn get_prompt(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let row = sqlx::query_as::<_, PromptTemplate>(
        r#"
        SELECT id, key, text, model, supports_images, context_config,
               created_at, updated_at
        FROM prompts
        WHERE key = $1
        "#,
    )
    .bind(&key)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Prompt not found: {}", key)))?;

    Ok(Json(DataResponse::new(row)))
}

/// PUT /prompts/:key
pub async fn update_prompt(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(input): Json<UpdatePromptRequest>,
) -> ApiResult<impl IntoResponse> {
    let row = sqlx::query_as::<_, PromptTemplate>(
        r#"
        UPDATE prompts SET
            text = $1,
            model = $2,
            supports_images = COALESCE($3, supports_images),
            context_config = $4,
            updated_at = NOW()
        WHERE key = $5
        RETURNING id, key, text, model, supports_images, context_config,
                  created_at, updated_at
        "#,
    )
    .bind(&input.text)
    .bind(&input.model)
    .bind(input.supports_images)
    .bind(&input.context_config)
    .bind(&key)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Prompt not found: {}", key)))?;

    state.prompts.invalidate(&key);

    Ok(Json(DataResponse::new(row)))
}

/// DELETE /prompts/:key
pub async fn delete_prompt(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let result = sqlx::query("DELETE FROM prompts WHERE key = $1")
        .bind(&key)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("Prompt not found: {}", key)));
    }

    state.prompts.invalidate(&key);

    Ok(Json(serde_json::json!({ "success": true })))
}
