//! Home and home-document endpoints.
//!
//! Boundary CRUD for the parent records the pipeline writes analyses
//! into. Documents are registered by URL; their `analysis` field is only
//! ever written by the analysis endpoints.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::{Paginated, PaginationParams};
use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::domain::homes::{CreateHomeDocumentRequest, CreateHomeRequest, Home, HomeDocument};
use crate::error::{ApiError, ApiResult};

/// POST /homes
pub async fn create_home(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateHomeRequest>,
) -> ApiResult<impl IntoResponse> {
    let row = sqlx::query_as::<_, Home>(
        r#"
        INSERT INTO homes (id, owner_email, name)
        VALUES ($1, $2, $3)
        RETURNING id, owner_email, name, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&input.owner_email)
    .bind(&input.name)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(DataResponse::new(row)))
}

/// GET /homes
pub async fn list_homes(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<impl IntoResponse> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM homes")
        .fetch_one(&state.db)
        .await?;

    let rows = sqlx::query_as::<_, Home>(
        r#"
        SELECT id, owner_email, name, created_at, updated_at
        FROM homes
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

/// GET /homes/:home_id
pub async fn get_home(
    State(state): State<Arc<AppState>>,
    Path(home_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let row = sqlx::query_as::<_, Home>(
        r#"
        SELECT id, owner_email, name, created_at, updated_at
        FROM homes
        WHERE id = $1
        "#,
    )
    .bind(home_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound("Home not found".to_string()))?;

    Ok(Json(DataResponse::new(row)))
}

/// POST /homes/:home_id/documents
pub async fn create_document(
    State(state): State<Arc<AppState>>,
    Path(home_id): Path<Uuid>,
    Json(input): Json<CreateHomeDocumentRequest>,
) -> ApiResult<impl IntoResponse> {
    let home_exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM homes WHERE id = $1")
        .bind(home_id)
        .fetch_optional(&state.db)
        .await?;

    if home_exists.is_none() {
        return Err(ApiError::NotFound("Home not found".to_string()));
    }

    let row = sqlx::query_as::<_, HomeDocument>(
        r#"
        INSERT INTO home_documents (id, home_id, name, url, document_type)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, home_id, name, url, document_type, analysis, analyzed_at, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(home_id)
    .bind(&input.name)
    .bind(&input.url)
    .bind(input.document_type.as_str())
    .fetch_one(&state.db)
    .await?;

    Ok(Json(DataResponse::new(row)))
}

/// GET /homes/:home_id/documents
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    Path(home_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let rows = sqlx::query_as::<_, HomeDocument>(
        r#"
        SELECT id, home_id, name, url, document_type, analysis, analyzed_at, created_at
        FROM home_documents
        WHERE home_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(home_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(DataResponse::new(rows)))
}
