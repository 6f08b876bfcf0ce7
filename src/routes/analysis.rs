//! Analysis endpoints.
//!
//! Drive the document-analysis pipeline either ad hoc (a set of URLs in
//! the request body) or against a stored home document. Audit logging and
//! the home-document write-back are best-effort: their failure never
//! fails a request that produced a result.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::domain::analysis::{AdHocAnalysisRequest, AnalysisResponse, DocumentAnalyzeRequest};
use crate::error::{ApiError, ApiResult};
use crate::pipeline::{AnalysisJob, AnalysisOutcome, PromptSelector, DEFAULT_ANALYSIS_PROMPT_KEY};
use crate::services::audit::{self, AuditRecord};

/// POST /analysis
///
/// Analyze a set of document URLs directly.
pub async fn analyze_adhoc(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdHocAnalysisRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.urls.is_empty() {
        return Err(ApiError::BadRequest("urls must not be empty".to_string()));
    }

    let prompt = match (&req.prompt, &req.prompt_key) {
        (Some(text), None) => PromptSelector::Literal(text.clone()),
        (None, Some(key)) => PromptSelector::Key(key.clone()),
        _ => {
            return Err(ApiError::BadRequest(
                "exactly one of prompt or prompt_key is required".to_string(),
            ))
        }
    };

    let outcome = state
        .pipeline
        .analyze(AnalysisJob {
            urls: req.urls.clone(),
            prompt,
            model: req.model.clone(),
            supports_images: req.supports_images,
            extra_context: req.extra_context.clone(),
        })
        .await?;

    audit::record_analysis(
        &state.db,
        AuditRecord {
            user_email: req.user_email.as_deref(),
            mode: "adhoc",
            prompt: &outcome.prompt_text,
            urls: &req.urls,
            model: &outcome.model,
            response_text: &outcome.raw,
            usage: outcome.usage.as_ref(),
        },
    )
    .await;

    Ok(Json(DataResponse::new(to_response(outcome))))
}

/// POST /homes/:home_id/documents/:document_id/analyze
///
/// Run the pipeline over a stored document's URL (plus optional sibling
/// URLs) and overwrite the document's analysis wholesale.
pub async fn analyze_document(
    State(state): State<Arc<AppState>>,
    Path((home_id, document_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<DocumentAnalyzeRequest>,
) -> ApiResult<impl IntoResponse> {
    let document_url: Option<String> = sqlx::query_scalar(
        "SELECT url FROM home_documents WHERE id = $1 AND home_id = $2",
    )
    .bind(document_id)
    .bind(home_id)
    .fetch_optional(&state.db)
    .await?;

    let document_url =
        document_url.ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;

    let mut urls = vec![document_url];
    urls.extend(req.include_urls.iter().cloned());

    let prompt_key = req
        .prompt_key
        .clone()
        .unwrap_or_else(|| DEFAULT_ANALYSIS_PROMPT_KEY.to_string());

    let outcome = state
        .pipeline
        .analyze(AnalysisJob {
            urls: urls.clone(),
            prompt: PromptSelector::Key(prompt_key),
            model: req.model.clone(),
            supports_images: None,
            extra_context: None,
        })
        .await?;

    // Best-effort write-back: the analysis is still returned even if the
    // document row could not be updated.
    let write_back = sqlx::query(
        "UPDATE home_documents SET analysis = $1, analyzed_at = NOW() WHERE id = $2",
    )
    .bind(&outcome.result)
    .bind(document_id)
    .execute(&state.db)
    .await;

    if let Err(e) = write_back {
        tracing::warn!(
            document_id = %document_id,
            error = %e,
            "Failed to persist analysis to home document"
        );
    }

    audit::record_analysis(
        &state.db,
        AuditRecord {
            user_email: req.user_email.as_deref(),
            mode: "document",
            prompt: &outcome.prompt_text,
            urls: &urls,
            model: &outcome.model,
            response_text: &outcome.raw,
            usage: outcome.usage.as_ref(),
        },
    )
    .await;

    Ok(Json(DataResponse::new(to_response(outcome))))
}

fn to_response(outcome: AnalysisOutcome) -> AnalysisResponse {
    AnalysisResponse {
        result: outcome.result,
        raw: outcome.raw,
        attempts: outcome.attempts,
        model: outcome.model,
        usage: outcome.usage,
    }
}
