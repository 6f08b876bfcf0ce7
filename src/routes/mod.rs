pub mod analysis;
pub mod health;
pub mod homes;
pub mod logs;
pub mod prompts;

use axum::{routing::delete, routing::get, routing::post, routing::put, Router};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        // Ad-hoc analysis
        .route("/analysis", post(analysis::analyze_adhoc))
        // Homes
        .route("/homes", post(homes::create_home))
        .route("/homes", get(homes::list_homes))
        .route("/homes/:home_id", get(homes::get_home))
        // Documents (nested under homes)
        .route(
            "/homes/:home_id/documents",
            post(homes::create_document),
        )
        .route("/homes/:home_id/documents", get(homes::list_documents))
        .route(
            "/homes/:home_id/documents/:document_id/analyze",
            post(analysis::analyze_document),
        )
        // Prompt administration
        .route("/prompts", get(prompts::list_prompts))
        .route("/prompts", post(prompts::create_prompt))
        .route("/prompts/:key", get(prompts::get_prompt))
        .route("/prompts/:key", put(prompts::update_prompt))
        .route("/prompts/:key", delete(prompts::delete_prompt))
        // Audit logs
        .route("/ai-logs", get(logs::list_logs))
}
