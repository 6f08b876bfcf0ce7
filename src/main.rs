use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use buildwise_backend::pipeline::content::HttpDocumentSource;
use buildwise_backend::pipeline::AnalysisPipeline;
use buildwise_backend::services::{OpenAiChat, PgPromptStore, PromptResolver};
use buildwise_backend::{app, config, db, logging};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = config::Settings::from_env()?;

    // Initialize logging
    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting Buildwise backend"
    );

    // Create database pool and apply migrations
    let pool = db::create_pool(&settings).await?;
    db::run_migrations(&pool).await?;

    // Shared HTTP client for document fetches and model calls
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.model_timeout_seconds))
        .build()?;

    // Model provider client
    let model = OpenAiChat::new(
        http_client.clone(),
        &settings.openai_api_key,
        &settings.openai_base_url,
        &settings.vision_model,
    );

    // Prompt resolver with in-process TTL cache
    let prompts = PromptResolver::new(
        Arc::new(PgPromptStore::new(pool.clone())),
        Duration::from_secs(settings.prompt_cache_ttl_seconds),
    );

    // Analysis pipeline
    let pipeline = AnalysisPipeline::new(
        Arc::new(model),
        Arc::new(HttpDocumentSource::new(http_client)),
        prompts.clone(),
        settings.default_model.clone(),
    );

    // Create application state
    let state = app::AppState::new(pool, settings.clone(), prompts, pipeline);

    // Build application
    let app = app::create_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
