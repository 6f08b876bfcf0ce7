//! Prompt template store.
//!
//! The resolver reads through this trait so the pipeline can run against
//! an in-memory store in tests while production hits PostgreSQL.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::prompts::PromptTemplate;

#[async_trait]
pub trait PromptStore: Send + Sync {
    async fn find_by_key(&self, key: &str) -> Result<Option<PromptTemplate>>;
}

/// PostgreSQL-backed prompt store.
#[derive(Clone)]
pub struct PgPromptStore {
    pool: PgPool,
}

impl PgPromptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PromptStore for PgPromptStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<PromptTemplate>> {
        sqlx::query_as::<_, PromptTemplate>(
            r#"
            SELECT id, key, text, model, supports_images, context_config,
                   created_at, updated_at
            FROM prompts
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load prompt template")
    }
}
