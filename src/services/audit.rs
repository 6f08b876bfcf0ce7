//! Append-only audit log for analysis invocations.
//!
//! Writes are best-effort: a failed audit insert is logged and never
//! fails the request that produced the analysis.

use serde_json::json;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::domain::analysis::TokenUsage;

/// One analysis invocation to record.
#[derive(Debug)]
pub struct AuditRecord<'a> {
    pub user_email: Option<&'a str>,
    pub mode: &'a str,
    pub prompt: &'a str,
    pub urls: &'a [String],
    pub model: &'a str,
    pub response_text: &'a str,
    pub usage: Option<&'a TokenUsage>,
}

/// Append an audit record, swallowing (but logging) failures.
pub async fn record_analysis(pool: &PgPool, record: AuditRecord<'_>) {
    if let Err(e) = insert(pool, &record).await {
        warn!(error = %e, mode = record.mode, "Failed to write audit log");
    }
}

async fn insert(pool: &PgPool, record: &AuditRecord<'_>) -> sqlx::Result<()> {
    let usage = record
        .usage
        .map(|u| json!({
            "prompt_tokens": u.prompt_tokens,
            "completion_tokens": u.completion_tokens,
            "total_tokens": u.total_tokens,
        }));

    sqlx::query(
        r#"
        INSERT INTO ai_logs (id, user_email, mode, prompt, urls, model, response_text, usage)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(record.user_email)
    .bind(record.mode)
    .bind(record.prompt)
    .bind(json!(record.urls))
    .bind(record.model)
    .bind(record.response_text)
    .bind(usage)
    .execute(pool)
    .await?;

    Ok(())
}
