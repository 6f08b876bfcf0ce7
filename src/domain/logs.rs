//! Audit log domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Append-only record of one analysis invocation. Written after every
/// pipeline run; never mutated or deleted by the application.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AiLogEntry {
    pub id: Uuid,
    pub user_email: Option<String>,
    pub mode: String,
    pub prompt: String,
    pub urls: Value,
    pub model: String,
    pub response_text: String,
    pub usage: Option<Value>,
    pub created_at: DateTime<Utc>,
}
