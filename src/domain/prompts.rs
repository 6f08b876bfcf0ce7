//! Prompt template domain types.
//!
//! Prompt templates are admin-managed, keyed text blobs the pipeline
//! resolves at analysis time. `context_config` carries optional per-prompt
//! tuning (currently `temperature`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Stored prompt template.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PromptTemplate {
    pub id: Uuid,
    pub key: String,
    pub text: String,
    pub model: Option<String>,
    pub supports_images: bool,
    pub context_config: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromptTemplate {
    /// Per-prompt temperature override from `context_config.temperature`.
    pub fn temperature(&self) -> Option<f32> {
        self.context_config
            .as_ref()
            .and_then(|c| c.get("temperature"))
            .and_then(|t| t.as_f64())
            .map(|t| t as f32)
    }
}

/// Request DTO for creating a prompt template.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePromptRequest {
    pub key: String,
    pub text: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub supports_images: Option<bool>,
    #[serde(default)]
    pub context_config: Option<Value>,
}

/// Request DTO for updating a prompt template (full replace of mutable
/// fields; last write wins).
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePromptRequest {
    pub text: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub supports_images: Option<bool>,
    #[serde(default)]
    pub context_config: Option<Value>,
}

/// Prompt filter query for the admin list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptQuery {
    pub search: Option<String>,
}
