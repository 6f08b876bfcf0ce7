//! Home and home-document domain types.
//!
//! A home is the per-project parent record; its documents reference plan
//! files by URL and carry the latest analysis object, overwritten
//! wholesale each time the pipeline runs for that document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Document type enum
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HomeDocumentType {
    Plan,
    Bid,
    Permit,
    Contract,
    Photo,
    Other,
}

impl Default for HomeDocumentType {
    fn default() -> Self {
        Self::Other
    }
}

impl HomeDocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Bid => "bid",
            Self::Permit => "permit",
            Self::Contract => "contract",
            Self::Photo => "photo",
            Self::Other => "other",
        }
    }
}

/// Home entity
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Home {
    pub id: Uuid,
    pub owner_email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Home document entity
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HomeDocument {
    pub id: Uuid,
    pub home_id: Uuid,
    pub name: String,
    pub url: String,
    pub document_type: String,
    pub analysis: Option<Value>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for creating a home
#[derive(Debug, Clone, Deserialize)]
pub struct CreateHomeRequest {
    pub owner_email: String,
    pub name: String,
}

/// Request DTO for registering a document on a home
#[derive(Debug, Clone, Deserialize)]
pub struct CreateHomeDocumentRequest {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub document_type: HomeDocumentType,
}
