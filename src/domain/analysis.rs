//! Analysis domain types.
//!
//! The model is asked for a fixed, schema-constrained shape; these types
//! cover the request DTOs, the JSON schema sent to the provider, and the
//! narrow typed views the quality gate needs (rooms and their dimensions).
//! The full result intentionally stays a `serde_json::Value`: every field
//! is optional/nullable and the normalizer works structurally.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Schema name passed to the provider's structured-output mode.
pub const ANALYSIS_SCHEMA_NAME: &str = "plan_analysis";

/// Token usage reported by the model provider (absent in structured mode
/// with some providers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// =============================================================================
// Request/Response DTOs
// =============================================================================

/// Ad-hoc analysis request: analyze a set of document URLs directly.
#[derive(Debug, Clone, Deserialize)]
pub struct AdHocAnalysisRequest {
    pub urls: Vec<String>,
    /// Literal prompt text. Exactly one of `prompt` / `prompt_key` is required.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Key of a stored prompt template.
    #[serde(default)]
    pub prompt_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub supports_images: Option<bool>,
    #[serde(default)]
    pub extra_context: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
}

/// Analyze a stored home document (plus optional sibling URLs).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentAnalyzeRequest {
    #[serde(default)]
    pub prompt_key: Option<String>,
    #[serde(default)]
    pub include_urls: Vec<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
}

/// Externally visible analysis result.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    /// Normalized structured result (nulls pruned, nested fields mirrored).
    pub result: Value,
    /// Text serialization of `result`, kept so audit records always carry
    /// a textual form regardless of extraction mode.
    pub raw: String,
    pub attempts: u32,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

// =============================================================================
// Typed views used by the quality gate
// =============================================================================

/// Room dimensions as the schema names them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDimensions {
    pub length_ft: Option<f64>,
    pub width_ft: Option<f64>,
    pub area_sq_ft: Option<f64>,
}

/// One entry of `roomAnalysis`. Only the fields the completeness
/// heuristics inspect are typed; everything else rides along in the raw
/// value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomEntry {
    pub name: Option<String>,
    pub dimensions: Option<RoomDimensions>,
    pub windows: Option<i64>,
}

// =============================================================================
// Schema + fallback shape
// =============================================================================

/// The well-defined empty result substituted when every attempt returned
/// an empty object. Callers always receive this shape, never `{}`.
pub fn empty_analysis() -> Value {
    json!({
        "projectInfo": {},
        "functionalScores": {},
        "roomAnalysis": [],
        "costAnalysis": {},
        "accessibilityComfort": {},
        "suggestedTasks": []
    })
}

/// Strict JSON schema for the plan-analysis structured output.
///
/// Every property is required-but-nullable: strict structured-output modes
/// demand all keys be listed in `required`, so optionality is expressed as
/// `null`. This is why the normalizer prunes explicit nulls afterwards.
pub fn analysis_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": [
            "projectInfo",
            "functionalScores",
            "roomAnalysis",
            "costAnalysis",
            "accessibilityComfort",
            "suggestedTasks"
        ],
        "properties": {
            "projectInfo": {
                "type": "object",
                "additionalProperties": false,
                "required": [
                    "houseType", "roofType", "address", "squareFootage",
                    "stories", "bedrooms", "bathrooms", "garageSpaces"
                ],
                "properties": {
                    "houseType": {"type": ["string", "null"]},
                    "roofType": {"type": ["string", "null"]},
                    "address": {"type": ["string", "null"]},
                    "squareFootage": {"type": ["number", "null"]},
                    "stories": {"type": ["integer", "null"]},
                    "bedrooms": {"type": ["integer", "null"]},
                    "bathrooms": {"type": ["number", "null"]},
                    "garageSpaces": {"type": ["integer", "null"]}
                }
            },
            "functionalScores": {
                "type": "object",
                "additionalProperties": false,
                "required": [
                    "layoutScore", "naturalLightScore", "storageScore",
                    "energyEfficiencyScore", "overallScore"
                ],
                "properties": {
                    "layoutScore": {"type": ["number", "null"]},
                    "naturalLightScore": {"type": ["number", "null"]},
                    "storageScore": {"type": ["number", "null"]},
                    "energyEfficiencyScore": {"type": ["number", "null"]},
                    "overallScore": {"type": ["number", "null"]}
                }
            },
            "roomAnalysis": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": [
                        "name", "level", "dimensions", "windows", "doors",
                        "features", "notes"
                    ],
                    "properties": {
                        "name": {"type": ["string", "null"]},
                        "level": {"type": ["string", "null"]},
                        "dimensions": {
                            "type": ["object", "null"],
                            "additionalProperties": false,
                            "required": ["lengthFt", "widthFt", "areaSqFt"],
                            "properties": {
                                "lengthFt": {"type": ["number", "null"]},
                                "widthFt": {"type": ["number", "null"]},
                                "areaSqFt": {"type": ["number", "null"]}
                            }
                        },
                        "windows": {"type": ["integer", "null"]},
                        "doors": {"type": ["integer", "null"]},
                        "features": {
                            "type": ["array", "null"],
                            "items": {"type": "string"}
                        },
                        "notes": {"type": ["string", "null"]}
                    }
                }
            },
            "costAnalysis": {
                "type": "object",
                "additionalProperties": false,
                "required": [
                    "estimatedTotalCost", "costPerSqFt", "breakdown", "confidence"
                ],
                "properties": {
                    "estimatedTotalCost": {"type": ["number", "null"]},
                    "costPerSqFt": {"type": ["number", "null"]},
                    "breakdown": {
                        "type": ["array", "null"],
                        "items": {
                            "type": "object",
                            "additionalProperties": false,
                            "required": ["category", "estimatedCost"],
                            "properties": {
                                "category": {"type": ["string", "null"]},
                                "estimatedCost": {"type": ["number", "null"]}
                            }
                        }
                    },
                    "confidence": {"type": ["number", "null"]}
                }
            },
            "accessibilityComfort": {
                "type": "object",
                "additionalProperties": false,
                "required": [
                    "singleFloorLiving", "wideDoorways", "stepFreeEntry", "notes"
                ],
                "properties": {
                    "singleFloorLiving": {"type": ["boolean", "null"]},
                    "wideDoorways": {"type": ["boolean", "null"]},
                    "stepFreeEntry": {"type": ["boolean", "null"]},
                    "notes": {"type": ["string", "null"]}
                }
            },
            "suggestedTasks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["title", "trade", "phase", "description"],
                    "properties": {
                        "title": {"type": ["string", "null"]},
                        "trade": {"type": ["string", "null"]},
                        "phase": {"type": ["string", "null"]},
                        "description": {"type": ["string", "null"]}
                    }
                }
            }
        }
    })
}
