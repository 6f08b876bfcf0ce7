//! Chat/vision model client.
//!
//! Speaks the OpenAI-style chat-completions API: one system message, one
//! user message (plain text or multi-part text+image), optional strict
//! JSON-schema constrained output. The client holds no state between
//! calls; provider errors propagate verbatim and are never retried here —
//! quality-driven retry is the critique loop's job.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::domain::analysis::TokenUsage;

/// Model family markers that are vision-capable. A requested model whose
/// name contains one of these markers is kept as-is when images are
/// present; any other name is substituted with the configured vision
/// default. Extending this table is the supported path for new families.
pub const VISION_MODEL_MARKERS: &[&str] = &["gpt-4o", "gpt-4.1"];

/// Maximum image parts attached to a single user message.
pub const MAX_IMAGE_PARTS: usize = 10;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model provider returned {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("model response contained no choices")]
    EmptyResponse,

    #[error("failed to parse structured output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Schema constraint for structured output.
#[derive(Debug, Clone)]
pub struct SchemaSpec {
    pub name: String,
    pub schema: Value,
}

/// One model invocation.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// Image URLs for multi-part vision input. Capped at [`MAX_IMAGE_PARTS`].
    pub image_urls: Vec<String>,
    pub model: String,
    pub temperature: f32,
    /// When set, the provider is asked for schema-constrained output and
    /// the result is [`ModelOutput::Data`].
    pub schema: Option<SchemaSpec>,
}

/// Provider output: free text, or a parsed schema-constrained object.
#[derive(Debug, Clone)]
pub enum ModelOutput {
    Text {
        text: String,
        usage: Option<TokenUsage>,
    },
    Data {
        data: Value,
        usage: Option<TokenUsage>,
    },
}

/// Seam between the pipeline and the model provider, so the critique loop
/// can run against scripted stubs in tests.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn execute(&self, request: ModelRequest) -> Result<ModelOutput, ModelError>;
}

/// Pick the model actually sent to the provider when image parts are
/// attached: keep a recognized vision-capable name, substitute the
/// configured default otherwise.
pub fn ensure_vision_capable(requested: &str, vision_default: &str) -> String {
    if VISION_MODEL_MARKERS.iter().any(|m| requested.contains(m)) {
        requested.to_string()
    } else {
        vision_default.to_string()
    }
}

/// OpenAI-backed [`ChatModel`] implementation.
#[derive(Clone)]
pub struct OpenAiChat {
    client: Client,
    api_key: String,
    base_url: String,
    vision_model: String,
}

impl OpenAiChat {
    pub fn new(
        client: Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        vision_model: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            vision_model: vision_model.into(),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    #[instrument(skip(self, request), fields(model = %request.model, images = request.image_urls.len()))]
    async fn execute(&self, request: ModelRequest) -> Result<ModelOutput, ModelError> {
        let has_images = !request.image_urls.is_empty();

        let model = if has_images {
            ensure_vision_capable(&request.model, &self.vision_model)
        } else {
            request.model.clone()
        };

        let user_message = user_content(&request.user_prompt, &request.image_urls);

        let structured = request.schema.is_some();
        let body = ChatRequest {
            model: &model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(request.system_prompt.clone()),
                },
                ChatMessage {
                    role: "user",
                    content: user_message,
                },
            ],
            temperature: request.temperature,
            response_format: request.schema.map(|s| ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: s.name,
                    strict: true,
                    schema: s.schema,
                },
            }),
        };

        debug!(model = %model, structured, "model request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ModelError::Api { status, message });
        }

        let chat_response: ChatResponse = response.json().await?;
        let usage = chat_response.usage;
        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(ModelError::EmptyResponse)?;

        if structured {
            let data: Value = serde_json::from_str(&content)?;
            Ok(ModelOutput::Data { data, usage })
        } else {
            Ok(ModelOutput::Text {
                text: content,
                usage,
            })
        }
    }
}

/// Build the user message content: plain text without images, multi-part
/// text plus at most [`MAX_IMAGE_PARTS`] image references otherwise.
fn user_content(prompt: &str, image_urls: &[String]) -> MessageContent {
    if image_urls.is_empty() {
        return MessageContent::Text(prompt.to_string());
    }

    let mut parts = vec![ContentPart::Text {
        text: prompt.to_string(),
    }];
    parts.extend(
        image_urls
            .iter()
            .take(MAX_IMAGE_PARTS)
            .map(|url| ContentPart::ImageUrl {
                image_url: ImageUrl { url: url.clone() },
            }),
    );
    MessageContent::Parts(parts)
}

// Wire types

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Serialize)]
struct JsonSchemaFormat {
    name: String,
    strict: bool,
    schema: Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vision_marker_models_are_kept() {
        assert_eq!(ensure_vision_capable("gpt-4o-mini", "gpt-4o"), "gpt-4o-mini");
        assert_eq!(
            ensure_vision_capable("gpt-4.1-2025-04-14", "gpt-4o"),
            "gpt-4.1-2025-04-14"
        );
    }

    #[test]
    fn non_vision_models_are_substituted() {
        assert_eq!(ensure_vision_capable("gpt-3.5-turbo", "gpt-4o"), "gpt-4o");
        assert_eq!(ensure_vision_capable("some-future-model", "gpt-4o"), "gpt-4o");
    }

    #[test]
    fn image_parts_are_capped_at_ten() {
        let urls: Vec<String> = (0..15).map(|i| format!("https://x/{}.png", i)).collect();
        match user_content("look at these", &urls) {
            MessageContent::Parts(parts) => assert_eq!(parts.len(), 1 + MAX_IMAGE_PARTS),
            MessageContent::Text(_) => panic!("expected multi-part content"),
        }
    }

    #[test]
    fn no_images_means_plain_text_content() {
        match user_content("just text", &[]) {
            MessageContent::Text(text) => assert_eq!(text, "just text"),
            MessageContent::Parts(_) => panic!("expected plain text content"),
        }
    }

    #[test]
    fn image_parts_serialize_as_multipart_content() {
        let part = ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: "https://example.com/plan.png".to_string(),
            },
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "image_url");
        assert_eq!(json["image_url"]["url"], "https://example.com/plan.png");
    }
}
