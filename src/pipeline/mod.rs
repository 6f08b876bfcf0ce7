//! Document-analysis pipeline.
//!
//! Orchestrates one analysis invocation: resolve the prompt, extract
//! content from the source documents, run the critique loop against the
//! model, and normalize the accepted result. Persistence side effects
//! (audit log, home document write-back) live with the callers and are
//! best-effort.

pub mod content;
pub mod critique;
pub mod normalize;

use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

use crate::domain::analysis::TokenUsage;
use crate::error::ApiError;
use crate::services::model_client::ChatModel;
use crate::services::prompt_resolver::{PromptResolver, ResolvedPrompt};
use content::{DocumentSource, MAX_EXTRA_CONTEXT_CHARS};

/// Sampling temperature when neither the request nor the stored prompt
/// overrides it.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Prompt key used for stored-document analysis when the caller does not
/// name one.
pub const DEFAULT_ANALYSIS_PROMPT_KEY: &str = "plan_analysis";

/// Fixed system instruction for every analysis call.
pub const ANALYSIS_SYSTEM_PROMPT: &str = "You are an expert residential construction analyst. \
You read architectural plans, bids, and project documents and produce precise, conservative \
structured analyses. Use only information present in the supplied documents; leave fields null \
when the documents do not support a value.";

/// How the caller names the prompt.
#[derive(Debug, Clone)]
pub enum PromptSelector {
    /// Literal prompt text supplied inline.
    Literal(String),
    /// Key of a stored prompt template.
    Key(String),
}

/// One pipeline invocation.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub urls: Vec<String>,
    pub prompt: PromptSelector,
    pub model: Option<String>,
    pub supports_images: Option<bool>,
    pub extra_context: Option<String>,
}

/// Result of one pipeline invocation, ready for the caller and for the
/// audit record.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub result: Value,
    pub raw: String,
    pub attempts: u32,
    pub model: String,
    pub prompt_text: String,
    pub usage: Option<TokenUsage>,
}

/// The analysis pipeline. Cheap to clone; holds no per-request state.
#[derive(Clone)]
pub struct AnalysisPipeline {
    model: Arc<dyn ChatModel>,
    source: Arc<dyn DocumentSource>,
    prompts: PromptResolver,
    default_model: String,
}

impl AnalysisPipeline {
    pub fn new(
        model: Arc<dyn ChatModel>,
        source: Arc<dyn DocumentSource>,
        prompts: PromptResolver,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            model,
            source,
            prompts,
            default_model: default_model.into(),
        }
    }

    /// Run one analysis.
    ///
    /// Prompt resolution happens first so an unknown key fails before any
    /// document fetch or model call. Document extraction is sequential
    /// and order-preserving; fetch failures degrade to inline
    /// placeholders. Provider errors propagate; quality issues are
    /// absorbed by the critique loop.
    #[instrument(skip(self, job), fields(urls = job.urls.len()))]
    pub async fn analyze(&self, job: AnalysisJob) -> Result<AnalysisOutcome, ApiError> {
        let resolved = match &job.prompt {
            PromptSelector::Literal(text) => ResolvedPrompt {
                text: text.clone(),
                model: None,
                supports_images: false,
                temperature: None,
            },
            PromptSelector::Key(key) => self.prompts.resolve(key).await?,
        };

        let extracted = content::extract_documents(self.source.as_ref(), &job.urls).await;

        let supports_images = job.supports_images.unwrap_or(resolved.supports_images);
        let image_urls = if supports_images {
            extracted.image_urls.clone()
        } else {
            Vec::new()
        };

        let model = job
            .model
            .clone()
            .or_else(|| resolved.model.clone())
            .unwrap_or_else(|| self.default_model.clone());

        let base_user_prompt =
            build_user_prompt(&resolved.text, &extracted.text, job.extra_context.as_deref());
        let temperature = resolved.temperature.unwrap_or(DEFAULT_TEMPERATURE);

        let loop_result = critique::run(
            self.model.as_ref(),
            critique::CritiqueLoopInput {
                system_prompt: ANALYSIS_SYSTEM_PROMPT.to_string(),
                base_user_prompt,
                image_urls,
                model: model.clone(),
                temperature,
            },
        )
        .await?;

        let normalized = normalize::normalize(loop_result.data);

        Ok(AnalysisOutcome {
            result: normalized.result,
            raw: normalized.raw,
            attempts: loop_result.attempts,
            model,
            prompt_text: resolved.text,
            usage: loop_result.usage,
        })
    }
}

/// Assemble the user message: instruction, extracted documents, bounded
/// extra context.
fn build_user_prompt(instruction: &str, document_text: &str, extra_context: Option<&str>) -> String {
    let mut prompt = instruction.to_string();

    if !document_text.is_empty() {
        prompt.push_str("\n\nDOCUMENTS:\n");
        prompt.push_str(document_text);
    }

    if let Some(context) = extra_context {
        let context = content::truncate_chars(context, MAX_EXTRA_CONTEXT_CHARS);
        if !context.is_empty() {
            prompt.push_str("\n\nADDITIONAL CONTEXT:\n");
            prompt.push_str(&context);
        }
    }

    prompt
}
