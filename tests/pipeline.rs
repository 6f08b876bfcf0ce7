//! End-to-end pipeline tests against scripted stubs.
//!
//! The model, document source, and prompt store are stubbed with canned
//! responses and call recording, so the critique loop's behavior can be
//! asserted call by call without network or database access.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use buildwise_backend::domain::prompts::PromptTemplate;
use buildwise_backend::pipeline::content::{
    DocumentSource, FetchError, FetchedDocument, FETCH_FAILURE_MARKER,
};
use buildwise_backend::pipeline::critique::EMPTY_RESULT_DIRECTIVE;
use buildwise_backend::pipeline::{AnalysisJob, AnalysisPipeline, PromptSelector};
use buildwise_backend::services::model_client::{
    ChatModel, ModelError, ModelOutput, ModelRequest,
};
use buildwise_backend::services::prompt_resolver::PromptResolver;
use buildwise_backend::services::prompt_store::PromptStore;

// ---------------------------------------------------------------------------
// Stubs
// ---------------------------------------------------------------------------

/// Chat model stub returning scripted structured outputs. The last script
/// entry repeats once the script runs out; every request is recorded.
struct StubModel {
    outputs: Vec<Value>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl StubModel {
    fn scripted(outputs: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            outputs,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn request(&self, index: usize) -> ModelRequest {
        self.requests.lock()[index].clone()
    }
}

#[async_trait]
impl ChatModel for StubModel {
    async fn execute(&self, request: ModelRequest) -> Result<ModelOutput, ModelError> {
        let call_index = {
            let mut requests = self.requests.lock();
            requests.push(request);
            requests.len() - 1
        };
        let data = self.outputs[call_index.min(self.outputs.len() - 1)].clone();
        Ok(ModelOutput::Data { data, usage: None })
    }
}

/// Document source stub with canned bodies or failures per URL.
#[derive(Default)]
struct StubSource {
    documents: HashMap<String, Result<FetchedDocument, FetchError>>,
    fetches: Mutex<Vec<String>>,
}

impl StubSource {
    fn new() -> Self {
        Self::default()
    }

    fn with_text(mut self, url: &str, body: &str) -> Self {
        self.documents.insert(
            url.to_string(),
            Ok(FetchedDocument {
                content_type: Some("text/plain".to_string()),
                bytes: body.as_bytes().to_vec(),
            }),
        );
        self
    }

    fn with_failure(mut self, url: &str, status: u16, message: &str) -> Self {
        self.documents.insert(
            url.to_string(),
            Err(FetchError {
                status: Some(status),
                message: message.to_string(),
            }),
        );
        self
    }

    fn fetch_count(&self) -> usize {
        self.fetches.lock().len()
    }
}

#[async_trait]
impl DocumentSource for StubSource {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        self.fetches.lock().push(url.to_string());
        self.documents
            .get(url)
            .cloned()
            .unwrap_or_else(|| {
                Err(FetchError {
                    status: None,
                    message: "no canned document".to_string(),
                })
            })
    }
}

/// In-memory prompt store.
struct MemPromptStore {
    prompts: HashMap<String, PromptTemplate>,
}

impl MemPromptStore {
    fn with(key: &str, text: &str) -> Self {
        let mut prompts = HashMap::new();
        prompts.insert(
            key.to_string(),
            PromptTemplate {
                id: uuid::Uuid::new_v4(),
                key: key.to_string(),
                text: text.to_string(),
                model: None,
                supports_images: true,
                context_config: None,
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            },
        );
        Self { prompts }
    }
}

#[async_trait]
impl PromptStore for MemPromptStore {
    async fn find_by_key(&self, key: &str) -> anyhow::Result<Option<PromptTemplate>> {
        Ok(self.prompts.get(key).cloned())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn pipeline(
    model: Arc<StubModel>,
    source: Arc<StubSource>,
    store: MemPromptStore,
) -> AnalysisPipeline {
    let resolver = PromptResolver::new(Arc::new(store), Duration::from_secs(300));
    AnalysisPipeline::new(model, source, resolver, "gpt-4o-mini")
}

fn literal_job(urls: Vec<&str>) -> AnalysisJob {
    AnalysisJob {
        urls: urls.into_iter().map(String::from).collect(),
        prompt: PromptSelector::Literal("Analyze these plan documents.".to_string()),
        model: None,
        supports_images: None,
        extra_context: None,
    }
}

fn complete_room(name: &str) -> Value {
    json!({
        "name": name,
        "level": "main",
        "dimensions": {"lengthFt": 14.0, "widthFt": 12.0, "areaSqFt": 168.0},
        "windows": 2,
        "doors": 1,
        "features": [],
        "notes": null
    })
}

fn complete_analysis() -> Value {
    json!({
        "projectInfo": {"houseType": "craftsman", "address": "123 Main St"},
        "roomAnalysis": [complete_room("Master Bedroom"), complete_room("Kitchen")],
        "suggestedTasks": []
    })
}

// ---------------------------------------------------------------------------
// Content extraction properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_failures_degrade_to_inline_placeholders() {
    let model = StubModel::scripted(vec![complete_analysis()]);
    let source = Arc::new(
        StubSource::new()
            .with_text("https://cdn.example.com/notes.txt", "Framing notes")
            .with_failure("https://cdn.example.com/missing.txt", 404, "Not Found")
            .with_text("https://cdn.example.com/specs.txt", "Window specs"),
    );

    let pipeline = pipeline(model.clone(), source, MemPromptStore::with("unused", "x"));
    let outcome = pipeline
        .analyze(literal_job(vec![
            "https://cdn.example.com/notes.txt",
            "https://cdn.example.com/missing.txt",
            "https://cdn.example.com/specs.txt",
        ]))
        .await
        .unwrap();

    // The batch completed despite the failure.
    assert_eq!(outcome.attempts, 1);

    // Exactly one segment per document, the failed one marked inline.
    let prompt = model.request(0).user_prompt;
    assert_eq!(prompt.matches("--- Document").count(), 3);
    assert_eq!(prompt.matches(FETCH_FAILURE_MARKER).count(), 1);
    assert!(prompt.contains("Framing notes"));
    assert!(prompt.contains("Window specs"));
}

#[tokio::test]
async fn segments_preserve_input_order() {
    let model = StubModel::scripted(vec![complete_analysis()]);
    let source = Arc::new(
        StubSource::new()
            .with_text("https://x/a.txt", "FIRST")
            .with_text("https://x/b.txt", "SECOND"),
    );

    let pipeline = pipeline(model.clone(), source, MemPromptStore::with("unused", "x"));
    pipeline
        .analyze(literal_job(vec!["https://x/a.txt", "https://x/b.txt"]))
        .await
        .unwrap();

    let prompt = model.request(0).user_prompt;
    let first = prompt.find("FIRST").unwrap();
    let second = prompt.find("SECOND").unwrap();
    assert!(first < second);
}

// ---------------------------------------------------------------------------
// Critique loop properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn always_empty_results_run_exactly_three_attempts() {
    let model = StubModel::scripted(vec![json!({})]);
    let source = Arc::new(StubSource::new().with_text("https://x/plan.txt", "plan"));

    let pipeline = pipeline(model.clone(), source, MemPromptStore::with("unused", "x"));
    let outcome = pipeline
        .analyze(literal_job(vec!["https://x/plan.txt"]))
        .await
        .unwrap();

    // Never more, never fewer.
    assert_eq!(model.call_count(), 3);
    assert_eq!(outcome.attempts, 3);

    // The empty-object directive accumulates across retries.
    assert!(!model.request(0).user_prompt.contains(EMPTY_RESULT_DIRECTIVE));
    assert!(model.request(1).user_prompt.contains(EMPTY_RESULT_DIRECTIVE));
    assert!(model.request(2).user_prompt.contains(EMPTY_RESULT_DIRECTIVE));

    // The caller still gets the well-defined empty shape, not {}.
    assert_eq!(outcome.result["roomAnalysis"], json!([]));
    assert_eq!(outcome.result["projectInfo"], json!({}));
}

#[tokio::test]
async fn complete_first_attempt_makes_a_single_call() {
    let model = StubModel::scripted(vec![complete_analysis()]);
    let source = Arc::new(StubSource::new().with_text("https://x/plan.txt", "plan"));

    let pipeline = pipeline(model.clone(), source, MemPromptStore::with("unused", "x"));
    let outcome = pipeline
        .analyze(literal_job(vec!["https://x/plan.txt"]))
        .await
        .unwrap();

    assert_eq!(model.call_count(), 1);
    assert_eq!(outcome.attempts, 1);
}

#[tokio::test]
async fn incomplete_rooms_trigger_a_critiqued_retry() {
    let incomplete = json!({
        "projectInfo": {"houseType": "ranch"},
        "roomAnalysis": [{
            "name": "Kitchen",
            "dimensions": {"lengthFt": null, "widthFt": null, "areaSqFt": null},
            "windows": 2
        }]
    });

    let model = StubModel::scripted(vec![incomplete, complete_analysis()]);
    let source = Arc::new(StubSource::new().with_text("https://x/plan.txt", "plan"));

    let pipeline = pipeline(model.clone(), source, MemPromptStore::with("unused", "x"));
    let outcome = pipeline
        .analyze(literal_job(vec!["https://x/plan.txt"]))
        .await
        .unwrap();

    assert_eq!(model.call_count(), 2);
    assert_eq!(outcome.attempts, 2);

    // The retry prompt names the offending room on top of the base prompt.
    let retry_prompt = model.request(1).user_prompt;
    assert!(retry_prompt.starts_with("Analyze these plan documents."));
    assert!(retry_prompt.contains("Kitchen"));
}

#[tokio::test]
async fn imperfect_result_is_accepted_after_exhaustion() {
    let incomplete = json!({
        "roomAnalysis": [{
            "name": "Dining Room",
            "dimensions": {"lengthFt": 12.0, "widthFt": 10.0, "areaSqFt": null},
            "windows": 0
        }]
    });

    let model = StubModel::scripted(vec![incomplete]);
    let source = Arc::new(StubSource::new().with_text("https://x/plan.txt", "plan"));

    let pipeline = pipeline(model.clone(), source, MemPromptStore::with("unused", "x"));
    let outcome = pipeline
        .analyze(literal_job(vec!["https://x/plan.txt"]))
        .await
        .unwrap();

    // Exhaustion is not an error; the last result comes back as-is.
    assert_eq!(model.call_count(), 3);
    assert_eq!(outcome.result["roomAnalysis"][0]["name"], "Dining Room");
}

// ---------------------------------------------------------------------------
// Prompt resolution properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_prompt_key_fails_before_any_model_call() {
    let model = StubModel::scripted(vec![complete_analysis()]);
    let source = Arc::new(StubSource::new().with_text("https://x/plan.txt", "plan"));

    let pipeline = pipeline(
        model.clone(),
        source.clone(),
        MemPromptStore::with("plan_analysis", "Analyze."),
    );

    let err = pipeline
        .analyze(AnalysisJob {
            urls: vec!["https://x/plan.txt".to_string()],
            prompt: PromptSelector::Key("bid_comparison".to_string()),
            model: None,
            supports_images: None,
            extra_context: None,
        })
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Prompt not found: bid_comparison"));
    assert_eq!(model.call_count(), 0);
    assert_eq!(source.fetch_count(), 0);
}

#[tokio::test]
async fn stored_prompt_text_drives_the_model_call() {
    let model = StubModel::scripted(vec![complete_analysis()]);
    let source = Arc::new(StubSource::new().with_text("https://x/plan.txt", "plan"));

    let pipeline = pipeline(
        model.clone(),
        source,
        MemPromptStore::with("plan_analysis", "Extract rooms and costs."),
    );

    pipeline
        .analyze(AnalysisJob {
            urls: vec!["https://x/plan.txt".to_string()],
            prompt: PromptSelector::Key("plan_analysis".to_string()),
            model: None,
            supports_images: None,
            extra_context: None,
        })
        .await
        .unwrap();

    assert!(model
        .request(0)
        .user_prompt
        .starts_with("Extract rooms and costs."));
}

// ---------------------------------------------------------------------------
// Image handling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn image_urls_skip_extraction_and_reach_the_model() {
    let model = StubModel::scripted(vec![complete_analysis()]);
    let source = Arc::new(StubSource::new().with_text("https://x/notes.txt", "notes"));

    let pipeline = pipeline(model.clone(), source.clone(), MemPromptStore::with("u", "x"));
    pipeline
        .analyze(AnalysisJob {
            urls: vec![
                "https://x/notes.txt".to_string(),
                "https://x/elevation.png".to_string(),
            ],
            prompt: PromptSelector::Literal("Analyze.".to_string()),
            model: None,
            supports_images: Some(true),
            extra_context: None,
        })
        .await
        .unwrap();

    let request = model.request(0);
    assert_eq!(request.image_urls, vec!["https://x/elevation.png".to_string()]);

    // The image was never fetched, but it still has an inline segment.
    assert_eq!(source.fetch_count(), 1);
    assert_eq!(request.user_prompt.matches("--- Document").count(), 2);
}

#[tokio::test]
async fn images_are_dropped_when_vision_is_not_requested() {
    let model = StubModel::scripted(vec![complete_analysis()]);
    let source = Arc::new(StubSource::new().with_text("https://x/notes.txt", "notes"));

    let pipeline = pipeline(model.clone(), source, MemPromptStore::with("u", "x"));
    pipeline
        .analyze(AnalysisJob {
            urls: vec![
                "https://x/notes.txt".to_string(),
                "https://x/elevation.png".to_string(),
            ],
            prompt: PromptSelector::Literal("Analyze.".to_string()),
            model: None,
            supports_images: Some(false),
            extra_context: None,
        })
        .await
        .unwrap();

    assert!(model.request(0).image_urls.is_empty());
}

// ---------------------------------------------------------------------------
// Normalization properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn nested_project_info_is_mirrored_to_flat_keys() {
    let model = StubModel::scripted(vec![complete_analysis()]);
    let source = Arc::new(StubSource::new().with_text("https://x/plan.txt", "plan"));

    let pipeline = pipeline(model, source, MemPromptStore::with("u", "x"));
    let outcome = pipeline
        .analyze(literal_job(vec!["https://x/plan.txt"]))
        .await
        .unwrap();

    assert_eq!(outcome.result["address"], "123 Main St");
    assert_eq!(outcome.result["projectInfo"]["address"], "123 Main St");

    // raw is the serialized normalized result, with no nulls anywhere.
    let reparsed: Value = serde_json::from_str(&outcome.raw).unwrap();
    assert_eq!(reparsed, outcome.result);
    assert!(!outcome.raw.contains("null"));
}
