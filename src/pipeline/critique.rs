//! Critique loop controller.
//!
//! Drives up to [`MAX_ATTEMPTS`] model calls per analysis. Each attempt is
//! an immutable record of the base prompt plus the critiques accumulated
//! so far; the effective prompt is recomputed by joining, never mutated in
//! place. Quality problems (empty or incomplete output) are handled here
//! with corrective instructions; transport and provider errors are not —
//! they propagate to the caller untouched.

use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::analysis::{
    analysis_schema, empty_analysis, RoomEntry, TokenUsage, ANALYSIS_SCHEMA_NAME,
};
use crate::services::model_client::{ChatModel, ModelError, ModelOutput, ModelRequest, SchemaSpec};

/// Fixed retry budget per analysis invocation.
pub const MAX_ATTEMPTS: u32 = 3;

/// Directive appended when the model returns an empty object. An empty
/// result is retried without any quality scoring.
pub const EMPTY_RESULT_DIRECTIVE: &str = "CRITICAL ERROR: empty object. The previous response \
contained no data at all. You MUST return a fully populated analysis object conforming to the \
schema.";

/// Room-name keywords that mark a room as meaningful for the quality gate
/// (case-insensitive substring match).
pub const MEANINGFUL_ROOM_KEYWORDS: &[&str] = &[
    "bed", "living", "great", "family", "kitchen", "office", "study", "dining",
];

/// At most this many offending rooms are named in a critique.
const MAX_CRITIQUE_ROOMS: usize = 5;

/// Immutable prompt state for one attempt.
#[derive(Debug, Clone)]
pub struct AttemptPrompt {
    pub attempt: u32,
    pub base_prompt: String,
    pub critiques: Vec<String>,
}

impl AttemptPrompt {
    pub fn first(base_prompt: String) -> Self {
        Self {
            attempt: 1,
            base_prompt,
            critiques: Vec::new(),
        }
    }

    /// The prompt actually sent: base instruction followed by every
    /// accumulated critique.
    pub fn effective_prompt(&self) -> String {
        if self.critiques.is_empty() {
            self.base_prompt.clone()
        } else {
            format!("{}\n\n{}", self.base_prompt, self.critiques.join("\n\n"))
        }
    }

    /// The next attempt, carrying one more critique.
    pub fn with_critique(&self, critique: String) -> Self {
        let mut critiques = self.critiques.clone();
        critiques.push(critique);
        Self {
            attempt: self.attempt + 1,
            base_prompt: self.base_prompt.clone(),
            critiques,
        }
    }
}

/// Outcome of scoring one structured result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// No keys at all (or not an object) — retried without scoring.
    Empty,
    /// Meaningful rooms with missing dimensions or a zero window count.
    Incomplete(Vec<String>),
    Complete,
}

/// Score a structured result against the completeness heuristics.
pub fn evaluate(result: &Value) -> Evaluation {
    let empty = match result {
        Value::Object(map) => map.is_empty(),
        Value::Null => true,
        _ => false,
    };
    if empty {
        return Evaluation::Empty;
    }

    let flagged = flag_incomplete_rooms(result);
    if flagged.is_empty() {
        Evaluation::Complete
    } else {
        Evaluation::Incomplete(flagged)
    }
}

/// Whether a room name matches the meaningful-room keyword set.
pub fn is_meaningful_room(name: &str) -> bool {
    let lower = name.to_lowercase();
    MEANINGFUL_ROOM_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// A meaningful room is incomplete when both length and width are falsy
/// (absent, null, or zero), or when the window count is exactly zero.
///
/// A room with exactly one dimension populated is NOT flagged. The
/// zero-windows rule cannot distinguish a genuinely windowless room from
/// a skipped field; that ambiguity is accepted (see DESIGN.md).
pub fn room_is_incomplete(room: &RoomEntry) -> bool {
    let falsy = |v: Option<f64>| v.map_or(true, |x| x == 0.0);
    let dimensions_missing = match &room.dimensions {
        None => true,
        Some(d) => falsy(d.length_ft) && falsy(d.width_ft),
    };

    dimensions_missing || room.windows == Some(0)
}

/// Collect names of meaningful rooms that fail the completeness check.
pub fn flag_incomplete_rooms(result: &Value) -> Vec<String> {
    result
        .get("roomAnalysis")
        .and_then(Value::as_array)
        .map(|rooms| {
            rooms
                .iter()
                .filter_map(|r| serde_json::from_value::<RoomEntry>(r.clone()).ok())
                .filter(|r| r.name.as_deref().map_or(false, is_meaningful_room))
                .filter(room_is_incomplete)
                .filter_map(|r| r.name)
                .collect()
        })
        .unwrap_or_default()
}

/// Corrective instruction naming up to [`MAX_CRITIQUE_ROOMS`] offenders.
pub fn room_critique(flagged: &[String]) -> String {
    let listed = flagged
        .iter()
        .take(MAX_CRITIQUE_ROOMS)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "The previous analysis was incomplete. These rooms are missing length/width dimensions \
         or a window count: {}. Provide lengthFt and widthFt in feet and an accurate window \
         count for each of them.",
        listed
    )
}

/// Input to one critique-loop run.
#[derive(Debug, Clone)]
pub struct CritiqueLoopInput {
    pub system_prompt: String,
    pub base_user_prompt: String,
    pub image_urls: Vec<String>,
    pub model: String,
    pub temperature: f32,
}

/// Accepted result of a critique-loop run.
#[derive(Debug, Clone)]
pub struct CritiqueLoopResult {
    pub data: Value,
    pub attempts: u32,
    pub usage: Option<TokenUsage>,
}

/// Run the loop: call the model with the fixed analysis schema, score the
/// output, and retry with critiques until the gate passes or the budget
/// is spent. Exhaustion is not an error — the last (possibly imperfect)
/// result is accepted, and all-empty exhaustion yields the empty-record
/// fallback.
pub async fn run(
    model: &dyn ChatModel,
    input: CritiqueLoopInput,
) -> Result<CritiqueLoopResult, ModelError> {
    let schema = SchemaSpec {
        name: ANALYSIS_SCHEMA_NAME.to_string(),
        schema: analysis_schema(),
    };

    let mut plan = AttemptPrompt::first(input.base_user_prompt);
    let mut last: Option<(Value, Option<TokenUsage>)> = None;

    loop {
        let request = ModelRequest {
            system_prompt: input.system_prompt.clone(),
            user_prompt: plan.effective_prompt(),
            image_urls: input.image_urls.clone(),
            model: input.model.clone(),
            temperature: input.temperature,
            schema: Some(schema.clone()),
        };

        let output = model.execute(request).await?;
        let (data, usage) = match output {
            ModelOutput::Data { data, usage } => (data, usage),
            // A provider without a structured mode may answer with text;
            // anything unparseable counts as an empty result.
            ModelOutput::Text { text, usage } => (
                serde_json::from_str(&text).unwrap_or(Value::Null),
                usage,
            ),
        };

        match evaluate(&data) {
            Evaluation::Complete => {
                debug!(attempt = plan.attempt, "Analysis accepted");
                return Ok(CritiqueLoopResult {
                    data,
                    attempts: plan.attempt,
                    usage,
                });
            }
            Evaluation::Empty => {
                warn!(attempt = plan.attempt, "Model returned an empty analysis object");
                last = Some((data, usage));
                if plan.attempt >= MAX_ATTEMPTS {
                    break;
                }
                plan = plan.with_critique(EMPTY_RESULT_DIRECTIVE.to_string());
            }
            Evaluation::Incomplete(rooms) => {
                debug!(
                    attempt = plan.attempt,
                    flagged = rooms.len(),
                    "Analysis incomplete, retrying with critique"
                );
                last = Some((data, usage));
                if plan.attempt >= MAX_ATTEMPTS {
                    break;
                }
                plan = plan.with_critique(room_critique(&rooms));
            }
        }
    }

    // Retry budget exhausted: accept the last result. Only an all-empty
    // run gets the fallback so callers always see a well-defined shape.
    let (data, usage) = last.unwrap_or((Value::Null, None));
    let data = if evaluate(&data) == Evaluation::Empty {
        empty_analysis()
    } else {
        data
    };

    Ok(CritiqueLoopResult {
        data,
        attempts: MAX_ATTEMPTS,
        usage,
    })
}
