//! Seams to the external collaborators: the text-generation service and the
//! session store.
//!
//! The generation service is a black box: structured input in, possibly
//! malformed output back. Consumers must tolerate `output` being absent or
//! junk and salvage a JSON value from the raw `text` instead. Schema
//! validation failures degrade to heuristic fallbacks, never a crash.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::types::SessionSnapshot;

/// Which specialized routine a generation call is serving. Prompt templates
/// live on the provider side, keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPurpose {
    MeetingAnalysis,
    MessageExtraction,
    TaskRefinement,
    TranscriptQa,
    IntentClassification,
    DetailRewrite,
}

/// Structured input for one generation call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub purpose: GenerationPurpose,
    pub payload: Value,
}

impl GenerationRequest {
    pub fn new(purpose: GenerationPurpose, payload: Value) -> Self {
        GenerationRequest { purpose, payload }
    }
}

/// Raw result of a generation call: a parsed value when the provider managed
/// to produce one, and/or the raw text it emitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationOutput {
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerationOutput {
    /// Best-effort structured value: `output` when present and non-null,
    /// otherwise the first JSON object or array salvaged from `text`.
    pub fn value(&self) -> Option<Value> {
        if let Some(v) = &self.output {
            if !v.is_null() {
                return Some(v.clone());
            }
        }
        let text = self.text.as_deref()?;
        extract_json_value(text).and_then(|s| serde_json::from_str(&s).ok())
    }

    /// Non-empty trimmed raw text, when the best available answer is a scalar.
    pub fn plain_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Find the first complete JSON object or array in the text, tolerating
/// markdown fences and surrounding prose.
pub fn extract_json_value(text: &str) -> Option<String> {
    let obj_at = text.find('{');
    let arr_at = text.find('[');
    let (start, open, close) = match (obj_at, arr_at) {
        (Some(o), Some(a)) if a < o => (a, b'[', b']'),
        (Some(o), _) => (o, b'{', b'}'),
        (None, Some(a)) => (a, b'[', b']'),
        (None, None) => return None,
    };

    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escape {
            escape = false;
            continue;
        }
        if b == b'\\' && in_string {
            escape = true;
            continue;
        }
        if b == b'"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(text[start..=i].to_string());
            }
        }
    }
    None
}

/// The text-generation service. Implementations own prompt templates,
/// transport, and model selection.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationOutput, ProviderError>;
}

/// Lookup of a prior session in a recurring meeting series. Failures here are
/// treated by the dispatcher as "no prior context", never as a failed turn.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn fetch_session(&self, session_id: &str)
        -> Result<Option<SessionSnapshot>, ProviderError>;
}
