//! Intent classification plus the message-shape predicates the router uses.
//!
//! Free text is structurally overloaded — "can you update the deadline task?"
//! is phrased as a question but is an action. The primary path asks the
//! generation service; when its result fails validation, a deterministic rule
//! set takes over, and that rule set special-cases directive-phrased
//! questions as actions.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::provider::{CompletionProvider, GenerationPurpose, GenerationRequest};

/// What the user wants from this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Answer a question from the transcript; tasks unchanged.
    Knowledge,
    /// Mutate the task list.
    Action,
    /// Can't tell; ask a clarifying question.
    Ambiguous,
}

/// Classification result, either from the provider or the rule fallback.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResult {
    pub intent: Intent,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub clarifying_question: Option<String>,
}

impl IntentResult {
    fn of(intent: Intent) -> Self {
        IntentResult {
            intent,
            confidence: None,
            clarifying_question: None,
        }
    }
}

/// Phrasings that make a question-shaped message a directive.
const DIRECTIVE_LEADS: &[&str] = &[
    "can you", "could you", "would you", "please", "let's", "lets ", "we should",
];

/// Verbs that signal a task mutation when not phrased as a bare question.
const ACTION_VERBS: &[&str] = &[
    "add", "create", "update", "change", "rename", "edit", "delete", "remove", "archive",
    "assign", "reassign", "move", "merge", "split", "complete", "finish", "mark", "set",
    "prioritize", "reorder", "break",
];

const INTERROGATIVE_LEADS: &[&str] = &[
    "who", "what", "when", "where", "why", "how", "which", "did", "does", "do", "is", "are",
    "was", "were", "has", "have",
];

const GENERIC_CLARIFICATION: &str =
    "I want to make sure I get this right. Should I update your task list, or answer a question about the meeting?";

/// Classify a message. Primary path is a generation call; any schema failure
/// falls back to `fallback_classify`.
pub async fn classify(
    provider: &dyn CompletionProvider,
    message: &str,
    has_transcript: bool,
    has_tasks: bool,
) -> IntentResult {
    let request = GenerationRequest::new(
        GenerationPurpose::IntentClassification,
        json!({
            "message": message,
            "hasTranscript": has_transcript,
            "hasTasks": has_tasks,
        }),
    );
    match provider.generate(request).await {
        Ok(out) => {
            if let Some(value) = out.value() {
                match serde_json::from_value::<IntentResult>(value) {
                    Ok(parsed) => return parsed,
                    Err(e) => log::warn!("intent output failed validation: {}", e),
                }
            } else {
                log::warn!("intent classification produced no parseable value");
            }
        }
        Err(e) => log::warn!("intent classification call failed: {}", e),
    }
    fallback_classify(message, has_transcript, has_tasks)
}

/// Deterministic rule fallback. Rules in order:
/// 1. no transcript → there is nothing to answer questions about → action
/// 2. directive phrasing ("can you...", "please...") → action, even if it
///    ends in a question mark
/// 3. action verbs without an interrogative form → action
/// 4. interrogative form → knowledge
/// 5. otherwise → ambiguous with a clarifying question
pub fn fallback_classify(message: &str, has_transcript: bool, has_tasks: bool) -> IntentResult {
    let msg = message.trim().to_lowercase();

    if !has_transcript {
        return IntentResult::of(Intent::Action);
    }
    if DIRECTIVE_LEADS.iter().any(|lead| msg.starts_with(lead)) {
        return IntentResult::of(Intent::Action);
    }

    let interrogative = msg.ends_with('?')
        || INTERROGATIVE_LEADS
            .iter()
            .any(|w| msg.starts_with(&format!("{} ", w)));

    if has_action_verb(&msg) && !interrogative {
        return IntentResult::of(Intent::Action);
    }
    if interrogative {
        return IntentResult::of(Intent::Knowledge);
    }

    let question = if has_tasks {
        GENERIC_CLARIFICATION.to_string()
    } else {
        "Could you say a bit more about what you'd like me to do?".to_string()
    };
    IntentResult {
        intent: Intent::Ambiguous,
        confidence: None,
        clarifying_question: Some(question),
    }
}

fn has_action_verb(msg: &str) -> bool {
    msg.split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| ACTION_VERBS.contains(&word))
}

// ---------------------------------------------------------------------------
// Message-shape predicates used by the routing rules
// ---------------------------------------------------------------------------

/// Explicit cues that the user is asking about the meeting itself.
pub fn is_knowledge_cue(message: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(transcript|summary|summari[sz]e|recap|minutes|attendees|who attended|who was (in|at) the meeting|what did \w+ say)\b",
        )
        .unwrap()
    });
    re.is_match(message)
}

/// Mutation verbs that need a specific target task resolved first.
/// Deliberately excludes the delete family, which has its own flow.
pub fn is_mutation_request(message: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(update|change|rename|edit|assign|reassign|due|deadline|priorit(y|ize)|merge|split|move|mark|complete|finish)\b",
        )
        .unwrap()
    });
    re.is_match(message)
}

/// Delete-family verbs.
pub fn is_delete_request(message: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)\b(delete|remove|archive)\b").unwrap());
    re.is_match(message)
}

/// True when the message reads as a task modification rather than a bare
/// question: directive phrasing, or an action verb without interrogative form.
pub fn is_action_phrased(message: &str) -> bool {
    let msg = message.trim().to_lowercase();
    if DIRECTIVE_LEADS.iter().any(|lead| msg.starts_with(lead)) {
        return true;
    }
    let interrogative = INTERROGATIVE_LEADS
        .iter()
        .any(|w| msg.starts_with(&format!("{} ", w)));
    has_action_verb(&msg) && !interrogative
}
