//! Provider-backed extraction routines: meeting analysis, general message
//! extraction, task refinement, transcript Q&A.
//!
//! Each routine builds a structured payload, validates whatever comes back,
//! salvages a JSON value from raw text when the parsed output is missing or
//! malformed, and degrades to "keep the caller's forest, apologize" when
//! nothing usable remains. No routine ever errors out of a turn.

use serde_json::{json, Value};

use crate::provider::{CompletionProvider, GenerationPurpose, GenerationRequest};
use crate::rollover::titles_correspond;
use crate::tree::{assign_stable_ids, dedupe_cyclic_ids, filter_valid};
use crate::types::{DetailLevel, Task, TaskLevels};

const FALLBACK_REPLY: &str =
    "Sorry, I couldn't make sense of the assistant's response. Your task list is unchanged.";
const QA_FALLBACK: &str = "Sorry, I couldn't answer that from the transcript.";
const DEFAULT_REPLY: &str = "Here's your updated task list.";

/// A task-producing routine's result: the complete replacement forest plus
/// the conversational reply.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub tasks: Vec<Task>,
    pub reply: String,
}

/// Result of analyzing a meeting transcript.
#[derive(Debug, Clone, Default)]
pub struct MeetingAnalysis {
    pub session_title: Option<String>,
    pub people: Vec<String>,
    pub levels: TaskLevels,
    pub reply: String,
}

/// Validity filter, cycle guard, then id assignment — every forest that came
/// from the provider goes through this before anyone else sees it.
fn sanitize_forest(tasks: Vec<Task>) -> Vec<Task> {
    assign_stable_ids(dedupe_cyclic_ids(filter_valid(tasks)))
}

/// Pull a task array out of a provider value: either the value itself is an
/// array, or it is an object with a `tasks` array. Items that fail to
/// deserialize are skipped individually rather than sinking the whole batch.
/// Returns None when there is no task array at all, so callers can keep the
/// forest they already have.
fn tasks_from_value(value: &Value) -> Option<Vec<Task>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => map.get("tasks")?.as_array()?,
        _ => return None,
    };
    Some(
        items
            .iter()
            .filter_map(|item| match serde_json::from_value::<Task>(item.clone()) {
                Ok(task) => Some(task),
                Err(e) => {
                    log::debug!("skipping malformed task item: {}", e);
                    None
                }
            })
            .collect(),
    )
}

fn reply_from_value(value: &Value) -> Option<String> {
    value
        .get("reply")
        .or_else(|| value.get("chatResponse"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// General message extraction: turn a chat message (plus the current forest)
/// into a complete replacement forest. `target` carries a task already
/// resolved by the matcher, when the message referred to one.
pub async fn extract_from_message(
    provider: &dyn CompletionProvider,
    message: &str,
    existing: &[Task],
    target: Option<&Task>,
) -> ExtractionResult {
    let request = GenerationRequest::new(
        GenerationPurpose::MessageExtraction,
        json!({
            "message": message,
            "existingTasks": existing,
            "targetTaskId": target.map(|t| t.id.clone()),
        }),
    );
    run_task_routine(provider, request, existing).await
}

/// Task refinement: break down the selected tasks (or the named context
/// task). The routine's contract is that its forest is complete — every
/// unselected task comes back unchanged — and we trust it rather than diff.
pub async fn refine_tasks(
    provider: &dyn CompletionProvider,
    message: &str,
    existing: &[Task],
    selected: &[Task],
    context_task_title: Option<&str>,
) -> ExtractionResult {
    let request = GenerationRequest::new(
        GenerationPurpose::TaskRefinement,
        json!({
            "message": message,
            "existingTasks": existing,
            "selectedTasks": selected,
            "contextTaskTitle": context_task_title,
        }),
    );
    run_task_routine(provider, request, existing).await
}

async fn run_task_routine(
    provider: &dyn CompletionProvider,
    request: GenerationRequest,
    existing: &[Task],
) -> ExtractionResult {
    let purpose = request.purpose;
    match provider.generate(request).await {
        Ok(out) => {
            if let Some(value) = out.value() {
                if let Some(tasks) = tasks_from_value(&value) {
                    let reply = reply_from_value(&value)
                        .unwrap_or_else(|| DEFAULT_REPLY.to_string());
                    return ExtractionResult {
                        tasks: sanitize_forest(tasks),
                        reply,
                    };
                }
            }
            log::warn!("{:?} returned no usable task payload; keeping forest", purpose);
            ExtractionResult {
                tasks: existing.to_vec(),
                reply: out
                    .plain_text()
                    .map(str::to_string)
                    .unwrap_or_else(|| FALLBACK_REPLY.to_string()),
            }
        }
        Err(e) => {
            log::warn!("{:?} call failed: {}; keeping forest", purpose, e);
            ExtractionResult {
                tasks: existing.to_vec(),
                reply: FALLBACK_REPLY.to_string(),
            }
        }
    }
}

/// Answer a question from the transcript. Tasks are never touched here.
pub async fn answer_from_transcript(
    provider: &dyn CompletionProvider,
    question: &str,
    transcript: &str,
) -> String {
    let request = GenerationRequest::new(
        GenerationPurpose::TranscriptQa,
        json!({ "question": question, "transcript": transcript }),
    );
    match provider.generate(request).await {
        Ok(out) => {
            if let Some(value) = out.value() {
                if let Some(answer) = value
                    .get("answer")
                    .and_then(Value::as_str)
                    .or_else(|| value.as_str())
                {
                    let answer = answer.trim();
                    if !answer.is_empty() {
                        return answer.to_string();
                    }
                }
            }
            out.plain_text()
                .map(str::to_string)
                .unwrap_or_else(|| QA_FALLBACK.to_string())
        }
        Err(e) => {
            log::warn!("transcript QA call failed: {}", e);
            QA_FALLBACK.to_string()
        }
    }
}

/// Analyze a meeting transcript into all three detail levels. The requested
/// level is extracted first; the other two are rewritten from it
/// concurrently (the calls are independent). Top-level ids are aligned
/// across levels by title correspondence so the forests share identity.
pub async fn analyze_meeting(
    provider: &dyn CompletionProvider,
    transcript: &str,
    requested: DetailLevel,
) -> MeetingAnalysis {
    let request = GenerationRequest::new(
        GenerationPurpose::MeetingAnalysis,
        json!({ "transcript": transcript, "detailLevel": requested }),
    );
    let (primary, session_title, people, reply) = match provider.generate(request).await {
        Ok(out) => match out.value() {
            Some(value) => {
                let tasks = tasks_from_value(&value).unwrap_or_default();
                let title = value
                    .get("sessionTitle")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let people = value
                    .get("people")
                    .and_then(Value::as_array)
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                let reply = reply_from_value(&value).unwrap_or_else(|| {
                    "I've pulled the action items out of the meeting.".to_string()
                });
                (sanitize_forest(tasks), title, people, reply)
            }
            None => {
                log::warn!("meeting analysis produced no parseable value");
                (Vec::new(), None, Vec::new(), FALLBACK_REPLY.to_string())
            }
        },
        Err(e) => {
            log::warn!("meeting analysis call failed: {}", e);
            (Vec::new(), None, Vec::new(), FALLBACK_REPLY.to_string())
        }
    };

    let (first, second) = other_levels(requested);
    let levels = if primary.is_empty() {
        TaskLevels::default()
    } else {
        let (a, b) = tokio::join!(
            rewrite_level(provider, &primary, first),
            rewrite_level(provider, &primary, second),
        );
        let mut levels = TaskLevels::default();
        *level_slot(&mut levels, requested) = primary;
        *level_slot(&mut levels, first) = a;
        *level_slot(&mut levels, second) = b;
        levels
    };

    MeetingAnalysis {
        session_title,
        people,
        levels,
        reply,
    }
}

fn other_levels(level: DetailLevel) -> (DetailLevel, DetailLevel) {
    match level {
        DetailLevel::Light => (DetailLevel::Medium, DetailLevel::Detailed),
        DetailLevel::Medium => (DetailLevel::Light, DetailLevel::Detailed),
        DetailLevel::Detailed => (DetailLevel::Light, DetailLevel::Medium),
    }
}

fn level_slot(levels: &mut TaskLevels, level: DetailLevel) -> &mut Vec<Task> {
    match level {
        DetailLevel::Light => &mut levels.light,
        DetailLevel::Medium => &mut levels.medium,
        DetailLevel::Detailed => &mut levels.detailed,
    }
}

/// Rewrite the base forest at a different granularity. Falls back to the base
/// forest itself when the provider can't produce one, so every level is
/// always populated.
async fn rewrite_level(
    provider: &dyn CompletionProvider,
    base: &[Task],
    target: DetailLevel,
) -> Vec<Task> {
    let request = GenerationRequest::new(
        GenerationPurpose::DetailRewrite,
        json!({ "tasks": base, "targetLevel": target }),
    );
    match provider.generate(request).await {
        Ok(out) => match out.value().as_ref().and_then(tasks_from_value) {
            Some(tasks) if !tasks.is_empty() => {
                align_top_level_ids(sanitize_forest(tasks), base)
            }
            _ => {
                log::warn!("detail rewrite to {:?} unusable; reusing base forest", target);
                base.to_vec()
            }
        },
        Err(e) => {
            log::warn!("detail rewrite to {:?} failed: {}; reusing base forest", target, e);
            base.to_vec()
        }
    }
}

/// Copy top-level ids from the base forest onto a rewritten level where the
/// titles correspond, so the three levels share identity where possible.
fn align_top_level_ids(mut tasks: Vec<Task>, base: &[Task]) -> Vec<Task> {
    let mut used = std::collections::HashSet::new();
    for task in &mut tasks {
        if let Some(hit) = base
            .iter()
            .find(|b| !used.contains(&b.id) && titles_correspond(&task.title, &b.title))
        {
            used.insert(hit.id.clone());
            task.id = hit.id.clone();
        }
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::GenerationOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted provider: pops one canned response per call.
    struct ScriptedProvider {
        script: Mutex<Vec<Result<GenerationOutput, ProviderError>>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<GenerationOutput, ProviderError>>) -> Self {
            let mut script = script;
            script.reverse();
            ScriptedProvider {
                script: Mutex::new(script),
            }
        }

        fn parsed(value: Value) -> Result<GenerationOutput, ProviderError> {
            Ok(GenerationOutput {
                output: Some(value),
                text: None,
            })
        }

        fn raw(text: &str) -> Result<GenerationOutput, ProviderError> {
            Ok(GenerationOutput {
                output: None,
                text: Some(text.to_string()),
            })
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<GenerationOutput, ProviderError> {
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(ProviderError::Malformed("script exhausted".into())))
        }
    }

    #[tokio::test]
    async fn test_extraction_parses_and_sanitizes() {
        let provider = ScriptedProvider::new(vec![ScriptedProvider::parsed(json!({
            "reply": "Added it.",
            "tasks": [
                {"title": "Ship the release"},
                {"title": "1."},
                {"title": ""}
            ]
        }))]);
        let result = extract_from_message(&provider, "add a release task", &[], None).await;
        assert_eq!(result.reply, "Added it.");
        assert_eq!(result.tasks.len(), 1);
        assert_eq!(result.tasks[0].title, "Ship the release");
        assert!(!result.tasks[0].id.is_empty());
    }

    #[tokio::test]
    async fn test_extraction_salvages_from_raw_text() {
        let provider = ScriptedProvider::new(vec![ScriptedProvider::raw(
            "Sure! ```json\n{\"tasks\": [{\"title\": \"Review budget\"}]}\n```",
        )]);
        let result = extract_from_message(&provider, "track the budget review", &[], None).await;
        assert_eq!(result.tasks.len(), 1);
        assert_eq!(result.tasks[0].title, "Review budget");
    }

    #[tokio::test]
    async fn test_extraction_keeps_forest_on_provider_failure() {
        let provider =
            ScriptedProvider::new(vec![Err(ProviderError::Timeout(30))]);
        let existing = vec![{
            let mut t = Task::titled("Keep me");
            t.id = "t1".into();
            t
        }];
        let result = extract_from_message(&provider, "add something", &existing, None).await;
        assert_eq!(result.tasks.len(), 1);
        assert_eq!(result.tasks[0].id, "t1");
        assert_eq!(result.reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_extraction_keeps_forest_on_non_array_tasks() {
        let provider = ScriptedProvider::new(vec![ScriptedProvider::parsed(
            json!({"tasks": "not an array"}),
        )]);
        let existing = vec![Task::titled("Still here")];
        let result = extract_from_message(&provider, "do things", &existing, None).await;
        assert_eq!(result.tasks.len(), 1);
        assert_eq!(result.tasks[0].title, "Still here");
    }

    #[tokio::test]
    async fn test_qa_answer_paths() {
        let provider = ScriptedProvider::new(vec![
            ScriptedProvider::parsed(json!({"answer": "Alice and Bob attended."})),
            ScriptedProvider::raw("It shipped on Tuesday."),
            Err(ProviderError::RateLimit),
        ]);
        assert_eq!(
            answer_from_transcript(&provider, "who attended?", "...").await,
            "Alice and Bob attended."
        );
        assert_eq!(
            answer_from_transcript(&provider, "when did it ship?", "...").await,
            "It shipped on Tuesday."
        );
        assert_eq!(
            answer_from_transcript(&provider, "anything?", "...").await,
            QA_FALLBACK
        );
    }

    #[tokio::test]
    async fn test_meeting_analysis_builds_all_levels() {
        let provider = ScriptedProvider::new(vec![
            ScriptedProvider::parsed(json!({
                "sessionTitle": "Weekly Sync",
                "people": ["Alice", "Bob"],
                "reply": "Here's what I found.",
                "tasks": [{"title": "Implement Auth"}]
            })),
            // two detail rewrites, order not guaranteed; same shape for both
            ScriptedProvider::parsed(json!({"tasks": [{"title": "Implement Auth end to end"}]})),
            ScriptedProvider::parsed(json!({"tasks": [{"title": "Implement Auth end to end"}]})),
        ]);
        let analysis = analyze_meeting(&provider, "transcript...", DetailLevel::Medium).await;
        assert_eq!(analysis.session_title.as_deref(), Some("Weekly Sync"));
        assert_eq!(analysis.people, vec!["Alice", "Bob"]);
        assert_eq!(analysis.levels.medium.len(), 1);
        assert_eq!(analysis.levels.light.len(), 1);
        assert_eq!(analysis.levels.detailed.len(), 1);
        // identity shared across levels by title correspondence
        let base_id = &analysis.levels.medium[0].id;
        assert_eq!(&analysis.levels.light[0].id, base_id);
        assert_eq!(&analysis.levels.detailed[0].id, base_id);
    }

    #[tokio::test]
    async fn test_meeting_analysis_degrades_on_failure() {
        let provider = ScriptedProvider::new(vec![Err(ProviderError::Network("down".into()))]);
        let analysis = analyze_meeting(&provider, "transcript...", DetailLevel::Medium).await;
        assert!(analysis.levels.medium.is_empty());
        assert_eq!(analysis.reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_refinement_trusts_returned_forest() {
        let provider = ScriptedProvider::new(vec![ScriptedProvider::parsed(json!({
            "reply": "Broke it down.",
            "tasks": [
                {"id": "t1", "title": "Implement Auth", "subtasks": [
                    {"title": "Password hashing"},
                    {"title": "Session tokens"}
                ]},
                {"id": "t2", "title": "Write docs"}
            ]
        }))]);
        let existing = vec![
            {
                let mut t = Task::titled("Implement Auth");
                t.id = "t1".into();
                t
            },
            {
                let mut t = Task::titled("Write docs");
                t.id = "t2".into();
                t
            },
        ];
        let selected = vec![existing[0].clone()];
        let result =
            refine_tasks(&provider, "break down auth", &existing, &selected, None).await;
        assert_eq!(result.tasks.len(), 2);
        assert_eq!(result.tasks[0].subtasks.len(), 2);
        assert_eq!(result.tasks[1].id, "t2");
    }
}
