//! Shared data shapes for the turn contract.
//!
//! All wire types are camelCase JSON with defaulted fields so that partially
//! populated provider output still deserializes. The task forest is the only
//! piece of state the dispatcher owns: it is read from the request and
//! replaced wholesale in the response, never patched in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task priority level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

/// Task completion status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    Done,
}

/// A snippet of source text grounding a task in the transcript or message
/// it was extracted from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEvidence {
    #[serde(default)]
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// A single task node. Recursive: `subtasks` holds the same shape.
///
/// `id` is assigned once (see `tree::assign_stable_ids`) and preserved across
/// every subsequent rewrite of the forest. An empty `id` means "not yet
/// assigned" and only ever appears on freshly extracted tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_name: Option<String>,
    /// ISO 8601 due date, when one was stated or implied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_evidence: Vec<SourceEvidence>,
    #[serde(default)]
    pub subtasks: Vec<Task>,
}

impl Task {
    /// Convenience constructor for a titled task with no metadata.
    pub fn titled(title: impl Into<String>) -> Self {
        Task {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Granularity of the extracted forest. Three alternate forests describe the
/// same underlying work; top-level identity is shared across them where the
/// titles correspond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Light,
    #[default]
    Medium,
    Detailed,
}

/// The three alternate forests produced by meeting analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLevels {
    #[serde(default)]
    pub light: Vec<Task>,
    #[serde(default)]
    pub medium: Vec<Task>,
    #[serde(default)]
    pub detailed: Vec<Task>,
}

impl TaskLevels {
    pub fn level(&self, level: DetailLevel) -> &Vec<Task> {
        match level {
            DetailLevel::Light => &self.light,
            DetailLevel::Medium => &self.medium,
            DetailLevel::Detailed => &self.detailed,
        }
    }
}

/// The destructive action a pending confirmation guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingAction {
    Delete,
}

/// Ephemeral confirm-before-destroy state. Returned in the response when a
/// destructive request needs confirmation; the caller echoes it back on the
/// next turn. Never persisted beyond that exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingConfirmation {
    pub task_id: String,
    pub task_title: String,
    pub action: PendingAction,
}

/// One conversational turn as submitted by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    /// The current user utterance.
    pub message: String,
    /// The full current forest. Never mutated in place — the response carries
    /// a complete replacement.
    #[serde(default)]
    pub existing_tasks: Vec<Task>,
    /// Explicit subset the user is operating on, when the UI supports
    /// selection.
    #[serde(default)]
    pub selected_tasks: Vec<Task>,
    /// A single task the user wants broken down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_task_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_meeting_transcript: Option<String>,
    /// Reference to a prior session in the same recurring series.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_meeting_id: Option<String>,
    /// Detail level for meeting analysis. Absent means "use the configured
    /// default".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_detail_level: Option<DetailLevel>,
    #[serde(default)]
    pub is_first_message: bool,
    /// Echo of a pending confirmation from the previous response, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_confirmation: Option<PendingConfirmation>,
}

/// The complete response for one turn. `tasks` is always the authoritative
/// forest after this turn, for every routing branch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub chat_response_text: String,
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_task_levels: Option<TaskLevels>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub people: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qa_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_confirmation: Option<PendingConfirmation>,
}

/// A scored match between a free-text query and an existing task.
/// `score` is the fraction of query tokens found in the task's text, in [0, 1].
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub task: Task,
    pub score: f64,
}

/// A prior session as returned by the session store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_defaults_from_sparse_json() {
        let task: Task = serde_json::from_str(r#"{"title": "Ship it"}"#).unwrap();
        assert_eq!(task.title, "Ship it");
        assert_eq!(task.id, "");
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.status, TaskStatus::Todo);
        assert!(task.subtasks.is_empty());
    }

    #[test]
    fn test_task_round_trips_camel_case() {
        let mut task = Task::titled("Review PR");
        task.assignee_name = Some("Dana".into());
        task.due_at = Some("2026-09-01".into());
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["assigneeName"], "Dana");
        assert_eq!(json["dueAt"], "2026-09-01");
        assert_eq!(json["priority"], "medium");
    }

    #[test]
    fn test_detail_level_selector() {
        let levels = TaskLevels {
            light: vec![Task::titled("a")],
            medium: vec![Task::titled("b")],
            detailed: vec![Task::titled("c")],
        };
        assert_eq!(levels.level(DetailLevel::Light)[0].title, "a");
        assert_eq!(levels.level(DetailLevel::Detailed)[0].title, "c");
    }
}
