//! Two-step confirm-before-destroy workflow.
//!
//! The source of truth is the explicit `PendingConfirmation` the caller
//! echoes back on the next turn, not re-parsed natural language. The literal
//! "confirm delete <title>" phrase is still honored so a one-shot
//! confirmation works without the echo.

use crate::tree::flatten;
use crate::types::{PendingConfirmation, Task};

const AFFIRMATIVES: &[&str] = &[
    "yes", "yep", "yeah", "confirm", "confirmed", "do it", "go ahead", "proceed", "sure",
];

/// The exact phrase a user can send to confirm deletion of a task.
pub fn confirmation_phrase(title: &str) -> String {
    format!("confirm delete {}", title)
}

/// Prompt returned when a delete needs confirming. Names the exact task so
/// there is no doubt what is about to be destroyed.
pub fn confirmation_prompt(task: &Task) -> String {
    let descendants = flatten(&task.subtasks).len();
    let scope = if descendants > 0 {
        format!(" and its {} subtask(s)", descendants)
    } else {
        String::new()
    };
    format!(
        "This will permanently delete \"{}\"{}. Reply \"{}\" (or just \"yes\") to go ahead.",
        task.title,
        scope,
        confirmation_phrase(&task.title)
    )
}

/// Does this message confirm the pending action? Either an affirmative reply
/// or the exact confirmation phrase for the pending task's title.
pub fn message_confirms(message: &str, pending: &PendingConfirmation) -> bool {
    let msg = message.trim().to_lowercase();
    if msg == confirmation_phrase(&pending.task_title).to_lowercase() {
        return true;
    }
    // A full confirmation phrase naming a different task is not a yes
    if msg.starts_with("confirm delete ") {
        return false;
    }
    AFFIRMATIVES
        .iter()
        .any(|a| msg == *a || msg.starts_with(&format!("{} ", a)) || msg.starts_with(&format!("{},", a)))
}

/// Parse a one-shot "confirm delete <title>" message. Returns the named title.
pub fn explicit_delete_confirmation(message: &str) -> Option<String> {
    let msg = message.trim();
    let rest = msg
        .strip_prefix("confirm delete ")
        .or_else(|| msg.strip_prefix("Confirm delete "))
        .or_else(|| msg.strip_prefix("CONFIRM DELETE "))?;
    let title = rest.trim().trim_matches('"');
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PendingAction;

    fn pending(title: &str) -> PendingConfirmation {
        PendingConfirmation {
            task_id: "t1".into(),
            task_title: title.into(),
            action: PendingAction::Delete,
        }
    }

    #[test]
    fn test_affirmatives_confirm() {
        for msg in ["yes", "Yes please", "confirm", "go ahead", "do it"] {
            assert!(message_confirms(msg, &pending("Implement Auth")), "{}", msg);
        }
    }

    #[test]
    fn test_exact_phrase_confirms() {
        assert!(message_confirms(
            "confirm delete Implement Auth",
            &pending("Implement Auth")
        ));
    }

    #[test]
    fn test_other_replies_do_not_confirm() {
        for msg in ["no", "wait", "actually rename it", "confirm delete Other Task"] {
            assert!(!message_confirms(msg, &pending("Implement Auth")), "{}", msg);
        }
    }

    #[test]
    fn test_explicit_confirmation_parse() {
        assert_eq!(
            explicit_delete_confirmation("confirm delete Implement Auth").as_deref(),
            Some("Implement Auth")
        );
        assert_eq!(
            explicit_delete_confirmation("Confirm delete \"Write docs\"").as_deref(),
            Some("Write docs")
        );
        assert!(explicit_delete_confirmation("delete the auth task").is_none());
        assert!(explicit_delete_confirmation("confirm delete ").is_none());
    }

    #[test]
    fn test_prompt_names_task_and_scope() {
        let mut task = Task::titled("Implement Auth");
        task.subtasks = vec![Task::titled("Add tokens"), Task::titled("Add login")];
        let prompt = confirmation_prompt(&task);
        assert!(prompt.contains("\"Implement Auth\""));
        assert!(prompt.contains("2 subtask(s)"));
        assert!(prompt.contains("confirm delete Implement Auth"));
    }
}
