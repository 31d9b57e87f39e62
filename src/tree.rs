//! Recursive task-forest utilities: flatten, id assignment, validity
//! filtering, metadata merge.
//!
//! Trees are small and externally bounded, so plain recursion is fine. The
//! one structural hazard — a descendant carrying an ancestor's id after a
//! provider rewrite — is handled by `dedupe_cyclic_ids`.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

use crate::types::Task;

/// Title given to nodes the provider emitted without one.
pub const UNTITLED_FALLBACK: &str = "Untitled Task";

/// Bare list markers: "1.", "12)", "a)", "B." — numbering or lettering with
/// no actual content. The trailing punctuation is required: a title that is
/// just "3" is odd but not a marker.
fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:\d+[.)]|[A-Za-z][.)])\s*$").unwrap())
}

/// True for titles that are empty, whitespace-only, or a bare list marker.
pub fn is_placeholder_title(title: &str) -> bool {
    title.trim().is_empty() || placeholder_re().is_match(title)
}

/// Pre-order traversal collapsing the forest into a flat ordered list.
pub fn flatten(tasks: &[Task]) -> Vec<&Task> {
    fn walk<'a>(tasks: &'a [Task], out: &mut Vec<&'a Task>) {
        for task in tasks {
            out.push(task);
            walk(&task.subtasks, out);
        }
    }
    let mut out = Vec::new();
    walk(tasks, &mut out);
    out
}

/// Ensure every node has an id and a usable title. Idempotent: nodes that
/// already carry an id keep it, so re-running over an identified forest is a
/// no-op.
pub fn assign_stable_ids(tasks: Vec<Task>) -> Vec<Task> {
    tasks
        .into_iter()
        .map(|mut task| {
            if task.id.trim().is_empty() {
                task.id = Uuid::new_v4().to_string();
            }
            if task.title.trim().is_empty() {
                task.title = UNTITLED_FALLBACK.to_string();
            }
            task.subtasks = assign_stable_ids(std::mem::take(&mut task.subtasks));
            task
        })
        .collect()
}

/// Depth-first drop of invalid nodes. A node with a placeholder title is
/// removed along with its subtree; a surviving node's subtasks are exactly
/// its valid children, recursively filtered. `subtasks` is always a Vec
/// (possibly empty) — there is no "missing vs empty" ambiguity.
pub fn filter_valid(tasks: Vec<Task>) -> Vec<Task> {
    tasks
        .into_iter()
        .filter_map(|mut task| {
            task.subtasks = filter_valid(std::mem::take(&mut task.subtasks));
            if is_placeholder_title(&task.title) {
                None
            } else {
                Some(task)
            }
        })
        .collect()
}

/// Clear any descendant id that duplicates an ancestor id, so
/// `assign_stable_ids` mints a fresh one. Owned trees cannot be structurally
/// cyclic, but a provider rewrite can echo a parent id onto a child and that
/// would break id-keyed operations like delete.
pub fn dedupe_cyclic_ids(tasks: Vec<Task>) -> Vec<Task> {
    fn walk(tasks: Vec<Task>, ancestors: &mut HashSet<String>) -> Vec<Task> {
        tasks
            .into_iter()
            .map(|mut task| {
                if !task.id.is_empty() && ancestors.contains(&task.id) {
                    log::warn!("task '{}' repeats ancestor id {}; reassigning", task.title, task.id);
                    task.id = String::new();
                }
                let tracked = !task.id.is_empty() && ancestors.insert(task.id.clone());
                task.subtasks = walk(std::mem::take(&mut task.subtasks), ancestors);
                if tracked {
                    ancestors.remove(&task.id);
                }
                task
            })
            .collect()
    }
    walk(tasks, &mut HashSet::new())
}

/// Remove the task with the given id, and its whole subtree, from the forest.
/// Returns the shrunk forest and whether anything was removed.
pub fn remove_task(tasks: Vec<Task>, id: &str) -> (Vec<Task>, bool) {
    let mut removed = false;
    let mut kept = Vec::with_capacity(tasks.len());
    for mut task in tasks {
        if task.id == id {
            removed = true;
            continue;
        }
        let (subtasks, sub_removed) = remove_task(std::mem::take(&mut task.subtasks), id);
        task.subtasks = subtasks;
        removed = removed || sub_removed;
        kept.push(task);
    }
    (kept, removed)
}

/// Merge metadata from a prior version of a task into its rewrite. The
/// incoming task is authoritative; gaps are filled from the existing one.
pub fn merge_metadata(existing: &Task, mut incoming: Task) -> Task {
    if incoming.description.is_none() {
        incoming.description = existing.description.clone();
    }
    if incoming.assignee_name.is_none() {
        incoming.assignee_name = existing.assignee_name.clone();
    }
    if incoming.due_at.is_none() {
        incoming.due_at = existing.due_at.clone();
    }
    if incoming.source_evidence.is_empty() {
        incoming.source_evidence = existing.source_evidence.clone();
    }
    incoming
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskStatus;

    fn task(id: &str, title: &str, subtasks: Vec<Task>) -> Task {
        Task {
            id: id.to_string(),
            title: title.to_string(),
            subtasks,
            ..Default::default()
        }
    }

    #[test]
    fn test_flatten_is_pre_order() {
        let forest = vec![
            task("1", "a", vec![task("2", "a1", vec![]), task("3", "a2", vec![])]),
            task("4", "b", vec![]),
        ];
        let ids: Vec<&str> = flatten(&forest).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_assign_ids_fills_gaps_recursively() {
        let forest = vec![task("", "", vec![task("", "child", vec![])])];
        let out = assign_stable_ids(forest);
        assert!(!out[0].id.is_empty());
        assert_eq!(out[0].title, UNTITLED_FALLBACK);
        assert!(!out[0].subtasks[0].id.is_empty());
        assert_eq!(out[0].subtasks[0].title, "child");
    }

    #[test]
    fn test_assign_ids_is_idempotent() {
        let once = assign_stable_ids(vec![task("", "write docs", vec![task("", "outline", vec![])])]);
        let twice = assign_stable_ids(once.clone());
        assert_eq!(once[0].id, twice[0].id);
        assert_eq!(once[0].subtasks[0].id, twice[0].subtasks[0].id);
    }

    #[test]
    fn test_placeholder_shapes() {
        for bad in ["", "   ", "1.", "12)", "a)", "B."] {
            assert!(is_placeholder_title(bad), "expected placeholder: {:?}", bad);
        }
        // bare digits and letters lack the marker punctuation and survive
        for good in ["Valid Task", "a real thing", "1. Review the doc", "3"] {
            assert!(!is_placeholder_title(good), "expected valid: {:?}", good);
        }
    }

    #[test]
    fn test_filter_valid_preserves_order() {
        let forest = ["Valid Task", "", " ", "1.", "a)", "Another valid one"]
            .iter()
            .map(|t| task("", t, vec![]))
            .collect();
        let titles: Vec<String> = filter_valid(forest).into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["Valid Task", "Another valid one"]);
    }

    #[test]
    fn test_filter_valid_recurses_without_orphaning_siblings() {
        // parent -> [valid child, invalid child with only invalid children]
        let forest = vec![task(
            "p",
            "Parent",
            vec![
                task("c1", "Keep me", vec![]),
                task("c2", "2)", vec![task("c3", " ", vec![])]),
            ],
        )];
        let out = filter_valid(forest);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].subtasks.len(), 1);
        assert_eq!(out[0].subtasks[0].title, "Keep me");
        assert!(out[0].subtasks[0].subtasks.is_empty());
    }

    #[test]
    fn test_dedupe_cyclic_ids_clears_descendant_duplicate() {
        let forest = vec![task("t1", "Parent", vec![task("t1", "Child", vec![])])];
        let out = dedupe_cyclic_ids(forest);
        assert_eq!(out[0].id, "t1");
        assert_eq!(out[0].subtasks[0].id, "");
        // siblings sharing an id are left alone; only ancestor/descendant pairs
        let siblings = dedupe_cyclic_ids(vec![task("x", "a", vec![]), task("x", "b", vec![])]);
        assert_eq!(siblings[0].id, "x");
        assert_eq!(siblings[1].id, "x");
    }

    #[test]
    fn test_remove_task_takes_descendants() {
        let forest = vec![
            task("t1", "Auth", vec![task("t2", "Tokens", vec![])]),
            task("t3", "Docs", vec![]),
        ];
        let (out, removed) = remove_task(forest, "t1");
        assert!(removed);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "t3");

        let (same, removed) = remove_task(vec![task("t3", "Docs", vec![])], "missing");
        assert!(!removed);
        assert_eq!(same.len(), 1);
    }

    #[test]
    fn test_merge_metadata_incoming_wins() {
        let mut existing = task("t1", "Auth", vec![]);
        existing.description = Some("old desc".into());
        existing.assignee_name = Some("Sam".into());

        let mut incoming = task("t1", "Auth", vec![]);
        incoming.description = Some("new desc".into());
        incoming.status = TaskStatus::Done;

        let merged = merge_metadata(&existing, incoming);
        assert_eq!(merged.description.as_deref(), Some("new desc"));
        assert_eq!(merged.assignee_name.as_deref(), Some("Sam"));
        assert_eq!(merged.status, TaskStatus::Done);
    }
}
