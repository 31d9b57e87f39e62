//! Task continuity across turns and recurring meeting series.
//!
//! Matching is deliberately permissive — case-folded equality or substring
//! containment in either direction — favoring continuity across paraphrase
//! over precision. Short generic titles can false-merge; that trade-off is
//! documented rather than tightened here.

use std::collections::HashSet;

use crate::tree::{flatten, merge_metadata};
use crate::types::Task;

/// Case-folded title correspondence: equal, or one contains the other.
pub fn titles_correspond(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(&b) || b.contains(&a)
}

/// Link newly extracted tasks to prior tasks by title correspondence,
/// overwriting the new task's id with the prior task's id on a hit. The new
/// task's other fields (status included) stay authoritative; metadata gaps
/// are filled from the prior task. Each prior task links at most once.
///
/// An incoming task whose id already names a prior task is trusted as-is:
/// it keeps that id and is never title-linked, and its id is reserved up
/// front so no other incoming task can take it via a title match. Without
/// this, an echoed task could steal a different task's identity.
pub fn reconcile_ids(tasks: Vec<Task>, prior: &[Task]) -> Vec<Task> {
    let prior_flat = flatten(prior);
    let prior_ids: HashSet<&str> = prior_flat.iter().map(|p| p.id.as_str()).collect();
    let mut consumed: HashSet<String> = flatten(&tasks)
        .iter()
        .filter(|t| !t.id.is_empty() && prior_ids.contains(t.id.as_str()))
        .map(|t| t.id.clone())
        .collect();

    fn walk(
        tasks: Vec<Task>,
        prior_flat: &[&Task],
        prior_ids: &HashSet<&str>,
        consumed: &mut HashSet<String>,
    ) -> Vec<Task> {
        tasks
            .into_iter()
            .map(|mut task| {
                if !task.id.is_empty() && prior_ids.contains(task.id.as_str()) {
                    if let Some(same) = prior_flat.iter().find(|p| p.id == task.id) {
                        task = merge_metadata(same, task);
                    }
                } else if let Some(hit) = prior_flat.iter().find(|p| {
                    !consumed.contains(&p.id) && titles_correspond(&task.title, &p.title)
                }) {
                    log::debug!(
                        "rollover: '{}' carries id {} from prior '{}'",
                        task.title,
                        hit.id,
                        hit.title
                    );
                    consumed.insert(hit.id.clone());
                    task.id = hit.id.clone();
                    task = merge_metadata(hit, task);
                }
                task.subtasks =
                    walk(std::mem::take(&mut task.subtasks), prior_flat, prior_ids, consumed);
                task
            })
            .collect()
    }

    walk(tasks, &prior_flat, &prior_ids, &mut consumed)
}

/// Reconcile ids against the existing forest, then append any existing root
/// whose id ended up absent from the result. This keeps every routing branch
/// returning a superset of the caller's forest, even when an extraction
/// rewrite dropped items it didn't mention.
pub fn carry_forward(tasks: Vec<Task>, existing: &[Task]) -> Vec<Task> {
    let mut out = reconcile_ids(tasks, existing);
    let present: HashSet<String> = flatten(&out).iter().map(|t| t.id.clone()).collect();
    for root in existing {
        if !root.id.is_empty() && !present.contains(&root.id) {
            out.push(root.clone());
        }
    }
    out
}
