//! Free-text task matching.
//!
//! Scores every task in the forest against the query tokens and resolves the
//! outcome with a fixed absolute tie band: if more than one candidate sits
//! within the band of the top score, the caller must ask the user rather than
//! guess.

use std::cmp::Ordering;

use crate::text::tokenize;
use crate::tree::flatten;
use crate::types::{MatchCandidate, Task};

/// Query tokens plus every task that matched at least one of them, sorted by
/// descending score.
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub tokens: Vec<String>,
    pub candidates: Vec<MatchCandidate>,
}

/// Resolution of a match report against the tie policy.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    /// The query produced no usable tokens; ask the user to name the task.
    NoTokens,
    /// No task matched any token; report it, mutate nothing.
    NoMatch,
    /// Several candidates scored within the tie band; present them and ask.
    Tie(Vec<MatchCandidate>),
    /// Exactly one candidate survived the band; safe to act on it.
    Unique(MatchCandidate),
}

/// Score existing tasks against a free-text query.
///
/// score = (query tokens appearing as substrings of `title + " " + description`)
///         / (total query tokens)
pub fn find_matches(message: &str, tasks: &[Task]) -> MatchReport {
    let tokens = tokenize(message);
    let mut candidates = Vec::new();

    if !tokens.is_empty() {
        for task in flatten(tasks) {
            let haystack = format!(
                "{} {}",
                task.title,
                task.description.as_deref().unwrap_or("")
            )
            .to_lowercase();
            let hits = tokens.iter().filter(|t| haystack.contains(t.as_str())).count();
            if hits > 0 {
                candidates.push(MatchCandidate {
                    task: task.clone(),
                    score: hits as f64 / tokens.len() as f64,
                });
            }
        }
        // Stable sort keeps pre-order among equal scores
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    }

    MatchReport { tokens, candidates }
}

impl MatchReport {
    /// Apply the tie policy. `tie_band` is an absolute margin below the top
    /// score; `max_shown` caps how many tied candidates are surfaced.
    pub fn resolve(&self, tie_band: f64, max_shown: usize) -> MatchOutcome {
        if self.tokens.is_empty() {
            return MatchOutcome::NoTokens;
        }
        let Some(top) = self.candidates.first() else {
            return MatchOutcome::NoMatch;
        };
        let tied: Vec<MatchCandidate> = self
            .candidates
            .iter()
            .filter(|c| top.score - c.score <= tie_band)
            .cloned()
            .collect();
        if tied.len() > 1 {
            MatchOutcome::Tie(tied.into_iter().take(max_shown).collect())
        } else {
            MatchOutcome::Unique(top.clone())
        }
    }
}
