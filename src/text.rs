//! Text normalization shared by the matcher and the classifier fallback.
//!
//! Both call sites score against the same token stream so that "which task
//! does this message mean" is answered consistently everywhere.

/// Tokens this short carry no matching signal.
const MIN_TOKEN_LEN: usize = 3;

/// Filler words stripped before matching. Interrogatives are included so a
/// question about a task scores on the task words, not the question words.
/// Only words of length >= 3 need listing; shorter ones fall to the length
/// filter anyway.
const STOP_WORDS: &[&str] = &[
    "the", "and", "but", "for", "with", "from", "into", "about", "over", "after", "before",
    "are", "was", "were", "been", "being", "its", "this", "that", "these", "those", "there",
    "our", "you", "your", "they", "their", "them", "his", "her", "does", "did", "have", "has",
    "had", "will", "would", "should", "could", "can", "may", "might", "must", "please",
    "task", "tasks", "item", "items", "what", "whats", "when", "where", "which", "why",
    "how", "who",
];

/// Normalize a string to a lowercase, alphanumeric-only token sequence with
/// stop-words and short tokens removed. Deterministic, no side effects.
pub fn tokenize(input: &str) -> Vec<String> {
    input
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|t| t.len() >= MIN_TOKEN_LEN && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}
