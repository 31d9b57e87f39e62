//! Dispatcher tunables.
//!
//! Defaults match the documented matching policy; hosts can deserialize an
//! override from their own config file.

use serde::Deserialize;

use crate::types::DetailLevel;

/// Knobs for matching and routing behavior.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatcherConfig {
    /// Fixed absolute score margin within which match candidates are treated
    /// as tied. Absolute rather than relative: it never silently picks one of
    /// two close candidates.
    #[serde(default = "default_tie_band")]
    pub tie_band: f64,
    /// How many tied titles to surface when asking the user to disambiguate.
    #[serde(default = "default_max_tie_candidates")]
    pub max_tie_candidates: usize,
    /// Detail level used when the request does not specify one.
    #[serde(default)]
    pub default_detail_level: DetailLevel,
}

fn default_tie_band() -> f64 {
    0.15
}

fn default_max_tie_candidates() -> usize {
    3
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            tie_band: default_tie_band(),
            max_tie_candidates: default_max_tie_candidates(),
            default_detail_level: DetailLevel::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = DispatcherConfig::default();
        assert!((cfg.tie_band - 0.15).abs() < f64::EPSILON);
        assert_eq!(cfg.max_tie_candidates, 3);
        assert_eq!(cfg.default_detail_level, DetailLevel::Medium);
    }

    #[test]
    fn test_partial_override() {
        let cfg: DispatcherConfig = serde_json::from_str(r#"{"tieBand": 0.2}"#).unwrap();
        assert!((cfg.tie_band - 0.2).abs() < f64::EPSILON);
        assert_eq!(cfg.max_tie_candidates, 3);
    }
}
