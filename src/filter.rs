//! Compiles a filter configuration (text/regex query, case sensitivity,
//! severity level) into a predicate that reports both whether a line
//! matches and the character-offset ranges of every match, for
//! highlighting. Generalizes the engine's original line-level byte
//! substring scan (`match_lines`/`contains_subslice`) into a richer
//! per-line predicate with character ranges and an optional regex mode.

use crate::classify::Severity;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Text,
    Regex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelFilter {
    All,
    Only(Severity),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    pub query: String,
    pub mode: FilterMode,
    pub case_sensitive: bool,
    pub level: LevelFilter,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            query: String::new(),
            mode: FilterMode::Text,
            case_sensitive: false,
            level: LevelFilter::All,
        }
    }
}

/// A single match range `[start, end)` in character offsets (not bytes).
pub type CharRange = (usize, usize);

#[derive(Debug, Clone)]
pub struct MatchResult {
    pub matched: bool,
    pub ranges: Vec<CharRange>,
}

/// A filter compiled once and reused across every line in the current
/// window. Regex compilation failures are absorbed here: an invalid regex
/// compiles successfully to a matcher that always reports no match, rather
/// than propagating an error up to the caller (spec: invalid regex must not
/// unmount the viewport).
pub struct CompiledFilter {
    query_empty: bool,
    case_sensitive: bool,
    level: LevelFilter,
    strategy: Strategy,
}

enum Strategy {
    Text { needle_chars: Vec<char> },
    Regex { regex: Option<Regex> },
}

impl CompiledFilter {
    pub fn compile(config: &FilterConfig) -> Self {
        let query_empty = config.query.is_empty();
        let strategy = match config.mode {
            FilterMode::Text => {
                let needle = if config.case_sensitive {
                    config.query.clone()
                } else {
                    config.query.to_lowercase()
                };
                Strategy::Text {
                    needle_chars: needle.chars().collect(),
                }
            }
            FilterMode::Regex => {
                let pattern = if config.case_sensitive {
                    config.query.clone()
                } else {
                    format!("(?i){}", config.query)
                };
                let regex = match Regex::new(&pattern) {
                    Ok(r) => Some(r),
                    Err(e) => {
                        warn!(pattern = %config.query, error = %e, "invalid filter regex, matcher disabled");
                        None
                    }
                };
                Strategy::Regex { regex }
            }
        };
        Self {
            query_empty,
            case_sensitive: config.case_sensitive,
            level: config.level,
            strategy,
        }
    }

    pub fn passes_severity(&self, severity: Severity) -> bool {
        match self.level {
            LevelFilter::All => true,
            LevelFilter::Only(level) => severity == level,
        }
    }

    /// Evaluates the query predicate against a single line's text. An empty
    /// query matches every line with no highlight ranges.
    pub fn evaluate(&self, text: &str) -> MatchResult {
        if self.query_empty {
            return MatchResult {
                matched: true,
                ranges: Vec::new(),
            };
        }
        match &self.strategy {
            Strategy::Text { needle_chars } => {
                let ranges = text_match_ranges(text, needle_chars, self.case_sensitive);
                MatchResult {
                    matched: !ranges.is_empty(),
                    ranges,
                }
            }
            Strategy::Regex { regex: Some(regex) } => {
                let ranges = regex_match_ranges(text, regex);
                MatchResult {
                    matched: !ranges.is_empty(),
                    ranges,
                }
            }
            Strategy::Regex { regex: None } => MatchResult {
                matched: false,
                ranges: Vec::new(),
            },
        }
    }

    /// A line is visible iff `(passesSeverity AND predicate)` or it is
    /// pinned; when `show_only_pinned` is set, pinned lines are the only
    /// visible lines regardless of filter state.
    pub fn is_visible(&self, text: &str, severity: Severity, pinned: bool, show_only_pinned: bool) -> bool {
        if show_only_pinned {
            return pinned;
        }
        let passes = self.passes_severity(severity) && self.evaluate(text).matched;
        passes || pinned
    }
}

/// Non-overlapping substring match ranges in character offsets.
fn text_match_ranges(text: &str, needle_chars: &[char], case_sensitive: bool) -> Vec<CharRange> {
    if needle_chars.is_empty() {
        return Vec::new();
    }
    let haystack: Vec<char> = if case_sensitive {
        text.chars().collect()
    } else {
        text.to_lowercase().chars().collect()
    };
    let mut ranges = Vec::new();
    let mut i = 0;
    while i + needle_chars.len() <= haystack.len() {
        if haystack[i..i + needle_chars.len()] == *needle_chars {
            ranges.push((i, i + needle_chars.len()));
            i += needle_chars.len();
        } else {
            i += 1;
        }
    }
    ranges
}

/// Non-overlapping regex match ranges, converted from byte offsets (what
/// `regex` reports) to character offsets. Zero-length matches advance by
/// one position, which `Regex::find_iter` already guarantees.
fn regex_match_ranges(text: &str, regex: &Regex) -> Vec<CharRange> {
    let byte_to_char = byte_to_char_offsets(text);
    regex
        .find_iter(text)
        .map(|m| (byte_to_char[m.start()], byte_to_char[m.end()]))
        .collect()
}

fn byte_to_char_offsets(text: &str) -> Vec<usize> {
    let mut map = vec![0usize; text.len() + 1];
    let mut char_idx = 0;
    for (byte_idx, _) in text.char_indices() {
        map[byte_idx] = char_idx;
        char_idx += 1;
    }
    map[text.len()] = char_idx;
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_matches_everything_with_no_ranges() {
        let filter = CompiledFilter::compile(&FilterConfig::default());
        let result = filter.evaluate("anything at all");
        assert!(result.matched);
        assert!(result.ranges.is_empty());
    }

    #[test]
    fn text_mode_case_insensitive_by_default() {
        let config = FilterConfig {
            query: "warn".into(),
            ..Default::default()
        };
        let filter = CompiledFilter::compile(&config);
        let result = filter.evaluate("WARN: low disk");
        assert!(result.matched);
        assert_eq!(result.ranges, vec![(0, 4)]);
    }

    #[test]
    fn text_mode_non_overlapping_occurrences() {
        let config = FilterConfig {
            query: "aa".into(),
            case_sensitive: true,
            ..Default::default()
        };
        let filter = CompiledFilter::compile(&config);
        // "aaaa" => matches at [0,2) and [2,4), not an overlapping [1,3).
        let result = filter.evaluate("aaaa");
        assert_eq!(result.ranges, vec![(0, 2), (2, 4)]);
    }

    #[test]
    fn regex_mode_matches_and_invalid_regex_disables_matching() {
        let config = FilterConfig {
            query: "^warn".into(),
            mode: FilterMode::Regex,
            ..Default::default()
        };
        let filter = CompiledFilter::compile(&config);
        assert!(filter.evaluate("warn: x").matched);
        assert!(!filter.evaluate("info: ok").matched);

        let bad = FilterConfig {
            query: "(unclosed".into(),
            mode: FilterMode::Regex,
            ..Default::default()
        };
        let filter = CompiledFilter::compile(&bad);
        let result = filter.evaluate("anything");
        assert!(!result.matched);
        assert!(result.ranges.is_empty());
    }

    #[test]
    fn severity_filter_restricts_to_one_level() {
        let config = FilterConfig {
            level: LevelFilter::Only(Severity::Error),
            ..Default::default()
        };
        let filter = CompiledFilter::compile(&config);
        assert!(filter.passes_severity(Severity::Error));
        assert!(!filter.passes_severity(Severity::Warn));
    }

    #[test]
    fn pinned_lines_are_visible_even_when_filtered_out() {
        let config = FilterConfig {
            query: "nomatch".into(),
            ..Default::default()
        };
        let filter = CompiledFilter::compile(&config);
        assert!(filter.is_visible("does not contain the query", Severity::Info, true, false));
        assert!(!filter.is_visible("does not contain the query", Severity::Info, false, false));
    }

    #[test]
    fn show_only_pinned_hides_everything_else() {
        let filter = CompiledFilter::compile(&FilterConfig::default());
        assert!(filter.is_visible("anything", Severity::Info, true, true));
        assert!(!filter.is_visible("anything", Severity::Info, false, true));
    }

    #[test]
    fn scenario_regex_filter_warn_lines() {
        let lines = ["info: ok", "warn: x", "error: y", "warn: z"];
        let config = FilterConfig {
            query: "^warn".into(),
            mode: FilterMode::Regex,
            case_sensitive: false,
            ..Default::default()
        };
        let filter = CompiledFilter::compile(&config);
        let visible: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, l)| filter.evaluate(l).matched)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(visible, vec![1, 3]);
        assert_eq!(filter.evaluate(lines[1]).ranges, vec![(0, 4)]);
        assert_eq!(filter.evaluate(lines[3]).ranges, vec![(0, 4)]);
    }
}
