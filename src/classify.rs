//! Severity classification: a pure, total function from a line's text to one
//! of six buckets. Case-insensitive scan for the first whole-word occurrence
//! of a level keyword, tested in a fixed priority order. No multi-line
//! awareness; a line is classified independently of its neighbors.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Other,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Other => "OTHER",
        };
        f.write_str(s)
    }
}

/// Keyword, case-insensitive, tried in priority order. `WARN`/`WARNING` and
/// `ERR`/`ERROR` both resolve to their bucket.
const KEYWORDS: &[(&str, Severity)] = &[
    ("trace", Severity::Trace),
    ("debug", Severity::Debug),
    ("info", Severity::Info),
    ("warning", Severity::Warn),
    ("warn", Severity::Warn),
    ("error", Severity::Error),
    ("err", Severity::Error),
];

/// Classifies a single line's text. Scans the whole line (not just the first
/// token) for the first whole-word hit among the keywords above, in the
/// priority order they are listed — so a line containing both "info" and a
/// later "error" classifies as INFO if "info" appears first in priority
/// order among whatever keywords are present, not by position in the text.
pub fn classify(line: &str) -> Severity {
    for &(keyword, severity) in KEYWORDS {
        if contains_whole_word_ci(line, keyword) {
            return severity;
        }
    }
    Severity::Other
}

/// Case-insensitive whole-word search: `needle` must occur in `haystack`
/// bounded on both sides by a non-alphanumeric byte (or the string edge).
fn contains_whole_word_ci(haystack: &str, needle: &str) -> bool {
    let hay_lower = haystack.to_ascii_lowercase();
    let needle = needle.as_bytes();
    let hay = hay_lower.as_bytes();
    if needle.is_empty() || needle.len() > hay.len() {
        return false;
    }
    let mut start = 0;
    while start + needle.len() <= hay.len() {
        if &hay[start..start + needle.len()] == needle {
            let before_ok = start == 0 || !is_word_byte(hay[start - 1]);
            let after_idx = start + needle.len();
            let after_ok = after_idx == hay.len() || !is_word_byte(hay[after_idx]);
            if before_ok && after_ok {
                return true;
            }
        }
        start += 1;
    }
    false
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_each_level() {
        assert_eq!(classify("a trace message"), Severity::Trace);
        assert_eq!(classify("DEBUG: connecting"), Severity::Debug);
        assert_eq!(classify("Info: started"), Severity::Info);
        assert_eq!(classify("WARNING: low disk"), Severity::Warn);
        assert_eq!(classify("warn: retrying"), Severity::Warn);
        assert_eq!(classify("ERROR: panic"), Severity::Error);
        assert_eq!(classify("err=broken pipe"), Severity::Error);
    }

    #[test]
    fn falls_back_to_other() {
        assert_eq!(classify("just a plain line"), Severity::Other);
        assert_eq!(classify(""), Severity::Other);
    }

    #[test]
    fn does_not_match_inside_a_longer_word() {
        // "information" contains "info" but not as a whole word boundary
        // only on one side; whole-word match still succeeds here since
        // "info" is followed by a word byte, so it must NOT match.
        assert_eq!(classify("informational notice"), Severity::Other);
    }

    #[test]
    fn matches_first_keyword_in_priority_order() {
        // Contains both "warn" and "error"; TRACE..ERROR priority order
        // means "warn" (checked before "error") wins if both appear,
        // since WARN/WARNING is tested before ERR/ERROR.
        assert_eq!(classify("warn: will error later"), Severity::Warn);
    }

    #[test]
    fn is_case_insensitive() {
        assert_eq!(classify("TrAcE event"), Severity::Trace);
    }
}
