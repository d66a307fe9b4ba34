//! The log line data model: a stable cross-file identifier, raw content, and
//! a classified severity. Identity is the `id`; within one file, line
//! numbers form a dense sequence 1..=total_lines.

use crate::classify::{classify, Severity};
use serde::{Deserialize, Serialize};

/// Builds the stable, storage-agnostic identifier `"<fileName>:<lineNumber>"`.
pub fn line_id(file_name: &str, line_number: usize) -> String {
    format!("{file_name}:{line_number}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLine {
    pub id: String,
    pub file_name: String,
    pub line_number: usize,
    pub content: String,
    pub severity: Severity,
}

impl LogLine {
    pub fn new(file_name: impl Into<String>, line_number: usize, content: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let content = content.into();
        let severity = classify(&content);
        Self {
            id: line_id(&file_name, line_number),
            line_number,
            content,
            severity,
            file_name,
        }
    }
}

/// File name -> total line count. Persisted for small files; derived from
/// the offset index at runtime for large files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub total_lines: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Severity;

    #[test]
    fn id_is_file_and_line_number() {
        let line = LogLine::new("a.log", 3, "boot complete");
        assert_eq!(line.id, "a.log:3");
    }

    #[test]
    fn severity_is_classified_from_content() {
        let line = LogLine::new("a.log", 1, "ERROR: disk full");
        assert_eq!(line.severity, Severity::Error);
    }
}
