//! Error kinds surfaced by the log workbench core, per the five failure
//! categories the controller must distinguish: a failed index build, a
//! persisted-store transaction abort, an unparsable regex, an out-of-range
//! request, and a stale result racing a disposed provider or superseded jump.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogWorkbenchError {
    /// A chunk read failed while streaming the file for index construction.
    /// The caller must abort the import and drop the partial offset table.
    #[error("failed to build line index for {file_name}: {source}")]
    IndexBuild {
        file_name: String,
        #[source]
        source: std::io::Error,
    },

    /// A persisted-store (IndexedDB) transaction aborted. Callers should
    /// degrade the affected file to the index-only large-file path when
    /// possible.
    #[error("storage operation failed: {0}")]
    Storage(String),

    /// A filter's regex source failed to compile. The matcher degrades to
    /// a predicate that never matches rather than propagating this further.
    #[error("invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// A requested line range fell outside `[1, total_lines]`. Reserved for
    /// diagnostics; public range accessors clamp silently instead of
    /// returning this variant.
    #[error("range [{from}, {to}] out of bounds for {total_lines} lines")]
    RangeOutOfBounds {
        from: usize,
        to: usize,
        total_lines: usize,
    },

    /// A result arrived for a provider that has since been disposed, or for
    /// a jump that has since been superseded by a newer one. Always
    /// discarded at the merge point, never shown to the user.
    #[error("stale result discarded")]
    StaleResult,
}

pub type Result<T> = std::result::Result<T, LogWorkbenchError>;
