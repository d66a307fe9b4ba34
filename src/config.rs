//! Workbench-wide configuration: page size, the small/large-file threshold,
//! and the index builder's chunk size. All three are named explicitly in the
//! external-interfaces surface; out-of-range values are clamped rather than
//! rejected, matching the crate's general "clamp silently" error posture.

use serde::{Deserialize, Serialize};

pub const MIN_PAGE_SIZE: usize = 2_000;
pub const MAX_PAGE_SIZE: usize = 200_000;
pub const DEFAULT_PAGE_SIZE: usize = 10_000;

pub const DEFAULT_LARGE_FILE_THRESHOLD_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_CHUNK_SIZE_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbenchConfig {
    pub page_size: usize,
    pub large_file_threshold_bytes: u64,
    pub chunk_size_bytes: usize,
}

impl WorkbenchConfig {
    /// Builds a config, clamping `page_size` into `[MIN_PAGE_SIZE,
    /// MAX_PAGE_SIZE]`. `large_file_threshold_bytes` and `chunk_size_bytes`
    /// have no meaningful upper bound beyond "not zero".
    pub fn new(page_size: usize, large_file_threshold_bytes: u64, chunk_size_bytes: usize) -> Self {
        Self {
            page_size: page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE),
            large_file_threshold_bytes: large_file_threshold_bytes.max(1),
            chunk_size_bytes: chunk_size_bytes.max(4096),
        }
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);
    }
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            large_file_threshold_bytes: DEFAULT_LARGE_FILE_THRESHOLD_BYTES,
            chunk_size_bytes: DEFAULT_CHUNK_SIZE_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_page_size_below_minimum() {
        let cfg = WorkbenchConfig::new(10, 1024, 1024);
        assert_eq!(cfg.page_size, MIN_PAGE_SIZE);
    }

    #[test]
    fn clamps_page_size_above_maximum() {
        let cfg = WorkbenchConfig::new(10_000_000, 1024, 1024);
        assert_eq!(cfg.page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn default_matches_documented_defaults() {
        let cfg = WorkbenchConfig::default();
        assert_eq!(cfg.large_file_threshold_bytes, 50 * 1024 * 1024);
        assert_eq!(cfg.chunk_size_bytes, 16 * 1024 * 1024);
    }
}
