//! The line-offset index: a byte-offset table of line starts built by a
//! single streaming scan, and the sole random-access primitive
//! (`read_lines`) used to serve arbitrary `[from, to]` line windows without
//! ever holding the whole file in memory.

mod scan;

use crate::error::{LogWorkbenchError, Result};
use scan::scan_line_starts;
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, trace, warn};

/// Packed offset storage: 32-bit when the file fits, 64-bit otherwise.
/// Kept as a sum type rather than a blanket `Vec<u64>` so small files (the
/// overwhelming majority) pay half the memory for their offset table.
#[derive(Debug, Clone)]
enum Offsets {
    U32(Vec<u32>),
    U64(Vec<u64>),
}

impl Offsets {
    fn len(&self) -> usize {
        match self {
            Offsets::U32(v) => v.len(),
            Offsets::U64(v) => v.len(),
        }
    }

    fn get(&self, i: usize) -> Option<u64> {
        match self {
            Offsets::U32(v) => v.get(i).map(|&x| x as u64),
            Offsets::U64(v) => v.get(i).copied(),
        }
    }

    fn pop(&mut self) {
        match self {
            Offsets::U32(v) => {
                v.pop();
            }
            Offsets::U64(v) => {
                v.pop();
            }
        }
    }
}

/// Growable numeric buffer following the capacity heuristic named in the
/// external specification: start at `max(1024, file_size/48)`, and on
/// overflow reallocate to `floor(len*1.5)+2048` rather than relying on the
/// allocator's default doubling.
struct GrowableU64 {
    data: Vec<u64>,
}

impl GrowableU64 {
    fn with_capacity_heuristic(file_size: u64) -> Self {
        let cap = ((file_size / 48) as usize).max(1024);
        Self {
            data: Vec::with_capacity(cap),
        }
    }

    /// Pushes `v`, growing by the spec-mandated policy rather than the
    /// allocator's default doubling: on overflow, reallocate to
    /// `floor(len*1.5)+2048`. Called from `scan::scan_line_starts` for every
    /// offset found, so this is the sole growth path the builder uses.
    fn push(&mut self, v: u64) {
        if self.data.len() == self.data.capacity() {
            let target = ((self.data.capacity() as f64) * 1.5).floor() as usize + 2048;
            self.data.reserve(target.saturating_sub(self.data.capacity()));
        }
        self.data.push(v);
    }

    fn as_slice(&self) -> &[u64] {
        &self.data
    }
}

/// Threshold above which offsets are stored as 64-bit (`file_size >
/// u32::MAX`).
const U32_WIDTH_LIMIT: u64 = u32::MAX as u64;

#[derive(Debug, Clone)]
pub struct LineOffsetIndex {
    file_name: String,
    file_size: u64,
    offsets: Offsets,
}

impl LineOffsetIndex {
    /// Builds the index by sequentially reading non-overlapping chunks of
    /// `chunk_size` bytes from `reader`, scanning each for `\n`. `file_size`
    /// must be the reader's total byte length (used for offset width and
    /// the trailing-line suppression rule).
    pub fn build<R: Read>(
        mut reader: R,
        file_size: u64,
        chunk_size: usize,
        file_name: impl Into<String>,
    ) -> Result<Self> {
        let file_name = file_name.into();
        let mut raw = GrowableU64::with_capacity_heuristic(file_size);
        raw.push(0);

        let mut buf = vec![0u8; chunk_size.max(4096)];
        let mut base: u64 = 0;
        loop {
            let n = reader.read(&mut buf).map_err(|source| LogWorkbenchError::IndexBuild {
                file_name: file_name.clone(),
                source,
            })?;
            if n == 0 {
                break;
            }
            trace!(file_name = %file_name, base, chunk_len = n, "scanning chunk");
            scan_line_starts(&buf[..n], base, &mut raw);
            base += n as u64;
        }

        if file_size == 0 {
            // An empty file has zero lines, not one empty line at offset 0.
            raw.data.clear();
        } else if raw.data.last().copied() == Some(file_size) {
            // Suppress the trailing zero-length line when the file ends in
            // `\n`: the last pushed offset then equals `file_size` exactly.
            raw.data.pop();
        }

        let offsets = if file_size <= U32_WIDTH_LIMIT {
            Offsets::U32(raw.data.iter().map(|&v| v as u32).collect())
        } else {
            Offsets::U64(raw.data)
        };

        debug!(file_name = %file_name, file_size, total_lines = offsets.len(), "index built");

        Ok(Self {
            file_name,
            file_size,
            offsets,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn total_lines(&self) -> usize {
        self.offsets.len()
    }

    fn line_start(&self, zero_based: usize) -> u64 {
        self.offsets.get(zero_based).unwrap_or(self.file_size)
    }

    fn line_end(&self, zero_based: usize) -> u64 {
        self.offsets.get(zero_based + 1).unwrap_or(self.file_size)
    }

    /// Reads lines `[from, to]` (1-based, inclusive), clamped into
    /// `[1, total_lines]`. Reads exactly one contiguous byte range from
    /// `reader` and never the whole file.
    pub fn read_lines<R: Read + Seek>(&self, mut reader: R, from: usize, to: usize) -> Result<Vec<String>> {
        let total = self.total_lines();
        if total == 0 {
            return Ok(Vec::new());
        }
        let from = from.clamp(1, total);
        let to = to.clamp(from, total);

        let byte_start = self.line_start(from - 1);
        let byte_end = self.line_end(to - 1);

        if byte_end <= byte_start {
            return Ok(Vec::new());
        }

        let mut raw = vec![0u8; (byte_end - byte_start) as usize];
        reader
            .seek(SeekFrom::Start(byte_start))
            .map_err(|source| LogWorkbenchError::IndexBuild {
                file_name: self.file_name.clone(),
                source,
            })?;
        reader
            .read_exact(&mut raw)
            .map_err(|source| LogWorkbenchError::IndexBuild {
                file_name: self.file_name.clone(),
                source,
            })?;

        let mut out = Vec::with_capacity(to - from + 1);
        for i in (from - 1)..=(to - 1) {
            let local_start = (self.line_start(i) - byte_start) as usize;
            let local_end = (self.line_end(i) - byte_start) as usize;
            let slice = &raw[local_start..local_end];
            out.push(strip_trailing_newline(slice));
        }
        if out.len() != to - from + 1 {
            warn!(from, to, total, "read_lines produced unexpected count");
        }
        Ok(out)
    }
}

/// Strips a single trailing `\r?\n` and decodes the remainder as UTF-8,
/// replacing invalid sequences. Binary bytes are tolerated, not rejected.
fn strip_trailing_newline(mut bytes: &[u8]) -> String {
    if bytes.last() == Some(&b'\n') {
        bytes = &bytes[..bytes.len() - 1];
    }
    if bytes.last() == Some(&b'\r') {
        bytes = &bytes[..bytes.len() - 1];
    }
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build(bytes: &[u8]) -> LineOffsetIndex {
        LineOffsetIndex::build(Cursor::new(bytes), bytes.len() as u64, 4, "t.log").unwrap()
    }

    #[test]
    fn byte_exact_no_trailing_newline() {
        let idx = build(b"a\nbb\nccc");
        assert_eq!(idx.total_lines(), 3);
        let lines = idx.read_lines(Cursor::new(b"a\nbb\nccc" as &[u8]), 1, 3).unwrap();
        assert_eq!(lines, vec!["a", "bb", "ccc"]);
    }

    #[test]
    fn crlf_stripping_and_trailing_suppression() {
        let bytes = b"a\r\nb\r\n";
        let idx = build(bytes);
        assert_eq!(idx.total_lines(), 2);
        let lines = idx.read_lines(Cursor::new(bytes as &[u8]), 1, 2).unwrap();
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[test]
    fn empty_file() {
        let idx = build(b"");
        assert_eq!(idx.total_lines(), 0);
        let lines = idx.read_lines(Cursor::new(b"" as &[u8]), 1, 1).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn file_of_only_newlines() {
        let bytes = b"\n\n\n";
        let idx = build(bytes);
        assert_eq!(idx.total_lines(), 3);
        let lines = idx.read_lines(Cursor::new(bytes as &[u8]), 1, 3).unwrap();
        assert_eq!(lines, vec!["", "", ""]);
    }

    #[test]
    fn cr_only_line_endings_form_a_single_line() {
        let bytes = b"a\rb\rc";
        let idx = build(bytes);
        assert_eq!(idx.total_lines(), 1);
        let lines = idx.read_lines(Cursor::new(bytes as &[u8]), 1, 1).unwrap();
        assert_eq!(lines, vec!["a\rb\rc"]);
    }

    #[test]
    fn range_out_of_bounds_clamps_silently() {
        let bytes = b"a\nb\nc\n";
        let idx = build(bytes);
        let lines = idx.read_lines(Cursor::new(bytes as &[u8]), 0, 1000).unwrap();
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn round_trip_reconstructs_bytes() {
        let bytes = b"a\nbb\nccc\n";
        let idx = build(bytes);
        let lines = idx.read_lines(Cursor::new(bytes as &[u8]), 1, idx.total_lines()).unwrap();
        let rebuilt = lines.join("\n");
        assert_eq!(rebuilt, "a\nbb\nccc");
    }

    #[test]
    fn single_line_without_any_newline() {
        let bytes = b"only one line, no newline";
        let idx = build(bytes);
        assert_eq!(idx.total_lines(), 1);
        let lines = idx.read_lines(Cursor::new(bytes as &[u8]), 1, 1).unwrap();
        assert_eq!(lines, vec!["only one line, no newline"]);
    }

    #[test]
    fn u32_width_chosen_for_small_files() {
        let idx = build(b"a\nb\n");
        match idx.offsets {
            Offsets::U32(_) => {}
            Offsets::U64(_) => panic!("expected u32 offsets for a tiny file"),
        }
    }

    /// Exercises the builder and random-access reader against a real file
    /// on disk, split across several small chunks so a line boundary is
    /// guaranteed to straddle a chunk read at least once, the way a
    /// multi-hundred-MB file would in production.
    #[test]
    #[cfg(not(target_arch = "wasm32"))]
    fn builds_and_reads_from_a_real_file_across_chunk_boundaries() {
        crate::init_test_tracing();
        use std::fs::File;
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        let content = sequential_lines(500);
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();

        let file_size = content.len() as u64;
        let reader = File::open(file.path()).unwrap();
        let idx = LineOffsetIndex::build(reader, file_size, 37, "real.log").unwrap();
        assert_eq!(idx.total_lines(), 500);

        let reader = File::open(file.path()).unwrap();
        let lines = idx.read_lines(reader, 1, 500).unwrap();
        assert_eq!(lines.first().unwrap(), "L1");
        assert_eq!(lines.last().unwrap(), "L500");
        assert_eq!(lines.len(), 500);
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn sequential_lines(n: usize) -> String {
        (1..=n).map(|i| format!("L{i}\n")).collect()
    }
}
