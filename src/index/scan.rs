//! SIMD-accelerated newline scanner. Finds line boundaries in raw bytes for
//! the line-offset index. Generalized from the original single-buffer WASM
//! scanner: this version does not re-push the chunk's own start offset,
//! since that offset was already recorded by the previous chunk's trailing
//! `\n` (pushing it again produced a duplicate, zero-length line whenever a
//! chunk boundary happened to land exactly on a `\n`). Offset `0` is seeded
//! once by the caller before the first chunk, not per chunk.
//!
//! Uses `memchr` for fast `\n` detection. LF is the sole line terminator;
//! `\r` is left in place and stripped later when a line's content is read.

use super::GrowableU64;
use memchr::memchr_iter;

/// Scans `chunk` for `\n` bytes and pushes the byte offset (in file space,
/// i.e. `base_offset + relative position + 1`) of each following line start
/// onto `line_starts`, via `GrowableU64::push` so the spec-mandated grow
/// policy applies to every offset found, not just the seeded `0`.
///
/// Returns `true` if `chunk` ends with `\n` (so the next chunk starts a new
/// line; used by the caller to decide whether the file's trailing line is
/// a zero-length line to be suppressed).
#[inline(always)]
pub fn scan_line_starts(chunk: &[u8], base_offset: u64, line_starts: &mut GrowableU64) -> bool {
    if chunk.is_empty() {
        return true;
    }
    for pos in memchr_iter(b'\n', chunk) {
        line_starts.push(base_offset + pos as u64 + 1);
    }
    chunk.last() == Some(&b'\n')
}
