//! The virtualized viewport: pure, host-agnostic math for measured-height
//! virtualization, overscan, follow-tail, and jump-to-id. DOM measurement
//! and scroll-event plumbing belong to the host (out of this crate's
//! scope, the way the original engine leaves rendering to JS and keeps
//! only indexing/search as pure Rust); `ViewportHost` is the seam a
//! WASM/DOM host binds to.

use std::collections::HashMap;

/// Default row height used before a row has been measured.
pub const ESTIMATE_ROW_HEIGHT: f32 = 34.0;
/// Extra rows rendered beyond the visible range on each side.
pub const OVERSCAN: usize = 8;
/// Distance from the bottom, in pixels, within which the viewport is
/// considered "following" the tail.
const FOLLOW_TAIL_BAND_PX: f32 = 24.0;
/// Scroll-top threshold below which a top-load is requested.
const TOP_LOAD_THRESHOLD_PX: f32 = 40.0;

/// Host-side effects the pure `Viewport` cannot perform itself: locating a
/// rendered DOM row, issuing a scroll, and requesting more data at the top.
pub trait ViewportHost {
    fn measure_row_height(&self, id: &str) -> Option<f32>;
    fn scroll_to(&mut self, offset_px: f32);
    fn request_more_top(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JumpOutcome {
    /// The id's row was located in `ids`; scroll so it sits at `offset_px`
    /// from the top, centered in a viewport of the given height.
    Center { offset_px: f32 },
    /// The id is not present in the currently filtered sequence at all;
    /// the jump resolves as a no-op.
    NotFound,
}

pub struct Viewport {
    heights: HashMap<String, f32>,
    pending_heights: HashMap<String, f32>,
    following: bool,
    top_load_inflight: bool,
    top_load_cooldown_frames: u32,
    pending_jump_id: Option<String>,
}

impl Viewport {
    pub fn new() -> Self {
        Self {
            heights: HashMap::new(),
            pending_heights: HashMap::new(),
            following: true,
            top_load_inflight: false,
            top_load_cooldown_frames: 0,
            pending_jump_id: None,
        }
    }

    pub fn height_of(&self, id: &str) -> f32 {
        self.heights.get(id).copied().unwrap_or(ESTIMATE_ROW_HEIGHT)
    }

    /// Queues a measured height for `id`. Multiple calls within the same
    /// frame coalesce; only `commit_frame` publishes them.
    pub fn queue_measured_height(&mut self, id: &str, height: f32) {
        self.pending_heights.insert(id.to_string(), height);
    }

    /// Applies queued height measurements and advances the top-load
    /// cooldown. Call once per animation frame.
    pub fn commit_frame(&mut self) {
        if !self.pending_heights.is_empty() {
            for (id, height) in self.pending_heights.drain() {
                self.heights.insert(id, height);
            }
        }
        if self.top_load_cooldown_frames > 0 {
            self.top_load_cooldown_frames -= 1;
        }
    }

    /// Prefix-sum array over `ids` in render order: `prefix[i]` is the
    /// total height of rows `0..i`. Length is `ids.len() + 1`.
    pub fn prefix_sums(&self, ids: &[String]) -> Vec<f32> {
        let mut prefix = Vec::with_capacity(ids.len() + 1);
        prefix.push(0.0);
        let mut acc = 0.0;
        for id in ids {
            acc += self.height_of(id);
            prefix.push(acc);
        }
        prefix
    }

    pub fn total_height(&self, ids: &[String]) -> f32 {
        self.prefix_sums(ids).last().copied().unwrap_or(0.0)
    }

    /// Returns the inclusive `[first, last]` row index range to render,
    /// including `OVERSCAN` extra rows on each side. `None` if `ids` is
    /// empty.
    pub fn visible_range(&self, ids: &[String], scroll_top: f32, viewport_height: f32) -> Option<(usize, usize)> {
        if ids.is_empty() {
            return None;
        }
        let prefix = self.prefix_sums(ids);
        let n = ids.len();

        let ends = &prefix[1..];
        let first_visible = ends.partition_point(|&end| end <= scroll_top);
        let first_visible = first_visible.min(n - 1);

        let starts = &prefix[..n];
        let bottom = scroll_top + viewport_height;
        let past_bottom = starts.partition_point(|&start| start < bottom);
        let last_visible = past_bottom.saturating_sub(1).min(n - 1).max(first_visible);

        let first = first_visible.saturating_sub(OVERSCAN);
        let last = (last_visible + OVERSCAN).min(n - 1);
        Some((first, last))
    }

    /// Updates follow-tail state from the current scroll position. Returns
    /// the new `following` state. Any scroll away from the bottom band
    /// clears the flag; returning to the band restores it.
    pub fn update_follow_state(&mut self, scroll_top: f32, total_height: f32, viewport_height: f32) -> bool {
        let distance_from_bottom = (total_height - viewport_height - scroll_top).max(0.0);
        self.following = distance_from_bottom <= FOLLOW_TAIL_BAND_PX;
        self.following
    }

    pub fn is_following(&self) -> bool {
        self.following
    }

    /// When following and the content has grown, the offset to scroll to
    /// keep the new bottom in view.
    pub fn autoscroll_target(&self, total_height: f32, viewport_height: f32) -> Option<f32> {
        if self.following {
            Some((total_height - viewport_height).max(0.0))
        } else {
            None
        }
    }

    /// Requests more data at the top if `scroll_top` is within the
    /// threshold and no request is already in flight or cooling down.
    /// Returns `true` exactly when a new request should be issued.
    pub fn request_more_top(&mut self, scroll_top: f32) -> bool {
        if scroll_top <= TOP_LOAD_THRESHOLD_PX && !self.top_load_inflight && self.top_load_cooldown_frames == 0 {
            self.top_load_inflight = true;
            true
        } else {
            false
        }
    }

    /// Marks an in-flight top-load as settled; gates further requests for
    /// one additional frame.
    pub fn top_load_settled(&mut self) {
        self.top_load_inflight = false;
        self.top_load_cooldown_frames = 1;
    }

    pub fn begin_jump(&mut self, id: impl Into<String>) {
        self.pending_jump_id = Some(id.into());
    }

    pub fn pending_jump_id(&self) -> Option<&str> {
        self.pending_jump_id.as_deref()
    }

    pub fn clear_jump(&mut self) {
        self.pending_jump_id = None;
    }

    /// Resolves the pending jump against `ids`: if the id is present,
    /// returns the offset that centers its row in a viewport of
    /// `viewport_height`; if absent, the jump is a no-op.
    pub fn resolve_jump(&self, ids: &[String], viewport_height: f32) -> JumpOutcome {
        let Some(target) = &self.pending_jump_id else {
            return JumpOutcome::NotFound;
        };
        match ids.iter().position(|id| id == target) {
            Some(index) => {
                let prefix = self.prefix_sums(ids);
                let row_top = prefix[index];
                let row_height = self.height_of(target);
                let row_center = row_top + row_height / 2.0;
                let offset_px = (row_center - viewport_height / 2.0).max(0.0);
                JumpOutcome::Center { offset_px }
            }
            None => JumpOutcome::NotFound,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new()
    }
}

/// Zebra striping by the row's global index within the filtered sequence.
pub fn is_zebra_odd(global_index: usize) -> bool {
    global_index % 2 == 1
}
