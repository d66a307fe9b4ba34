//! The session controller: the orchestration core that owns open files,
//! their providers, the in-memory windows, pin state, and the active
//! filter. It is the one component with no teacher counterpart as a whole
//! (the teacher has a single global engine and no paging/tab/jump
//! lifecycle at all); its per-direction single-flight discipline is
//! generalized from the teacher's "one mutable owner, explicit lock scope
//! per FFI call" posture to "a latch per direction plus a jump generation
//! counter", since the teacher never had competing paging directions or
//! superseding jumps to arbitrate between.

use crate::config::WorkbenchConfig;
use crate::error::Result;
use crate::filter::FilterConfig;
use crate::line::{line_id, LogLine};
use crate::pinned::PinnedStore;
use crate::provider::{LineProvider, SmallFileProvider};
use crate::store::LineStoreBackend;
use serde::Serialize;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, warn};

/// Minimum block size used by `load_more_up`/`load_more_down`, per spec.md
/// §4.6: `max(2000, min(pageSize, 20000))`.
fn paging_block_size(page_size: usize) -> usize {
    2_000.max(page_size.min(20_000))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenFile {
    pub file_name: String,
    pub total_lines: usize,
}

/// The active tab: a single open file, or the aggregate "ALL" sentinel that
/// shows whatever is already loaded across files without fanning out
/// provider calls (spec.md §9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tab {
    File(String),
    All,
}

pub struct SessionController {
    config: WorkbenchConfig,
    store: Rc<dyn LineStoreBackend>,
    files: Vec<OpenFile>,
    providers: HashMap<String, LineProvider>,
    /// Each open file's currently loaded window, kept independently so the
    /// "ALL" tab can aggregate without re-fetching.
    windows: HashMap<String, Vec<LogLine>>,
    pinned: PinnedStore,
    filter: FilterConfig,
    show_only_pinned: bool,
    selected_tab: Tab,
    pending_jump_id: Option<String>,
    up_inflight: bool,
    down_inflight: bool,
    jump_generation: u64,
    prefetch_toggle: bool,
}

impl SessionController {
    pub fn new(config: WorkbenchConfig, store: Rc<dyn LineStoreBackend>) -> Self {
        Self {
            config,
            store,
            files: Vec::new(),
            providers: HashMap::new(),
            windows: HashMap::new(),
            pinned: PinnedStore::new(),
            filter: FilterConfig::default(),
            show_only_pinned: false,
            selected_tab: Tab::All,
            pending_jump_id: None,
            up_inflight: false,
            down_inflight: false,
            jump_generation: 0,
            prefetch_toggle: false,
        }
    }

    /// Restores session state (pinned ids, page-size hint) from the
    /// persisted store on start, per spec.md §3 ("Session state ... restored
    /// from the meta store on start").
    pub async fn restore_from_store(&mut self) -> Result<()> {
        let state = self.store.load_state().await?;
        self.pinned = PinnedStore::from_ids(state.pinned_ids);
        Ok(())
    }

    /// A snapshot of the workbench configuration, used by the import path to
    /// decide small vs. large backend and chunk size before a provider
    /// exists to ask.
    pub fn config(&self) -> WorkbenchConfig {
        self.config
    }

    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.config.set_page_size(page_size);
    }

    pub fn files(&self) -> &[OpenFile] {
        &self.files
    }

    pub fn selected_tab(&self) -> &Tab {
        &self.selected_tab
    }

    pub fn pending_jump_id(&self) -> Option<&str> {
        self.pending_jump_id.as_deref()
    }

    pub fn pinned(&self) -> &PinnedStore {
        &self.pinned
    }

    pub fn filter(&self) -> &FilterConfig {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: FilterConfig) {
        self.filter = filter;
    }

    pub fn show_only_pinned(&self) -> bool {
        self.show_only_pinned
    }

    pub fn set_show_only_pinned(&mut self, value: bool) {
        self.show_only_pinned = value;
    }

    /// The lines the viewport should render for the current tab: the open
    /// file's window, or — for "ALL" — every open file's window
    /// concatenated in file order, each internally sorted by line number
    /// (no provider calls, per spec.md §9).
    pub fn current_window(&self) -> Vec<LogLine> {
        match &self.selected_tab {
            Tab::File(name) => self.windows.get(name).cloned().unwrap_or_default(),
            Tab::All => self
                .files
                .iter()
                .flat_map(|f| self.windows.get(&f.file_name).cloned().unwrap_or_default())
                .collect(),
        }
    }

    /// Sum of currently loaded window lines across open files — the "ALL"
    /// tab's counter, per DESIGN.md's resolution of spec.md §9's open
    /// question (window contents, not aggregated meta totals).
    pub fn all_tab_loaded_count(&self) -> usize {
        self.windows.values().map(|w| w.len()).sum()
    }

    /// Registers a newly constructed large-file provider (offset index kept
    /// in memory only) and loads its tail into the window. Selects this
    /// file's tab, per spec.md §4.6 ("select the last imported file's
    /// tab").
    pub async fn add_large_file(&mut self, file_name: String, mut provider: LineProvider) -> Result<()> {
        let total = provider.total_lines();
        let tail_n = self.config.page_size.min(total.max(1));
        let tail = provider.tail(tail_n).await?;
        self.upsert_file(&file_name, total);
        self.windows.insert(file_name.clone(), tail);
        self.providers.insert(file_name.clone(), provider);
        self.selected_tab = Tab::File(file_name);
        Ok(())
    }

    /// Imports a small file end-to-end: streams it through the offset
    /// index into the shared persisted store in bounded chunks, then
    /// builds and registers its provider. `index`/`reader` are only needed
    /// for the one-time import pass; afterward the provider delegates to
    /// the store.
    pub async fn add_small_file<R: std::io::Read + std::io::Seek>(
        &mut self,
        file_name: String,
        reader: R,
        index: &crate::index::LineOffsetIndex,
    ) -> Result<()> {
        let total = SmallFileProvider::import(&file_name, reader, index, self.store.as_ref()).await?;
        let provider = LineProvider::Small(SmallFileProvider::new(file_name.clone(), total, self.store.clone()));
        self.add_large_file(file_name, provider).await
    }

    fn upsert_file(&mut self, file_name: &str, total_lines: usize) {
        if let Some(entry) = self.files.iter_mut().find(|f| f.file_name == file_name) {
            entry.total_lines = total_lines;
        } else {
            self.files.push(OpenFile {
                file_name: file_name.to_string(),
                total_lines,
            });
        }
    }

    /// Replaces `window` with `tail(min(pageSize, total))` for `name`; the
    /// "ALL" tab requires no provider call at all.
    pub async fn select_tab(&mut self, tab: Tab) -> Result<()> {
        if let Tab::File(name) = &tab {
            if let Some(provider) = self.providers.get_mut(name) {
                let total = provider.total_lines();
                let tail_n = self.config.page_size.min(total.max(1));
                let tail = provider.tail(tail_n).await?;
                self.windows.insert(name.clone(), tail);
            }
        }
        self.selected_tab = tab;
        Ok(())
    }

    fn filter_is_active(&self) -> bool {
        !self.filter.query.is_empty() || !matches!(self.filter.level, crate::filter::LevelFilter::All) || self.show_only_pinned
    }

    /// Expands the current file tab's window toward lower line numbers by
    /// one paging block. Single-flight: a re-entry while already in flight
    /// is a no-op.
    pub async fn load_more_up(&mut self) -> Result<()> {
        let Tab::File(name) = self.selected_tab.clone() else {
            return Ok(());
        };
        if self.up_inflight {
            return Ok(());
        }
        self.up_inflight = true;
        let result = self.load_more_up_inner(&name).await;
        self.up_inflight = false;
        result
    }

    async fn load_more_up_inner(&mut self, name: &str) -> Result<()> {
        let window = self.windows.get(name).cloned().unwrap_or_default();
        let min_line = window.iter().map(|l| l.line_number).min();
        let Some(min_line) = min_line else {
            return Ok(());
        };
        if min_line <= 1 {
            return Ok(());
        }
        let block = paging_block_size(self.config.page_size);
        let new_to = min_line - 1;
        let new_from = new_to.saturating_sub(block - 1).max(1);
        let Some(provider) = self.providers.get_mut(name) else {
            return Ok(());
        };
        let added = provider.range(new_from, new_to).await?;
        let mut merged = merge_dedup_sorted(window, added);
        bound_window(&mut merged, self.config.page_size, /* keep_head */ true);
        self.windows.insert(name.to_string(), merged);
        Ok(())
    }

    /// Expands the current file tab's window toward higher line numbers by
    /// one paging block. Single-flight, symmetric with `load_more_up`.
    pub async fn load_more_down(&mut self) -> Result<()> {
        let Tab::File(name) = self.selected_tab.clone() else {
            return Ok(());
        };
        if self.down_inflight {
            return Ok(());
        }
        self.down_inflight = true;
        let result = self.load_more_down_inner(&name).await;
        self.down_inflight = false;
        result
    }

    async fn load_more_down_inner(&mut self, name: &str) -> Result<()> {
        let window = self.windows.get(name).cloned().unwrap_or_default();
        let max_line = window.iter().map(|l| l.line_number).max();
        let total = self.files.iter().find(|f| f.file_name == name).map(|f| f.total_lines).unwrap_or(0);
        let Some(max_line) = max_line else {
            return Ok(());
        };
        if max_line >= total {
            return Ok(());
        }
        let block = paging_block_size(self.config.page_size);
        let new_from = max_line + 1;
        let new_to = (new_from + block - 1).min(total);
        let Some(provider) = self.providers.get_mut(name) else {
            return Ok(());
        };
        let added = provider.range(new_from, new_to).await?;
        let mut merged = merge_dedup_sorted(window, added);
        bound_window(&mut merged, self.config.page_size, /* keep_head */ false);
        self.windows.insert(name.to_string(), merged);
        Ok(())
    }

    /// Loads a `pageSize`-wide window centered on 1-based line `n` for the
    /// current file tab and sets `pending_jump_id`. A later jump
    /// supersedes an earlier in-flight one: results for a stale generation
    /// are discarded at merge time.
    pub async fn jump_to_line(&mut self, n: usize) -> Result<()> {
        let Tab::File(name) = self.selected_tab.clone() else {
            return Ok(());
        };
        let Some(file) = self.files.iter().find(|f| f.file_name == name) else {
            return Ok(());
        };
        let total = file.total_lines;
        if total == 0 {
            return Ok(());
        }
        let n = n.clamp(1, total);

        self.jump_generation += 1;
        let this_generation = self.jump_generation;

        let page_size = self.config.page_size;
        let half = page_size / 2;
        let mut from = n.saturating_sub(half.saturating_sub(1)).max(1);
        let mut to = (from + page_size - 1).min(total);
        if to - from + 1 < page_size {
            from = (to + 1).saturating_sub(page_size).max(1);
        }
        to = to.max(from);

        let Some(provider) = self.providers.get_mut(&name) else {
            return Ok(());
        };
        let lines = provider.range(from, to).await?;

        if this_generation != self.jump_generation {
            debug!(file_name = %name, n, "discarding superseded jump result");
            return Ok(());
        }
        self.windows.insert(name.clone(), lines);
        self.pending_jump_id = Some(line_id(&name, n));
        Ok(())
    }

    /// Flips pinned membership for `id` and persists the full set
    /// immediately, per spec.md §4.5's eager-persistence contract.
    pub async fn toggle_pin(&mut self, id: &str) -> Result<bool> {
        let now_pinned = self.pinned.toggle(id);
        self.store.update_pinned(&self.pinned.to_vec()).await?;
        Ok(now_pinned)
    }

    /// Disposes `name`'s provider, purges its persisted rows (a no-op for
    /// an already index-only large file, harmless either way since the
    /// store simply has nothing to delete), drops its pinned entries, and
    /// removes it from the open-file list. If it was the selected tab,
    /// falls back to "ALL".
    pub async fn close_file_tab(&mut self, name: &str) -> Result<()> {
        if let Some(provider) = self.providers.remove(name) {
            provider.dispose();
        }
        if let Err(e) = self.store.delete_file(name).await {
            warn!(file_name = name, error = %e, "failed to purge persisted rows on tab close");
        }
        self.pinned.remove_file(name);
        self.store.update_pinned(&self.pinned.to_vec()).await?;
        self.files.retain(|f| f.file_name != name);
        self.windows.remove(name);
        if self.selected_tab == Tab::File(name.to_string()) {
            self.selected_tab = Tab::All;
        }
        Ok(())
    }

    /// Disposes every provider, clears all persisted rows, and resets the
    /// session to a fresh empty tab.
    pub async fn clear_all(&mut self) -> Result<()> {
        for (_, provider) in self.providers.drain() {
            provider.dispose();
        }
        self.store.clear_all().await?;
        self.pinned = PinnedStore::new();
        self.files.clear();
        self.windows.clear();
        self.selected_tab = Tab::All;
        self.pending_jump_id = None;
        self.up_inflight = false;
        self.down_inflight = false;
        Ok(())
    }

    /// Host event loop entry point, called at roughly 2 Hz per spec.md
    /// §4.6. Alternates `load_more_up`/`load_more_down` while a non-trivial
    /// filter is active; idle otherwise.
    pub async fn tick_prefetch(&mut self) -> Result<()> {
        if !self.filter_is_active() {
            return Ok(());
        }
        if self.prefetch_toggle {
            self.load_more_up().await?;
        } else {
            self.load_more_down().await?;
        }
        self.prefetch_toggle = !self.prefetch_toggle;
        Ok(())
    }
}

/// Merges `added` into `existing`, de-duplicating by `id` (mandatory per
/// spec.md §4.6) and sorting ascending by `line_number`.
fn merge_dedup_sorted(existing: Vec<LogLine>, added: Vec<LogLine>) -> Vec<LogLine> {
    let mut by_id: HashMap<String, LogLine> = HashMap::with_capacity(existing.len() + added.len());
    for line in existing.into_iter().chain(added) {
        by_id.insert(line.id.clone(), line);
    }
    let mut merged: Vec<LogLine> = by_id.into_values().collect();
    merged.sort_by_key(|l| l.line_number);
    merged
}

/// Caps a merged window at `page_size`, per spec.md §5's memory bound
/// ("held lines ≤ pageSize per file tab"). `keep_head` is `true` after a
/// `load_more_up` (new content was prepended; trim the excess from the
/// bottom) and `false` after a `load_more_down` (new content was appended;
/// trim the excess from the top).
fn bound_window(window: &mut Vec<LogLine>, page_size: usize, keep_head: bool) {
    if window.len() <= page_size {
        return;
    }
    if keep_head {
        window.truncate(page_size);
    } else {
        let excess = window.len() - page_size;
        window.drain(0..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkbenchConfig;
    use crate::index::LineOffsetIndex;
    use crate::provider::LargeFileProvider;
    use crate::store::MemoryLineStore;
    use std::io::Cursor;

    fn sequential_lines(n: usize) -> String {
        (1..=n).map(|i| format!("L{i}\n")).collect()
    }

    fn large_provider_for(bytes: &str, file_name: &str) -> LineProvider {
        let data = bytes.as_bytes().to_vec();
        let index = LineOffsetIndex::build(Cursor::new(&data), data.len() as u64, 4096, file_name).unwrap();
        LineProvider::Large(LargeFileProvider::new(index, Box::new(Cursor::new(data))))
    }

    /// Builds a controller with an exact `page_size`, bypassing
    /// `set_page_size`'s `[MIN_PAGE_SIZE, MAX_PAGE_SIZE]` clamp (config.rs)
    /// so small-scale tests can exercise spec.md §8's literal scenarios
    /// (page sizes of 10/20) instead of always clamping up to 2_000.
    fn controller(page_size: usize) -> SessionController {
        crate::init_test_tracing();
        let config = WorkbenchConfig {
            page_size,
            ..WorkbenchConfig::default()
        };
        SessionController::new(config, Rc::new(MemoryLineStore::new()))
    }

    #[test]
    fn tail_window_after_add_file() {
        pollster::block_on(async {
            let mut session = controller(10);
            let provider = large_provider_for(&sequential_lines(100), "a.log");
            session.add_large_file("a.log".to_string(), provider).await.unwrap();

            let window = session.current_window();
            assert_eq!(window.len(), 10);
            assert_eq!(window.first().unwrap().line_number, 91);
            assert_eq!(window.last().unwrap().line_number, 100);
            assert_eq!(*session.selected_tab(), Tab::File("a.log".to_string()));
        });
    }

    #[test]
    fn jump_to_line_centers_window_and_sets_pending_id() {
        pollster::block_on(async {
            let mut session = controller(20);
            let provider = large_provider_for(&sequential_lines(100), "a.log");
            session.add_large_file("a.log".to_string(), provider).await.unwrap();

            session.jump_to_line(50).await.unwrap();
            let window = session.current_window();
            let numbers: Vec<usize> = window.iter().map(|l| l.line_number).collect();
            assert_eq!(numbers, (41..=60).collect::<Vec<_>>());
            assert_eq!(session.pending_jump_id(), Some("a.log:50"));
        });
    }

    #[test]
    fn jump_to_line_clips_at_trailing_edge() {
        pollster::block_on(async {
            let mut session = controller(20);
            let provider = large_provider_for(&sequential_lines(100), "a.log");
            session.add_large_file("a.log".to_string(), provider).await.unwrap();

            session.jump_to_line(95).await.unwrap();
            let window = session.current_window();
            let numbers: Vec<usize> = window.iter().map(|l| l.line_number).collect();
            assert_eq!(numbers, (81..=100).collect::<Vec<_>>());
            assert!(numbers.contains(&95));
        });
    }

    #[test]
    fn load_more_up_expands_window_toward_the_start_and_dedupes() {
        pollster::block_on(async {
            let mut session = controller(10);
            // A page size small enough that the paging block
            // (max(2000, min(pageSize,20000)) = 2000) would exceed the file;
            // use a bigger file so the block is meaningfully smaller than total.
            let provider = large_provider_for(&sequential_lines(5_000), "a.log");
            session.add_large_file("a.log".to_string(), provider).await.unwrap();

            let before: Vec<usize> = session.current_window().iter().map(|l| l.line_number).collect();
            assert_eq!(before, (4991..=5000).collect::<Vec<_>>());

            session.load_more_up().await.unwrap();
            let after = session.current_window();
            let numbers: Vec<usize> = after.iter().map(|l| l.line_number).collect();
            // Bounded at page_size=10: newest block loses its tail to the cap,
            // keeping the earliest (newly loaded) lines.
            assert_eq!(numbers.len(), 10);
            let ids: std::collections::HashSet<&String> = after.iter().map(|l| &l.id).collect();
            assert_eq!(ids.len(), after.len());
            let mut sorted = numbers.clone();
            sorted.sort_unstable();
            assert_eq!(numbers, sorted, "window must be sorted ascending by line number");
        });
    }

    #[test]
    fn load_more_up_is_single_flight_and_noop_at_start_of_file() {
        pollster::block_on(async {
            let mut session = controller(10);
            let provider = large_provider_for(&sequential_lines(5), "a.log");
            session.add_large_file("a.log".to_string(), provider).await.unwrap();
            // Window already covers the whole 5-line file; loading more up is a no-op.
            session.load_more_up().await.unwrap();
            assert_eq!(session.current_window().len(), 5);
        });
    }

    #[test]
    fn all_tab_aggregates_without_provider_calls() {
        pollster::block_on(async {
            let mut session = controller(10);
            let a = large_provider_for(&sequential_lines(20), "a.log");
            let b = large_provider_for(&sequential_lines(30), "b.log");
            session.add_large_file("a.log".to_string(), a).await.unwrap();
            session.add_large_file("b.log".to_string(), b).await.unwrap();

            session.select_tab(Tab::All).await.unwrap();
            let window = session.current_window();
            assert_eq!(window.len(), 20);
            assert_eq!(session.all_tab_loaded_count(), 20);
        });
    }

    #[test]
    fn pin_survives_independent_of_provider_lifecycle() {
        pollster::block_on(async {
            let mut session = controller(10);
            let provider = large_provider_for(&sequential_lines(10), "a.log");
            session.add_large_file("a.log".to_string(), provider).await.unwrap();

            assert!(session.toggle_pin("a.log:3").await.unwrap());
            assert!(session.pinned().contains("a.log:3"));

            session.close_file_tab("a.log").await.unwrap();
            assert!(!session.pinned().contains("a.log:3"));
            assert_eq!(*session.selected_tab(), Tab::All);
        });
    }

    #[test]
    fn clear_all_resets_everything() {
        pollster::block_on(async {
            let mut session = controller(10);
            let provider = large_provider_for(&sequential_lines(10), "a.log");
            session.add_large_file("a.log".to_string(), provider).await.unwrap();
            session.toggle_pin("a.log:1").await.unwrap();

            session.clear_all().await.unwrap();
            assert!(session.files().is_empty());
            assert!(session.current_window().is_empty());
            assert!(session.pinned().is_empty());
            assert_eq!(*session.selected_tab(), Tab::All);
        });
    }
}
