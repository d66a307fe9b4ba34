//! WASM FFI shell: the `#[wasm_bindgen]`-gated surface exposing the line
//! index, provider, session controller, and viewport to JS. Plays the same
//! role the teacher's `lib.rs` plays — a thin host-facing shell around a
//! host-agnostic core — generalized from four free functions around one
//! global engine to a session-shaped API around one global controller.
//!
//! File bytes are streamed in the same pointer/chunk-length pattern as the
//! teacher's `get_buffer_pointer`/`index_chunk`: JS writes into a
//! Rust-reserved region and commits the length, rather than Rust reaching
//! back into JS per chunk. Unlike the teacher, the accumulated bytes become
//! a `Cursor<Vec<u8>>` handed to `LineOffsetIndex::build` (a pull-based
//! `Read`) once the whole file has arrived, so the index builder itself
//! stays runtime-agnostic and is exercised the same way in native tests
//! (over a `std::fs::File`) and in this shell (over the in-memory cursor).

use crate::config::WorkbenchConfig;
use crate::filter::FilterConfig;
use crate::index::LineOffsetIndex;
use crate::line::LogLine;
use crate::provider::{LargeFileProvider, LineProvider};
use crate::session::{OpenFile, SessionController, Tab};
use crate::store::{LineStoreBackend, PersistedLineStore};
use crate::viewport::Viewport;
use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

/// Bytes accumulated for a file import still in progress. Bounded by one
/// import at a time, matching spec.md's "per file, operations are
/// serialized" concurrency rule.
struct PendingImport {
    file_name: String,
    file_size: u64,
    buffer: Vec<u8>,
}

struct WasmState {
    session: Rc<RefCell<SessionController>>,
    viewport: Viewport,
    pending: Option<PendingImport>,
}

thread_local! {
    static STATE: RefCell<Option<WasmState>> = RefCell::new(None);
}

fn js_err(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn with_state<T>(f: impl FnOnce(&mut WasmState) -> T) -> T {
    STATE.with(|cell| {
        let mut guard = cell.borrow_mut();
        let state = guard.as_mut().expect("init_session must be awaited before any other export is called");
        f(state)
    })
}

fn session_handle() -> Rc<RefCell<SessionController>> {
    with_state(|state| state.session.clone())
}

/// Forwards panics to the browser console: the WASM equivalent of
/// installing a native panic hook, run once at module instantiation.
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
}

/// Opens the persisted store and installs the global session, restoring
/// pinned ids from a prior run. Must be awaited before any other exported
/// function is called.
#[wasm_bindgen(js_name = initSession)]
pub fn init_session() -> js_sys::Promise {
    future_to_promise(async move {
        let store = PersistedLineStore::open().await.map_err(js_err)?;
        let store: Rc<dyn LineStoreBackend> = Rc::new(store);
        let mut session = SessionController::new(WorkbenchConfig::default(), store);
        session.restore_from_store().await.map_err(js_err)?;
        STATE.with(|cell| {
            *cell.borrow_mut() = Some(WasmState {
                session: Rc::new(RefCell::new(session)),
                viewport: Viewport::new(),
                pending: None,
            });
        });
        Ok(JsValue::UNDEFINED)
    })
}

/// Sets the page size, clamped into `[2_000, 200_000]`.
#[wasm_bindgen(js_name = setPageSize)]
pub fn set_page_size(page_size: usize) {
    with_state(|state| state.session.borrow_mut().set_page_size(page_size));
}

/// Begins streaming `file_name` (`file_size` bytes) in. JS then repeatedly
/// calls `getBufferPointer`/`writeChunk` until the whole file has been
/// written, then calls `finishFileImport`.
#[wasm_bindgen(js_name = beginFileImport)]
pub fn begin_file_import(file_name: String, file_size: f64) {
    with_state(|state| {
        state.pending = Some(PendingImport {
            file_name,
            file_size: file_size as u64,
            buffer: Vec::with_capacity(file_size as usize),
        });
    });
}

/// Returns a pointer to the write region for the next chunk of the
/// in-progress import. JS writes up to `size` bytes there, then calls
/// `writeChunk(size)`. The pointer is invalid after any call that may
/// reallocate the buffer, so callers must not cache it across chunks.
#[wasm_bindgen(js_name = getBufferPointer)]
pub fn get_buffer_pointer(size: usize) -> *mut u8 {
    with_state(|state| {
        let pending = state.pending.as_mut().expect("beginFileImport must precede getBufferPointer");
        pending.buffer.reserve(size);
        let len = pending.buffer.len();
        unsafe { pending.buffer.as_mut_ptr().add(len) }
    })
}

/// Commits `chunk_len` bytes written at the last `getBufferPointer` result
/// into the in-progress import's buffer.
#[wasm_bindgen(js_name = writeChunk)]
pub fn write_chunk(chunk_len: usize) {
    with_state(|state| {
        let pending = state.pending.as_mut().expect("beginFileImport must precede writeChunk");
        let new_len = pending.buffer.len() + chunk_len;
        assert!(new_len <= pending.buffer.capacity(), "chunk_len exceeds reserved capacity");
        unsafe { pending.buffer.set_len(new_len) };
    });
}

/// Finishes the in-progress import: builds the offset index over the
/// buffered bytes, selects the small- or large-file backend against
/// `LARGE_FILE_THRESHOLD`, and registers the resulting provider. Selects
/// the newly imported file's tab on success, per spec.md §4.6.
#[wasm_bindgen(js_name = finishFileImport)]
pub fn finish_file_import() -> js_sys::Promise {
    let session = session_handle();
    future_to_promise(async move {
        let pending = with_state(|state| state.pending.take());
        let Some(pending) = pending else {
            return Err(js_err("finishFileImport called with no import in progress"));
        };

        let config = session.borrow().config();
        let mut cursor = Cursor::new(pending.buffer);
        let index = LineOffsetIndex::build(&mut cursor, pending.file_size, config.chunk_size_bytes, pending.file_name.clone())
            .map_err(js_err)?;
        cursor.set_position(0);

        if LineProvider::is_large(&config, pending.file_size) {
            let provider = LineProvider::Large(LargeFileProvider::new(index, Box::new(cursor)));
            session
                .borrow_mut()
                .add_large_file(pending.file_name, provider)
                .await
                .map_err(js_err)?;
        } else {
            session
                .borrow_mut()
                .add_small_file(pending.file_name, cursor, &index)
                .await
                .map_err(js_err)?;
        }
        Ok(JsValue::UNDEFINED)
    })
}

/// Selects a tab: a file name, or `null`/`undefined` for the aggregate
/// "ALL" tab.
#[wasm_bindgen(js_name = selectTab)]
pub fn select_tab(name: Option<String>) -> js_sys::Promise {
    let session = session_handle();
    future_to_promise(async move {
        let tab = match name {
            Some(n) => Tab::File(n),
            None => Tab::All,
        };
        session.borrow_mut().select_tab(tab).await.map_err(js_err)?;
        Ok(JsValue::UNDEFINED)
    })
}

/// Expands the current file tab's window toward lower line numbers by one
/// paging block. A no-op while a previous call is still in flight.
#[wasm_bindgen(js_name = loadMoreUp)]
pub fn load_more_up() -> js_sys::Promise {
    let session = session_handle();
    future_to_promise(async move {
        session.borrow_mut().load_more_up().await.map_err(js_err)?;
        Ok(JsValue::UNDEFINED)
    })
}

/// Expands the current file tab's window toward higher line numbers by one
/// paging block. Symmetric with `loadMoreUp`.
#[wasm_bindgen(js_name = loadMoreDown)]
pub fn load_more_down() -> js_sys::Promise {
    let session = session_handle();
    future_to_promise(async move {
        session.borrow_mut().load_more_down().await.map_err(js_err)?;
        Ok(JsValue::UNDEFINED)
    })
}

/// Loads a page-size-wide window centered on 1-based line `n` for the
/// current file tab and marks it as the pending jump target.
#[wasm_bindgen(js_name = jumpToLine)]
pub fn jump_to_line(n: usize) -> js_sys::Promise {
    let session = session_handle();
    future_to_promise(async move {
        session.borrow_mut().jump_to_line(n).await.map_err(js_err)?;
        Ok(JsValue::UNDEFINED)
    })
}

/// Flips pinned membership for `id`, persisting the full pinned set before
/// resolving. Resolves to the new membership state.
#[wasm_bindgen(js_name = togglePin)]
pub fn toggle_pin(id: String) -> js_sys::Promise {
    let session = session_handle();
    future_to_promise(async move {
        let now_pinned = session.borrow_mut().toggle_pin(&id).await.map_err(js_err)?;
        Ok(JsValue::from_bool(now_pinned))
    })
}

/// Disposes `name`'s provider, purges its persisted rows, drops its pinned
/// entries, and falls back to the "ALL" tab if it was selected.
#[wasm_bindgen(js_name = closeFileTab)]
pub fn close_file_tab(name: String) -> js_sys::Promise {
    let session = session_handle();
    future_to_promise(async move {
        session.borrow_mut().close_file_tab(&name).await.map_err(js_err)?;
        Ok(JsValue::UNDEFINED)
    })
}

/// Disposes every provider, clears all persisted rows, and resets the
/// session to a fresh empty tab.
#[wasm_bindgen(js_name = clearAll)]
pub fn clear_all() -> js_sys::Promise {
    let session = session_handle();
    future_to_promise(async move {
        session.borrow_mut().clear_all().await.map_err(js_err)?;
        Ok(JsValue::UNDEFINED)
    })
}

/// Host event loop entry point, intended to be called at roughly 2 Hz
/// (spec.md §4.6). Alternates `loadMoreUp`/`loadMoreDown` while a
/// non-trivial filter is active; idle otherwise.
#[wasm_bindgen(js_name = tickPrefetch)]
pub fn tick_prefetch() -> js_sys::Promise {
    let session = session_handle();
    future_to_promise(async move {
        session.borrow_mut().tick_prefetch().await.map_err(js_err)?;
        Ok(JsValue::UNDEFINED)
    })
}

/// Replaces the active filter configuration. `config` is a JS object
/// shaped like `FilterConfig` (`query`, `mode`, `caseSensitive`, `level`).
#[wasm_bindgen(js_name = setFilter)]
pub fn set_filter(config: JsValue) -> Result<(), JsValue> {
    let filter: FilterConfig = serde_wasm_bindgen::from_value(config).map_err(js_err)?;
    with_state(|state| state.session.borrow_mut().set_filter(filter));
    Ok(())
}

#[wasm_bindgen(js_name = setShowOnlyPinned)]
pub fn set_show_only_pinned(value: bool) {
    with_state(|state| state.session.borrow_mut().set_show_only_pinned(value));
}

/// The current tab's loaded lines, serialized as a JS array of objects.
#[wasm_bindgen(js_name = currentWindow)]
pub fn current_window() -> Result<JsValue, JsValue> {
    let lines: Vec<LogLine> = with_state(|state| state.session.borrow().current_window());
    serde_wasm_bindgen::to_value(&lines).map_err(js_err)
}

/// Every open file and its total line count, serialized as a JS array.
#[wasm_bindgen(js_name = openFiles)]
pub fn open_files() -> Result<JsValue, JsValue> {
    let files: Vec<OpenFile> = with_state(|state| state.session.borrow().files().to_vec());
    serde_wasm_bindgen::to_value(&files).map_err(js_err)
}

/// Every currently pinned line id.
#[wasm_bindgen(js_name = pinnedIds)]
pub fn pinned_ids() -> Vec<String> {
    with_state(|state| state.session.borrow().pinned().to_vec())
}

/// The id a jump is pending toward, if any (`null` otherwise).
#[wasm_bindgen(js_name = pendingJumpId)]
pub fn pending_jump_id() -> Option<String> {
    with_state(|state| state.session.borrow().pending_jump_id().map(str::to_string))
}

/// Queues a measured row height for `id`; applied on the next `commitFrame`.
#[wasm_bindgen(js_name = queueMeasuredHeight)]
pub fn queue_measured_height(id: String, height: f32) {
    with_state(|state| state.viewport.queue_measured_height(&id, height));
}

/// Applies queued row-height measurements. Call once per animation frame.
#[wasm_bindgen(js_name = commitFrame)]
pub fn commit_frame() {
    with_state(|state| state.viewport.commit_frame());
}

/// Requests more data at the top if `scroll_top` is within the threshold
/// and no request is already in flight or cooling down.
#[wasm_bindgen(js_name = requestMoreTop)]
pub fn request_more_top(scroll_top: f32) -> bool {
    with_state(|state| state.viewport.request_more_top(scroll_top))
}

#[wasm_bindgen(js_name = topLoadSettled)]
pub fn top_load_settled() {
    with_state(|state| state.viewport.top_load_settled());
}

#[wasm_bindgen(js_name = beginJump)]
pub fn begin_jump(id: String) {
    with_state(|state| state.viewport.begin_jump(id));
}

#[wasm_bindgen(js_name = isShowingOnlyPinned)]
pub fn is_showing_only_pinned() -> bool {
    with_state(|state| state.session.borrow().show_only_pinned())
}
