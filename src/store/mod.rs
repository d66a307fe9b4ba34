//! The persisted line store: a durable, `idb`-backed (IndexedDB) key-value
//! layout used for small files. Two object stores: `logs` (keyed by line
//! `id`, with a secondary index over `(fileName, lineNumber)`) and `meta`
//! (keyed slots for pinned ids, per-file totals, and the `maxLines` hint).
//!
//! Every operation here is a suspension point (spec.md's concurrency model):
//! transactions are committed in arrival order per file, and any failure is
//! surfaced as `LogWorkbenchError::Storage` so the caller can degrade the
//! affected file to the index-only large-file path.

use crate::classify::Severity;
use crate::error::{LogWorkbenchError, Result};
use crate::line::{line_id, FileMeta, LogLine};
use async_trait::async_trait;
use idb::{Database, Factory, IndexParams, KeyPath, ObjectStoreParams, TransactionMode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const DB_NAME: &str = "log_workbench";
const DB_VERSION: u32 = 1;
const LOGS_STORE: &str = "logs";
const META_STORE: &str = "meta";

const META_KEY_PINNED: &str = "pinnedIds";
const META_KEY_FILES: &str = "files";
const META_KEY_MAX_LINES: &str = "maxLines";

const DEFAULT_MAX_LINES_HINT: usize = 50_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogRow {
    id: String,
    file_name: String,
    line_number: usize,
    content: String,
    level: Severity,
}

impl From<&LogLine> for LogRow {
    fn from(line: &LogLine) -> Self {
        Self {
            id: line.id.clone(),
            file_name: line.file_name.clone(),
            line_number: line.line_number,
            content: line.content.clone(),
            level: line.severity,
        }
    }
}

impl From<LogRow> for LogLine {
    fn from(row: LogRow) -> Self {
        Self {
            id: row.id,
            file_name: row.file_name,
            line_number: row.line_number,
            content: row.content,
            severity: row.level,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct FilesMetaSlot {
    files: Vec<(String, FileMeta)>,
}

#[derive(Debug, Clone, Default)]
pub struct PersistedState {
    pub pinned_ids: Vec<String>,
    pub files: Vec<(String, FileMeta)>,
    pub max_lines: usize,
}

fn storage_err(context: &str, err: impl std::fmt::Display) -> LogWorkbenchError {
    LogWorkbenchError::Storage(format!("{context}: {err}"))
}

/// The persistence seam `SmallFileProvider` and the session controller code
/// against, rather than the concrete `idb`-backed type directly. Object-safe
/// (via `async-trait`) so it can be held as `Arc<dyn LineStoreBackend>`,
/// which lets native tests exercise the session controller and the small-
/// file provider against an in-memory implementation without a browser's
/// IndexedDB.
#[async_trait(?Send)]
pub trait LineStoreBackend {
    async fn append_logs(&self, batch: &[LogLine]) -> Result<()>;
    async fn get_last_n(&self, file_name: &str, n: usize) -> Result<Vec<LogLine>>;
    async fn get_by_range(&self, file_name: &str, from: usize, to: usize) -> Result<Vec<LogLine>>;
    async fn update_file_total(&self, file_name: &str, total: usize) -> Result<()>;
    async fn get_files_meta(&self) -> Result<Vec<(String, FileMeta)>>;
    async fn delete_file(&self, file_name: &str) -> Result<()>;
    async fn clear_all(&self) -> Result<()>;
    async fn load_state(&self) -> Result<PersistedState>;
    async fn update_pinned(&self, ids: &[String]) -> Result<()>;
}

pub struct PersistedLineStore {
    db: Database,
}

impl PersistedLineStore {
    /// Opens (creating on first run) the `log_workbench` database, with the
    /// `logs` and `meta` object stores and the secondary
    /// `(fileName, lineNumber)` index on `logs`. Schema version is advanced
    /// only on additive changes, per the external interface contract.
    pub async fn open() -> Result<Self> {
        let factory = Factory::new().map_err(|e| storage_err("open factory", e))?;

        let mut open_request = factory
            .open(DB_NAME, Some(DB_VERSION), |event| {
                let database = match event.database() {
                    Ok(db) => db,
                    Err(e) => {
                        warn!("indexeddb upgrade event missing database handle: {e}");
                        return;
                    }
                };

                if !database.store_names().iter().any(|n| n == LOGS_STORE) {
                    let mut logs_params = ObjectStoreParams::new();
                    logs_params.key_path(Some(KeyPath::new_single("id")));
                    if let Ok(logs_store) = database.create_object_store(LOGS_STORE, logs_params) {
                        let mut index_params = IndexParams::new();
                        index_params.unique(false);
                        let _ = logs_store.create_index(
                            "by_file_and_line",
                            KeyPath::new_array(vec!["fileName".into(), "lineNumber".into()]),
                            Some(index_params),
                        );
                    }
                }

                if !database.store_names().iter().any(|n| n == META_STORE) {
                    let _ = database.create_object_store(META_STORE, ObjectStoreParams::new());
                }
            })
            .map_err(|e| storage_err("open database", e))?;

        let db = open_request
            .await
            .map_err(|e| storage_err("await database open", e))?;

        debug!("persisted line store opened");
        Ok(Self { db })
    }

    /// Upserts a batch of lines, idempotent by `id`. Committed as a single
    /// transaction so partial batches never become visible.
    pub async fn append_logs(&self, batch: &[LogLine]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let txn = self
            .db
            .transaction(&[LOGS_STORE], TransactionMode::ReadWrite)
            .map_err(|e| storage_err("begin append_logs transaction", e))?;
        let store = txn
            .object_store(LOGS_STORE)
            .map_err(|e| storage_err("open logs store", e))?;

        for line in batch {
            let row = LogRow::from(line);
            let value = serde_wasm_bindgen::to_value(&row).map_err(|e| storage_err("encode log row", e))?;
            store
                .put(&value, None)
                .map_err(|e| storage_err("queue put", e))?
                .await
                .map_err(|e| storage_err("put log row", e))?;
        }

        txn.commit()
            .map_err(|e| storage_err("commit append_logs", e))?
            .await
            .map_err(|e| storage_err("await append_logs commit", e))?;
        Ok(())
    }

    /// Returns the last `n` lines of `file_name` by line number.
    pub async fn get_last_n(&self, file_name: &str, n: usize) -> Result<Vec<LogLine>> {
        let all = self.all_rows_for_file(file_name).await?;
        let start = all.len().saturating_sub(n);
        Ok(all[start..].iter().cloned().map(LogLine::from).collect())
    }

    /// Returns the inclusive line-number range `[from, to]` for `file_name`.
    pub async fn get_by_range(&self, file_name: &str, from: usize, to: usize) -> Result<Vec<LogLine>> {
        let all = self.all_rows_for_file(file_name).await?;
        Ok(all
            .into_iter()
            .filter(|r| r.line_number >= from && r.line_number <= to)
            .map(LogLine::from)
            .collect())
    }

    async fn all_rows_for_file(&self, file_name: &str) -> Result<Vec<LogRow>> {
        let txn = self
            .db
            .transaction(&[LOGS_STORE], TransactionMode::ReadOnly)
            .map_err(|e| storage_err("begin read transaction", e))?;
        let store = txn
            .object_store(LOGS_STORE)
            .map_err(|e| storage_err("open logs store", e))?;

        let values = store
            .get_all(None, None)
            .map_err(|e| storage_err("queue get_all", e))?
            .await
            .map_err(|e| storage_err("get_all logs", e))?;

        let mut rows: Vec<LogRow> = values
            .into_iter()
            .filter_map(|v| serde_wasm_bindgen::from_value::<LogRow>(v).ok())
            .filter(|r: &LogRow| r.file_name == file_name)
            .collect();
        rows.sort_by_key(|r| r.line_number);
        Ok(rows)
    }

    /// Records `file_name`'s total line count in the `meta.files` slot.
    pub async fn update_file_total(&self, file_name: &str, total: usize) -> Result<()> {
        let mut slot = self.read_files_slot().await?;
        if let Some(entry) = slot.files.iter_mut().find(|(name, _)| name == file_name) {
            entry.1.total_lines = total;
        } else {
            slot.files.push((file_name.to_string(), FileMeta { total_lines: total }));
        }
        self.write_meta(META_KEY_FILES, &slot).await
    }

    pub async fn get_files_meta(&self) -> Result<Vec<(String, FileMeta)>> {
        Ok(self.read_files_slot().await?.files)
    }

    async fn read_files_slot(&self) -> Result<FilesMetaSlot> {
        Ok(self.read_meta(META_KEY_FILES).await?.unwrap_or_default())
    }

    /// Deletes every persisted row for `file_name` and its files-meta entry.
    pub async fn delete_file(&self, file_name: &str) -> Result<()> {
        let txn = self
            .db
            .transaction(&[LOGS_STORE], TransactionMode::ReadWrite)
            .map_err(|e| storage_err("begin delete_file transaction", e))?;
        let store = txn
            .object_store(LOGS_STORE)
            .map_err(|e| storage_err("open logs store", e))?;

        let values = store
            .get_all(None, None)
            .map_err(|e| storage_err("queue get_all", e))?
            .await
            .map_err(|e| storage_err("get_all for delete", e))?;

        for v in values {
            if let Ok(row) = serde_wasm_bindgen::from_value::<LogRow>(v) {
                if row.file_name == file_name {
                    let key = serde_wasm_bindgen::to_value(&row.id).map_err(|e| storage_err("encode key", e))?;
                    store
                        .delete(key)
                        .map_err(|e| storage_err("queue delete", e))?
                        .await
                        .map_err(|e| storage_err("delete row", e))?;
                }
            }
        }

        txn.commit()
            .map_err(|e| storage_err("commit delete_file", e))?
            .await
            .map_err(|e| storage_err("await delete_file commit", e))?;

        let mut slot = self.read_files_slot().await?;
        slot.files.retain(|(name, _)| name != file_name);
        self.write_meta(META_KEY_FILES, &slot).await
    }

    /// Drops every `logs` row and resets `meta` to its default slots.
    pub async fn clear_all(&self) -> Result<()> {
        let txn = self
            .db
            .transaction(&[LOGS_STORE, META_STORE], TransactionMode::ReadWrite)
            .map_err(|e| storage_err("begin clear_all transaction", e))?;
        txn.object_store(LOGS_STORE)
            .map_err(|e| storage_err("open logs store", e))?
            .clear()
            .map_err(|e| storage_err("queue clear logs", e))?
            .await
            .map_err(|e| storage_err("clear logs", e))?;
        txn.object_store(META_STORE)
            .map_err(|e| storage_err("open meta store", e))?
            .clear()
            .map_err(|e| storage_err("queue clear meta", e))?
            .await
            .map_err(|e| storage_err("clear meta", e))?;
        txn.commit()
            .map_err(|e| storage_err("commit clear_all", e))?
            .await
            .map_err(|e| storage_err("await clear_all commit", e))?;
        Ok(())
    }

    /// Loads the whole persisted session state: pinned ids, per-file
    /// totals, and the `maxLines` hint. Missing slots default per the
    /// external interface contract (pinned = [], files = [],
    /// maxLines = 50_000).
    pub async fn load_state(&self) -> Result<PersistedState> {
        let pinned_ids = self.read_meta::<Vec<String>>(META_KEY_PINNED).await?.unwrap_or_default();
        let files = self.read_files_slot().await?.files;
        let max_lines = self
            .read_meta::<usize>(META_KEY_MAX_LINES)
            .await?
            .unwrap_or(DEFAULT_MAX_LINES_HINT);
        Ok(PersistedState {
            pinned_ids,
            files,
            max_lines,
        })
    }

    /// Rewrites the full pinned-id set. Eager: callers write on every
    /// mutation rather than batching, per spec.md's pinned-store contract.
    pub async fn update_pinned(&self, ids: &[String]) -> Result<()> {
        self.write_meta(META_KEY_PINNED, &ids.to_vec()).await
    }

    async fn read_meta<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>> {
        let txn = self
            .db
            .transaction(&[META_STORE], TransactionMode::ReadOnly)
            .map_err(|e| storage_err("begin meta read transaction", e))?;
        let store = txn
            .object_store(META_STORE)
            .map_err(|e| storage_err("open meta store", e))?;
        let key_value = serde_wasm_bindgen::to_value(key).map_err(|e| storage_err("encode meta key", e))?;
        let stored = store
            .get(key_value)
            .map_err(|e| storage_err("queue meta get", e))?
            .await
            .map_err(|e| storage_err("get meta slot", e))?;
        match stored {
            Some(value) => serde_wasm_bindgen::from_value(value)
                .map(Some)
                .map_err(|e| storage_err("decode meta slot", e)),
            None => Ok(None),
        }
    }

    async fn write_meta<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let txn = self
            .db
            .transaction(&[META_STORE], TransactionMode::ReadWrite)
            .map_err(|e| storage_err("begin meta write transaction", e))?;
        let store = txn
            .object_store(META_STORE)
            .map_err(|e| storage_err("open meta store", e))?;

        #[derive(Serialize)]
        struct Keyed<'a, T> {
            key: &'a str,
            value: &'a T,
        }
        // `meta` has no declared key path; each put supplies its key
        // explicitly so unrelated slots never collide.
        let encoded = serde_wasm_bindgen::to_value(value).map_err(|e| storage_err("encode meta value", e))?;
        let key_value = serde_wasm_bindgen::to_value(key).map_err(|e| storage_err("encode meta key", e))?;
        store
            .put(&encoded, Some(&key_value))
            .map_err(|e| storage_err("queue meta put", e))?
            .await
            .map_err(|e| storage_err("put meta slot", e))?;

        txn.commit()
            .map_err(|e| storage_err("commit meta write", e))?
            .await
            .map_err(|e| storage_err("await meta write commit", e))?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl LineStoreBackend for PersistedLineStore {
    async fn append_logs(&self, batch: &[LogLine]) -> Result<()> {
        PersistedLineStore::append_logs(self, batch).await
    }

    async fn get_last_n(&self, file_name: &str, n: usize) -> Result<Vec<LogLine>> {
        PersistedLineStore::get_last_n(self, file_name, n).await
    }

    async fn get_by_range(&self, file_name: &str, from: usize, to: usize) -> Result<Vec<LogLine>> {
        PersistedLineStore::get_by_range(self, file_name, from, to).await
    }

    async fn update_file_total(&self, file_name: &str, total: usize) -> Result<()> {
        PersistedLineStore::update_file_total(self, file_name, total).await
    }

    async fn get_files_meta(&self) -> Result<Vec<(String, FileMeta)>> {
        PersistedLineStore::get_files_meta(self).await
    }

    async fn delete_file(&self, file_name: &str) -> Result<()> {
        PersistedLineStore::delete_file(self, file_name).await
    }

    async fn clear_all(&self) -> Result<()> {
        PersistedLineStore::clear_all(self).await
    }

    async fn load_state(&self) -> Result<PersistedState> {
        PersistedLineStore::load_state(self).await
    }

    async fn update_pinned(&self, ids: &[String]) -> Result<()> {
        PersistedLineStore::update_pinned(self, ids).await
    }
}

/// Native, in-memory implementation of [`LineStoreBackend`] used to exercise
/// the session controller and the small-file provider in `#[test]`s without
/// a browser's IndexedDB — the in-memory counterpart the teacher never
/// needed since its own global state (`LogEngine`) was always in-memory.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemoryLineStore {
    rows: std::sync::Mutex<Vec<LogRow>>,
    files: std::sync::Mutex<Vec<(String, FileMeta)>>,
    pinned: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MemoryLineStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
#[async_trait(?Send)]
impl LineStoreBackend for MemoryLineStore {
    async fn append_logs(&self, batch: &[LogLine]) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        for line in batch {
            let row = LogRow::from(line);
            if let Some(existing) = rows.iter_mut().find(|r: &&mut LogRow| r.id == row.id) {
                *existing = row;
            } else {
                rows.push(row);
            }
        }
        Ok(())
    }

    async fn get_last_n(&self, file_name: &str, n: usize) -> Result<Vec<LogLine>> {
        let mut matching: Vec<LogRow> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.file_name == file_name)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.line_number);
        let start = matching.len().saturating_sub(n);
        Ok(matching[start..].iter().cloned().map(LogLine::from).collect())
    }

    async fn get_by_range(&self, file_name: &str, from: usize, to: usize) -> Result<Vec<LogLine>> {
        let mut matching: Vec<LogRow> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.file_name == file_name && r.line_number >= from && r.line_number <= to)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.line_number);
        Ok(matching.into_iter().map(LogLine::from).collect())
    }

    async fn update_file_total(&self, file_name: &str, total: usize) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        if let Some(entry) = files.iter_mut().find(|(name, _)| name == file_name) {
            entry.1.total_lines = total;
        } else {
            files.push((file_name.to_string(), FileMeta { total_lines: total }));
        }
        Ok(())
    }

    async fn get_files_meta(&self) -> Result<Vec<(String, FileMeta)>> {
        Ok(self.files.lock().unwrap().clone())
    }

    async fn delete_file(&self, file_name: &str) -> Result<()> {
        self.rows.lock().unwrap().retain(|r| r.file_name != file_name);
        self.files.lock().unwrap().retain(|(name, _)| name != file_name);
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        self.rows.lock().unwrap().clear();
        self.files.lock().unwrap().clear();
        self.pinned.lock().unwrap().clear();
        Ok(())
    }

    async fn load_state(&self) -> Result<PersistedState> {
        Ok(PersistedState {
            pinned_ids: self.pinned.lock().unwrap().clone(),
            files: self.files.lock().unwrap().clone(),
            max_lines: DEFAULT_MAX_LINES_HINT,
        })
    }

    async fn update_pinned(&self, ids: &[String]) -> Result<()> {
        *self.pinned.lock().unwrap() = ids.to_vec();
        Ok(())
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    async fn append_and_load_round_trip() {
        let store = PersistedLineStore::open().await.unwrap();
        store.clear_all().await.unwrap();

        let lines = vec![
            LogLine::new("a.log", 1, "INFO: started"),
            LogLine::new("a.log", 2, "ERROR: boom"),
        ];
        store.append_logs(&lines).await.unwrap();
        store.update_file_total("a.log", 2).await.unwrap();

        let last = store.get_last_n("a.log", 1).await.unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].line_number, 2);

        let meta = store.get_files_meta().await.unwrap();
        assert_eq!(meta, vec![("a.log".to_string(), FileMeta { total_lines: 2 })]);
    }

    #[wasm_bindgen_test]
    async fn pinned_ids_persist_across_calls() {
        let store = PersistedLineStore::open().await.unwrap();
        store.clear_all().await.unwrap();

        let id = line_id("a.log", 3);
        store.update_pinned(&[id.clone()]).await.unwrap();
        let state = store.load_state().await.unwrap();
        assert_eq!(state.pinned_ids, vec![id]);
    }
}
