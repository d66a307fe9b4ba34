//! The pinned-line set: a storage-agnostic collection of line identifiers,
//! persisted independently of line payloads. Because `id = fileName:
//! lineNumber` is stable under re-import with identical numbering, this set
//! never needs to know which backend (persisted store or index-only) owns
//! the file it references.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct PinnedStore {
    ids: BTreeSet<String>,
}

impl PinnedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids(ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Flips membership for `id`, returning the new membership state. The
    /// caller is responsible for persisting the full set afterward (eager
    /// persistence on every mutation, per the external contract).
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    /// Removes every identifier prefixed `"<file_name>:"`, called when a
    /// file tab is closed. Identifiers for files that stay open are
    /// untouched; identifiers for files not currently open remain valid and
    /// are reinstated on re-import.
    pub fn remove_file(&mut self, file_name: &str) {
        let prefix = format!("{file_name}:");
        self.ids.retain(|id| !id.starts_with(&prefix));
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.ids.iter()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_adds_then_removes() {
        let mut pins = PinnedStore::new();
        assert!(pins.toggle("a.log:3"));
        assert!(pins.contains("a.log:3"));
        assert!(!pins.toggle("a.log:3"));
        assert!(!pins.contains("a.log:3"));
    }

    #[test]
    fn remove_file_strips_only_matching_prefix() {
        let mut pins = PinnedStore::from_ids(["a.log:1".to_string(), "a.log:22".to_string(), "b.log:1".to_string()]);
        pins.remove_file("a.log");
        assert_eq!(pins.to_vec(), vec!["b.log:1".to_string()]);
    }

    #[test]
    fn remove_file_does_not_touch_a_file_whose_name_prefixes_another() {
        // "a.log" must not strip ids belonging to "a.log.bak" just because
        // it is a string prefix of that file name.
        let mut pins = PinnedStore::from_ids(["a.log:1".to_string(), "a.log.bak:1".to_string()]);
        pins.remove_file("a.log");
        assert_eq!(pins.to_vec(), vec!["a.log.bak:1".to_string()]);
    }
}
