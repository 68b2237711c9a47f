//! Single-slot preview cache keyed by document identity.
//!
//! Each document has at most one preview; writing a new one replaces the old
//! content outright. The store is owned by the controller rather than being a
//! process-wide static, so each controller (and each test) gets a fresh one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct PreviewStore {
    entries: HashMap<PathBuf, Vec<u8>>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, id: &Path) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &Path) -> Option<&[u8]> {
        self.entries.get(id).map(Vec::as_slice)
    }

    /// Store `content` for `id`, returning the preview it replaced.
    pub fn set(&mut self, id: impl Into<PathBuf>, content: Vec<u8>) -> Option<Vec<u8>> {
        self.entries.insert(id.into(), content)
    }

    pub fn delete(&mut self, id: &Path) -> Option<Vec<u8>> {
        self.entries.remove(id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Preview text for a content provider; empty when nothing is stored.
    pub fn text(&self, id: &Path) -> String {
        self.get(id)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_previous_entry() {
        let mut store = PreviewStore::new();
        let id = Path::new("/ws/src/lib.rs");

        assert!(store.set(id, b"first".to_vec()).is_none());
        let old = store.set(id, b"second".to_vec());

        assert_eq!(old.as_deref(), Some(&b"first"[..]));
        assert_eq!(store.get(id), Some(&b"second"[..]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_frees_entry() {
        let mut store = PreviewStore::new();
        let id = Path::new("/ws/a.rs");
        store.set(id, b"x".to_vec());

        assert!(store.delete(id).is_some());
        assert!(!store.has(id));
        assert!(store.delete(id).is_none());
    }

    #[test]
    fn text_of_missing_entry_is_empty() {
        let store = PreviewStore::new();
        assert_eq!(store.text(Path::new("/ws/missing.rs")), "");
    }
}
