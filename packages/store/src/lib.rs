//! Path-keyed byte store.
//!
//! The `ByteStore` is the persistence substrate for guest files: an
//! associative mapping from absolute path strings to immutable byte buffers.
//! There are no directory semantics and no deletion - a path either holds a
//! fully committed buffer or nothing at all. Readers never observe a
//! partially written file; the virtual file system above this layer only
//! calls [`ByteStore::put`] with a complete buffer.
//!
//! Buffers are [`Bytes`], so handing a file to a reader is a refcount bump,
//! not a copy.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

/// A byte store shared between sequential runtime instances.
///
/// Compiled output written by one guest run (e.g. a compiler) is picked up
/// by the next run through this shared handle. Access is synchronous; the
/// mutex exists only so the store can outlive any single runtime.
pub type SharedStore = Arc<Mutex<ByteStore>>;

/// Associative mapping from absolute paths to immutable byte buffers.
#[derive(Debug, Default)]
pub struct ByteStore {
    files: BTreeMap<String, Bytes>,
}

impl ByteStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store behind a shared handle.
    pub fn shared() -> SharedStore {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Store or replace the buffer at `path`.
    ///
    /// The buffer becomes visible to readers atomically: there is no state
    /// in which `get` observes a partially replaced file.
    pub fn put(&mut self, path: impl Into<String>, bytes: impl Into<Bytes>) {
        self.files.insert(path.into(), bytes.into());
    }

    /// Store a UTF-8 string at `path`, encoding it to bytes first.
    pub fn put_text(&mut self, path: impl Into<String>, text: &str) {
        self.put(path, Bytes::copy_from_slice(text.as_bytes()));
    }

    /// Get the buffer at `path`, or `None` if nothing is stored there.
    pub fn get(&self, path: &str) -> Option<Bytes> {
        self.files.get(path).cloned()
    }

    /// Whether a buffer is stored at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Number of stored files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the store holds no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_roundtrip() {
        let mut store = ByteStore::new();
        store.put("/x", Bytes::from_static(b"hello"));

        assert_eq!(store.get("/x"), Some(Bytes::from_static(b"hello")));
        assert!(store.contains("/x"));
        assert!(!store.contains("/y"));
        assert_eq!(store.get("/y"), None);
    }

    #[test]
    fn put_replaces_existing() {
        let mut store = ByteStore::new();
        store.put("/x", Bytes::from_static(b"first"));
        store.put("/x", Bytes::from_static(b"second"));

        assert_eq!(store.get("/x"), Some(Bytes::from_static(b"second")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn put_text_encodes_utf8() {
        let mut store = ByteStore::new();
        store.put_text("/greeting", "héllo");

        assert_eq!(store.get("/greeting"), Some(Bytes::from("héllo".as_bytes().to_vec())));
    }

    #[test]
    fn shared_handle_survives_users() {
        let shared = ByteStore::shared();
        {
            let mut guard = shared.lock().unwrap();
            guard.put("/a.wasm", Bytes::from_static(b"\0asm"));
        }
        let guard = shared.lock().unwrap();
        assert!(guard.contains("/a.wasm"));
    }

    #[test]
    fn empty_store_reports_empty() {
        let store = ByteStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }
}
