use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::cursor::{KeyValue, QueryCursor, SnapshotIterator};
use crate::error::{StoreError, StoreResult};
use crate::selector::Selector;
use crate::traits::RecordStore;

#[derive(Clone, Debug)]
struct Entry {
    value: Vec<u8>,
    version: u64,
}

#[derive(Default)]
struct MemoryState {
    entries: BTreeMap<String, Entry>,
    revision: u64,
}

/// In-memory, `BTreeMap`-based record store.
///
/// Intended for tests and embedding. Entries are held behind a `RwLock` and
/// iterated in key order. Every write bumps a store-wide revision, and each
/// entry remembers the revision at which it was last written.
pub struct InMemoryRecordStore {
    inner: RwLock<MemoryState>,
    open_cursors: Arc<AtomicUsize>,
}

impl InMemoryRecordStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryState::default()),
            open_cursors: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.read_state().map(|s| s.entries.len()).unwrap_or(0)
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Revision of the most recent write (0 for a fresh store).
    pub fn revision(&self) -> u64 {
        self.read_state().map(|s| s.revision).unwrap_or(0)
    }

    /// Revision at which `key` was last written.
    pub fn version(&self, key: &str) -> StoreResult<Option<u64>> {
        Ok(self.read_state()?.entries.get(key).map(|e| e.version))
    }

    /// All keys in order.
    pub fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.read_state()?.entries.keys().cloned().collect())
    }

    /// Snapshot of every entry in key order.
    pub fn entries(&self) -> StoreResult<Vec<KeyValue>> {
        Ok(self
            .read_state()?
            .entries
            .iter()
            .map(|(k, e)| KeyValue::new(k.clone(), e.value.clone()))
            .collect())
    }

    /// Number of query cursors handed out and not yet closed.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    /// Remove all entries. The revision keeps counting.
    pub fn clear(&self) -> StoreResult<()> {
        let mut state = self.write_state()?;
        state.entries.clear();
        state.revision += 1;
        Ok(())
    }

    fn read_state(&self) -> StoreResult<RwLockReadGuard<'_, MemoryState>> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write_state(&self) -> StoreResult<RwLockWriteGuard<'_, MemoryState>> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        check_key(key)?;
        Ok(self.read_state()?.entries.get(key).map(|e| e.value.clone()))
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        check_key(key)?;
        let mut state = self.write_state()?;
        state.revision += 1;
        let version = state.revision;
        state.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                version,
            },
        );
        debug!(key, version, len = value.len(), "record stored");
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        check_key(key)?;
        let mut state = self.write_state()?;
        let removed = state.entries.remove(key).map(|e| e.value);
        if removed.is_some() {
            state.revision += 1;
            debug!(key, "record deleted");
        }
        Ok(removed)
    }

    fn query(&self, selector: &Selector) -> StoreResult<QueryCursor> {
        let matches: Vec<KeyValue> = self
            .read_state()?
            .entries
            .iter()
            .filter(|(_, e)| selector.matches_bytes(&e.value))
            .map(|(k, e)| KeyValue::new(k.clone(), e.value.clone()))
            .collect();
        debug!(matches = matches.len(), "query evaluated");

        self.open_cursors.fetch_add(1, Ordering::SeqCst);
        let open = Arc::clone(&self.open_cursors);
        let iter = SnapshotIterator::new(matches).on_close(move || {
            open.fetch_sub(1, Ordering::SeqCst);
        });
        Ok(QueryCursor::new(iter))
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        check_key(key)?;
        Ok(self.read_state()?.entries.contains_key(key))
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRecordStore")
            .field("record_count", &self.len())
            .field("revision", &self.revision())
            .finish()
    }
}

pub(crate) fn check_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        Err(StoreError::EmptyKey)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[test]
    fn put_then_get_roundtrips() {
        let store = InMemoryRecordStore::new();
        let value = doc(json!({"id": "M1", "organization": "AcmeFarms"}));
        store.put("M1", &value).unwrap();

        let read_back = store.get("M1").unwrap().expect("should exist");
        let decoded: serde_json::Value = serde_json::from_slice(&read_back).unwrap();
        assert_eq!(decoded, json!({"id": "M1", "organization": "AcmeFarms"}));
    }

    #[test]
    fn get_missing_is_none() {
        let store = InMemoryRecordStore::new();
        assert!(store.get("nope").unwrap().is_none());
        assert!(!store.exists("nope").unwrap());
    }

    #[test]
    fn put_overwrites() {
        let store = InMemoryRecordStore::new();
        store.put("k", b"one").unwrap();
        store.put("k", b"two").unwrap();
        assert_eq!(store.get("k").unwrap().unwrap(), b"two");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_returns_removed_value() {
        let store = InMemoryRecordStore::new();
        store.put("k", b"v").unwrap();
        assert_eq!(store.delete("k").unwrap(), Some(b"v".to_vec()));
        assert!(!store.exists("k").unwrap());
        assert_eq!(store.delete("k").unwrap(), None);
    }

    #[test]
    fn empty_keys_are_rejected() {
        let store = InMemoryRecordStore::new();
        assert!(matches!(store.put("", b"v"), Err(StoreError::EmptyKey)));
        assert!(matches!(store.get(""), Err(StoreError::EmptyKey)));
        assert!(matches!(store.delete(""), Err(StoreError::EmptyKey)));
    }

    // -----------------------------------------------------------------------
    // Versions
    // -----------------------------------------------------------------------

    #[test]
    fn every_write_gets_a_new_version() {
        let store = InMemoryRecordStore::new();
        assert_eq!(store.revision(), 0);
        store.put("a", b"1").unwrap();
        store.put("b", b"1").unwrap();
        store.put("a", b"2").unwrap();
        assert_eq!(store.version("a").unwrap(), Some(3));
        assert_eq!(store.version("b").unwrap(), Some(2));
        assert_eq!(store.version("c").unwrap(), None);
        assert_eq!(store.revision(), 3);
    }

    #[test]
    fn deleting_a_missing_key_does_not_bump_revision() {
        let store = InMemoryRecordStore::new();
        store.put("a", b"1").unwrap();
        store.delete("zzz").unwrap();
        assert_eq!(store.revision(), 1);
        store.delete("a").unwrap();
        assert_eq!(store.revision(), 2);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    #[test]
    fn query_returns_matches_in_key_order() {
        let store = InMemoryRecordStore::new();
        store.put("b2", &doc(json!({"grower": "M1"}))).unwrap();
        store.put("b1", &doc(json!({"grower": "M1"}))).unwrap();
        store.put("b3", &doc(json!({"grower": "M2"}))).unwrap();

        let keys: Vec<String> = store
            .query(&Selector::eq("grower", "M1"))
            .unwrap()
            .map(|kv| kv.unwrap().key)
            .collect();
        assert_eq!(keys, vec!["b1", "b2"]);
    }

    #[test]
    fn empty_selector_returns_everything_including_non_json() {
        let store = InMemoryRecordStore::new();
        store.put("a", b"plain text").unwrap();
        store.put("b", &doc(json!({"x": 1}))).unwrap();
        let cursor = store.query(&Selector::all()).unwrap();
        assert_eq!(cursor.count(), 2);
    }

    #[test]
    fn query_sees_a_snapshot() {
        let store = InMemoryRecordStore::new();
        store.put("a", b"{}").unwrap();
        let cursor = store.query(&Selector::all()).unwrap();
        store.put("b", b"{}").unwrap();
        assert_eq!(cursor.count(), 1);
    }

    #[test]
    fn cursors_are_released_on_drain_drop_and_close() {
        let store = InMemoryRecordStore::new();
        store.put("a", b"{}").unwrap();
        store.put("b", b"{}").unwrap();

        let drained = store.query(&Selector::all()).unwrap();
        assert_eq!(store.open_cursors(), 1);
        assert_eq!(drained.count(), 2);
        assert_eq!(store.open_cursors(), 0);

        let mut partial = store.query(&Selector::all()).unwrap();
        let _ = partial.next();
        assert_eq!(store.open_cursors(), 1);
        drop(partial);
        assert_eq!(store.open_cursors(), 0);

        let explicit = store.query(&Selector::all()).unwrap();
        explicit.close().unwrap();
        assert_eq!(store.open_cursors(), 0);
    }

    // -----------------------------------------------------------------------
    // Utility methods
    // -----------------------------------------------------------------------

    #[test]
    fn clear_removes_all() {
        let store = InMemoryRecordStore::new();
        store.put("a", b"1").unwrap();
        store.put("b", b"2").unwrap();
        store.clear().unwrap();
        assert!(store.is_empty());
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn concurrent_writers_to_distinct_keys() {
        use std::thread;

        let store = Arc::new(InMemoryRecordStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store.put(&format!("k{i}"), b"v").unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert_eq!(store.len(), 8);
        assert_eq!(store.revision(), 8);
    }

    #[test]
    fn debug_format() {
        let store = InMemoryRecordStore::new();
        store.put("x", b"1").unwrap();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryRecordStore"));
        assert!(debug.contains("record_count"));
    }

    proptest::proptest! {
        #[test]
        fn put_get_roundtrip(key in "[a-zA-Z0-9]{1,16}", value in proptest::collection::vec(proptest::num::u8::ANY, 0..64)) {
            let store = InMemoryRecordStore::new();
            store.put(&key, &value).unwrap();
            proptest::prop_assert_eq!(store.get(&key).unwrap(), Some(value));
        }
    }
}
