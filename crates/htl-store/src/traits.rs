use std::sync::Arc;

use crate::cursor::QueryCursor;
use crate::error::StoreResult;
use crate::selector::Selector;

/// Single-keyspace record store.
///
/// All implementations must satisfy these invariants:
/// - `put` overwrites unconditionally; there is no compare-and-swap.
/// - `get` of a missing key is `Ok(None)`.
/// - `delete` returns the value it removed, or `None` if there was none.
/// - `query` returns every entry whose value matches the selector, in key
///   order, as a cursor that must be drained or dropped to release it.
/// - Empty keys are rejected with [`StoreError::EmptyKey`](crate::StoreError::EmptyKey).
pub trait RecordStore: Send + Sync {
    /// Read the bytes stored under `key`.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing anything already there.
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Remove `key`, returning the removed value.
    fn delete(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Open a cursor over all entries matching `selector`.
    fn query(&self, selector: &Selector) -> StoreResult<QueryCursor>;

    /// Check whether a value is stored under `key`.
    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).delete(key)
    }

    fn query(&self, selector: &Selector) -> StoreResult<QueryCursor> {
        (**self).query(selector)
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        (**self).exists(key)
    }
}
