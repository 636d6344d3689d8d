//! Closeable query cursors.
//!
//! A backend hands out a [`StateIterator`]; callers only ever see it wrapped
//! in a [`QueryCursor`], which guarantees `close` runs exactly once whether
//! the caller drains it, stops early, or bails out on an error.

use std::fmt;
use std::vec;

use tracing::warn;

use crate::error::{StoreError, StoreResult};

/// A stored entry yielded by a query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Backend side of a query result sequence.
pub trait StateIterator: Send {
    /// Next matching entry, or `None` once the sequence is exhausted.
    fn next_entry(&mut self) -> StoreResult<Option<KeyValue>>;

    /// Release backend resources. Called exactly once by [`QueryCursor`].
    fn close(&mut self) -> StoreResult<()>;
}

/// Iterator over a materialized result set with a release hook.
///
/// Backends that evaluate the selector eagerly (both built-in backends do)
/// snapshot the matches into one of these.
pub struct SnapshotIterator {
    entries: vec::IntoIter<KeyValue>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
    closed: bool,
}

impl SnapshotIterator {
    pub fn new(entries: Vec<KeyValue>) -> Self {
        Self {
            entries: entries.into_iter(),
            on_close: None,
            closed: false,
        }
    }

    /// Run `hook` when the iterator is closed.
    pub fn on_close(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }
}

impl StateIterator for SnapshotIterator {
    fn next_entry(&mut self) -> StoreResult<Option<KeyValue>> {
        ensure_open(self.closed)?;
        Ok(self.entries.next())
    }

    fn close(&mut self) -> StoreResult<()> {
        self.closed = true;
        if let Some(hook) = self.on_close.take() {
            hook();
        }
        Ok(())
    }
}

/// Finite, non-restartable query result sequence.
///
/// Implements [`Iterator`] over `StoreResult<KeyValue>`. After the backend
/// reports exhaustion or an error, the cursor yields `None` forever. The
/// backend iterator is closed on [`QueryCursor::close`] or, failing that,
/// when the cursor is dropped.
pub struct QueryCursor {
    inner: Box<dyn StateIterator>,
    finished: bool,
    closed: bool,
    yielded: usize,
}

impl QueryCursor {
    pub fn new(inner: impl StateIterator + 'static) -> Self {
        Self {
            inner: Box::new(inner),
            finished: false,
            closed: false,
            yielded: 0,
        }
    }

    /// Number of entries yielded so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Returns `true` once the backend has reported the end of the sequence.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Close the cursor, surfacing any error from the backend.
    pub fn close(mut self) -> StoreResult<()> {
        self.close_inner()
    }

    fn close_inner(&mut self) -> StoreResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.finished = true;
        self.inner.close()
    }
}

impl Iterator for QueryCursor {
    type Item = StoreResult<KeyValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        if self.finished {
            return None;
        }
        match self.inner.next_entry() {
            Ok(Some(kv)) => {
                self.yielded += 1;
                Some(Ok(kv))
            }
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl Drop for QueryCursor {
    fn drop(&mut self) {
        if let Err(e) = self.close_inner() {
            warn!(error = %e, "failed to close query cursor");
        }
    }
}

impl fmt::Debug for QueryCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCursor")
            .field("yielded", &self.yielded)
            .field("finished", &self.finished)
            .field("closed", &self.closed)
            .finish()
    }
}

fn ensure_open(closed: bool) -> StoreResult<()> {
    if closed {
        Err(StoreError::CursorClosed)
    } else {
        Ok(())
    }
}
