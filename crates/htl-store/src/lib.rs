//! Key-value record storage for the Hemp Trace Ledger.
//!
//! This crate is the ledger boundary the contract layer builds on: a single
//! logical keyspace mapping string keys to opaque bytes, plus a document-style
//! selector query over the stored values.
//!
//! # Storage Backends
//!
//! All backends implement the [`RecordStore`] trait:
//!
//! - [`InMemoryRecordStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`JournaledRecordStore`] -- in-memory state made durable by an
//!   append-only, CRC-framed journal file
//!
//! # Design Rules
//!
//! 1. `put` overwrites unconditionally; last write wins.
//! 2. A missing key is `Ok(None)`, never an error.
//! 3. The store never interprets values except to evaluate selectors.
//! 4. Query cursors are finite, not restartable, and release their
//!    resources exactly once, on explicit close or on drop.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod cursor;
pub mod error;
pub mod journal;
pub mod memory;
pub mod selector;
pub mod traits;

pub use cursor::{KeyValue, QueryCursor, SnapshotIterator, StateIterator};
pub use error::{StoreError, StoreResult};
pub use journal::{JournalConfig, JournaledRecordStore};
pub use memory::InMemoryRecordStore;
pub use selector::{Condition, Selector};
pub use traits::RecordStore;
