//! Identifier generation for new batches.
//!
//! Batch ids are minted by the ledger, not supplied by the caller, so the
//! source is an injectable capability. Uniqueness is never checked against
//! the store: a collision silently overwrites the earlier batch.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Source of fresh record identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random lowercase base-36 ids from the thread-local RNG.
#[derive(Clone, Debug)]
pub struct RandomBatchIds {
    length: usize,
}

impl RandomBatchIds {
    /// Default id length: 36^10 (about 3.6e15) possible ids.
    pub const DEFAULT_LENGTH: usize = 10;

    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(1),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomBatchIds {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LENGTH)
    }
}

impl IdGenerator for RandomBatchIds {
    fn next_id(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.length)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect()
    }
}

/// Time-ordered UUID v7 ids, hyphen-free.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidBatchIds;

impl IdGenerator for UuidBatchIds {
    fn next_id(&self) -> String {
        uuid::Uuid::now_v7().simple().to_string()
    }
}

/// Deterministic ids (`{prefix}1`, `{prefix}2`, ...) for tests and replays.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{n}", self.prefix)
    }
}

impl<G: IdGenerator + ?Sized> IdGenerator for Box<G> {
    fn next_id(&self) -> String {
        (**self).next_id()
    }
}
