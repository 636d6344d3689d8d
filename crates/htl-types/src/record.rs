use std::fmt;

use serde::{Deserialize, Serialize};

use crate::batch::Batch;
use crate::error::TypeError;
use crate::member::Member;
use crate::product::Product;

/// Kind of a stored record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Member,
    Batch,
    Product,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member => f.write_str("member"),
            Self::Batch => f.write_str("batch"),
            Self::Product => f.write_str("product"),
        }
    }
}

/// Any record stored on the ledger.
///
/// Documents carry no type tag, so decoding goes by shape: a document with a
/// `productID` is a product, one with the cultivation fields is a batch, and
/// one with `id`/`organization`/`address`/`memberType` is a member.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Record {
    Product(Product),
    Batch(Batch),
    Member(Member),
}

impl Record {
    /// Decode stored bytes.
    ///
    /// Bytes that are not JSON at all fail with [`TypeError::Serialization`];
    /// JSON that matches no record shape fails with
    /// [`TypeError::UnrecognizedRecord`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| TypeError::Serialization(e.to_string()))?;
        serde_json::from_value(value.clone())
            .map_err(|_| TypeError::UnrecognizedRecord(truncate(&value.to_string(), 80)))
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Member(_) => RecordKind::Member,
            Self::Batch(_) => RecordKind::Batch,
            Self::Product(_) => RecordKind::Product,
        }
    }

    /// The key this record is stored under.
    pub fn key(&self) -> &str {
        match self {
            Self::Member(m) => &m.id,
            Self::Batch(b) => &b.batch_id,
            Self::Product(p) => &p.product_id,
        }
    }

    pub fn as_batch(&self) -> Option<&Batch> {
        match self {
            Self::Batch(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_batch(self) -> Option<Batch> {
        match self {
            Self::Batch(b) => Some(b),
            _ => None,
        }
    }
}

impl From<Member> for Record {
    fn from(member: Member) -> Self {
        Self::Member(member)
    }
}

impl From<Batch> for Record {
    fn from(batch: Batch) -> Self {
        Self::Batch(batch)
    }
}

impl From<Product> for Record {
    fn from(product: Product) -> Self {
        Self::Product(product)
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
