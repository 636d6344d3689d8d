//! Bulk reads over the record store.
//!
//! A query drains a [`QueryCursor`] into an ordered list of hits. Each value
//! is decoded as JSON where possible and kept as text otherwise, so a single
//! malformed record never hides the rest of the result set.

use htl_store::{QueryCursor, StoreResult};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ContractError, ContractResult};

/// The decoded value of one hit.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordPayload {
    Document(Value),
    /// Stored bytes that were not JSON, as (lossy) UTF-8 text.
    Raw(String),
}

impl RecordPayload {
    pub fn as_document(&self) -> Option<&Value> {
        match self {
            Self::Document(v) => Some(v),
            Self::Raw(_) => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryHit {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Record")]
    pub record: RecordPayload,
}

/// Ordered result of a query, in cursor order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QueryResults {
    hits: Vec<QueryHit>,
}

impl QueryResults {
    /// Drain `cursor` into a result set.
    ///
    /// The cursor is closed whether draining succeeds or fails. Entries with
    /// an empty value are skipped.
    pub fn collect(mut cursor: QueryCursor) -> StoreResult<Self> {
        let mut hits = Vec::new();
        for entry in cursor.by_ref() {
            // An early return drops `cursor`, which closes it.
            let entry = entry?;
            if entry.value.is_empty() {
                continue;
            }
            let record = decode(&entry.key, &entry.value);
            hits.push(QueryHit {
                key: entry.key,
                record,
            });
        }
        cursor.close()?;
        Ok(Self { hits })
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueryHit> {
        self.hits.iter()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.key.as_str()).collect()
    }

    pub fn get(&self, key: &str) -> Option<&RecordPayload> {
        self.hits.iter().find(|h| h.key == key).map(|h| &h.record)
    }

    pub fn into_hits(self) -> Vec<QueryHit> {
        self.hits
    }

    /// Render as `[{"Key": ..., "Record": ...}, ...]`.
    pub fn to_json(&self) -> ContractResult<String> {
        serde_json::to_string(self).map_err(|e| ContractError::Serialization(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> ContractResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ContractError::Serialization(e.to_string()))
    }
}

impl IntoIterator for QueryResults {
    type Item = QueryHit;
    type IntoIter = std::vec::IntoIter<QueryHit>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResults {
    type Item = &'a QueryHit;
    type IntoIter = std::slice::Iter<'a, QueryHit>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.iter()
    }
}

fn decode(key: &str, bytes: &[u8]) -> RecordPayload {
    let text = String::from_utf8_lossy(bytes);
    match serde_json::from_str(&text) {
        Ok(value) => RecordPayload::Document(value),
        Err(err) => {
            debug!(key, error = %err, "value is not JSON, returning raw text");
            RecordPayload::Raw(text.into_owned())
        }
    }
}
