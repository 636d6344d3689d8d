//! Record types for the Hemp Trace Ledger (HTL).
//!
//! Every supply-chain event in HTL (grower registration, cultivation, lab
//! testing, shipping, inspection, retail) is recorded as a JSON document
//! keyed by a string identifier. This crate defines the typed shape of
//! those documents while keeping the wire format schema-less.
//!
//! # Key Types
//!
//! - [`Member`] -- a registered participant (grower, lab, shipper, trader, retailer)
//! - [`Batch`] -- a traceable unit of crop, enriched by each downstream event
//! - [`LabResult`], [`PackingList`], [`WeightTally`] -- typed batch events
//! - [`Product`] -- a retail product derived from a batch
//! - [`Record`] -- any stored record, decoded by shape
//! - [`IdGenerator`] / [`Clock`] -- injectable sources of ids and time

pub mod batch;
pub mod error;
pub mod identity;
pub mod member;
pub mod product;
pub mod record;
pub mod temporal;

pub use batch::{Batch, EventStamp, LabResult, NewBatch, PackingList, WeightTally};
pub use error::TypeError;
pub use identity::{IdGenerator, RandomBatchIds, SequentialIds, UuidBatchIds};
pub use member::Member;
pub use product::{BeanType, Product, ProductType, PRODUCT_CLASS};
pub use record::{Record, RecordKind};
pub use temporal::{Clock, FixedClock, SystemClock};
