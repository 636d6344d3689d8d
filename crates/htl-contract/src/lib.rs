//! Supply-chain contract for the Hemp Trace Ledger.
//!
//! One operation per real-world event: registering a participant, planting
//! a batch, recording lab results, packing lists and weight tallies against
//! it, and deriving retail products from it. Every batch event is a
//! read-merge-write against the record store; nothing here coordinates
//! concurrent writers, so the store's own guarantees are the only ones.

pub mod config;
pub mod contract;
pub mod error;
pub mod query;

pub use config::{ContractConfig, IdScheme};
pub use contract::SupplyChainContract;
pub use error::{ContractError, ContractResult};
pub use query::{QueryHit, QueryResults, RecordPayload};

pub use htl_store::{InMemoryRecordStore, JournaledRecordStore, RecordStore, Selector};
pub use htl_types::{
    Batch, EventStamp, LabResult, Member, NewBatch, PackingList, Product, Record, WeightTally,
};
