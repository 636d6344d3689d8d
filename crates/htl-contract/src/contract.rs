use htl_store::{RecordStore, Selector};
use htl_types::{
    Batch, Clock, EventStamp, IdGenerator, LabResult, Member, NewBatch, PackingList, Product,
    Record, SystemClock, WeightTally,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ContractConfig;
use crate::error::{ContractError, ContractResult};
use crate::query::QueryResults;

/// The supply-chain contract.
///
/// Owns a handle to its record store together with the id generator and
/// clock it stamps new records with. Every operation is a short synchronous
/// sequence of store calls: existence checks and validation run before the
/// single `put`, so a failed operation leaves the store untouched.
pub struct SupplyChainContract<S> {
    store: S,
    ids: Box<dyn IdGenerator>,
    clock: Box<dyn Clock>,
    config: ContractConfig,
}

impl<S: RecordStore> SupplyChainContract<S> {
    /// Create a contract with the default configuration and the system clock.
    pub fn new(store: S) -> Self {
        Self::with_config(store, ContractConfig::default())
    }

    pub fn with_config(store: S, config: ContractConfig) -> Self {
        Self {
            store,
            ids: config.id_generator(),
            clock: Box::new(SystemClock),
            config,
        }
    }

    /// Replace the batch id generator.
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// Replace the clock used for product timestamps.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ContractConfig {
        &self.config
    }

    pub fn into_store(self) -> S {
        self.store
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn init(&self) {
        info!(id_scheme = ?self.config.id_scheme, "supply chain contract instantiated");
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Register a supply-chain participant under `id`.
    ///
    /// Re-registering an existing id overwrites the previous record.
    pub fn register_member(
        &self,
        id: &str,
        organization: &str,
        address: &str,
        member_type: &str,
    ) -> ContractResult<Member> {
        require("member id", id)?;
        let member = Member::new(id, organization, address, member_type);
        self.put_json(id, &member)?;
        info!(key = id, organization, member_type, "member registered");
        Ok(member)
    }

    /// Plant a new batch under a freshly generated id.
    pub fn create_batch(&self, input: NewBatch) -> ContractResult<Batch> {
        let batch_id = self.ids.next_id();
        require("batch id", &batch_id)?;
        let batch = Batch::new(batch_id, input);
        self.put_json(&batch.batch_id, &batch)?;
        info!(key = %batch.batch_id, grower = %batch.grower, "batch created");
        Ok(batch)
    }

    /// Derive a retail product from an existing batch.
    pub fn create_product(
        &self,
        product_id: &str,
        batch_id: &str,
        transaction_id: &str,
    ) -> ContractResult<Product> {
        require("product id", product_id)?;
        require("batch id", batch_id)?;
        if self.read(batch_id)?.is_none() {
            return Err(not_found_batch(batch_id));
        }
        let product = Product::classify(
            product_id,
            batch_id,
            transaction_id,
            self.clock.now_rfc3339(),
        );
        self.put_json(product_id, &product)?;
        info!(
            key = product_id,
            batch_id,
            product_type = %product.product_type,
            "product created"
        );
        Ok(product)
    }

    // -----------------------------------------------------------------------
    // Batch events
    // -----------------------------------------------------------------------

    pub fn record_lab_result(&self, result: &LabResult, stamp: &EventStamp) -> ContractResult<Batch> {
        self.merge_batch(stamp, "lab result", |batch| result.apply_to(batch))
    }

    pub fn record_packing_list(
        &self,
        list: &PackingList,
        stamp: &EventStamp,
    ) -> ContractResult<Batch> {
        self.merge_batch(stamp, "packing list", |batch| list.apply_to(batch))
    }

    pub fn record_weight_tally(
        &self,
        tally: &WeightTally,
        stamp: &EventStamp,
    ) -> ContractResult<Batch> {
        self.merge_batch(stamp, "weight tally", |batch| tally.apply_to(batch))
    }

    fn merge_batch(
        &self,
        stamp: &EventStamp,
        event: &str,
        apply: impl FnOnce(&mut Batch),
    ) -> ContractResult<Batch> {
        require("batch id", &stamp.batch_id)?;
        let mut batch = self.get_batch(&stamp.batch_id)?;
        apply(&mut batch);
        batch.stamp(stamp);
        self.put_json(&stamp.batch_id, &batch)?;
        info!(
            key = %stamp.batch_id,
            transaction_id = %stamp.transaction_id,
            event,
            "batch updated"
        );
        Ok(batch)
    }

    // -----------------------------------------------------------------------
    // Reads and removal
    // -----------------------------------------------------------------------

    /// Read and decode whatever record is stored at `key`.
    pub fn get_record(&self, key: &str) -> ContractResult<Record> {
        require("key", key)?;
        let bytes = self
            .read(key)?
            .ok_or_else(|| ContractError::NotFound(key.to_string()))?;
        Record::from_slice(&bytes).map_err(|e| ContractError::Deserialization {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Read the batch stored at `batch_id`.
    pub fn get_batch(&self, batch_id: &str) -> ContractResult<Batch> {
        require("batch id", batch_id)?;
        let bytes = self
            .read(batch_id)?
            .ok_or_else(|| not_found_batch(batch_id))?;
        decode(batch_id, &bytes)
    }

    /// Remove the record at `key`. Fails with `NotFound` if nothing was there.
    ///
    /// A zero-length value counts as nothing; it is cleared but still
    /// reported as `NotFound`.
    pub fn delete_record(&self, key: &str) -> ContractResult<()> {
        require("key", key)?;
        match self.store.delete(key)? {
            Some(removed) if !removed.is_empty() => {
                info!(key, "record deleted");
                Ok(())
            }
            _ => Err(ContractError::NotFound(key.to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Every record in the store, in key order.
    pub fn list_all(&self) -> ContractResult<QueryResults> {
        self.run_query(&Selector::all())
    }

    /// Records matching a Mango-style selector document.
    pub fn query_with_selector(&self, query: &str) -> ContractResult<QueryResults> {
        let selector = Selector::parse(query)?;
        self.run_query(&selector)
    }

    fn run_query(&self, selector: &Selector) -> ContractResult<QueryResults> {
        let cursor = self.store.query(selector)?;
        let results = QueryResults::collect(cursor)?;
        debug!(hits = results.len(), "query completed");
        Ok(results)
    }

    /// Read `key`, treating a zero-length value the same as a missing one.
    ///
    /// Queries skip empty values, so single-record reads must too.
    fn read(&self, key: &str) -> ContractResult<Option<Vec<u8>>> {
        Ok(self.store.get(key)?.filter(|bytes| !bytes.is_empty()))
    }

    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> ContractResult<()> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| ContractError::Serialization(e.to_string()))?;
        self.store.put(key, &bytes)?;
        Ok(())
    }
}

impl<S> std::fmt::Debug for SupplyChainContract<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupplyChainContract")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn require(what: &str, value: &str) -> ContractResult<()> {
    if value.is_empty() {
        Err(ContractError::Validation(format!("{what} must not be empty")))
    } else {
        Ok(())
    }
}

fn not_found_batch(batch_id: &str) -> ContractError {
    ContractError::NotFound(format!("{batch_id} batch"))
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> ContractResult<T> {
    serde_json::from_slice(bytes).map_err(|e| ContractError::Deserialization {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
