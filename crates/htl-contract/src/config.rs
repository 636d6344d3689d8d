use htl_types::{IdGenerator, RandomBatchIds, UuidBatchIds};
use serde::{Deserialize, Serialize};

/// How new batch ids are minted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdScheme {
    /// Short random base-36 ids.
    #[default]
    Random,
    /// Time-ordered UUID v7 ids.
    Uuid,
}

/// Configuration for the supply-chain contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContractConfig {
    pub id_scheme: IdScheme,
    /// Length of random batch ids. Ignored for UUID ids.
    pub batch_id_length: usize,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            id_scheme: IdScheme::Random,
            batch_id_length: RandomBatchIds::DEFAULT_LENGTH,
        }
    }
}

impl ContractConfig {
    /// Build the id generator this configuration describes.
    pub fn id_generator(&self) -> Box<dyn IdGenerator> {
        match self.id_scheme {
            IdScheme::Random => Box::new(RandomBatchIds::new(self.batch_id_length)),
            IdScheme::Uuid => Box::new(UuidBatchIds),
        }
    }
}
