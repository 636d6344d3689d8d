use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use htl_contract::ContractConfig;
use htl_store::JournalConfig;
use serde::{Deserialize, Serialize};

pub const DEFAULT_STORE_PATH: &str = "htl.journal";

/// Settings read from `--config`, overridable from the command line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub store_path: PathBuf,
    pub journal: JournalConfig,
    pub contract: ContractConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            journal: JournalConfig::default(),
            contract: ContractConfig::default(),
        }
    }
}

impl CliConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load the config file if one was given, then apply flag overrides.
    pub fn resolve(config: Option<&Path>, store: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut resolved = match config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(store) = store {
            resolved.store_path = store;
        }
        Ok(resolved)
    }
}
