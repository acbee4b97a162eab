use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{StoreError, StoreResult};
use crate::storage::DEFAULT_STORAGE_KEY;

/// Store configuration.
///
/// ```toml
/// storage_key = "GlobalState"
/// storage_dir = "/var/lib/my-app/state"
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Key the persisted snapshot is stored under.
    pub storage_key: String,
    /// Directory for file-backed storage. In-memory storage when unset.
    pub storage_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            storage_dir: None,
        }
    }
}

impl StoreConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration before a store is built from it.
    ///
    /// # Errors
    ///
    /// [`StoreError::Config`] when `storage_key` is blank.
    ///
    /// # Examples
    ///
    /// ```
    /// use global_state::StoreConfig;
    ///
    /// let blank = StoreConfig { storage_key: " ".into(), storage_dir: None };
    /// assert!(blank.validate().is_err());
    /// assert!(StoreConfig::default().validate().is_ok());
    /// ```
    pub fn validate(&self) -> StoreResult<()> {
        if self.storage_key.trim().is_empty() {
            return Err(StoreError::Config("storage_key must not be empty".into()));
        }
        Ok(())
    }
}
