//! Runtime configuration exposed through `CONFIG GET` / `CONFIG SET`.

use crate::storage::GlobPattern;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Name of the password parameter.
pub const REQUIREPASS: &str = "requirepass";

/// Errors raised by [`ConfigStore::set`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ERR Unsupported CONFIG parameter: {0}")]
    Unsupported(String),
}

/// Key/value store of recognized runtime parameters.
///
/// Only parameters present at construction can be set; there is no way to
/// add a new one at runtime.
#[derive(Debug)]
pub struct ConfigStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl ConfigStore {
    /// Creates the store with every recognized parameter at its initial value.
    pub fn new(requirepass: impl Into<String>) -> Self {
        let mut values = BTreeMap::new();
        values.insert(REQUIREPASS.to_string(), requirepass.into());
        Self {
            values: RwLock::new(values),
        }
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.read(|values| values.get(name).cloned())
    }

    /// Updates a recognized parameter. Names are case-insensitive.
    pub fn set(&self, name: &str, value: impl Into<String>) -> Result<(), ConfigError> {
        let name = name.to_ascii_lowercase();
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        match values.get_mut(&name) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(ConfigError::Unsupported(name)),
        }
    }

    /// `[name, value]` pairs whose name matches the glob `pattern`, in name order.
    pub fn matching(&self, pattern: &[u8]) -> Vec<(String, String)> {
        let pattern = GlobPattern::new(pattern);
        self.read(|values| {
            values
                .iter()
                .filter(|(name, _)| pattern.matches(name.as_bytes()))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect()
        })
    }

    /// The configured password, `None` when authentication is disabled.
    pub fn requirepass(&self) -> Option<String> {
        self.get(REQUIREPASS).filter(|pass| !pass.is_empty())
    }

    fn read<T>(&self, f: impl FnOnce(&BTreeMap<String, String>) -> T) -> T {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        f(&values)
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new("")
    }
}
