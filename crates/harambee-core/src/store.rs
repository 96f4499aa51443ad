//! Local application state store.
//!
//! A string-keyed store persisted as one JSON file in the cache directory.
//! The fetch cycle writes the derived dashboard values here after each
//! merge so a cold start has something to show before the first fetch;
//! consumers are handed the `AggregateResult` directly and never read
//! these keys back as the source of truth. Cleared in full on sign-out.
//!
//! Last write wins; there is no schema versioning. Reading a key that was
//! never set yields `None`.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Well-known keys written after each fetch cycle.
pub mod keys {
    pub const USER: &str = "user";
    pub const EMAIL: &str = "email";
    pub const TOTAL_CONTRIBUTION: &str = "totalContribution";
    pub const CURRENT_USER_CONTRIBUTIONS: &str = "currentUserContributions";
    pub const UNIQUE_CONTRIBUTORS: &str = "uniqueContributors";
    pub const PERMISSION: &str = "permission";
}

/// State file name in cache directory
const STATE_FILE: &str = "state.json";

pub struct StateStore {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl StateStore {
    /// Open the store in the given directory, loading any persisted values.
    pub fn open(cache_dir: PathBuf) -> Result<Self> {
        let path = cache_dir.join(STATE_FILE);
        let values = if path.exists() {
            let contents =
                std::fs::read_to_string(&path).context("Failed to read state store")?;
            serde_json::from_str(&contents).context("Failed to parse state store")?
        } else {
            HashMap::new()
        };
        Ok(Self { path, values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Remove every key, on disk and in memory.
    pub fn clear(&mut self) -> Result<()> {
        self.values.clear();
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove state store")?;
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, contents).context("Failed to write state store")
    }
}
