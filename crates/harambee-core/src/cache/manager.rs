use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::AggregateResult;
use crate::models::{Member, Transaction};

/// Consider a snapshot stale after 1 hour.
/// Balances freshness with reducing unnecessary refetches of slowly-changing
/// contribution data.
const CACHE_STALE_MINUTES: i64 = 60;

/// A fetched value together with the time it was cached.
///
/// Snapshots are a display convenience, never the source of truth: the
/// backing tables are re-fetched and re-merged on every refresh cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew (negative ages)
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            let remaining_mins = minutes % 60;
            if remaining_mins >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            let remaining_hours = (minutes % 1440) / 60;
            if remaining_hours >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > CACHE_STALE_MINUTES
    }
}

/// JSON snapshot cache in the application cache directory.
pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", name))?;

        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;

        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let cached = CachedData::new(data);
        let path = self.cache_path(name);
        let contents = serde_json::to_string_pretty(&cached)?;
        std::fs::write(&path, contents)?;
        Ok(())
    }

    // ===== Members =====

    pub fn load_members(&self) -> Result<Option<CachedData<Vec<Member>>>> {
        self.load("members")
    }

    pub fn save_members(&self, members: &[Member]) -> Result<()> {
        self.save("members", &members)
    }

    // ===== Transactions =====

    pub fn load_transactions(&self) -> Result<Option<CachedData<Vec<Transaction>>>> {
        self.load("transactions")
    }

    pub fn save_transactions(&self, transactions: &[Transaction]) -> Result<()> {
        self.save("transactions", &transactions)
    }

    // ===== Derived Aggregate =====

    pub fn load_aggregate(&self) -> Result<Option<CachedData<AggregateResult>>> {
        self.load("aggregate")
    }

    pub fn save_aggregate(&self, aggregate: &AggregateResult) -> Result<()> {
        self.save("aggregate", aggregate)
    }

    /// Remove every snapshot, as part of sign-out.
    pub fn clear(&self) -> Result<()> {
        for name in ["members", "transactions", "aggregate"] {
            let path = self.cache_path(name);
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove cache file: {}", name))?;
            }
        }
        Ok(())
    }

    // ===== Cache Age Information =====

    /// Helper to load cache and log errors without failing
    fn load_age<T>(
        &self,
        name: &str,
        loader: impl FnOnce() -> Result<Option<CachedData<T>>>,
    ) -> Option<String> {
        match loader() {
            Ok(Some(cached)) => Some(cached.age_display()),
            Ok(None) => None,
            Err(e) => {
                debug!(cache = name, error = %e, "Failed to load cache for age display");
                None
            }
        }
    }

    pub fn get_cache_ages(&self) -> CacheAges {
        CacheAges {
            members: self.load_age("members", || self.load_members()),
            transactions: self.load_age("transactions", || self.load_transactions()),
            aggregate: self.load_age("aggregate", || self.load_aggregate()),
        }
    }

    /// Helper to check staleness and log errors without failing
    fn is_cache_stale<T>(
        &self,
        name: &str,
        loader: impl FnOnce() -> Result<Option<CachedData<T>>>,
    ) -> bool {
        match loader() {
            Ok(Some(cached)) => cached.is_stale(),
            Ok(None) => true, // No cache = stale
            Err(e) => {
                debug!(cache = name, error = %e, "Failed to load cache for staleness check");
                true // Error reading = treat as stale
            }
        }
    }

    /// Check if any snapshot is stale
    pub fn any_stale(&self) -> bool {
        let stale_checks = [
            self.is_cache_stale("members", || self.load_members()),
            self.is_cache_stale("transactions", || self.load_transactions()),
            self.is_cache_stale("aggregate", || self.load_aggregate()),
        ];
        stale_checks.iter().any(|&stale| stale)
    }
}

#[derive(Debug, Default)]
pub struct CacheAges {
    pub members: Option<String>,
    pub transactions: Option<String>,
    pub aggregate: Option<String>,
}

impl CacheAges {
    /// Returns the most recent update time across the snapshots
    pub fn last_updated(&self) -> String {
        let ages = [&self.aggregate, &self.transactions, &self.members];

        for a in ages.iter().copied().flatten() {
            return a.clone();
        }

        "never".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use chrono::Duration;
    use rust_decimal::Decimal;

    #[test]
    fn test_cached_data_age_display_just_now() {
        let cached = CachedData::new(vec![1, 2, 3]);
        assert_eq!(cached.age_display(), "just now");
    }

    #[test]
    fn test_cached_data_is_stale() {
        let fresh = CachedData::new(vec![1]);
        assert!(!fresh.is_stale());

        let mut old = CachedData::new(vec![1]);
        old.cached_at = Utc::now() - Duration::minutes(61);
        assert!(old.is_stale());
    }

    #[test]
    fn test_cache_ages_last_updated_empty() {
        let ages = CacheAges::default();
        assert_eq!(ages.last_updated(), "never");
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = CacheManager::new(dir.path().to_path_buf()).expect("cache manager");

        let members = vec![Member {
            id: 1,
            name: "Alice".to_string(),
            email: "a@x.com".to_string(),
            permission: Default::default(),
        }];
        let transactions = vec![Transaction {
            id: 10,
            member: 1,
            amount: Decimal::from(50),
            created_at: Utc::now(),
        }];

        cache.save_members(&members).expect("save members");
        cache
            .save_transactions(&transactions)
            .expect("save transactions");
        let result = aggregate(&members, &transactions, "a@x.com");
        cache.save_aggregate(&result).expect("save aggregate");

        let loaded = cache
            .load_aggregate()
            .expect("load")
            .expect("snapshot present");
        assert_eq!(loaded.data.totals.total, Decimal::from(50));
        assert!(!loaded.is_stale());

        let ages = cache.get_cache_ages();
        assert_eq!(ages.last_updated(), "just now");
        assert!(!cache.any_stale());
    }

    #[test]
    fn test_clear_removes_all_snapshots() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = CacheManager::new(dir.path().to_path_buf()).expect("cache manager");
        cache.save_members(&[]).expect("save members");
        cache.save_transactions(&[]).expect("save transactions");

        cache.clear().expect("clear");
        assert!(cache.load_members().expect("load").is_none());
        assert!(cache.load_transactions().expect("load").is_none());
        assert_eq!(cache.get_cache_ages().last_updated(), "never");
    }

    #[test]
    fn test_missing_snapshot_is_none_and_stale() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = CacheManager::new(dir.path().to_path_buf()).expect("cache manager");
        assert!(cache.load_members().expect("load").is_none());
        assert!(cache.any_stale());
    }
}
