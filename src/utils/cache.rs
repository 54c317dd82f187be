//! Versioned TTL Cache over a key/value store
//!
//! Short-circuits the explorer client for previously seen lookups.
//!
//! Features:
//! - Keys carry schema version + chain id (`{version}:{chainId}:{address}[:{suffix}]`)
//! - TTL-based expiration (24h default), stale entries are evicted on read
//! - Address normalization (lowercase)
//! - Write failures are swallowed: caching never affects correctness
//! - Cache HIT/MISS logging and counters

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::utils::constants::{CACHE_SCHEMA_VERSION, DEFAULT_CACHE_TTL_SECS};
use crate::utils::storage::KeyValueStore;

/// What a cache entry holds for an address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Normalized ContractSource
    Source { chain_id: String, address: String },
    /// ProxyInfo
    Proxy { chain_id: String, address: String },
    /// ABI from the `getabi` action
    Abi { chain_id: String, address: String },
}

impl CacheKey {
    pub fn source(chain_id: &str, address: &str) -> Self {
        Self::Source {
            chain_id: chain_id.to_string(),
            address: address.to_lowercase(),
        }
    }

    pub fn proxy(chain_id: &str, address: &str) -> Self {
        Self::Proxy {
            chain_id: chain_id.to_string(),
            address: address.to_lowercase(),
        }
    }

    pub fn abi(chain_id: &str, address: &str) -> Self {
        Self::Abi {
            chain_id: chain_id.to_string(),
            address: address.to_lowercase(),
        }
    }

    fn parts(&self) -> (&str, &str, Option<&'static str>) {
        match self {
            Self::Source { chain_id, address } => (chain_id, address, None),
            Self::Proxy { chain_id, address } => (chain_id, address, Some("proxy")),
            Self::Abi { chain_id, address } => (chain_id, address, Some("abi")),
        }
    }

    /// Storage key under a schema version tag
    pub fn storage_key(&self, version: &str) -> String {
        let (chain_id, address, suffix) = self.parts();
        match suffix {
            Some(suffix) => format!("{}:{}:{}:{}", version, chain_id, address, suffix),
            None => format!("{}:{}:{}", version, chain_id, address),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (chain_id, address, suffix) = self.parts();
        match suffix {
            Some(suffix) => write!(f, "{}:{}:{}", chain_id, address, suffix),
            None => write!(f, "{}:{}", chain_id, address),
        }
    }
}

/// Stored representation: payload plus creation time (unix ms)
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: i64,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Stale once `now - timestamp > ttl`
    pub fn is_expired(&self, ttl: Duration, now_ms: i64) -> bool {
        let age = now_ms.saturating_sub(self.timestamp);
        age > ttl.as_millis() as i64
    }
}

/// Cache over a shared key/value store.
///
/// Concurrent get/set on the same key is last-write-wins; entries are
/// recomputations of the same upstream data.
#[derive(Clone)]
pub struct CacheStore {
    store: Arc<dyn KeyValueStore>,
    version: String,
    ttl: Duration,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    write_failures: Arc<AtomicU64>,
}

impl CacheStore {
    /// Cache with the default schema version and TTL (24h)
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_settings(
            store,
            CACHE_SCHEMA_VERSION,
            Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        )
    }

    pub fn with_settings(store: Arc<dyn KeyValueStore>, version: &str, ttl: Duration) -> Self {
        Self {
            store,
            version: version.to_string(),
            ttl,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            write_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Underlying key/value store
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get from cache with TTL validation.
    /// Expired or undecodable entries are removed and reported as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let storage_key = key.storage_key(&self.version);

        let Some(raw) = self.store.get(&storage_key) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("📭 CACHE MISS: {}", key);
            return None;
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("🗑️ CACHE DROP (undecodable): {} ({})", key, e);
                self.store.remove(&storage_key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if entry.is_expired(self.ttl, Utc::now().timestamp_millis()) {
            self.store.remove(&storage_key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("📭 CACHE MISS (expired): {}", key);
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        info!("✅ CACHE HIT: {}", key);
        Some(entry.data)
    }

    /// Store a payload. Failures are logged and swallowed.
    pub fn set<T: Serialize>(&self, key: &CacheKey, data: &T) {
        let storage_key = key.storage_key(&self.version);
        let entry = CacheEntry::new(data);

        let result = serde_json::to_string(&entry)
            .map_err(crate::models::errors::AppError::from)
            .and_then(|raw| self.store.set(&storage_key, &raw));

        match result {
            Ok(()) => info!("💾 CACHE SET: {} (TTL: {}s)", key, self.ttl.as_secs()),
            Err(e) => {
                self.write_failures.fetch_add(1, Ordering::Relaxed);
                warn!("⚠️ Failed to cache {}: {}", key, e);
            }
        }
    }

    /// Remove one entry
    pub fn invalidate(&self, key: &CacheKey) {
        self.store.remove(&key.storage_key(&self.version));
        debug!("🗑️ CACHE INVALIDATE: {}", key);
    }

    /// Get statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            hits,
            misses,
            write_failures: self.write_failures.load(Ordering::Relaxed),
            hit_rate,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub write_failures: u64,
    pub hit_rate: f64,
    pub ttl_secs: u64,
}
