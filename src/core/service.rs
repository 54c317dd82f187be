//! Contract Service - one comparison session
//!
//! Owns the session settings (active chain, optional user key) and routes
//! every lookup through the cache before the explorer client. The client and
//! cache are shared between sessions; the settings are not.

use serde_json::Value;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::core::proxy::{degrade_lookup, proxy_info_from_record};
use crate::core::source::{extract, parse_abi, RawContractRecord};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{ContractSource, ProxyInfo, SourceCacheStats};
use crate::providers::etherscan::{ExplorerClient, RequestContext};
use crate::utils::cache::{CacheKey, CacheStore};
use crate::utils::constants::{is_supported_chain, API_KEY_STORAGE_KEY};

/// Cache-first access to contract data for one session
pub struct ContractService {
    client: Arc<ExplorerClient>,
    cache: CacheStore,
    context: RwLock<RequestContext>,
}

impl ContractService {
    /// Create a session on `chain_id`, restoring a persisted user key
    pub fn new(client: Arc<ExplorerClient>, cache: CacheStore, chain_id: &str) -> Self {
        let stored_key = cache
            .store()
            .get(API_KEY_STORAGE_KEY)
            .filter(|k| !k.trim().is_empty());
        if stored_key.is_some() {
            info!("🔑 Restored user API key from storage (key hidden)");
        }

        Self {
            client,
            cache,
            context: RwLock::new(RequestContext::new(chain_id).with_api_key(stored_key)),
        }
    }

    /// Session with explicit settings; nothing is restored or persisted
    /// for the user key
    pub fn with_context(
        client: Arc<ExplorerClient>,
        cache: CacheStore,
        context: RequestContext,
    ) -> Self {
        Self {
            client,
            cache,
            context: RwLock::new(context),
        }
    }

    /// Snapshot of the current session settings
    pub fn context(&self) -> RequestContext {
        self.context
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn chain_id(&self) -> String {
        self.context().chain_id
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn client(&self) -> &Arc<ExplorerClient> {
        &self.client
    }

    /// Switch the active chain. Subsequent lookups use chain-scoped cache keys.
    pub fn set_chain_id(&self, chain_id: &str) -> AppResult<()> {
        let chain_id = chain_id.trim();
        if !is_supported_chain(chain_id) {
            return Err(AppError::unsupported_chain(chain_id));
        }
        let mut ctx = self.context.write().unwrap_or_else(|p| p.into_inner());
        if ctx.chain_id != chain_id {
            info!("🔗 Active chain: {} -> {}", ctx.chain_id, chain_id);
            ctx.chain_id = chain_id.to_string();
        }
        Ok(())
    }

    /// Set or clear the user key. The key is persisted so it survives restarts.
    pub fn set_api_key_override(&self, key: Option<String>) {
        let key = key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
        let store = self.cache.store();

        match &key {
            Some(k) => {
                if let Err(e) = store.set(API_KEY_STORAGE_KEY, k) {
                    warn!("⚠️ Failed to persist user API key: {}", e);
                }
                info!("🔑 User API key set (key hidden)");
            }
            None => {
                store.remove(API_KEY_STORAGE_KEY);
                info!("🔑 User API key cleared, using configured pool");
            }
        }

        let mut ctx = self.context.write().unwrap_or_else(|p| p.into_inner());
        ctx.api_key_override = key;
    }

    /// Verified source for an address, cache first
    pub async fn get_source(&self, address: &str) -> AppResult<ContractSource> {
        let ctx = self.context();
        let key = CacheKey::source(&ctx.chain_id, address);

        if let Some(cached) = self.cache.get::<ContractSource>(&key) {
            let files = cached.files.len();
            return Ok(cached.with_cache_stats(SourceCacheStats::from_cache(files)));
        }

        let value = self.client.get_source_record(&ctx, address).await?;
        let record = RawContractRecord::from_value(value)?;
        let source = extract(address, &record);
        info!(
            "📄 Fetched {} ({} files, verified: {})",
            address,
            source.files.len(),
            source.verified
        );

        self.cache.set(&key, &source);
        Ok(source)
    }

    /// Proxy status of an address, cache first.
    ///
    /// Only successful lookups are cached; a degraded "not a proxy" answer is
    /// recomputed next time.
    pub async fn resolve_proxy(&self, address: &str) -> AppResult<ProxyInfo> {
        let ctx = self.context();
        let key = CacheKey::proxy(&ctx.chain_id, address);

        if let Some(cached) = self.cache.get::<ProxyInfo>(&key) {
            return Ok(cached);
        }

        let outcome = self.fetch_proxy_info(&ctx, address).await;
        if let Ok(info) = &outcome {
            self.cache.set(&key, info);
        }
        degrade_lookup(address, outcome)
    }

    async fn fetch_proxy_info(&self, ctx: &RequestContext, address: &str) -> AppResult<ProxyInfo> {
        let value = self.client.get_source_record(ctx, address).await?;
        let record = RawContractRecord::from_value(value)?;
        Ok(proxy_info_from_record(address, &record))
    }

    /// ABI from the dedicated `getabi` action, cache first.
    /// `None` when the contract has no usable ABI.
    pub async fn get_abi(&self, address: &str) -> AppResult<Option<Value>> {
        let ctx = self.context();
        let key = CacheKey::abi(&ctx.chain_id, address);

        if let Some(cached) = self.cache.get::<Value>(&key) {
            return Ok(Some(cached));
        }

        let raw = self.client.get_abi_raw(&ctx, address).await?;
        let abi = parse_abi(&raw);
        match &abi {
            Some(abi) => self.cache.set(&key, abi),
            None => debug!("No usable ABI for {}", address),
        }
        Ok(abi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::ExplorerConfig;
    use crate::models::types::SourceFile;
    use crate::utils::storage::{KeyValueStore, MemoryStore};

    fn service_with(store: Arc<MemoryStore>) -> ContractService {
        let client = Arc::new(ExplorerClient::new(&ExplorerConfig::default()).unwrap());
        ContractService::new(client, CacheStore::new(store), "1")
    }

    #[test]
    fn test_restores_persisted_key() {
        let store = Arc::new(MemoryStore::new());
        store.set(API_KEY_STORAGE_KEY, "user-key").unwrap();
        let service = service_with(store);
        assert_eq!(service.context().api_key_override.as_deref(), Some("user-key"));
    }

    #[test]
    fn test_set_and_clear_override_persists() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store.clone());

        service.set_api_key_override(Some(" k1 ".to_string()));
        assert_eq!(store.get(API_KEY_STORAGE_KEY).as_deref(), Some("k1"));
        assert_eq!(service.context().api_key_override.as_deref(), Some("k1"));

        service.set_api_key_override(Some("   ".to_string()));
        assert!(store.get(API_KEY_STORAGE_KEY).is_none());
        assert!(service.context().api_key_override.is_none());
    }

    #[test]
    fn test_set_chain_id() {
        let service = service_with(Arc::new(MemoryStore::new()));
        service.set_chain_id("17000").unwrap();
        assert_eq!(service.chain_id(), "17000");
        assert!(service.set_chain_id("424242").is_err());
        assert_eq!(service.chain_id(), "17000");
    }

    #[tokio::test]
    async fn test_cached_source_reports_cache_stats() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store);
        let mut source = ContractSource::unverified("0xabc");
        source.verified = true;
        source.files = vec![SourceFile::new("A.sol", "a"), SourceFile::new("B.sol", "b")];
        source.cache_stats = SourceCacheStats::fetched(2);
        service.cache().set(&CacheKey::source("1", "0xABC"), &source);

        // No keys configured: any network call would fail with ApiNoKeys
        let got = service.get_source("0xabc").await.unwrap();
        assert_eq!(got.cache_stats, SourceCacheStats::from_cache(2));
        assert_eq!(got.files.len(), 2);
    }

    #[tokio::test]
    async fn test_proxy_lookup_without_keys_propagates() {
        let service = service_with(Arc::new(MemoryStore::new()));
        let err = service.resolve_proxy("0xabc").await.unwrap_err();
        assert!(err.is_session_fatal());
    }
}
