//! Comparison flow
//!
//! target address -> proxy check -> old implementation
//! old + new implementation -> verified source -> constructor args -> file diffs
//!
//! Each acquisition failure is scoped to the side and address that failed.
//! The whole flow can be cancelled through a CancellationToken.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::diff::match_files;
use crate::core::service::ContractService;
use crate::models::errors::{CompareError, Side};
use crate::models::types::{
    ConstructorInfo, ContractSource, FileDiff, ProxyInfo, SourceCacheStats,
};
use crate::utils::decoder::ConstructorDecoder;
use crate::utils::render::{DiffRenderer, HtmlDiffRenderer};

/// Outcome of one successful comparison
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub chain_id: String,
    /// Present when the target address is a proxy
    pub proxy: Option<ProxyInfo>,
    pub old_implementation: String,
    pub new_implementation: String,
    pub old_source: ContractSource,
    pub new_source: ContractSource,
    pub old_constructor: ConstructorInfo,
    pub new_constructor: ConstructorInfo,
    pub diffs: Vec<FileDiff>,
}

impl Comparison {
    /// Entries whose content differs, including additions and deletions
    pub fn changed_files(&self) -> impl Iterator<Item = &FileDiff> {
        self.diffs.iter().filter(|d| d.has_diff)
    }

    /// First changed file, else the first file
    pub fn first_changed(&self) -> Option<&FileDiff> {
        self.changed_files().next().or_else(|| self.diffs.first())
    }

    /// Cache statistics of both sides combined
    pub fn cache_totals(&self) -> SourceCacheStats {
        self.old_source.cache_stats + self.new_source.cache_stats
    }
}

/// Runs comparisons for one session
pub struct Comparator {
    service: Arc<ContractService>,
    renderer: Arc<dyn DiffRenderer>,
    decoder: ConstructorDecoder,
}

impl Comparator {
    pub fn new(service: Arc<ContractService>) -> Self {
        Self::with_renderer(service, Arc::new(HtmlDiffRenderer))
    }

    pub fn with_renderer(service: Arc<ContractService>, renderer: Arc<dyn DiffRenderer>) -> Self {
        Self {
            service,
            renderer,
            decoder: ConstructorDecoder::alloy(),
        }
    }

    pub fn service(&self) -> &Arc<ContractService> {
        &self.service
    }

    /// Compare the implementation behind `target` with `new_implementation`
    pub async fn compare(
        &self,
        target: &str,
        new_implementation: &str,
        cancel: &CancellationToken,
    ) -> Result<Comparison, CompareError> {
        let target = target.trim();
        let new_implementation = new_implementation.trim();
        if target.is_empty() || new_implementation.is_empty() {
            return Err(CompareError::MissingAddress);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("🛑 Comparison {} vs {} cancelled", target, new_implementation);
                Err(CompareError::Cancelled)
            }
            result = self.run(target, new_implementation) => result,
        }
    }

    async fn run(
        &self,
        target: &str,
        new_implementation: &str,
    ) -> Result<Comparison, CompareError> {
        let start = Instant::now();
        let chain_id = self.service.chain_id();
        info!("🔍 Comparing {} with {} (chainId: {})", target, new_implementation, chain_id);

        let proxy = self
            .service
            .resolve_proxy(target)
            .await
            .map_err(|error| CompareError::ProxyCheck {
                address: target.to_string(),
                error,
            })?;

        let old_implementation = proxy
            .implementation
            .clone()
            .filter(|_| proxy.is_proxy)
            .unwrap_or_else(|| target.to_string());

        let old_source = self.verified_source(Side::Old, &old_implementation).await?;
        let new_source = self.verified_source(Side::New, new_implementation).await?;

        let old_constructor = self.constructor_info(&old_source).await;
        let new_constructor = self.constructor_info(&new_source).await;

        let diffs = match_files(&old_source.files, &new_source.files, self.renderer.as_ref());

        let comparison = Comparison {
            chain_id,
            proxy: proxy.is_proxy.then_some(proxy),
            old_implementation,
            new_implementation: new_implementation.to_string(),
            old_source,
            new_source,
            old_constructor,
            new_constructor,
            diffs,
        };

        let totals = comparison.cache_totals();
        info!(
            "✅ Compared in {}ms: {} files, {} changed (cached: {}, fetched: {})",
            start.elapsed().as_millis(),
            comparison.diffs.len(),
            comparison.changed_files().count(),
            totals.cached,
            totals.fetched
        );
        Ok(comparison)
    }

    async fn verified_source(
        &self,
        side: Side,
        address: &str,
    ) -> Result<ContractSource, CompareError> {
        let source = self
            .service
            .get_source(address)
            .await
            .map_err(|error| CompareError::Source {
                side,
                address: address.to_string(),
                error,
            })?;

        if !source.verified {
            return Err(CompareError::NotVerified {
                side,
                address: address.to_string(),
            });
        }
        Ok(source)
    }

    /// Constructor arguments of one side, decoded when an ABI is available.
    /// Falls back to the `getabi` action when the source record had no ABI.
    async fn constructor_info(&self, source: &ContractSource) -> ConstructorInfo {
        let arguments = source.constructor_arguments.clone();

        let abi: Option<Value> = match (&source.abi, &arguments) {
            (Some(abi), _) => Some(abi.clone()),
            (None, Some(_)) => match self.service.get_abi(&source.address).await {
                Ok(abi) => abi,
                Err(e) => {
                    warn!("⚠️ ABI lookup for {} failed: {}", source.address, e);
                    None
                }
            },
            (None, None) => None,
        };

        let decoded_params = abi.and_then(|abi| self.decoder.decode(&abi, arguments.as_deref()));

        ConstructorInfo {
            address: source.address.clone(),
            arguments,
            decoded_params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::ExplorerConfig;
    use crate::models::types::SourceFile;
    use crate::providers::etherscan::ExplorerClient;
    use crate::utils::cache::{CacheKey, CacheStore};
    use crate::utils::storage::MemoryStore;

    fn verified(address: &str, files: &[(&str, &str)]) -> ContractSource {
        let mut source = ContractSource::unverified(address);
        source.verified = true;
        source.contract_name = "Token".to_string();
        source.files = files.iter().map(|(n, c)| SourceFile::new(*n, *c)).collect();
        source
    }

    /// Comparator whose cache is pre-seeded; no keys are configured so any
    /// network call would fail.
    fn seeded_comparator(
        entries: &[(&str, ContractSource)],
        proxies: &[(&str, ProxyInfo)],
    ) -> Comparator {
        let cache = CacheStore::new(Arc::new(MemoryStore::new()));
        for (address, source) in entries {
            cache.set(&CacheKey::source("1", address), source);
        }
        for (address, info) in proxies {
            cache.set(&CacheKey::proxy("1", address), info);
        }
        let client = Arc::new(ExplorerClient::new(&ExplorerConfig::default()).unwrap());
        Comparator::new(Arc::new(ContractService::new(client, cache, "1")))
    }

    #[tokio::test]
    async fn test_missing_address() {
        let comparator = seeded_comparator(&[], &[]);
        let err = comparator
            .compare("  ", "0xnew", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CompareError::MissingAddress));
    }

    #[tokio::test]
    async fn test_compare_through_proxy_from_cache() {
        let proxy = ProxyInfo {
            is_proxy: true,
            implementation: Some("0xold".to_string()),
            proxy_address: Some("0xproxy".to_string()),
            proxy_contract_name: Some("Proxy".to_string()),
        };
        let comparator = seeded_comparator(
            &[
                ("0xold", verified("0xold", &[("src/A.sol", "v1"), ("B.sol", "b")])),
                ("0xnew", verified("0xnew", &[("contracts/A.sol", "v2"), ("B.sol", "b")])),
            ],
            &[("0xproxy", proxy)],
        );

        let comparison = comparator
            .compare("0xproxy", "0xnew", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(comparison.old_implementation, "0xold");
        assert!(comparison.proxy.is_some());
        assert_eq!(comparison.diffs.len(), 2);
        assert_eq!(comparison.changed_files().count(), 1);
        assert_eq!(
            comparison.first_changed().unwrap().file_name,
            "src/A.sol → contracts/A.sol"
        );
        assert_eq!(comparison.cache_totals(), SourceCacheStats { cached: 4, fetched: 0 });
        assert!(comparison.old_constructor.decoded_params.is_none());
    }

    #[tokio::test]
    async fn test_unverified_side_is_reported() {
        let comparator = seeded_comparator(
            &[
                ("0xold", verified("0xold", &[("A.sol", "a")])),
                ("0xnew", ContractSource::unverified("0xnew")),
            ],
            &[("0xold", ProxyInfo::not_proxy())],
        );

        let err = comparator
            .compare("0xold", "0xnew", &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            CompareError::NotVerified { side, address } => {
                assert_eq!(side, Side::New);
                assert_eq!(address, "0xnew");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_proxy_check_failure_names_target() {
        let comparator = seeded_comparator(&[], &[]);
        let err = comparator
            .compare("0xtarget", "0xnew", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CompareError::ProxyCheck { .. }));
        assert_eq!(err.address(), Some("0xtarget"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let comparator = seeded_comparator(&[], &[]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = comparator.compare("0xa", "0xb", &cancel).await.unwrap_err();
        assert!(matches!(err, CompareError::Cancelled));
    }

    #[test]
    fn test_first_changed_falls_back_to_first_file() {
        let comparison = Comparison {
            chain_id: "1".to_string(),
            proxy: None,
            old_implementation: "0xa".to_string(),
            new_implementation: "0xb".to_string(),
            old_source: verified("0xa", &[]),
            new_source: verified("0xb", &[]),
            old_constructor: ConstructorInfo {
                address: "0xa".into(),
                arguments: None,
                decoded_params: None,
            },
            new_constructor: ConstructorInfo {
                address: "0xb".into(),
                arguments: None,
                decoded_params: None,
            },
            diffs: vec![FileDiff {
                file_name: "A.sol".to_string(),
                old_content: Some("a".into()),
                new_content: Some("a".into()),
                has_diff: false,
                diff_html: String::new(),
                diff_html_unified: String::new(),
                unified_diff: String::new(),
            }],
        };
        assert_eq!(comparison.first_changed().unwrap().file_name, "A.sol");
        assert_eq!(comparison.changed_files().count(), 0);
    }
}
