//! API Request Handlers

use alloy_primitives::Address;
use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::types::*;
use crate::core::{Comparator, ContractService};
use crate::models::config::ExplorerConfig;
use crate::models::errors::{AppError, AppResult};
use crate::providers::etherscan::{ExplorerClient, RequestContext};
use crate::utils::cache::CacheStore;
use crate::utils::constants::{is_supported_chain, SUPPORTED_CHAINS};
use crate::utils::storage::KeyValueStore;

/// Max comparisons in flight; the rate gate serializes upstream calls anyway
const MAX_CONCURRENT_COMPARISONS: usize = 16;

type ApiFailure = (StatusCode, Json<ApiResponse<()>>);

/// Shared application state
pub struct AppState {
    pub client: Arc<ExplorerClient>,
    pub cache: CacheStore,
    pub default_chain_id: String,
    pub start_time: Instant,
    pub compare_semaphore: Arc<Semaphore>,
    /// Cancelled on shutdown so in-flight comparisons stop waiting on backoff
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: &ExplorerConfig, store: Arc<dyn KeyValueStore>) -> AppResult<Self> {
        let client = Arc::new(ExplorerClient::new(config)?);
        let cache = CacheStore::with_settings(store, &config.cache_version, config.cache_ttl);

        Ok(Self {
            client,
            cache,
            default_chain_id: config.chain_id.clone(),
            start_time: Instant::now(),
            compare_semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_COMPARISONS)),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn failure(status: StatusCode, error: ApiError, start: Instant) -> ApiFailure {
    (status, Json(ApiResponse::error(error, elapsed_ms(start))))
}

fn status_of(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

// ============================================
// Health Check
// ============================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    let start = Instant::now();
    let cache = state.cache.stats();

    let data = HealthData {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        configured_keys: state.client.key_pool().len(),
        cache_hits: cache.hits,
        cache_misses: cache.misses,
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}

// ============================================
// Chains
// ============================================

pub async fn list_chains() -> Json<ApiResponse<Vec<ChainData>>> {
    let start = Instant::now();
    let chains = SUPPORTED_CHAINS
        .iter()
        .map(|c| ChainData {
            chain_id: c.id.to_string(),
            name: c.name.to_string(),
            explorer_url: c.explorer_url.to_string(),
        })
        .collect();

    Json(ApiResponse::success(chains, elapsed_ms(start)))
}

// ============================================
// Compare
// ============================================

pub async fn compare(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CompareRequest>,
) -> Result<Json<ApiResponse<CompareData>>, ApiFailure> {
    let start = Instant::now();

    let target = parse_address("address", &req.address, start)?;
    let new_implementation = parse_address("newImplementation", &req.new_implementation, start)?;

    let chain_id = req
        .chain_id
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| state.default_chain_id.clone());
    if !is_supported_chain(&chain_id) {
        let err = AppError::unsupported_chain(&chain_id);
        return Err(failure(status_of(err.code.http_status()), ApiError::from(&err), start));
    }

    let _permit = state
        .compare_semaphore
        .acquire()
        .await
        .map_err(|_| {
            failure(
                StatusCode::SERVICE_UNAVAILABLE,
                ApiError::from(&AppError::internal("Server is shutting down")),
                start,
            )
        })?;

    // Per-request session: the caller's key is used but never persisted
    let context = RequestContext::new(chain_id).with_api_key(req.api_key);
    let service = ContractService::with_context(state.client.clone(), state.cache.clone(), context);
    let comparator = Comparator::new(Arc::new(service));

    match comparator
        .compare(&target, &new_implementation, &state.shutdown)
        .await
    {
        Ok(comparison) => {
            let data = CompareData::from(comparison);
            info!(
                "📊 Compare {} -> {}: {} files, {} changed ({:.0}ms)",
                target,
                new_implementation,
                data.files.len(),
                data.changed_files,
                elapsed_ms(start)
            );
            Ok(Json(ApiResponse::success(data, elapsed_ms(start))))
        }
        Err(e) => {
            warn!("⚠️ Compare {} -> {} failed: {}", target, new_implementation, e);
            Err(failure(status_of(e.code().http_status()), ApiError::from(&e), start))
        }
    }
}

/// Validate an address field, returning its trimmed text
fn parse_address(field: &str, raw: &str, start: Instant) -> Result<String, ApiFailure> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            ApiError::bad_request(format!("Missing {}", field)),
            start,
        ));
    }
    trimmed.parse::<Address>().map_err(|_| {
        failure(
            StatusCode::BAD_REQUEST,
            ApiError::bad_request(format!("Invalid {} format", field)),
            start,
        )
    })?;
    Ok(trimmed.to_string())
}
