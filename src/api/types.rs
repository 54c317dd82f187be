//! API Request/Response Types

use serde::{Deserialize, Serialize};

use crate::core::Comparison;
use crate::models::errors::{AppError, CompareError};
use crate::models::types::{ConstructorInfo, FileDiff, ProxyInfo, SourceCacheStats};
use crate::utils::constants::{explorer_address_url, get_chain_name};

/// API Response wrapper
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub latency_ms: f64,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, latency_ms: f64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(error: ApiError, latency_ms: f64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// API Error
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    /// Address the failure is scoped to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "API_BAD_REQUEST".to_string(),
            message: message.into(),
            address: None,
        }
    }

    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            code: "API_RATE_LIMITED".to_string(),
            message: format!("Rate limit exceeded. Retry after {} seconds", retry_after),
            address: None,
        }
    }
}

impl From<&AppError> for ApiError {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code_str().to_string(),
            message: err.message.clone(),
            address: None,
        }
    }
}

impl From<&CompareError> for ApiError {
    fn from(err: &CompareError) -> Self {
        Self {
            code: err.code().as_str().to_string(),
            message: err.to_string(),
            address: err.address().map(String::from),
        }
    }
}

// ============================================
// Compare
// ============================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareRequest {
    /// Proxy or implementation currently deployed
    pub address: String,
    /// Candidate implementation
    pub new_implementation: String,
    /// Defaults to the server's configured chain
    #[serde(default)]
    pub chain_id: Option<String>,
    /// Per-request explorer key replacing the server pool
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareData {
    pub chain_id: String,
    pub chain_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyInfo>,
    pub old_implementation: ImplementationSummary,
    pub new_implementation: ImplementationSummary,
    pub files: Vec<FileDiff>,
    pub changed_files: usize,
    pub cache_stats: SourceCacheStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationSummary {
    pub address: String,
    pub contract_name: String,
    pub compiler_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    pub constructor: ConstructorInfo,
}

impl From<Comparison> for CompareData {
    fn from(comparison: Comparison) -> Self {
        let changed_files = comparison.changed_files().count();
        let cache_stats = comparison.cache_totals();
        let chain_id = comparison.chain_id;

        let summary = |source: crate::models::types::ContractSource, constructor: ConstructorInfo| {
            ImplementationSummary {
                explorer_url: explorer_address_url(&chain_id, &source.address),
                address: source.address,
                contract_name: source.contract_name,
                compiler_version: source.compiler_version,
                constructor,
            }
        };

        Self {
            chain_name: get_chain_name(&chain_id).to_string(),
            proxy: comparison.proxy,
            old_implementation: summary(comparison.old_source, comparison.old_constructor),
            new_implementation: summary(comparison.new_source, comparison.new_constructor),
            files: comparison.diffs,
            changed_files,
            cache_stats,
            chain_id,
        }
    }
}

// ============================================
// Chains
// ============================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainData {
    pub chain_id: String,
    pub name: String,
    pub explorer_url: String,
}

// ============================================
// Health Check
// ============================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub configured_keys: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
}
