//! CodeDiff Library
//!
//! Compares the verified source of two smart-contract deployments:
//! - Resilient block-explorer client (key rotation, rate gate, retry/backoff)
//! - Versioned TTL cache over a pluggable key/value store
//! - Proxy resolution to the current implementation
//! - Multi-format source extraction and constructor argument decoding
//! - File-level diffs with basename rename correlation

pub mod api;
pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use crate::core::{Comparator, Comparison, ContractService};
pub use models::{
    AppError, AppResult, CompareError, ContractSource, ErrorCode, ExplorerConfig, FileDiff,
    ProxyInfo, Side, SourceFile,
};
pub use providers::{ExplorerClient, RateLimiter, RequestContext};
pub use utils::cache::{CacheKey, CacheStats, CacheStore};
pub use utils::storage::{FileStore, KeyValueStore, MemoryStore};
