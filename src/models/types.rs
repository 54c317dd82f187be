//! Type definitions for CodeDiff
//! Data structures shared by acquisition, decoding and diffing

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One named source file of a verified contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path-like name, unique within one ContractSource
    pub name: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Final path segment of the name
    pub fn basename(&self) -> &str {
        basename(&self.name)
    }
}

/// Final path segment, ignoring directory structure
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Where a ContractSource came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCacheStats {
    /// Files served from cache
    pub cached: usize,
    /// Files freshly fetched
    pub fetched: usize,
}

impl SourceCacheStats {
    pub fn from_cache(files: usize) -> Self {
        Self { cached: files, fetched: 0 }
    }

    pub fn fetched(files: usize) -> Self {
        Self { cached: 0, fetched: files }
    }
}

impl std::ops::Add for SourceCacheStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            cached: self.cached + rhs.cached,
            fetched: self.fetched + rhs.fetched,
        }
    }
}

/// Normalized verified source of one contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractSource {
    pub address: String,
    pub contract_name: String,
    pub files: Vec<SourceFile>,
    pub compiler_version: String,
    pub verified: bool,
    /// Hex encoded constructor arguments as reported upstream
    pub constructor_arguments: Option<String>,
    pub abi: Option<Value>,
    #[serde(default)]
    pub cache_stats: SourceCacheStats,
}

impl ContractSource {
    /// Record for an address without verified source
    pub fn unverified(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            contract_name: String::new(),
            files: Vec::new(),
            compiler_version: String::new(),
            verified: false,
            constructor_arguments: None,
            abi: None,
            cache_stats: SourceCacheStats::default(),
        }
    }

    /// Copy with cache statistics replaced
    pub fn with_cache_stats(mut self, stats: SourceCacheStats) -> Self {
        self.cache_stats = stats;
        self
    }
}

/// Result of a proxy check
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyInfo {
    pub is_proxy: bool,
    /// Current implementation address when `is_proxy`
    pub implementation: Option<String>,
    pub proxy_address: Option<String>,
    pub proxy_contract_name: Option<String>,
}

impl ProxyInfo {
    /// Address that is not (or could not be shown to be) a proxy
    pub fn not_proxy() -> Self {
        Self::default()
    }
}

/// Per-file comparison record. Derived, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDiff {
    /// Path, or `old → new` when matched across directories
    pub file_name: String,
    /// `None` when the file was added
    pub old_content: Option<String>,
    /// `None` when the file was deleted or left unmatched
    pub new_content: Option<String>,
    pub has_diff: bool,
    /// Side-by-side rendering, empty when contents are identical
    pub diff_html: String,
    /// Line-by-line rendering, empty when contents are identical
    pub diff_html_unified: String,
    /// Unified diff text the renderings were produced from
    #[serde(default)]
    pub unified_diff: String,
}

/// Kind of change a FileDiff represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    Unchanged,
    Modified,
    Added,
    Deleted,
}

impl FileChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileChange::Unchanged => "UNCHANGED",
            FileChange::Modified => "MODIFIED",
            FileChange::Added => "ADDED",
            FileChange::Deleted => "DELETED",
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            FileChange::Unchanged => " ",
            FileChange::Modified => "~",
            FileChange::Added => "+",
            FileChange::Deleted => "-",
        }
    }
}

impl FileDiff {
    pub fn change(&self) -> FileChange {
        match (&self.old_content, &self.new_content) {
            (None, _) => FileChange::Added,
            (_, None) => FileChange::Deleted,
            _ if self.has_diff => FileChange::Modified,
            _ => FileChange::Unchanged,
        }
    }
}

/// One decoded constructor parameter, value ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedParam {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub value: String,
}

/// Constructor data of one side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructorInfo {
    pub address: String,
    /// Raw hex, the fallback display when decoding is unavailable
    pub arguments: Option<String>,
    pub decoded_params: Option<Vec<DecodedParam>>,
}
