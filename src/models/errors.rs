//! Centralized Error Handling Module
//!
//! Every failure carries a unique error code so log lines and API responses
//! can be correlated without parsing messages.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - API_xxx: upstream explorer API errors
//! - CONTRACT_xxx: contract-level outcomes
//! - CACHE_xxx / DECODE_xxx: locally recovered failures
//! - CFG_xxx: configuration errors

use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    /// Errors that make the whole session unusable (credentials, quota).
    pub fn is_session_fatal(&self) -> bool {
        self.code.is_session_fatal()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Explorer API Errors
    // ============================================
    /// Active key set is empty
    ApiNoKeys,
    /// Upstream rejected the request permanently (bad address, unverified, ...)
    ApiNonRetryable,
    /// Upstream rejected the credential
    ApiInvalidKey,
    /// Rate limit budget exhausted
    ApiRateLimited,
    /// Network / upstream failure, attempt budget exhausted
    ApiTransient,
    /// Response body did not have the expected shape
    ApiMalformed,

    // ============================================
    // Contract Errors
    // ============================================
    /// Explorer returned no record for the address
    ContractNotFound,
    /// Source is not verified on the explorer
    ContractNotVerified,

    // ============================================
    // Locally recovered errors
    // ============================================
    /// Constructor argument decoding failed
    DecodeFailure,
    /// Key/value store rejected a write
    CacheWriteFailed,

    // ============================================
    // API Errors (REST surface)
    // ============================================
    /// Invalid request format
    ApiBadRequest,
    /// Internal server error
    ApiInternalError,

    // ============================================
    // Configuration Errors
    // ============================================
    /// Invalid configuration value
    ConfigInvalidValue,
    /// Unsupported chain ID
    ConfigUnsupportedChain,

    // ============================================
    // Generic Errors
    // ============================================
    /// Comparison was cancelled by the caller
    Cancelled,
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiNoKeys => "API_NO_KEYS",
            Self::ApiNonRetryable => "API_NON_RETRYABLE",
            Self::ApiInvalidKey => "API_INVALID_KEY",
            Self::ApiRateLimited => "API_RATE_LIMITED",
            Self::ApiTransient => "API_TRANSIENT",
            Self::ApiMalformed => "API_MALFORMED",

            Self::ContractNotFound => "CONTRACT_NOT_FOUND",
            Self::ContractNotVerified => "CONTRACT_NOT_VERIFIED",

            Self::DecodeFailure => "DECODE_FAILURE",
            Self::CacheWriteFailed => "CACHE_WRITE_FAILED",

            Self::ApiBadRequest => "API_BAD_REQUEST",
            Self::ApiInternalError => "API_INTERNAL_ERROR",

            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",
            Self::ConfigUnsupportedChain => "CFG_UNSUPPORTED_CHAIN",

            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Get HTTP status code for API responses
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ApiBadRequest | Self::ApiNonRetryable | Self::ConfigInvalidValue => 400,
            Self::ConfigUnsupportedChain => 400,
            Self::ApiInvalidKey | Self::ApiNoKeys => 401,
            Self::ContractNotFound => 404,
            Self::ContractNotVerified => 422,
            Self::ApiRateLimited => 429,
            Self::ApiTransient | Self::ApiMalformed => 502,
            _ => 500,
        }
    }

    /// Worth another call (next key or after backoff)
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ApiRateLimited | Self::ApiTransient | Self::ApiMalformed)
    }

    /// Credential and quota failures poison every request of the session
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::ApiNoKeys | Self::ApiInvalidKey | Self::ApiRateLimited)
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    /// No API keys configured
    pub fn no_keys() -> Self {
        Self::new(
            ErrorCode::ApiNoKeys,
            "No explorer API keys configured. Set ETHERSCAN_API_KEY or supply a key",
        )
    }

    /// Permanent upstream rejection
    pub fn non_retryable(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiNonRetryable, msg)
    }

    /// Upstream rejected the credential
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiInvalidKey, msg)
    }

    /// Rate limit budget exhausted
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiRateLimited, msg)
    }

    /// Transient upstream failure
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiTransient, msg)
    }

    /// Unexpected payload shape
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiMalformed, msg)
    }

    /// Explorer returned no record
    pub fn contract_not_found(address: &str) -> Self {
        Self::new(
            ErrorCode::ContractNotFound,
            format!("Contract not found: {}", address),
        )
    }

    /// Unsupported chain
    pub fn unsupported_chain(chain_id: &str) -> Self {
        Self::new(
            ErrorCode::ConfigUnsupportedChain,
            format!("Unsupported chain_id: {}", chain_id),
        )
    }

    /// Invalid configuration value
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidValue, msg)
    }

    /// API bad request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiBadRequest, msg)
    }

    /// API internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiInternalError, msg)
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorCode::Unknown, "IO error", err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::ApiTransient, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::ApiTransient, "Connection failed")
        } else if err.is_builder() {
            Self::with_source(ErrorCode::ApiNonRetryable, "Invalid request", err)
        } else if err.is_decode() {
            Self::with_source(ErrorCode::ApiMalformed, "Undecodable response body", err)
        } else {
            Self::new(ErrorCode::ApiTransient, err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::ApiMalformed, "JSON parse error", err)
    }
}

// ============================================
// Comparison errors
// ============================================

/// Which side of a comparison an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Old,
    New,
}

impl Side {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Old => "old implementation",
            Self::New => "new implementation",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Failure of a single comparison attempt.
///
/// Each acquisition failure names the address that failed so callers can
/// present a targeted message. None of these are fatal to the process.
#[derive(Debug)]
pub enum CompareError {
    /// Either input address was empty
    MissingAddress,
    /// Checking whether the target address is a proxy failed
    ProxyCheck { address: String, error: AppError },
    /// Fetching source for one side failed
    Source {
        side: Side,
        address: String,
        error: AppError,
    },
    /// One side is not verified on the explorer
    NotVerified { side: Side, address: String },
    /// The caller cancelled the comparison
    Cancelled,
}

impl CompareError {
    /// Error code for logging and HTTP mapping
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingAddress => ErrorCode::ApiBadRequest,
            Self::ProxyCheck { error, .. } | Self::Source { error, .. } => error.code,
            Self::NotVerified { .. } => ErrorCode::ContractNotVerified,
            Self::Cancelled => ErrorCode::Cancelled,
        }
    }

    /// Address the failure is scoped to, if any
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::ProxyCheck { address, .. }
            | Self::Source { address, .. }
            | Self::NotVerified { address, .. } => Some(address),
            _ => None,
        }
    }
}

impl fmt::Display for CompareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAddress => write!(f, "Please provide both addresses"),
            Self::ProxyCheck { address, error } => {
                write!(f, "Failed to fetch address information for {}: {}", address, error)
            }
            Self::Source { side, address, error } => {
                write!(f, "Failed to fetch {} ({}): {}", side, address, error)
            }
            Self::NotVerified { side, address } => {
                write!(f, "The {} ({}) is not verified on the explorer", side, address)
            }
            Self::Cancelled => write!(f, "Comparison cancelled"),
        }
    }
}

impl std::error::Error for CompareError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ProxyCheck { error, .. } | Self::Source { error, .. } => Some(error),
            _ => None,
        }
    }
}
