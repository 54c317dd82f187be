//! Constants Module - Single Source of Truth
//!
//! Every constant, chain lookup and explorer URL helper used across the
//! crate is defined here. No hardcoded values in other modules.

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "CodeDiff";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for HTTP requests
pub const USER_AGENT: &str = concat!("CodeDiff/", env!("CARGO_PKG_VERSION"));

// ============================================
// EXPLORER API CONSTANTS
// ============================================

/// Etherscan v2 multichain endpoint
pub const ETHERSCAN_API_URL: &str = "https://api.etherscan.io/v2/api";

/// Default chain (Ethereum mainnet)
pub const DEFAULT_CHAIN_ID: &str = "1";

/// Minimum spacing between outbound calls (4 calls per second max)
pub const API_DELAY_MS: u64 = 250;

/// Outer retry attempts per logical request
pub const MAX_RETRIES: u32 = 10;

/// First backoff delay
pub const INITIAL_RETRY_DELAY_MS: u64 = 1000;

/// Backoff cap
pub const MAX_RETRY_DELAY_MS: u64 = 5000;

/// Backoff growth factor
pub const RETRY_BACKOFF_MULTIPLIER: f64 = 1.5;

/// Rate-limit waits allowed per logical request
pub const MAX_RATE_LIMIT_WAITS: u32 = 30;

/// Default timeout for explorer requests (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Error text patterns that signal upstream throttling
pub const RATE_LIMIT_PATTERNS: [&str; 2] = ["rate limit", "max calls"];

/// Error text patterns that will never succeed on retry (matched lowercase)
pub const NON_RETRYABLE_ERRORS: [&str; 5] = [
    "invalid address",
    "contract source code not verified",
    "missing chainid parameter",
    "you are using a deprecated",
    "invalid api key",
];

/// Subset of the non-retryable patterns that reject the credential itself
pub const INVALID_KEY_ERRORS: [&str; 2] = ["invalid api key", "missing or invalid api key"];

/// Literal ABI payload returned for unverified contracts
pub const ABI_NOT_VERIFIED: &str = "Contract source code not verified";

// ============================================
// CACHE CONSTANTS
// ============================================

/// Cache TTL (24 hours)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// Cache schema version tag, bump when the cached payload format changes
pub const CACHE_SCHEMA_VERSION: &str = "v3";

/// Storage key of the persisted user-supplied API key
pub const API_KEY_STORAGE_KEY: &str = "etherscan_api_key";

// ============================================
// CHAIN IDS - Single Source of Truth
// ============================================

/// Ethereum Mainnet
pub const CHAIN_ID_ETHEREUM: &str = "1";
/// Ethereum Holesky testnet
pub const CHAIN_ID_HOLESKY: &str = "17000";
/// Ethereum Hoodi testnet
pub const CHAIN_ID_HOODI: &str = "560048";
/// Taiko Alethia
pub const CHAIN_ID_TAIKO: &str = "167000";
/// Taiko Hoodi testnet
pub const CHAIN_ID_TAIKO_HOODI: &str = "167013";

/// Chain metadata for a supported explorer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportedChain {
    pub id: &'static str,
    pub name: &'static str,
    pub explorer_url: &'static str,
}

/// All supported chains
pub const SUPPORTED_CHAINS: [SupportedChain; 5] = [
    SupportedChain {
        id: CHAIN_ID_ETHEREUM,
        name: "Ethereum",
        explorer_url: "https://etherscan.io",
    },
    SupportedChain {
        id: CHAIN_ID_HOLESKY,
        name: "Ethereum Holesky",
        explorer_url: "https://holesky.etherscan.io",
    },
    SupportedChain {
        id: CHAIN_ID_HOODI,
        name: "Ethereum Hoodi",
        explorer_url: "https://hoodi.etherscan.io",
    },
    SupportedChain {
        id: CHAIN_ID_TAIKO,
        name: "Taiko",
        explorer_url: "https://taikoscan.io",
    },
    SupportedChain {
        id: CHAIN_ID_TAIKO_HOODI,
        name: "Taiko Hoodi",
        explorer_url: "https://hoodi.taikoscan.io",
    },
];

// ============================================
// HELPER FUNCTIONS
// ============================================

/// Look up a supported chain by id
pub fn get_chain(chain_id: &str) -> Option<&'static SupportedChain> {
    SUPPORTED_CHAINS.iter().find(|c| c.id == chain_id)
}

/// Get human-readable chain name
pub fn get_chain_name(chain_id: &str) -> &'static str {
    get_chain(chain_id).map(|c| c.name).unwrap_or("Unknown")
}

/// Check if chain is supported
pub fn is_supported_chain(chain_id: &str) -> bool {
    get_chain(chain_id).is_some()
}

/// Explorer page for an address (verified code tab)
pub fn explorer_address_url(chain_id: &str, address: &str) -> Option<String> {
    get_chain(chain_id).map(|c| format!("{}/address/{}#code", c.explorer_url, address))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_lookup() {
        assert_eq!(get_chain_name(CHAIN_ID_ETHEREUM), "Ethereum");
        assert_eq!(get_chain_name(CHAIN_ID_TAIKO), "Taiko");
        assert_eq!(get_chain_name("999"), "Unknown");
        assert!(is_supported_chain("17000"));
        assert!(!is_supported_chain(""));
    }

    #[test]
    fn test_explorer_url() {
        assert_eq!(
            explorer_address_url("1", "0xabc").as_deref(),
            Some("https://etherscan.io/address/0xabc#code")
        );
        assert_eq!(
            explorer_address_url("167013", "0xabc").as_deref(),
            Some("https://hoodi.taikoscan.io/address/0xabc#code")
        );
        assert!(explorer_address_url("42", "0xabc").is_none());
    }

    #[test]
    fn test_invalid_key_patterns_are_non_retryable() {
        for pattern in INVALID_KEY_ERRORS {
            assert!(
                NON_RETRYABLE_ERRORS.iter().any(|p| pattern.contains(p)),
                "{} must also classify as non-retryable",
                pattern
            );
        }
    }
}
