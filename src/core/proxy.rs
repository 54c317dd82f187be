//! Proxy Resolver
//!
//! An address is an upgradeable proxy when its `getsourcecode` record carries
//! a non-empty `Implementation` that differs from the address itself.
//! Lookup failures degrade to "not a proxy" unless they are session-fatal
//! (credential or quota), which must reach the caller.

use tracing::{info, warn};

use crate::core::source::RawContractRecord;
use crate::models::errors::AppResult;
use crate::models::types::ProxyInfo;

/// Build ProxyInfo from a `getsourcecode` record
pub fn proxy_info_from_record(address: &str, record: &RawContractRecord) -> ProxyInfo {
    let implementation = record.implementation.trim();
    if implementation.is_empty() || implementation.eq_ignore_ascii_case(address.trim()) {
        return ProxyInfo::not_proxy();
    }

    info!("🔀 {} is a proxy for {}", address, implementation);
    ProxyInfo {
        is_proxy: true,
        implementation: Some(implementation.to_string()),
        proxy_address: Some(address.to_string()),
        proxy_contract_name: Some(record.contract_name.clone()).filter(|n| !n.is_empty()),
    }
}

/// Apply the degrade policy to a lookup outcome
pub fn degrade_lookup(address: &str, outcome: AppResult<ProxyInfo>) -> AppResult<ProxyInfo> {
    match outcome {
        Ok(info) => Ok(info),
        Err(e) if e.is_session_fatal() => Err(e),
        Err(e) => {
            warn!("⚠️ Proxy check for {} failed, treating as implementation: {}", address, e);
            Ok(ProxyInfo::not_proxy())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::errors::{AppError, ErrorCode};

    fn record(implementation: &str) -> RawContractRecord {
        RawContractRecord {
            contract_name: "TransparentUpgradeableProxy".to_string(),
            implementation: implementation.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_implementation_marks_proxy() {
        let info = proxy_info_from_record("0xproxy", &record("0xImpl"));
        assert!(info.is_proxy);
        assert_eq!(info.implementation.as_deref(), Some("0xImpl"));
        assert_eq!(info.proxy_address.as_deref(), Some("0xproxy"));
        assert_eq!(info.proxy_contract_name.as_deref(), Some("TransparentUpgradeableProxy"));
    }

    #[test]
    fn test_empty_implementation_is_not_proxy() {
        assert_eq!(proxy_info_from_record("0xabc", &record("")), ProxyInfo::not_proxy());
    }

    #[test]
    fn test_self_implementation_is_not_proxy() {
        assert!(!proxy_info_from_record("0xAbC", &record("0xabc")).is_proxy);
    }

    #[test]
    fn test_transient_failure_degrades() {
        let info = degrade_lookup("0xabc", Err(AppError::transient("HTTP error: 502"))).unwrap();
        assert!(!info.is_proxy);
        let rejected = Err(AppError::non_retryable("Invalid Address format"));
        let info = degrade_lookup("0xabc", rejected).unwrap();
        assert!(!info.is_proxy);
    }

    #[test]
    fn test_session_fatal_failure_propagates() {
        let err =
            degrade_lookup("0xabc", Err(AppError::invalid_key("Invalid API Key"))).unwrap_err();
        assert_eq!(err.code, ErrorCode::ApiInvalidKey);
        let err = degrade_lookup("0xabc", Err(AppError::rate_limited("Max calls"))).unwrap_err();
        assert_eq!(err.code, ErrorCode::ApiRateLimited);
        assert!(degrade_lookup("0xabc", Err(AppError::no_keys())).is_err());
    }
}
