//! Etherscan-compatible Explorer API Client
//!
//! One logical request = rate gate + key rotation + retry/backoff:
//! 1. Every outbound call passes the process-wide rate gate
//! 2. Each attempt walks the active key set in order
//! 3. Failures are classified (rate limited / non-retryable / transient) and
//!    the retry state machine in `retry.rs` decides the next step
//! 4. Keys never appear in logs, only their position in the pool
//!
//! Envelope: `{ "status": "1"|"0", "message": "OK"|"NOTOK...", "result": ... }`

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::models::config::{ExplorerConfig, RetryConfig};
use crate::models::errors::{AppError, AppResult};
use crate::providers::key_pool::KeyPool;
use crate::providers::rate_limiter::RateLimiter;
use crate::providers::retry::{Failure, RetryMachine, Step};
use crate::utils::constants::USER_AGENT as USER_AGENT_CONST;

/// Per-request settings owned by a session, not by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Chain identifier appended to every call
    pub chain_id: String,
    /// Single caller-supplied key replacing the configured pool
    pub api_key_override: Option<String>,
}

impl RequestContext {
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            api_key_override: None,
        }
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key_override = key.filter(|k| !k.trim().is_empty());
        self
    }
}

/// Raw response envelope
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

impl ApiEnvelope {
    /// Text describing an upstream failure: `result` when it is a string
    fn error_text(&self) -> String {
        match &self.result {
            Value::String(s) if !s.is_empty() => s.clone(),
            _ if !self.message.is_empty() => self.message.clone(),
            _ => "API request failed".to_string(),
        }
    }
}

/// Explorer API client shared by every session.
///
/// Cheap to clone; the rate limiter is shared between clones so the
/// spacing guarantee holds process-wide.
#[derive(Clone)]
pub struct ExplorerClient {
    base_url: String,
    client: reqwest::Client,
    keys: KeyPool,
    limiter: Arc<RateLimiter>,
    retry: RetryConfig,
}

impl ExplorerClient {
    /// Create a client from configuration
    pub fn new(config: &ExplorerConfig) -> AppResult<Self> {
        let limiter = Arc::new(RateLimiter::new(config.min_spacing));
        Self::with_limiter(config, limiter)
    }

    /// Create a client that shares an existing rate gate
    pub fn with_limiter(config: &ExplorerConfig, limiter: Arc<RateLimiter>) -> AppResult<Self> {
        let keys = KeyPool::new(config.configured_keys());
        info!(
            "🔑 Explorer client for {} with {} configured keys",
            config.base_url,
            keys.len()
        );

        Ok(Self {
            base_url: config.base_url.clone(),
            client: Self::build_client(config.http_timeout)?,
            keys,
            limiter,
            retry: config.retry.clone(),
        })
    }

    /// Build HTTP client with custom headers (gzip compression)
    fn build_client(timeout: Duration) -> AppResult<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn key_pool(&self) -> &KeyPool {
        &self.keys
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Perform one logical request and return the envelope's `result`.
    ///
    /// `params` are the action-specific query parameters (`module`, `action`,
    /// `address`, ...); `chainid` and `apikey` are appended here.
    pub async fn request(&self, ctx: &RequestContext, params: &[(&str, &str)]) -> AppResult<Value> {
        let active = self.keys.active(ctx.api_key_override.as_deref())?;
        let mut machine = RetryMachine::new(self.retry.clone(), active.len(), active.is_override());

        loop {
            let key_index = machine.key_index();
            let key = &active.keys()[key_index];

            self.limiter.acquire().await;
            machine.on_call();
            debug!(
                "📡 Explorer call (attempt {}/{}, key {}/{}, chainId: {})",
                machine.attempt() + 1,
                self.retry.max_retries,
                key_index + 1,
                active.len(),
                ctx.chain_id
            );

            match self.call_once(ctx, params, key).await {
                Ok(result) => {
                    machine.on_success();
                    return Ok(result);
                }
                Err(failure) => match machine.on_failure(failure) {
                    Step::NextKey(_) => continue,
                    Step::Backoff(delay) => {
                        tokio::time::sleep(delay).await;
                        machine.on_backoff_complete();
                    }
                    Step::Fail(error) => return Err(error),
                },
            }
        }
    }

    /// Single HTTP call with one key, classified on failure
    async fn call_once(
        &self,
        ctx: &RequestContext,
        params: &[(&str, &str)],
        key: &str,
    ) -> Result<Value, Failure> {
        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .query(&[("chainid", ctx.chain_id.as_str()), ("apikey", key)])
            .send()
            .await
            .map_err(|e| Failure::transport(AppError::from(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Failure::transport(AppError::transient(format!(
                "HTTP error: {}",
                status
            ))));
        }

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|e| {
                Failure::transport(AppError::malformed(format!(
                    "Failed to parse response: {}",
                    e
                )))
            })?;

        if envelope.status == "1" {
            return Ok(envelope.result);
        }

        if envelope.message.starts_with("NOTOK") {
            return Err(Failure::from_upstream(&envelope.error_text()));
        }

        // status "0" with an informational message ("No data found", ...)
        debug!("Explorer returned status {:?}: {}", envelope.status, envelope.message);
        Ok(envelope.result)
    }

    /// `module=contract&action=getsourcecode`: first record of the result array
    pub async fn get_source_record(&self, ctx: &RequestContext, address: &str) -> AppResult<Value> {
        let result = self
            .request(
                ctx,
                &[("module", "contract"), ("action", "getsourcecode"), ("address", address)],
            )
            .await?;

        match result {
            Value::Array(mut records) if !records.is_empty() => Ok(records.swap_remove(0)),
            Value::Array(_) => Err(AppError::contract_not_found(address)),
            other => Err(AppError::malformed(format!(
                "Unexpected getsourcecode result for {}: {}",
                address,
                truncate(&other.to_string(), 120)
            ))),
        }
    }

    /// `module=contract&action=getabi`: raw result string
    pub async fn get_abi_raw(&self, ctx: &RequestContext, address: &str) -> AppResult<String> {
        let result = self
            .request(ctx, &[("module", "contract"), ("action", "getabi"), ("address", address)])
            .await?;

        match result {
            Value::String(s) => Ok(s),
            other => Err(AppError::malformed(format!(
                "Unexpected getabi result for {}: {}",
                address,
                truncate(&other.to_string(), 120)
            ))),
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_error_text() {
        let env: ApiEnvelope = serde_json::from_str(
            r#"{"status":"0","message":"NOTOK","result":"Max calls per sec rate limit reached (3/sec)"}"#,
        )
        .unwrap();
        assert_eq!(env.error_text(), "Max calls per sec rate limit reached (3/sec)");

        let env: ApiEnvelope =
            serde_json::from_str(r#"{"status":"0","message":"NOTOK","result":null}"#).unwrap();
        assert_eq!(env.error_text(), "NOTOK");
    }

    #[test]
    fn test_request_context_blank_key() {
        let ctx = RequestContext::new("1").with_api_key(Some("  ".to_string()));
        assert!(ctx.api_key_override.is_none());
        let ctx = RequestContext::new("1").with_api_key(Some("abc".to_string()));
        assert_eq!(ctx.api_key_override.as_deref(), Some("abc"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
    }

    #[tokio::test]
    async fn test_no_keys_fails_fast() {
        let client = ExplorerClient::new(&ExplorerConfig::default()).unwrap();
        let err = client
            .request(&RequestContext::new("1"), &[("module", "contract")])
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::models::errors::ErrorCode::ApiNoKeys);
    }
}
