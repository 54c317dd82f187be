//! Retry policy for explorer requests
//!
//! Failures are classified once (rate limited / non-retryable / transient)
//! and fed into a small state machine that decides the next step:
//!
//! ```text
//! Gating -> Calling -> Done
//!              |
//!              v
//!     ClassifyingFailure -> Gating            (next key)
//!              |       \-> Backoff -> Gating (rate limited, or key set exhausted)
//!              v
//!           Failed                            (non-retryable, budget exhausted)
//! ```
//!
//! Rate-limit responses restart the key loop after a backoff sleep without
//! consuming an outer attempt; they are bounded separately by
//! `max_rate_limit_waits`.

use std::time::Duration;
use tracing::{debug, warn};

use crate::models::config::RetryConfig;
use crate::models::errors::{AppError, ErrorCode};
use crate::utils::constants::{INVALID_KEY_ERRORS, NON_RETRYABLE_ERRORS, RATE_LIMIT_PATTERNS};

/// Classification of a single failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Upstream throttling, wait and restart the key loop
    RateLimited,
    /// Permanent rejection of the request itself
    NonRetryable,
    /// The credential was rejected
    InvalidKey,
    /// Anything else: network, HTTP status, unknown upstream error
    Transient,
}

/// Classify an upstream error message
pub fn classify_message(message: &str) -> FailureClass {
    let lower = message.to_lowercase();
    if RATE_LIMIT_PATTERNS.iter().any(|p| lower.contains(p)) {
        FailureClass::RateLimited
    } else if INVALID_KEY_ERRORS.iter().any(|p| lower.contains(p)) {
        FailureClass::InvalidKey
    } else if NON_RETRYABLE_ERRORS.iter().any(|p| lower.contains(p)) {
        FailureClass::NonRetryable
    } else {
        FailureClass::Transient
    }
}

/// A failed call with its classification
#[derive(Debug)]
pub struct Failure {
    pub class: FailureClass,
    pub error: AppError,
}

impl Failure {
    /// Upstream `NOTOK` payload: classify by message text
    pub fn from_upstream(message: &str) -> Self {
        let class = classify_message(message);
        let error = match class {
            FailureClass::RateLimited => AppError::rate_limited(message),
            FailureClass::NonRetryable => AppError::non_retryable(message),
            FailureClass::InvalidKey => AppError::invalid_key(message),
            FailureClass::Transient => AppError::transient(message),
        };
        Self { class, error }
    }

    /// Transport-level failure (connection, non-2xx status, bad body),
    /// classified by error code
    pub fn transport(error: AppError) -> Self {
        let class = match error.code {
            ErrorCode::ApiRateLimited => FailureClass::RateLimited,
            ErrorCode::ApiInvalidKey => FailureClass::InvalidKey,
            code if code.is_retryable() => FailureClass::Transient,
            _ => FailureClass::NonRetryable,
        };
        Self { class, error }
    }
}

/// Current state of one logical request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Gating,
    Calling,
    ClassifyingFailure,
    Backoff,
    Done,
    Failed,
}

/// What the caller should do after a failure
#[derive(Debug)]
pub enum Step {
    /// Call again with the key at this index, no sleep
    NextKey(usize),
    /// Sleep, then call again starting from the first key
    Backoff(Duration),
    /// Give up with this error
    Fail(AppError),
}

/// Retry bookkeeping for one logical request
#[derive(Debug)]
pub struct RetryMachine {
    config: RetryConfig,
    key_count: usize,
    single_key: bool,
    state: RetryState,
    key_index: usize,
    attempt: u32,
    rate_limit_waits: u32,
    delay: Duration,
}

impl RetryMachine {
    /// `single_key` marks a caller-supplied override: no fallback on failure
    pub fn new(config: RetryConfig, key_count: usize, single_key: bool) -> Self {
        let delay = config.initial_backoff;
        Self {
            config,
            key_count,
            single_key,
            state: RetryState::Gating,
            key_index: 0,
            attempt: 0,
            rate_limit_waits: 0,
            delay,
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Index of the key to use for the next call
    pub fn key_index(&self) -> usize {
        self.key_index
    }

    /// Outer attempts consumed so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn rate_limit_waits(&self) -> u32 {
        self.rate_limit_waits
    }

    /// Delay the next backoff will sleep for
    pub fn current_delay(&self) -> Duration {
        self.delay
    }

    /// Gate passed, the call is going out
    pub fn on_call(&mut self) {
        self.state = RetryState::Calling;
    }

    pub fn on_success(&mut self) {
        self.state = RetryState::Done;
    }

    /// Backoff sleep finished, next call goes through the gate again
    pub fn on_backoff_complete(&mut self) {
        self.state = RetryState::Gating;
    }

    /// Decide the next step after a failed call
    pub fn on_failure(&mut self, failure: Failure) -> Step {
        self.state = RetryState::ClassifyingFailure;

        match failure.class {
            FailureClass::RateLimited => {
                self.rate_limit_waits += 1;
                if self.rate_limit_waits > self.config.max_rate_limit_waits {
                    return self.fail(AppError::rate_limited(format!(
                        "Rate limited after {} waits: {}",
                        self.config.max_rate_limit_waits, failure.error.message
                    )));
                }
                warn!(
                    "⏳ Rate limit hit: {}. Retrying after {}ms",
                    failure.error.message,
                    self.delay.as_millis()
                );
                self.key_index = 0;
                self.backoff()
            }
            FailureClass::NonRetryable | FailureClass::InvalidKey => self.fail(failure.error),
            FailureClass::Transient if self.single_key => {
                debug!("Caller-supplied key failed, no fallback: {}", failure.error);
                self.fail(failure.error)
            }
            FailureClass::Transient => {
                if self.key_index + 1 < self.key_count {
                    self.key_index += 1;
                    self.state = RetryState::Gating;
                    debug!(
                        "🔄 Key {} failed, trying key {}/{}",
                        self.key_index,
                        self.key_index + 1,
                        self.key_count
                    );
                    return Step::NextKey(self.key_index);
                }

                self.attempt += 1;
                if self.attempt >= self.config.max_retries {
                    return self.fail(failure.error);
                }
                warn!(
                    "⚠️ Request failed ({}), retry {}/{} in {}ms",
                    failure.error,
                    self.attempt + 1,
                    self.config.max_retries,
                    self.delay.as_millis()
                );
                self.key_index = 0;
                self.backoff()
            }
        }
    }

    fn backoff(&mut self) -> Step {
        self.state = RetryState::Backoff;
        let delay = self.delay;
        let grown = self.delay.mul_f64(self.config.multiplier);
        self.delay = grown.min(self.config.max_backoff);
        Step::Backoff(delay)
    }

    fn fail(&mut self, error: AppError) -> Step {
        self.state = RetryState::Failed;
        Step::Fail(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            max_rate_limit_waits: 3,
            initial_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_millis(5000),
            multiplier: 1.5,
        }
    }

    #[test]
    fn test_classify_messages() {
        let cases = [
            ("Max calls per sec rate limit reached (3/sec)", FailureClass::RateLimited),
            ("Max calls per sec reached", FailureClass::RateLimited),
            ("Invalid Address format", FailureClass::NonRetryable),
            ("Contract source code not verified", FailureClass::NonRetryable),
            ("Missing chainid parameter (required for v2 api)", FailureClass::NonRetryable),
            ("You are using a deprecated V1 endpoint", FailureClass::NonRetryable),
            ("Invalid API Key", FailureClass::InvalidKey),
            ("Missing Or invalid API Key", FailureClass::InvalidKey),
            ("Query Timeout occured", FailureClass::Transient),
        ];
        for (message, expected) in cases {
            assert_eq!(classify_message(message), expected, "{}", message);
        }
    }

    #[test]
    fn test_non_retryable_fails_without_trying_other_keys() {
        let mut machine = RetryMachine::new(config(10), 3, false);
        machine.on_call();
        let step = machine.on_failure(Failure::from_upstream("Invalid Address format"));
        match step {
            Step::Fail(e) => assert_eq!(e.code, ErrorCode::ApiNonRetryable),
            other => panic!("expected Fail, got {:?}", other),
        }
        assert_eq!(machine.state(), RetryState::Failed);
        assert_eq!(machine.key_index(), 0);
    }

    #[test]
    fn test_transport_failure_classified_by_code() {
        assert_eq!(
            Failure::transport(AppError::malformed("bad body")).class,
            FailureClass::Transient
        );

        let mut machine = RetryMachine::new(config(10), 3, false);
        match machine.on_failure(Failure::transport(AppError::non_retryable("Invalid request"))) {
            Step::Fail(e) => assert_eq!(e.code, ErrorCode::ApiNonRetryable),
            other => panic!("expected Fail, got {:?}", other),
        }
        assert_eq!(machine.key_index(), 0);
    }

    #[test]
    fn test_rate_limit_never_counts_attempt() {
        let mut machine = RetryMachine::new(config(1), 2, false);
        for expected in [1000u64, 1500, 2250] {
            match machine.on_failure(Failure::from_upstream("Max rate limit reached")) {
                Step::Backoff(d) => assert_eq!(d, Duration::from_millis(expected)),
                other => panic!("expected Backoff, got {:?}", other),
            }
            assert_eq!(machine.attempt(), 0);
            assert_eq!(machine.key_index(), 0);
            machine.on_backoff_complete();
        }
        // Fourth wait exceeds max_rate_limit_waits = 3
        match machine.on_failure(Failure::from_upstream("Max rate limit reached")) {
            Step::Fail(e) => assert_eq!(e.code, ErrorCode::ApiRateLimited),
            other => panic!("expected Fail, got {:?}", other),
        }
        assert_eq!(machine.attempt(), 0);
    }

    #[test]
    fn test_rate_limit_restarts_key_loop() {
        let mut machine = RetryMachine::new(config(10), 3, false);
        machine.on_failure(Failure::transport(AppError::transient("HTTP error: 502")));
        assert_eq!(machine.key_index(), 1);
        machine.on_failure(Failure::from_upstream("rate limit"));
        assert_eq!(machine.key_index(), 0);
    }

    #[test]
    fn test_transient_rotates_keys_then_backs_off() {
        let mut machine = RetryMachine::new(config(10), 2, false);

        match machine.on_failure(Failure::transport(AppError::transient("HTTP error: 500"))) {
            Step::NextKey(1) => {}
            other => panic!("expected NextKey(1), got {:?}", other),
        }
        assert_eq!(machine.attempt(), 0);

        match machine.on_failure(Failure::transport(AppError::transient("HTTP error: 500"))) {
            Step::Backoff(d) => assert_eq!(d, Duration::from_millis(1000)),
            other => panic!("expected Backoff, got {:?}", other),
        }
        assert_eq!(machine.attempt(), 1);
        assert_eq!(machine.key_index(), 0);
        assert_eq!(machine.current_delay(), Duration::from_millis(1500));
    }

    #[test]
    fn test_exhausted_attempts_surface_last_error() {
        let mut machine = RetryMachine::new(config(2), 1, false);
        assert!(matches!(
            machine.on_failure(Failure::transport(AppError::transient("first"))),
            Step::Backoff(_)
        ));
        match machine.on_failure(Failure::transport(AppError::malformed("second"))) {
            Step::Fail(e) => {
                assert_eq!(e.code, ErrorCode::ApiMalformed);
                assert_eq!(e.message, "second");
            }
            other => panic!("expected Fail, got {:?}", other),
        }
        assert_eq!(machine.attempt(), 2);
    }

    #[test]
    fn test_backoff_is_capped() {
        let mut machine = RetryMachine::new(config(100), 1, false);
        for _ in 0..10 {
            machine.on_failure(Failure::transport(AppError::transient("x")));
        }
        assert_eq!(machine.current_delay(), Duration::from_millis(5000));
    }

    #[test]
    fn test_override_key_fails_without_fallback() {
        let mut machine = RetryMachine::new(config(10), 1, true);
        match machine.on_failure(Failure::transport(AppError::transient("HTTP error: 503"))) {
            Step::Fail(e) => assert_eq!(e.code, ErrorCode::ApiTransient),
            other => panic!("expected Fail, got {:?}", other),
        }
        assert_eq!(machine.attempt(), 0);
    }

    #[test]
    fn test_override_key_still_waits_out_rate_limits() {
        let mut machine = RetryMachine::new(config(10), 1, true);
        assert!(matches!(
            machine.on_failure(Failure::from_upstream("Max calls per sec rate limit reached")),
            Step::Backoff(_)
        ));
    }
}
