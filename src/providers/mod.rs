//! Providers Module - External Data Sources
//!
//! Block-explorer API plumbing: credentials, rate gate, retry policy and
//! the HTTP client composing them.

pub mod etherscan;
pub mod key_pool;
pub mod rate_limiter;
pub mod retry;

pub use etherscan::*;
pub use key_pool::*;
pub use rate_limiter::*;
pub use retry::*;
