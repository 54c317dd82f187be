//! Core Module - Business Logic
//!
//! Source extraction, proxy resolution, file matching and the comparison
//! flow that ties them to the explorer client and cache.

pub mod compare;
pub mod diff;
pub mod proxy;
pub mod service;
pub mod source;

pub use compare::*;
pub use diff::*;
pub use proxy::*;
pub use service::*;
pub use source::*;
