//! Utils Module - Helper Functions & Shared Utilities
//!
//! Cache and storage, constants, constructor decoding and diff rendering.

pub mod cache;
pub mod constants;
pub mod decoder;
pub mod render;
pub mod storage;

pub use cache::*;
pub use constants::*;
pub use decoder::*;
pub use render::*;
pub use storage::*;
