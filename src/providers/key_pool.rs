//! Explorer API credential pool
//!
//! The configured pool is immutable once loaded. A session may supply a
//! single override key, which replaces the pool and disables fallback.

use crate::models::errors::{AppError, AppResult};

/// Ordered set of configured credentials
#[derive(Debug, Clone, Default)]
pub struct KeyPool {
    keys: Vec<String>,
}

/// Keys to try for one logical request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveKeys {
    keys: Vec<String>,
    is_override: bool,
}

impl ActiveKeys {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// True when a caller-supplied key replaced the configured pool
    pub fn is_override(&self) -> bool {
        self.is_override
    }
}

impl KeyPool {
    pub fn new(keys: Vec<String>) -> Self {
        let keys = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Resolve the active key set. A non-blank override wins over the pool.
    pub fn active(&self, override_key: Option<&str>) -> AppResult<ActiveKeys> {
        if let Some(key) = override_key.map(str::trim).filter(|k| !k.is_empty()) {
            return Ok(ActiveKeys {
                keys: vec![key.to_string()],
                is_override: true,
            });
        }
        if self.keys.is_empty() {
            return Err(AppError::no_keys());
        }
        Ok(ActiveKeys {
            keys: self.keys.clone(),
            is_override: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::errors::ErrorCode;

    #[test]
    fn test_pool_keeps_order_and_drops_blanks() {
        let pool = KeyPool::new(vec!["a".into(), " ".into(), " b ".into()]);
        let active = pool.active(None).unwrap();
        assert_eq!(active.keys(), ["a", "b"]);
        assert!(!active.is_override());
    }

    #[test]
    fn test_override_replaces_pool() {
        let pool = KeyPool::new(vec!["a".into(), "b".into()]);
        let active = pool.active(Some("mine")).unwrap();
        assert_eq!(active.keys(), ["mine"]);
        assert!(active.is_override());
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let pool = KeyPool::new(vec!["a".into()]);
        assert!(!pool.active(Some("  ")).unwrap().is_override());
    }

    #[test]
    fn test_empty_pool_fails() {
        let err = KeyPool::default().active(None).unwrap_err();
        assert_eq!(err.code, ErrorCode::ApiNoKeys);
        // An override still works without configured keys
        assert!(KeyPool::default().active(Some("k")).is_ok());
    }
}
