//! Authorization header cache
//!
//! Tokens are scoped to a registry and a repository action set, so a token obtained while
//! pushing one image is reused for every further blob and manifest request of that image.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe cache of `Authorization` header values keyed by registry and scope
#[derive(Debug, Clone, Default)]
pub struct TokenManager {
    headers: Arc<RwLock<HashMap<String, String>>>,
}

impl TokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(registry: &str, scope: &str) -> String {
        format!("{}|{}", registry, scope)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.headers
            .read()
            .ok()
            .and_then(|guard| guard.get(key).cloned())
    }

    pub fn store(&self, key: String, header: String) {
        if let Ok(mut guard) = self.headers.write() {
            guard.insert(key, header);
        }
    }

    /// Forget a header the registry no longer accepts
    pub fn invalidate(&self, key: &str) {
        if let Ok(mut guard) = self.headers.write() {
            guard.remove(key);
        }
    }
}
