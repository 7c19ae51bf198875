//! Short-lived token denylist.
//!
//! Entries are keyed by the token id (`jti`) and dropped once the token would
//! have expired anyway. Consulted on admin-gated paths and on the caller's own
//! session and credential paths.

use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct RevocationList {
    // jti -> exp
    entries: Mutex<HashMap<String, i64>>,
}

impl RevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self, token_id: &str, expires_at: i64, now: i64) {
        let mut entries = self.entries.lock();
        entries.retain(|_, exp| *exp > now);
        if expires_at > now {
            entries.insert(token_id.to_string(), expires_at);
        }
    }

    pub fn is_revoked(&self, token_id: &str) -> bool {
        self.entries.lock().contains_key(token_id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
