//! In-process response cache with per-entry TTL.
//!
//! Entries are full [`ApiResponse`] values, so a hit replays the original
//! envelope including its timestamp. Expired entries are dropped lazily on
//! read and swept on write once the map grows past [`SWEEP_THRESHOLD`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::envelope::ApiResponse;

/// Entry count above which a write also sweeps expired entries.
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug)]
struct CacheEntry {
    response: ApiResponse,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct ResponseCache {
    prefix: String,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    pub async fn get(&self, key: &str) -> Option<ApiResponse> {
        let full_key = self.full_key(key);
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(&full_key) {
                Some(entry) if entry.expires_at > now => return Some(entry.response.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(&full_key)
            .is_some_and(|entry| entry.expires_at <= now)
        {
            entries.remove(&full_key);
        }
        None
    }

    /// Store a response, overwriting any previous entry under the same key.
    pub async fn set(&self, key: &str, response: ApiResponse, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        if entries.len() >= SWEEP_THRESHOLD {
            entries.retain(|_, entry| entry.expires_at > now);
        }
        entries.insert(
            self.full_key(key),
            CacheEntry {
                response,
                expires_at: now + ttl,
            },
        );
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
