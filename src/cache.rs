use crate::{config::Config, LookupResponse};
use moka::future::Cache;
use std::{sync::Arc, time::Duration};
use tracing::debug;

/// TTL cache of IP and ASN lookup responses, keyed by `<type>:<query>`.
pub struct CacheService {
    cache: Cache<String, LookupResponse>,
}

impl CacheService {
    pub fn new(config: Arc<Config>) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_max_entries)
            .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
            .build();

        Self { cache }
    }

    pub async fn get(&self, key: &str) -> Option<LookupResponse> {
        let key = Self::normalize_key(key);

        match self.cache.get(&key).await {
            Some(mut response) => {
                debug!("Cache hit for {}", key);
                response.cached = true;
                Some(response)
            }
            None => {
                debug!("Cache miss for {}", key);
                None
            }
        }
    }

    pub async fn set(&self, key: &str, response: &LookupResponse) {
        let key = Self::normalize_key(key);
        debug!("Cached response for {}", key);
        self.cache.insert(key, response.clone()).await;
    }

    fn normalize_key(key: &str) -> String {
        let normalized = key.trim().to_lowercase();

        // "example.com." and "example.com" are the same zone
        match normalized.strip_suffix('.') {
            Some(stripped) => stripped.to_string(),
            None => normalized,
        }
    }
}
