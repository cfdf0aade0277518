//! The versioned request/response cache store.
//!
//! The store is host-provided in a real deployment; [`MemoryCacheStore`]
//! is the shipped implementation and the test backend. Entries are only
//! ever replaced wholesale or deleted wholesale, never mutated in place.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use hashbrown::HashMap;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use url::Url;

use offkit_net::{Request, Response};

/// Cache store errors.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    #[error("storage error: {0}")]
    Storage(String),
}

/// Normalized request identity: method plus URL with the fragment dropped.
/// Headers are deliberately not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    method: String,
    url: String,
}

impl CacheKey {
    /// Key for an arbitrary request.
    pub fn for_request(request: &Request) -> Self {
        let mut url = request.url.clone();
        url.set_fragment(None);
        Self {
            method: request.method.as_str().to_string(),
            url: url.to_string(),
        }
    }

    /// Key for a GET of the given URL.
    pub fn get(url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method: "GET".to_string(),
            url: url.to_string(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// A stored response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    pub url: Url,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Milliseconds since epoch at write time.
    pub cached_at: u64,
}

impl CachedResponse {
    /// Snapshot a live response for storage.
    pub fn from_response(response: &Response) -> Self {
        let headers = response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        Self {
            url: response.url.clone(),
            status: response.status.as_u16(),
            headers,
            body: response.body.to_vec(),
            cached_at: now_millis(),
        }
    }

    /// Rebuild a servable response from this entry.
    pub fn to_response(&self) -> Response {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                name.parse::<HeaderName>(),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        Response {
            url: self.url.clone(),
            // Entries are only written from real responses, so the stored
            // status is always a valid code.
            status: StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK),
            headers,
            body: Bytes::from(self.body.clone()),
            redirected: false,
        }
    }

    /// Age of this entry in milliseconds.
    pub fn age_millis(&self) -> u64 {
        now_millis().saturating_sub(self.cached_at)
    }
}

/// One named cache instance.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Look up a stored response.
    async fn lookup(&self, key: &CacheKey) -> Result<Option<CachedResponse>, CacheError>;

    /// Store a response, replacing any existing entry for the key.
    async fn put(&self, key: CacheKey, entry: CachedResponse) -> Result<(), CacheError>;

    /// All keys currently stored.
    async fn keys(&self) -> Result<Vec<CacheKey>, CacheError>;
}

/// The host's cache storage: a collection of named caches.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open a cache, creating it if absent.
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, CacheError>;

    /// Delete a cache wholesale. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, CacheError>;

    /// Names of all caches currently known.
    async fn names(&self) -> Result<Vec<String>, CacheError>;
}

/// In-memory cache instance.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<CacheKey, CachedResponse>>,
}

#[async_trait]
impl Cache for MemoryCache {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<CachedResponse>, CacheError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: CacheKey, entry: CachedResponse) -> Result<(), CacheError> {
        self.entries.write().await.insert(key, entry);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<CacheKey>, CacheError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}

/// In-memory cache storage.
#[derive(Default)]
pub struct MemoryCacheStore {
    caches: RwLock<HashMap<String, Arc<MemoryCache>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, CacheError> {
        let mut caches = self.caches.write().await;
        let cache = caches
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCache::default()));
        Ok(Arc::clone(cache) as Arc<dyn Cache>)
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.caches.write().await.remove(name).is_some())
    }

    async fn names(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.caches.read().await.keys().cloned().collect())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
