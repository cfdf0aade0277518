//! # OffKit SW
//!
//! Offline-support worker for the marketplace UI: a background
//! network-interception worker over a versioned key-value cache store.
//!
//! ## Features
//!
//! - **Version registry**: one config value derives the active cache name
//!   and version-stamped asset URLs
//! - **Install**: best-effort precache of the core asset manifest
//! - **Activate**: sweep of stale versioned caches, then client claiming
//! - **Fetch interception**: always-revalidate for deploy-governed
//!   resources, network-first with cache fallback for everything else
//! - **Graceful degradation**: offline requests resolve to a cached entry,
//!   the offline document, or a synthesized 408 response
//!
//! ## Architecture
//!
//! ```text
//! OfflineWorker (one instance per deployed version)
//!     │
//!     ├── Install  ── precache core assets into "<prefix>-v<N>"
//!     ├── Activate ── delete caches != "<prefix>-v<N>", claim clients
//!     └── Fetch    ── classify request
//!             ├── always-revalidate (manifest/icon)
//!             └── network-first with cache fallback
//!                     │
//!                     └── CacheStore
//!                             └── Cache ("<prefix>-v<N>")
//!                                     └── CacheKey → CachedResponse
//! ```

use thiserror::Error;
use url::Url;

pub mod cache;
pub mod config;
pub mod events;
pub mod worker;

pub use cache::{Cache, CacheError, CacheKey, CacheStore, CachedResponse, MemoryCacheStore};
pub use config::WorkerConfig;
pub use events::{ActivateEvent, EventLifetime, FetchEvent, InstallEvent, WorkerEvent};
pub use worker::{FetchOutcome, OfflineWorker, RequestClass, WorkerState};

/// Errors produced by the offline worker.
#[derive(Error, Debug)]
pub enum SwError {
    #[error("Cache error: {0}")]
    Cache(#[from] cache::CacheError),

    #[error("Network error: {0}")]
    Network(#[from] offkit_net::NetError),

    #[error("Asset not cacheable: {url} (status {status})")]
    AssetUnavailable { url: Url, status: u16 },

    #[error("Invalid asset URL: {0}")]
    InvalidAssetUrl(#[from] url::ParseError),
}
