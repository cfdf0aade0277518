//! Worker configuration: the version registry.
//!
//! `WorkerConfig` is built once at worker construction and never mutated;
//! a new deploy ships a new worker instance with a bumped version.

use serde::{Deserialize, Serialize};
use url::Url;

/// Default cache-name prefix.
pub const DEFAULT_CACHE_PREFIX: &str = "marketplace";

/// Default path of the offline-fallback document.
pub const DEFAULT_OFFLINE_PATH: &str = "/offline.html";

/// Default path marker for the web app manifest.
pub const DEFAULT_MANIFEST_MARKER: &str = "manifest.webmanifest";

/// Default path marker for home-screen icons.
pub const DEFAULT_ICON_MARKER: &str = "app-icon";

/// Configuration for one worker instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Cache version, bumped manually at deploy time.
    pub version: u32,
    /// Origin and base path the worker serves (e.g. `https://shop.example/`).
    pub scope: Url,
    /// Prefix of versioned cache names.
    pub cache_prefix: String,
    /// Paths (relative to `scope`) that must be retrievable offline for
    /// the application shell to render.
    pub core_assets: Vec<String>,
    /// Path of the offline-fallback document. Must appear in `core_assets`.
    pub offline_path: String,
    /// Path substring selecting the always-revalidate strategy (manifest).
    pub manifest_marker: String,
    /// Path substring selecting the always-revalidate strategy (icons).
    pub icon_marker: String,
}

impl WorkerConfig {
    /// Create a configuration with the default core asset manifest.
    pub fn new(version: u32, scope: Url) -> Self {
        let mut config = Self {
            version,
            scope,
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
            core_assets: Vec::new(),
            offline_path: DEFAULT_OFFLINE_PATH.to_string(),
            manifest_marker: DEFAULT_MANIFEST_MARKER.to_string(),
            icon_marker: DEFAULT_ICON_MARKER.to_string(),
        };
        config.core_assets = config.default_core_assets();
        config
    }

    /// Replace the cache-name prefix.
    pub fn with_cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    /// Replace the core asset manifest.
    pub fn with_core_assets(mut self, assets: Vec<String>) -> Self {
        self.core_assets = assets;
        self
    }

    /// The name of this version's cache.
    pub fn cache_name(&self) -> String {
        format!("{}-v{}", self.cache_prefix, self.version)
    }

    /// Version-stamp an asset path so intermediate HTTP caches cannot
    /// serve a previous deploy's copy.
    pub fn versioned_asset(&self, path: &str) -> String {
        format!("{}?v={}", path, self.version)
    }

    /// Core asset paths resolved against the scope.
    pub fn core_asset_urls(&self) -> Result<Vec<Url>, url::ParseError> {
        self.core_assets.iter().map(|p| self.scope.join(p)).collect()
    }

    /// Absolute URL of the offline-fallback document.
    pub fn offline_url(&self) -> Result<Url, url::ParseError> {
        self.scope.join(&self.offline_path)
    }

    fn default_core_assets(&self) -> Vec<String> {
        vec![
            "/".to_string(),
            self.offline_path.clone(),
            self.versioned_asset("/manifest.webmanifest"),
            self.versioned_asset("/assets/icons/app-icon-192.png"),
            self.versioned_asset("/assets/icons/app-icon-512.png"),
            self.versioned_asset("/assets/icons/app-icon-maskable-512.png"),
            "/assets/brand/storefront-logo.png".to_string(),
            "/assets/brand/feature-graphic.png".to_string(),
        ]
    }
}
