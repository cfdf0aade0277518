//! The offline worker: lifecycle handlers and serving strategies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use http::{Method, StatusCode};
use tracing::{debug, info, trace, warn};
use url::Url;

use offkit_net::{FetchMode, Network, Request, Response};

use crate::cache::{Cache, CacheError, CacheKey, CacheStore, CachedResponse};
use crate::config::WorkerConfig;
use crate::events::{ActivateEvent, FetchEvent, InstallEvent, WorkerEvent};
use crate::SwError;

/// Lifecycle state of one worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Install event in progress.
    Installing,
    /// Installed; eligible for activation.
    Installed,
    /// Active and intercepting fetches.
    Activated,
    /// Superseded by a newer version's instance.
    Redundant,
}

impl WorkerState {
    pub fn is_active(&self) -> bool {
        matches!(self, WorkerState::Activated)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "installed"),
            Self::Activated => write!(f, "activated"),
            Self::Redundant => write!(f, "redundant"),
        }
    }
}

/// Which serving strategy a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Deploy-governed resource (manifest/icon): hit origin with cache
    /// bypass whenever the network is reachable.
    AlwaysRevalidate,
    /// Everything else intercepted: live response first, cache on failure.
    NetworkFirst,
}

impl std::fmt::Display for RequestClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlwaysRevalidate => write!(f, "always-revalidate"),
            Self::NetworkFirst => write!(f, "network-first"),
        }
    }
}

/// Result of a fetch event.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The worker supplies this response.
    Respond(Response),
    /// The worker stays out of the way; the request proceeds untouched.
    Passthrough,
}

impl FetchOutcome {
    pub fn is_passthrough(&self) -> bool {
        matches!(self, FetchOutcome::Passthrough)
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            FetchOutcome::Respond(response) => Some(response),
            FetchOutcome::Passthrough => None,
        }
    }
}

/// One worker instance, tied to one cache version.
///
/// Handlers take `&self`: distinct fetch events may be in flight
/// concurrently, and the cache store is the only shared mutable resource.
pub struct OfflineWorker {
    config: WorkerConfig,
    store: Arc<dyn CacheStore>,
    net: Arc<dyn Network>,
    state: RwLock<WorkerState>,
    took_over_waiting: AtomicBool,
    claimed_clients: AtomicBool,
}

impl OfflineWorker {
    pub fn new(config: WorkerConfig, store: Arc<dyn CacheStore>, net: Arc<dyn Network>) -> Self {
        Self {
            config,
            store,
            net,
            state: RwLock::new(WorkerState::Installing),
            took_over_waiting: AtomicBool::new(false),
            claimed_clients: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: WorkerState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = next;
    }

    /// Whether install requested immediate replacement of the previous
    /// worker (the skip-waiting effect, observable by the host).
    pub fn took_over_waiting(&self) -> bool {
        self.took_over_waiting.load(Ordering::SeqCst)
    }

    /// Whether activate claimed all open clients.
    pub fn claimed_clients(&self) -> bool {
        self.claimed_clients.load(Ordering::SeqCst)
    }

    /// Mark this instance as superseded by a newer version.
    pub fn retire(&self) {
        self.set_state(WorkerState::Redundant);
        info!(cache = %self.config.cache_name(), "worker retired");
    }

    /// Dispatch one host event. Lifecycle events resolve to `None`; fetch
    /// events resolve to `Some` outcome.
    pub async fn handle(&self, event: WorkerEvent) -> Result<Option<FetchOutcome>, SwError> {
        match event {
            WorkerEvent::Install(event) => {
                self.handle_install(&event).await;
                Ok(None)
            }
            WorkerEvent::Activate(event) => {
                self.handle_activate(&event).await?;
                Ok(None)
            }
            WorkerEvent::Fetch(event) => self.handle_fetch(&event).await.map(Some),
        }
    }

    /// Install: best-effort precache of the core asset manifest, then
    /// request immediate takeover from any previously active worker.
    pub async fn handle_install(&self, event: &InstallEvent) {
        let store = Arc::clone(&self.store);
        let net = Arc::clone(&self.net);
        let config = self.config.clone();
        let cache_name = config.cache_name();
        event.lifetime().wait_until(async move {
            match Self::precache(store, net, config).await {
                Ok(stored) => {
                    debug!(cache = %cache_name, entries = stored, "core assets cached")
                }
                // Partial install must not prevent activation.
                Err(err) => warn!(cache = %cache_name, error = %err, "failed to cache core assets"),
            }
        });

        // The cache is a static-asset store: briefly stale content is
        // acceptable, a delayed takeover is not.
        self.took_over_waiting.store(true, Ordering::SeqCst);

        event.lifetime().settled().await;
        self.set_state(WorkerState::Installed);
        info!(cache = %self.config.cache_name(), "worker installed");
    }

    /// Activate: delete every cache not named for the current version,
    /// then claim all open clients.
    pub async fn handle_activate(&self, event: &ActivateEvent) -> Result<(), SwError> {
        let current = self.config.cache_name();
        let names = self.store.names().await?;
        for name in names.into_iter().filter(|n| *n != current) {
            let store = Arc::clone(&self.store);
            event.lifetime().wait_until(async move {
                match store.delete(&name).await {
                    Ok(true) => info!(cache = %name, "deleted old cache"),
                    Ok(false) => {}
                    // One failed deletion must not block the rest of the
                    // sweep.
                    Err(err) => warn!(cache = %name, error = %err, "failed to delete old cache"),
                }
            });
        }
        event.lifetime().settled().await;

        // The next request from every open page, not just future
        // navigations, now routes through this worker.
        self.claimed_clients.store(true, Ordering::SeqCst);
        self.set_state(WorkerState::Activated);
        info!(cache = %current, "worker activated");
        Ok(())
    }

    /// Fetch: classify the request and serve it with the matching
    /// strategy, or stay out of the way entirely.
    pub async fn handle_fetch(&self, event: &FetchEvent) -> Result<FetchOutcome, SwError> {
        let request = event.request();

        if request.method != Method::GET {
            trace!(method = %request.method, url = %request.url, "pass-through: non-GET");
            return Ok(FetchOutcome::Passthrough);
        }
        if !matches!(request.url.scheme(), "http" | "https") {
            trace!(scheme = %request.url.scheme(), "pass-through: non-http scheme");
            return Ok(FetchOutcome::Passthrough);
        }

        match self.classify(&request.url) {
            RequestClass::AlwaysRevalidate => self.revalidate(event).await,
            RequestClass::NetworkFirst => {
                Ok(FetchOutcome::Respond(self.network_first(event).await))
            }
        }
    }

    /// Which strategy serves a URL. Two independent markers, either of
    /// which selects always-revalidate.
    pub fn classify(&self, url: &Url) -> RequestClass {
        let path = url.path();
        let is_manifest = path.contains(self.config.manifest_marker.as_str());
        let is_icon = path.contains(self.config.icon_marker.as_str());
        if is_manifest || is_icon {
            RequestClass::AlwaysRevalidate
        } else {
            RequestClass::NetworkFirst
        }
    }

    async fn precache(
        store: Arc<dyn CacheStore>,
        net: Arc<dyn Network>,
        config: WorkerConfig,
    ) -> Result<usize, SwError> {
        let cache = store.open(&config.cache_name()).await?;
        let mut stored = 0;
        for url in config.core_asset_urls()? {
            let request = Request::get(url.clone());
            let response = net.fetch(&request, FetchMode::Default).await?;
            if !Self::cacheable(&response) {
                return Err(SwError::AssetUnavailable {
                    url,
                    status: response.status.as_u16(),
                });
            }
            cache
                .put(
                    CacheKey::for_request(&request),
                    CachedResponse::from_response(&response),
                )
                .await?;
            stored += 1;
        }
        Ok(stored)
    }

    async fn revalidate(&self, event: &FetchEvent) -> Result<FetchOutcome, SwError> {
        let request = event.request();
        match self.net.fetch(request, FetchMode::Reload).await {
            Ok(response) => {
                if Self::cacheable(&response) {
                    self.write_through(event, request, &response);
                }
                Ok(FetchOutcome::Respond(response))
            }
            Err(err) => {
                debug!(url = %request.url, error = %err, "revalidation failed, falling back to cache");
                let cache = self.store.open(&self.config.cache_name()).await?;
                match cache.lookup(&CacheKey::for_request(request)).await? {
                    Some(entry) => Ok(FetchOutcome::Respond(entry.to_response())),
                    // Nothing cached: the network failure is the outcome.
                    None => Err(SwError::Network(err)),
                }
            }
        }
    }

    async fn network_first(&self, event: &FetchEvent) -> Response {
        let request = event.request();
        match self.net.fetch(request, FetchMode::Default).await {
            Ok(response) => {
                if Self::cacheable(&response) {
                    self.write_through(event, request, &response);
                }
                // Non-200 responses are returned as-is, just never
                // written back.
                response
            }
            Err(err) => {
                debug!(url = %request.url, error = %err, "network fetch failed, consulting cache");
                self.offline_fallback(request).await
            }
        }
    }

    /// Offline resolution order: cached entry, offline document (for
    /// navigations), synthesized 408. Always a well-formed response.
    async fn offline_fallback(&self, request: &Request) -> Response {
        if let Ok(cache) = self.store.open(&self.config.cache_name()).await {
            if let Ok(Some(entry)) = cache.lookup(&CacheKey::for_request(request)).await {
                debug!(url = %request.url, age_ms = entry.age_millis(), "serving cached response");
                return entry.to_response();
            }
            if request.is_navigation {
                if let Ok(offline_url) = self.config.offline_url() {
                    if let Ok(Some(entry)) = cache.lookup(&CacheKey::get(&offline_url)).await {
                        debug!(url = %request.url, "serving offline document");
                        return entry.to_response();
                    }
                }
            }
        }
        debug!(url = %request.url, "synthesizing 408 response");
        Response::text(
            request.url.clone(),
            StatusCode::REQUEST_TIMEOUT,
            "Network error",
        )
    }

    /// Best-effort write-back, registered on the event lifetime so the
    /// response path is never delayed by it.
    fn write_through(&self, event: &FetchEvent, request: &Request, response: &Response) {
        let key = CacheKey::for_request(request);
        let entry = CachedResponse::from_response(response);
        let store = Arc::clone(&self.store);
        let name = self.config.cache_name();
        event.lifetime().wait_until(async move {
            let result: Result<(), CacheError> =
                async { store.open(&name).await?.put(key, entry).await }.await;
            if let Err(err) = result {
                warn!(cache = %name, error = %err, "write-through failed");
            }
        });
    }

    fn cacheable(response: &Response) -> bool {
        response.status == StatusCode::OK && !response.redirected
    }
}
