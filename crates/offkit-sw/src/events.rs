//! Host lifecycle events and the lifetime-extension handle.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use offkit_net::Request;

/// Lifetime-extension handle carried by every event.
///
/// Handlers register pending async work with [`wait_until`]; the host (or a
/// test) awaits [`settled`] before considering the event resolved and the
/// worker safe to tear down. Fire-and-forget cache writes ride on this so
/// the response path is never delayed by them.
///
/// [`wait_until`]: EventLifetime::wait_until
/// [`settled`]: EventLifetime::settled
#[derive(Debug, Clone, Default)]
pub struct EventLifetime {
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl EventLifetime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register async work that must finish before the event is resolved.
    pub fn wait_until<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(work);
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).push(handle);
    }

    /// Number of registered tasks not yet reaped by [`settled`].
    ///
    /// [`settled`]: EventLifetime::settled
    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Resolve once all registered work has finished. Work registered
    /// while settling is awaited too.
    pub async fn settled(&self) {
        loop {
            let handle = self.pending.lock().unwrap_or_else(|e| e.into_inner()).pop();
            match handle {
                // A panicked task has nothing left to wait for.
                Some(handle) => {
                    let _ = handle.await;
                }
                None => break,
            }
        }
    }
}

/// Install event: dispatched once when a new version's worker first loads.
#[derive(Debug, Default)]
pub struct InstallEvent {
    lifetime: EventLifetime,
}

impl InstallEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lifetime(&self) -> &EventLifetime {
        &self.lifetime
    }
}

/// Activate event: dispatched once after install, when the host switches
/// the active worker version.
#[derive(Debug, Default)]
pub struct ActivateEvent {
    lifetime: EventLifetime,
}

impl ActivateEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lifetime(&self) -> &EventLifetime {
        &self.lifetime
    }
}

/// Fetch event: dispatched once per outgoing network request.
#[derive(Debug)]
pub struct FetchEvent {
    request: Request,
    lifetime: EventLifetime,
}

impl FetchEvent {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            lifetime: EventLifetime::new(),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn lifetime(&self) -> &EventLifetime {
        &self.lifetime
    }
}

/// The three message kinds the worker actor receives.
#[derive(Debug)]
pub enum WorkerEvent {
    Install(InstallEvent),
    Activate(ActivateEvent),
    Fetch(FetchEvent),
}
