//! Command-line harness for the OffKit offline worker.
//!
//! Drives a worker through its lifecycle against a live origin, then
//! serves requests through it and reports what happened as JSON lines.
//!
//! ## Usage
//!
//! ```bash
//! # Install and activate, listing what was precached
//! sw-harness --scope https://shop.example/ --version 7 install
//!
//! # Install, activate, then serve some URLs through the worker
//! sw-harness --scope https://shop.example/ --version 7 fetch \
//!     https://shop.example/products/42 --navigation
//!
//! # Show which strategy would serve each URL
//! sw-harness --scope https://shop.example/ classify \
//!     https://shop.example/manifest.webmanifest?v=7
//! ```

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use url::Url;

use offkit_common::logging::{init_logging, LogConfig};
use offkit_net::{HttpNetwork, Request};
use offkit_sw::{
    events::{ActivateEvent, FetchEvent, InstallEvent},
    Cache, CacheStore, FetchOutcome, MemoryCacheStore, OfflineWorker, WorkerConfig,
};

#[derive(Parser)]
#[command(name = "sw-harness")]
#[command(about = "Harness for the OffKit offline worker")]
struct Cli {
    /// Origin the worker controls
    #[arg(long)]
    scope: Url,

    /// Deployment version (selects the cache generation)
    #[arg(long, default_value = "1")]
    version: u32,

    /// Cache name prefix
    #[arg(long)]
    cache_prefix: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install and activate, listing the precached entries
    Install,

    /// Install, activate, then serve the given URLs through the worker
    Fetch {
        /// URLs to request
        urls: Vec<Url>,
        /// Treat the requests as navigations
        #[arg(long)]
        navigation: bool,
    },

    /// Print which strategy serves each URL
    Classify {
        /// URLs to classify
        urls: Vec<Url>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::debug()
    } else {
        LogConfig::production()
    };
    init_logging(&log_config);

    let mut config = WorkerConfig::new(cli.version, cli.scope.clone());
    if let Some(prefix) = cli.cache_prefix.clone() {
        config = config.with_cache_prefix(prefix);
    }

    let store = Arc::new(MemoryCacheStore::new());
    let net = Arc::new(HttpNetwork::new(concat!("sw-harness/", env!("CARGO_PKG_VERSION")))?);
    let worker = OfflineWorker::new(config, store.clone(), net);

    match cli.command {
        Commands::Install => {
            run_lifecycle(&worker).await?;
            print_cache_contents(&store, &worker).await?;
        }

        Commands::Fetch { urls, navigation } => {
            run_lifecycle(&worker).await?;
            for url in urls {
                serve(&worker, url, navigation).await?;
            }
            print_cache_contents(&store, &worker).await?;
        }

        Commands::Classify { urls } => {
            for url in urls {
                println!(
                    "{}",
                    serde_json::json!({
                        "url": url.as_str(),
                        "class": worker.classify(&url).to_string(),
                    })
                );
            }
        }
    }

    Ok(())
}

async fn run_lifecycle(worker: &OfflineWorker) -> anyhow::Result<()> {
    worker.handle_install(&InstallEvent::new()).await;
    worker
        .handle_activate(&ActivateEvent::new())
        .await
        .context("activation failed")?;
    println!(
        "{}",
        serde_json::json!({
            "state": worker.state().to_string(),
            "cache": worker.config().cache_name(),
            "took_over_waiting": worker.took_over_waiting(),
            "claimed_clients": worker.claimed_clients(),
        })
    );
    Ok(())
}

async fn serve(worker: &OfflineWorker, url: Url, navigation: bool) -> anyhow::Result<()> {
    let mut request = Request::get(url.clone());
    if navigation {
        request = request.navigation();
    }
    let event = FetchEvent::new(request);
    let class = worker.classify(&url).to_string();
    let outcome = worker
        .handle_fetch(&event)
        .await
        .with_context(|| format!("fetch failed for {url}"))?;
    // Let write-through tasks finish so the cache listing reflects them.
    event.lifetime().settled().await;

    let line = match outcome {
        FetchOutcome::Respond(response) => serde_json::json!({
            "url": url.as_str(),
            "class": class,
            "outcome": "respond",
            "status": response.status.as_u16(),
            "redirected": response.redirected,
            "bytes": response.body.len(),
        }),
        FetchOutcome::Passthrough => serde_json::json!({
            "url": url.as_str(),
            "class": class,
            "outcome": "passthrough",
        }),
    };
    println!("{line}");
    Ok(())
}

async fn print_cache_contents(
    store: &MemoryCacheStore,
    worker: &OfflineWorker,
) -> anyhow::Result<()> {
    let cache = store
        .open(&worker.config().cache_name())
        .await
        .context("failed to open cache")?;
    let mut keys = cache.keys().await.context("failed to list cache")?;
    keys.sort_by(|a, b| a.url().cmp(b.url()));
    for key in keys {
        println!(
            "{}",
            serde_json::json!({
                "cached": key.url(),
                "method": key.method(),
            })
        );
    }
    Ok(())
}
