//! Runs one attachment screen load against a live environment and prints the
//! result as JSON.
//!
//! Usage: `attachkit <MASK> <ITEM_ID> [CONFIG]`
//!
//! Settings come from `attachkit.toml` (or CONFIG) and `ATTACHKIT_*`
//! environment variables, e.g. `ATTACHKIT_SESSION_ID`. Log verbosity follows
//! `RUST_LOG`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use attachkit::auth::SessionCredentials;
use attachkit::cache::{CacheStore, MemoryStore, SessionCache, SqliteStore};
use attachkit::config::HarnessSettings;
use attachkit::error::Result;
use attachkit::orchestrator::AttachmentFetcher;
use attachkit::transport::HttpTransport;

const EVICTABLE: [&str; 4] = ["getScreenDefinition", "getModels", "getAttachmentDefinitions", "getAttachments"];

async fn run<S: CacheStore>(settings: &HarnessSettings, store: S, mask: &str, item_id: &str) -> Result<bool> {
    let cache = Arc::new(SessionCache::new(store).with_eviction(&EVICTABLE, 5));
    let attachment_settings = settings.attachment_settings();
    cache.ensure_version(attachment_settings.cache_version());
    let transport = HttpTransport::new(settings.timeout_secs.map(Duration::from_secs));
    let fetcher = AttachmentFetcher::new(&attachment_settings, transport, cache)?;
    fetcher.registry().require(mask)?;
    let credentials = SessionCredentials { session_id: settings.session_id.clone(), auth_token: settings.auth_token.clone() };
    match fetcher.load(mask, item_id, &credentials).await {
        Some(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(true)
        }
        None => Ok(false),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("usage: {} <MASK> <ITEM_ID> [CONFIG]", args[0]);
        std::process::exit(2);
    }
    let config_path = args.get(3).map(String::as_str).unwrap_or("attachkit");
    let settings = match HarnessSettings::load(config_path) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "could not load settings");
            std::process::exit(2);
        }
    };
    info!(environment = settings.environment.as_str(), mask = args[1].as_str(), "starting load");

    let outcome = match &settings.cache_path {
        Some(path) => match SqliteStore::open(path, None) {
            Ok(store) => run(&settings, store, &args[1], &args[2]).await,
            Err(e) => Err(e),
        },
        None => run(&settings, MemoryStore::new(), &args[1], &args[2]).await,
    };
    match outcome {
        Ok(true) => (),
        Ok(false) => {
            error!("load produced no result");
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "load failed");
            std::process::exit(1);
        }
    }
}
