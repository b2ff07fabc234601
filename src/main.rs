//! Gallery Server - photo galleries with owner-only editing.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gallery_server::{
    config::Config,
    model::{Principal, UserId},
    server::{create_router, AppState, CsrfGuard, RouterConfig, Views},
    storage::{DiskImageStore, MemoryGalleryStore, MemorySessionStore},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Gallery Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Images directory: {}", config.images_dir.display());
    info!("  Allowed extensions: {}", config.allowed_extensions.join(", "));
    info!("  Upload limit: {} bytes", config.max_upload_bytes);
    info!("  CSRF token lifetime: {}s", config.csrf_ttl);

    // Parse templates
    let views = match Views::load() {
        Ok(views) => views,
        Err(e) => {
            error!("Failed to load templates: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Build stores
    let sessions = match build_session_store(&config) {
        Ok(sessions) => sessions,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let policy = match config.upload_policy() {
        Ok(policy) => policy,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let app_state = AppState::new(
        Arc::new(MemoryGalleryStore::new()),
        Arc::new(DiskImageStore::new(config.images_dir.clone())),
        Arc::new(sessions),
        views,
        policy,
        CsrfGuard::new(&config.csrf_secret, config.csrf_ttl()),
    );

    let router_config = RouterConfig::new()
        .with_max_upload_bytes(config.max_upload_bytes)
        .with_tracing(!config.no_tracing);

    let router = create_router(app_state, router_config);

    // Bind and serve
    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    open http://{}/galleries", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Seed the session store from `--dev-session` pairs.
///
/// User ids are assigned in the order the pairs are given, starting at 1.
fn build_session_store(config: &Config) -> Result<MemorySessionStore, String> {
    let seeds = config.dev_sessions()?;

    if seeds.is_empty() {
        warn!("  Sessions: none configured, every request is anonymous");
        warn!("        Add one with --dev-session=<token>=<email>");
    }

    let store = seeds
        .into_iter()
        .zip(1u64..)
        .fold(MemorySessionStore::new(), |store, ((token, email), id)| {
            info!("  Session for {} (user {})", email, id);
            store.with_session(token, Principal::new(UserId(id), email))
        });

    Ok(store)
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "gallery_server=debug,tower_http=debug"
    } else {
        "gallery_server=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
