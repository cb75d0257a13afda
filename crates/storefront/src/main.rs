//! District Vinyl storefront - public record shop.
//!
//! This binary serves the storefront on port 3000.
//!
//! # Architecture
//!
//! - Axum web framework with HTMX for interactivity
//! - Askama templates for server-side rendering
//! - Remote data service (REST) for products, orders, profiles and auth
//! - In-memory backend seeded from a YAML catalog when no remote service is
//!   configured
//! - Visitor state (cart, identity, checkout stage) in `tower-sessions`

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use district_vinyl_core::Email;
use district_vinyl_storefront::backend::{Backend, MemoryBackend, RestBackend};
use district_vinyl_storefront::build_app;
use district_vinyl_storefront::catalog::load_catalog;
use district_vinyl_storefront::config::{LogFormat, StorefrontConfig};
use district_vinyl_storefront::state::AppState;
use secrecy::ExposeSecret;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing(format: LogFormat) {
    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "district_vinyl_storefront=info,tower_http=debug".into());

    let json = format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(env_filter)
        .with((!json).then(tracing_subscriber::fmt::layer))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

/// Pick the backend: the remote service when configured, otherwise an
/// in-memory store seeded from the catalog and the admin bootstrap.
fn build_backend(config: &StorefrontConfig) -> Result<Arc<dyn Backend>, Box<dyn std::error::Error>> {
    if let Some(remote) = &config.backend {
        tracing::info!(url = %remote.url, "Using remote data service");
        return Ok(Arc::new(RestBackend::new(&remote.url, remote.anon_key.clone())?));
    }

    tracing::warn!("BACKEND_URL not set; using in-memory backend (data is lost on restart)");
    let backend = MemoryBackend::new();

    if let Some(path) = &config.catalog_path {
        let products = load_catalog(path)?;
        let count = products.len();
        for product in products {
            backend.seed_product(product)?;
        }
        tracing::info!(path = %path.display(), count, "Catalog seeded");
    }

    if let Some(admin) = &config.admin {
        let email = Email::parse(&admin.email)?;
        backend.create_admin(&email, admin.password.expose_secret(), "Administrator")?;
        tracing::info!(email = %email, "Admin account created");
    }

    Ok(Arc::new(backend))
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);
    init_tracing(config.log_format);

    let backend = build_backend(&config).expect("Failed to initialize backend");
    let addr = config.socket_addr();
    let app = build_app(AppState::new(config, backend));

    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
