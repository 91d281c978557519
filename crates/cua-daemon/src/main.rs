//! cua-daemon entry point.
//!
//! Thin: loads configuration, sets up tracing, wires the director to the
//! configured board and transport, starts the scan ticker and serves the
//! HTTP control surface. All routing lives in the library target.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use cua_config::{load_layered_yaml, report_unused_keys, CatchupConfig, UnusedKeyPolicy};
use cua_daemon::{
    director::{Collaborators, Director},
    routes, state,
    transport::{connect_boards, Transport},
};
use cua_efd::EfdClient;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

const DEFAULT_CONFIG_PATHS: &str = "config/catchup.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = config_paths_from_env();
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&path_refs).context("config load failed")?;

    let unused = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !unused.is_clean() {
        warn!(keys = ?unused.unused_leaf_pointers, "config contains keys the daemon never reads");
    }

    let cfg = CatchupConfig::from_config_json(&loaded.config_json)?;
    info!(
        config_hash = %loaded.config_hash,
        paths = ?paths,
        camera = %cfg.camera_name,
        "configuration loaded"
    );
    info!(
        backend = ?cfg.store.backend,
        store_host = %cfg.store.host,
        store_db = cfg.store.db,
        transport = cfg.transport.base_url.as_deref().unwrap_or("standalone"),
        "store and transport selected"
    );

    let boards = connect_boards(&cfg).await.context("board connect failed")?;
    let transport = Transport::from_config(&cfg);
    let efd = Arc::new(EfdClient::new(
        cfg.efd.base_url.clone(),
        cfg.efd.database.clone(),
    ));
    let scan_interval = cfg.catchup.scan_interval_secs;

    let director = Arc::new(Director::new(
        cfg.clone(),
        loaded.config_hash.clone(),
        Collaborators {
            discovery: boards.discovery,
            jobs: boards.jobs,
            efd,
            publisher: transport.publisher(),
        },
    ));

    let _consumers = transport.attach(&cfg, director.clone()).await?;

    if scan_interval > 0 {
        state::spawn_scan_tick(Arc::clone(&director), Duration::from_secs(scan_interval));
    }

    let shared = Arc::new(state::AppState::new(director));
    let app = routes::build_router(shared)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8898)));
    info!("cua-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Comma-separated list in `CUA_CONFIG_PATHS`; later files override earlier.
fn config_paths_from_env() -> Vec<String> {
    let raw = std::env::var("CUA_CONFIG_PATHS").unwrap_or_else(|_| DEFAULT_CONFIG_PATHS.to_string());
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("CUA_DAEMON_ADDR").ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
