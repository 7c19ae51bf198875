//! Cafe Backend
//! Mission: Catalog administration behind stateless bearer-token auth
//! Philosophy: Trust the signature, guard every shared write

use anyhow::{Context, Result};
use cafe_backend::{
    auth::clock::SystemClock, build_router, notify::LogNotifier, AppConfig, AppState,
};
use clap::Parser;
use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    let config = AppConfig::parse();
    // Weak secrets and half-configured admins never reach request handling.
    if let Err(e) = config.validate() {
        error!("❌ Invalid configuration: {}", e);
        return Err(e).context("Refusing to start");
    }

    info!("🚀 Cafe backend starting");

    let state = AppState::from_config(&config, Arc::new(SystemClock), Arc::new(LogNotifier))?;
    info!(db = %config.db_path, lock_wait_ms = config.lock_wait_ms, "💾 Database ready");

    if let Some((email, password)) = config.bootstrap_admin() {
        let users = state.users.clone();
        let (email, password) = (email.to_string(), password.to_string());
        tokio::task::spawn_blocking(move || users.ensure_admin(&email, &password))
            .await
            .context("Bootstrap task panicked")?
            .context("Failed to create bootstrap admin")?;
    }

    let app = build_router(state, config.login_rate_limit);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("🎯 API server listening on {}", config.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cafe_backend=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
