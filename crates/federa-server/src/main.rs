//! Federa Server Binary
//!
//! Runs the identity bridge HTTP server.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use federa_bridge::validators::testing;
use federa_bridge::ValidatorRegistry;
use federa_server::{create_router, AppState, Bootstrap, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env()?;

    // Initialize logging
    let filter = EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("parse FEDERA_LOG_LEVEL: {}", config.log_level))?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .with_context(|| "set tracing subscriber")?;

    // Validator types
    let registry = ValidatorRegistry::with_builtins();
    if config.enable_testing_provider {
        testing::register(&registry);
    }

    let state = Arc::new(AppState::new(registry));

    if let Some(path) = &config.bootstrap_path {
        Bootstrap::load(path)?.apply(&state).await?;
    }

    info!(
        port = config.port,
        provider_types = ?state.registry.types(),
        "Starting federa server"
    );

    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;

    info!(addr = %addr, "Federa listening");

    axum::serve(listener, app).await.with_context(|| "server error")?;
    Ok(())
}
