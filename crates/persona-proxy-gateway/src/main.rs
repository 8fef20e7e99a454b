//! Persona Proxy Gateway binary. Config from `.env` + environment; refuses to start without an API key.

use std::sync::Arc;

use persona_proxy_core::HttpCompletionClient;
use persona_proxy_gateway::{attach_event_log, build_app, AppState, DeploymentMode, GatewayConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[persona-proxy] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("[SYSTEM] Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let mut completion = HttpCompletionClient::new(config.api_key.clone(), config.api_url.clone());
    if let Some(timeout) = config.upstream_timeout {
        completion = match completion.with_timeout(timeout) {
            Ok(client) => client,
            Err(e) => {
                tracing::error!("[SYSTEM] Cannot build upstream client with timeout {:?}: {}", timeout, e);
                std::process::exit(1);
            }
        };
    }

    let state = Arc::new(AppState::new(config.clone(), Arc::new(completion)));
    attach_event_log(&state.bus);
    let app = build_app(Arc::clone(&state));

    let listener = match tokio::net::TcpListener::bind(config.bind_addr()).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("[SYSTEM] Cannot bind {}: {}", config.bind_addr(), e);
            std::process::exit(1);
        }
    };

    tracing::info!("[SYSTEM] persona-proxy v{}", persona_proxy_core::version());
    tracing::info!("[SYSTEM] Server running at http://localhost:{}", config.port);
    tracing::info!("[SYSTEM] Environment: {}", config.mode);
    tracing::info!("[SYSTEM] Upstream: {}", config.api_url);
    tracing::info!("[SYSTEM] DEEPSEEK_API_KEY: set");
    if config.mode == DeploymentMode::Production {
        tracing::info!("[SYSTEM] Serving frontend from {}", config.static_dir.display());
    }

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("[SYSTEM] Server error: {}", e);
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("[SYSTEM] Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("[SYSTEM] Shutting down");
}
