//! Router assembly and shared application state.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use persona_proxy_core::{
    topics, CompletionClient, EventBus, PersonaCache, PersonaResolver, PersonaStore,
};
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
};

use crate::config::{DeploymentMode, GatewayConfig};
use crate::handlers;

/// Built once at startup and shared by every request.
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub resolver: PersonaResolver,
    pub completion: Arc<dyn CompletionClient>,
    pub bus: EventBus,
}

impl AppState {
    /// Fresh in-memory persona cache and event bus.
    pub fn new(config: GatewayConfig, completion: Arc<dyn CompletionClient>) -> Self {
        Self::with_store(config, completion, Arc::new(PersonaCache::new()))
    }

    pub fn with_store(
        config: GatewayConfig,
        completion: Arc<dyn CompletionClient>,
        store: Arc<dyn PersonaStore>,
    ) -> Self {
        let resolver = PersonaResolver::new(config.persona_policy(), store);
        Self {
            config: Arc::new(config),
            resolver,
            completion,
            bus: EventBus::new(),
        }
    }
}

pub fn build_app(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/api/ask", post(handlers::ask))
        .route("/health", get(handlers::health));

    match state.config.mode {
        DeploymentMode::Development => {
            app = app.route("/", get(handlers::dev_root));
        }
        DeploymentMode::Production => {
            // Unknown paths get index.html so client-side routes resolve.
            let static_dir = state.config.static_dir.clone();
            let index = ServeFile::new(static_dir.join("index.html"));
            app = app.fallback_service(ServeDir::new(static_dir).fallback(index));
        }
    }

    app.with_state(state)
        .layer(middleware::from_fn(log_request))
        .layer(CorsLayer::permissive())
}

/// Logs the bus lifecycle events at debug level.
pub fn attach_event_log(bus: &EventBus) {
    for topic in [
        topics::ASK_RECEIVED,
        topics::PERSONA_CACHED,
        topics::ASK_ANSWERED,
        topics::ASK_FAILED,
    ] {
        bus.subscribe(topic, move |payload| {
            tracing::debug!(topic, %payload, "[BUS] event");
            Ok(())
        });
    }
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "[HTTP] request handled"
    );
    response
}
