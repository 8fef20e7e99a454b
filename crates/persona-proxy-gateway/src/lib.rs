//! Persona Proxy Gateway: `POST /api/ask`, `GET /health`, and the built frontend in production.

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;

pub use app::{attach_event_log, build_app, AppState};
pub use config::{ConfigError, DeploymentMode, GatewayConfig};
pub use error::ApiError;
