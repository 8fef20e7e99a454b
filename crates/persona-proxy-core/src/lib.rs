//! Persona Proxy core library.
//! Persona cache and resolution, the chat-completion client, and the in-process event bus.

pub mod completion;
pub mod event_bus;
pub mod persona_cache;
pub mod persona_resolver;

pub use completion::{
    CompletionClient, CompletionError, CompletionRequest, CompletionResult, HttpCompletionClient,
    upstream_error_payload, API_ERROR_MARKER, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
};
pub use event_bus::{topics, EventBus, HandlerError, PublishReport, SubscriptionId};
pub use persona_cache::{PersonaCache, PersonaStore};
pub use persona_resolver::{
    resolve, PersonaPolicy, PersonaResolver, PersonaSource, Resolution, DEFAULT_FULL_THRESHOLD,
    DEFAULT_PERSONA,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
