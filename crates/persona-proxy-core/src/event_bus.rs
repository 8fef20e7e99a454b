//! In-process publish/subscribe bus for request lifecycle events.
//!
//! Dispatch is synchronous and follows registration order. Each handler is isolated:
//! an `Err` or a panic in one handler is logged and counted, and the remaining handlers
//! still run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;

/// Topics published by the gateway.
pub mod topics {
    pub const ASK_RECEIVED: &str = "ask.received";
    pub const PERSONA_CACHED: &str = "persona.cached";
    pub const ASK_ANSWERED: &str = "ask.answered";
    pub const ASK_FAILED: &str = "ask.failed";
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl From<&str> for HandlerError {
    fn from(s: &str) -> Self {
        HandlerError(s.to_string())
    }
}

impl From<String> for HandlerError {
    fn from(s: String) -> Self {
        HandlerError(s)
    }
}

type Handler = Arc<dyn Fn(&Value) -> Result<(), HandlerError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Outcome of one `publish`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

struct Subscriber {
    id: SubscriptionId,
    handler: Handler,
}

#[derive(Default)]
struct Inner {
    topics: DashMap<String, Vec<Subscriber>>,
    next_id: AtomicU64,
}

/// Cloneable handle; clones share the same subscriptions.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, topic: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&Value) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .topics
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber {
                id,
                handler: Arc::new(handler),
            });
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut removed = false;
        for mut entry in self.inner.topics.iter_mut() {
            let before = entry.value().len();
            entry.value_mut().retain(|s| s.id != id);
            if entry.value().len() != before {
                removed = true;
                break;
            }
        }
        removed
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner.topics.get(topic).map(|s| s.len()).unwrap_or(0)
    }

    pub fn publish(&self, topic: &str, payload: &Value) -> PublishReport {
        // Snapshot so handlers may subscribe or publish without holding the shard lock.
        let handlers: Vec<(SubscriptionId, Handler)> = match self.inner.topics.get(topic) {
            Some(subs) => subs
                .iter()
                .map(|s| (s.id, Arc::clone(&s.handler)))
                .collect(),
            None => return PublishReport::default(),
        };

        let mut report = PublishReport::default();
        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!(topic, subscription = id.0, error = %e, "[BUS] handler failed");
                }
                Err(_) => {
                    report.failed += 1;
                    tracing::warn!(topic, subscription = id.0, "[BUS] handler panicked");
                }
            }
        }
        report
    }
}
