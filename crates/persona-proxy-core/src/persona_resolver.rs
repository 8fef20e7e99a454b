//! Persona resolution: picks the system prompt for one request.
//!
//! Order of precedence:
//! 1. A supplied *full* persona (longer than the threshold) is used and cached for the conversation.
//! 2. A supplied *short* persona is used for this request only. It shadows, but never replaces,
//!    a cached full persona.
//! 3. With nothing supplied, the conversation's cached persona is used.
//! 4. Otherwise the configured default persona.

use std::sync::Arc;

use crate::persona_cache::PersonaStore;

/// Personas strictly longer than this many UTF-16 units are classified as full and cached.
pub const DEFAULT_FULL_THRESHOLD: usize = 100;

/// Fallback when no default persona is configured.
pub const DEFAULT_PERSONA: &str = "You are a helpful AI assistant.";

/// Classification threshold and fallback persona.
#[derive(Debug, Clone)]
pub struct PersonaPolicy {
    pub full_threshold: usize,
    pub default_persona: String,
}

impl Default for PersonaPolicy {
    fn default() -> Self {
        Self {
            full_threshold: DEFAULT_FULL_THRESHOLD,
            default_persona: DEFAULT_PERSONA.to_string(),
        }
    }
}

impl PersonaPolicy {
    pub fn new(full_threshold: usize, default_persona: impl Into<String>) -> Self {
        Self {
            full_threshold,
            default_persona: default_persona.into(),
        }
    }

    /// Length is counted in UTF-16 code units, the unit browsers report for string length.
    pub fn is_full(&self, persona: &str) -> bool {
        persona.encode_utf16().count() > self.full_threshold
    }
}

/// Where the resolved persona came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonaSource {
    /// Full persona supplied with the request.
    Supplied,
    /// Short persona supplied with the request; not cached.
    SuppliedShort,
    /// Previously cached full persona.
    Cached,
    /// Configured default.
    Default,
}

impl PersonaSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonaSource::Supplied => "supplied",
            PersonaSource::SuppliedShort => "supplied_short",
            PersonaSource::Cached => "cached",
            PersonaSource::Default => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub persona: String,
    pub source: PersonaSource,
    /// `(conversation_id, persona)` to write into the cache, if any.
    pub cache_write: Option<(String, String)>,
}

/// Pure resolution step. Does not touch any cache; the caller applies `cache_write`.
///
/// Empty strings for `supplied` count as "not supplied". A full persona without a
/// conversation id is used but produces no cache write.
pub fn resolve(
    conversation_id: Option<&str>,
    supplied: Option<&str>,
    cached: Option<&str>,
    policy: &PersonaPolicy,
) -> Resolution {
    if let Some(persona) = supplied.filter(|p| !p.is_empty()) {
        if policy.is_full(persona) {
            return Resolution {
                persona: persona.to_string(),
                source: PersonaSource::Supplied,
                cache_write: conversation_id
                    .filter(|id| !id.is_empty())
                    .map(|id| (id.to_string(), persona.to_string())),
            };
        }
        return Resolution {
            persona: persona.to_string(),
            source: PersonaSource::SuppliedShort,
            cache_write: None,
        };
    }

    if let Some(persona) = cached {
        return Resolution {
            persona: persona.to_string(),
            source: PersonaSource::Cached,
            cache_write: None,
        };
    }

    Resolution {
        persona: policy.default_persona.clone(),
        source: PersonaSource::Default,
        cache_write: None,
    }
}

/// Resolves personas against a shared store and applies cache writes.
#[derive(Clone)]
pub struct PersonaResolver {
    policy: PersonaPolicy,
    store: Arc<dyn PersonaStore>,
}

impl PersonaResolver {
    pub fn new(policy: PersonaPolicy, store: Arc<dyn PersonaStore>) -> Self {
        Self { policy, store }
    }

    pub fn resolve(&self, conversation_id: Option<&str>, supplied: Option<&str>) -> Resolution {
        let cached = conversation_id
            .filter(|id| !id.is_empty())
            .and_then(|id| self.store.get(id));

        let resolution = resolve(conversation_id, supplied, cached.as_deref(), &self.policy);

        if let Some((id, persona)) = &resolution.cache_write {
            self.store.put(id, persona);
        }

        tracing::debug!(
            conversation_id = conversation_id.unwrap_or("-"),
            source = resolution.source.as_str(),
            cached = resolution.cache_write.is_some(),
            "[PERSONA] resolved"
        );

        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona_cache::PersonaCache;

    fn long_persona(tag: &str) -> String {
        format!("{} {}", tag, "You are a meticulous travel planner. ".repeat(5))
    }

    fn resolver() -> (PersonaResolver, Arc<PersonaCache>) {
        let cache = Arc::new(PersonaCache::new());
        let resolver = PersonaResolver::new(
            PersonaPolicy::new(DEFAULT_FULL_THRESHOLD, "default persona"),
            cache.clone(),
        );
        (resolver, cache)
    }

    #[test]
    fn threshold_is_strictly_greater_than() {
        let policy = PersonaPolicy::default();
        assert!(!policy.is_full(&"x".repeat(100)));
        assert!(policy.is_full(&"x".repeat(101)));
    }

    #[test]
    fn threshold_counts_utf16_units_not_bytes() {
        let policy = PersonaPolicy::default();
        // 60 units, 180 bytes.
        assert!(!policy.is_full(&"你".repeat(60)));
        assert!(policy.is_full(&"你".repeat(101)));
    }

    #[test]
    fn astral_characters_count_as_two_units() {
        let policy = PersonaPolicy::default();
        // 50 emoji are 100 units; 51 are 102.
        assert!(!policy.is_full(&"🌊".repeat(50)));
        assert!(policy.is_full(&"🌊".repeat(51)));
        assert!(policy.is_full(&"🌊".repeat(60)));
    }

    #[test]
    fn full_supplied_persona_is_used_and_cached() {
        let persona = long_persona("A");
        let r = resolve(Some("c1"), Some(persona.as_str()), None, &PersonaPolicy::default());
        assert_eq!(r.persona, persona);
        assert_eq!(r.source, PersonaSource::Supplied);
        assert_eq!(r.cache_write, Some(("c1".to_string(), persona)));
    }

    #[test]
    fn full_supplied_persona_without_conversation_is_not_cached() {
        let persona = long_persona("A");
        let r = resolve(None, Some(persona.as_str()), None, &PersonaPolicy::default());
        assert_eq!(r.source, PersonaSource::Supplied);
        assert!(r.cache_write.is_none());
    }

    #[test]
    fn short_persona_shadows_cached_without_write() {
        let cached = long_persona("cached");
        let r = resolve(Some("c1"), Some("be brief"), Some(cached.as_str()), &PersonaPolicy::default());
        assert_eq!(r.persona, "be brief");
        assert_eq!(r.source, PersonaSource::SuppliedShort);
        assert!(r.cache_write.is_none());
    }

    #[test]
    fn empty_supplied_persona_falls_through_to_cache() {
        let r = resolve(Some("c1"), Some(""), Some("cached one"), &PersonaPolicy::default());
        assert_eq!(r.persona, "cached one");
        assert_eq!(r.source, PersonaSource::Cached);
    }

    #[test]
    fn nothing_supplied_and_no_cache_uses_default() {
        let policy = PersonaPolicy::new(100, "the default");
        let r = resolve(Some("c1"), None, None, &policy);
        assert_eq!(r.persona, "the default");
        assert_eq!(r.source, PersonaSource::Default);
    }

    #[test]
    fn cache_round_trip_through_resolver() {
        let (resolver, cache) = resolver();
        let persona = long_persona("round-trip");

        let first = resolver.resolve(Some("conv"), Some(persona.as_str()));
        assert_eq!(first.source, PersonaSource::Supplied);
        assert_eq!(cache.get("conv").as_deref(), Some(persona.as_str()));

        let second = resolver.resolve(Some("conv"), None);
        assert_eq!(second.persona, persona);
        assert_eq!(second.source, PersonaSource::Cached);
    }

    #[test]
    fn short_persona_leaves_cached_entry_intact() {
        let (resolver, cache) = resolver();
        let persona = long_persona("keep-me");
        resolver.resolve(Some("conv"), Some(persona.as_str()));

        let shadowed = resolver.resolve(Some("conv"), Some("answer in French"));
        assert_eq!(shadowed.persona, "answer in French");
        assert_eq!(cache.get("conv").as_deref(), Some(persona.as_str()));

        let restored = resolver.resolve(Some("conv"), None);
        assert_eq!(restored.persona, persona);
    }

    #[test]
    fn newer_full_persona_replaces_older() {
        let (resolver, _cache) = resolver();
        let old = long_persona("old");
        let new = long_persona("new");
        resolver.resolve(Some("conv"), Some(old.as_str()));
        resolver.resolve(Some("conv"), Some(new.as_str()));
        assert_eq!(resolver.resolve(Some("conv"), None).persona, new);
    }

    #[test]
    fn other_conversations_get_default() {
        let (resolver, _cache) = resolver();
        resolver.resolve(Some("conv-a"), Some(long_persona("a").as_str()));
        let r = resolver.resolve(Some("conv-b"), None);
        assert_eq!(r.persona, "default persona");
        assert_eq!(r.source, PersonaSource::Default);
    }
}
