//! Persona cache: conversation id -> full persona text.
//! Process lifetime only. No eviction, no TTL; an overwrite is last-write-wins.

use dashmap::DashMap;

/// Storage seam for cached personas. The gateway holds an `Arc<dyn PersonaStore>`.
pub trait PersonaStore: Send + Sync {
    fn get(&self, conversation_id: &str) -> Option<String>;

    fn put(&self, conversation_id: &str, persona: &str);
}

/// In-memory persona cache backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct PersonaCache {
    entries: DashMap<String, String>,
}

impl PersonaCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, conversation_id: &str) -> bool {
        self.entries.contains_key(conversation_id)
    }
}

impl PersonaStore for PersonaCache {
    fn get(&self, conversation_id: &str) -> Option<String> {
        self.entries.get(conversation_id).map(|e| e.value().clone())
    }

    fn put(&self, conversation_id: &str, persona: &str) {
        self.entries
            .insert(conversation_id.to_string(), persona.to_string());
    }
}
