use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::model::{Action, IconRef, Preview, Query, RefreshFn, ResultTail};

#[derive(Clone)]
pub struct CacheEntry {
    pub result_id: String,
    pub provider_id: String,
    pub provider_dir: PathBuf,
    pub query: Arc<Query>,
    pub title: String,
    pub subtitle: String,
    pub icon: Option<IconRef>,
    pub tails: Vec<ResultTail>,
    pub context_data: String,
    pub actions: Vec<Action>,
    pub full_preview: Option<Preview>,
    pub on_refresh: Option<RefreshFn>,
    pub refresh_interval_ms: i64,
}

impl CacheEntry {
    pub fn action(&self, action_id: &str) -> Option<&Action> {
        self.actions.iter().find(|action| action.id == action_id)
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("result_id", &self.result_id)
            .field("provider_id", &self.provider_id)
            .field("title", &self.title)
            .field("actions", &self.actions)
            .field("has_refresh", &self.on_refresh.is_some())
            .finish_non_exhaustive()
    }
}

struct Slot {
    generation: u64,
    entry: Arc<CacheEntry>,
}

#[derive(Default)]
pub struct ResultCache {
    generation: AtomicU64,
    slots: RwLock<HashMap<String, Slot>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Invalidates everything cached so far and returns the new generation.
    pub fn begin_generation(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let mut slots = self.slots.write();
        let before = slots.len();
        slots.retain(|_, slot| slot.generation >= generation);
        debug!(generation, swept = before - slots.len(), "result cache generation opened");
        generation
    }

    /// Stores an entry produced under `generation`. Returns false and drops
    /// the entry when that generation has already been superseded.
    pub fn insert(&self, generation: u64, entry: CacheEntry) -> bool {
        let mut slots = self.slots.write();
        if generation != self.generation() {
            debug!(
                generation,
                result_id = %entry.result_id,
                "dropping cache entry from superseded query"
            );
            return false;
        }
        slots.insert(
            entry.result_id.clone(),
            Slot {
                generation,
                entry: Arc::new(entry),
            },
        );
        true
    }

    pub fn get(&self, result_id: &str) -> Option<Arc<CacheEntry>> {
        let slots = self.slots.read();
        let slot = slots.get(result_id)?;
        if slot.generation != self.generation() {
            debug!(result_id, "stale result lookup");
            return None;
        }
        Some(Arc::clone(&slot.entry))
    }

    /// Replaces a live entry. Returns false if it is gone or stale.
    pub fn update(&self, result_id: &str, update: impl FnOnce(&mut CacheEntry)) -> bool {
        let current = self.generation();
        let mut slots = self.slots.write();
        let Some(slot) = slots.get_mut(result_id) else {
            return false;
        };
        if slot.generation != current {
            return false;
        }
        let mut entry = CacheEntry::clone(&slot.entry);
        update(&mut entry);
        slot.entry = Arc::new(entry);
        true
    }

    pub fn len(&self) -> usize {
        let current = self.generation();
        self.slots
            .read()
            .values()
            .filter(|slot| slot.generation == current)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{CacheEntry, ResultCache};
    use crate::model::Query;

    fn entry(id: &str) -> CacheEntry {
        CacheEntry {
            result_id: id.to_string(),
            provider_id: "p".to_string(),
            provider_dir: Default::default(),
            query: Arc::new(Query::input("q")),
            title: id.to_string(),
            subtitle: String::new(),
            icon: None,
            tails: Vec::new(),
            context_data: String::new(),
            actions: Vec::new(),
            full_preview: None,
            on_refresh: None,
            refresh_interval_ms: 0,
        }
    }

    #[test]
    fn new_generation_hides_old_entries() {
        let cache = ResultCache::new();
        let first = cache.begin_generation();
        assert!(cache.insert(first, entry("a")));
        assert!(cache.get("a").is_some());

        cache.begin_generation();
        assert!(cache.get("a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn late_insert_from_old_generation_is_dropped() {
        let cache = ResultCache::new();
        let first = cache.begin_generation();
        let second = cache.begin_generation();
        assert!(!cache.insert(first, entry("late")));
        assert!(cache.get("late").is_none());
        assert!(cache.insert(second, entry("fresh")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn update_replaces_live_entry() {
        let cache = ResultCache::new();
        let generation = cache.begin_generation();
        cache.insert(generation, entry("a"));
        assert!(cache.update("a", |e| e.title = "renamed".into()));
        assert_eq!(cache.get("a").map(|e| e.title.clone()), Some("renamed".into()));
        assert!(!cache.update("missing", |_| {}));
    }
}
