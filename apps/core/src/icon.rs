use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::collaborators::IconResolver;
use crate::model::IconRef;

/// Resolves relative icon paths against a provider directory, canonicalising
/// files that exist. Lookups are memoised in a bounded LRU.
pub struct PathIconResolver {
    cache: Mutex<LruCache<(PathBuf, String), String>>,
}

impl PathIconResolver {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }

    fn absolute(&self, relative: &str, base_dir: &Path) -> String {
        let key = (base_dir.to_path_buf(), relative.to_string());
        if let Some(hit) = self.cache.lock().get(&key) {
            return hit.clone();
        }

        let joined = base_dir.join(relative);
        let resolved = std::fs::canonicalize(&joined).unwrap_or(joined);
        let resolved = resolved.to_string_lossy().into_owned();

        let mut cache = self.cache.lock();
        if cache.len() >= cache.cap().get() {
            debug!(cache_size = cache.len(), "icon cache full, evicting oldest");
        }
        cache.put(key, resolved.clone());
        resolved
    }
}

impl Default for PathIconResolver {
    fn default() -> Self {
        Self::new(512)
    }
}

impl IconResolver for PathIconResolver {
    fn resolve(&self, icon: &IconRef, base_dir: &Path) -> IconRef {
        match icon {
            IconRef::RelativePath(path) => IconRef::AbsolutePath(self.absolute(path, base_dir)),
            other => other.clone(),
        }
    }
}
