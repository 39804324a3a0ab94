use std::collections::HashMap;
use std::path::Path;

use crate::model::IconRef;
use crate::usage_store::{MruEntry, StoreError};

/// Strings starting with this prefix are looked up through the [`Translator`].
pub const I18N_PREFIX: &str = "i18n:";

pub trait Translator: Send + Sync {
    fn translate(&self, key: &str) -> String;
}

pub fn translate_text(translator: &dyn Translator, text: &str) -> String {
    match text.strip_prefix(I18N_PREFIX) {
        Some(key) => translator.translate(key),
        None => text.to_string(),
    }
}

/// Returns keys unchanged.
pub struct IdentityTranslator;

impl Translator for IdentityTranslator {
    fn translate(&self, key: &str) -> String {
        key.to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticTranslator {
    entries: HashMap<String, String>,
}

impl StaticTranslator {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Translator for StaticTranslator {
    fn translate(&self, key: &str) -> String {
        self.entries
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

pub trait IconResolver: Send + Sync {
    /// Never returns a relative path.
    fn resolve(&self, icon: &IconRef, base_dir: &Path) -> IconRef;
}

/// Joins relative paths onto the base directory and nothing else.
pub struct PassthroughIconResolver;

impl IconResolver for PassthroughIconResolver {
    fn resolve(&self, icon: &IconRef, base_dir: &Path) -> IconRef {
        match icon {
            IconRef::RelativePath(path) => {
                IconRef::AbsolutePath(base_dir.join(path).to_string_lossy().into_owned())
            }
            other => other.clone(),
        }
    }
}

/// Identifies one previously shown result for usage bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageRecord {
    pub provider_id: String,
    pub title: String,
    pub subtitle: String,
    pub query_text: String,
    pub context_data: String,
    pub icon: Option<IconRef>,
}

pub trait UsageHistory: Send + Sync {
    fn score_for(
        &self,
        provider_id: &str,
        title: &str,
        subtitle: &str,
        current_query_text: &str,
    ) -> i64;

    fn record_action(&self, record: &UsageRecord) -> Result<(), StoreError>;

    fn record_query(&self, query_text: &str) -> Result<(), StoreError>;

    fn record_mru(&self, record: &UsageRecord) -> Result<(), StoreError>;

    /// Most recently used results, newest first.
    fn mru(&self, limit: usize) -> Result<Vec<MruEntry>, StoreError>;
}

pub struct NoUsageHistory;

impl UsageHistory for NoUsageHistory {
    fn score_for(&self, _: &str, _: &str, _: &str, _: &str) -> i64 {
        0
    }

    fn record_action(&self, _record: &UsageRecord) -> Result<(), StoreError> {
        Ok(())
    }

    fn record_query(&self, _query_text: &str) -> Result<(), StoreError> {
        Ok(())
    }

    fn record_mru(&self, _record: &UsageRecord) -> Result<(), StoreError> {
        Ok(())
    }

    fn mru(&self, _limit: usize) -> Result<Vec<MruEntry>, StoreError> {
        Ok(Vec::new())
    }
}

pub trait FavoritesStore: Send + Sync {
    fn is_favorite(&self, provider_id: &str, title: &str, subtitle: &str) -> bool;
}

pub struct NoFavorites;

impl FavoritesStore for NoFavorites {
    fn is_favorite(&self, _provider_id: &str, _title: &str, _subtitle: &str) -> bool {
        false
    }
}
