use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::collaborators::{FavoritesStore, UsageHistory, UsageRecord};

pub const MRU_CAPACITY: usize = 100;
pub const QUERY_HISTORY_CAPACITY: usize = 200;

/// Weight of a use by age in days: index 0 is a week old, index 6 is today.
const RECENCY_WEIGHTS: [i64; 7] = [5, 8, 13, 21, 34, 55, 89];
const OLD_USE_WEIGHT: i64 = 2;
const SAME_QUERY_BONUS: i64 = 10;
const SECS_PER_DAY: i64 = 86_400;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store io failed for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MruEntry {
    pub provider_id: String,
    pub title: String,
    pub subtitle: String,
    pub context_data: String,
    pub used_at_epoch_secs: i64,
}

/// One past invocation as seen by the scorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PastUse {
    pub used_at_epoch_secs: i64,
    pub query_text: String,
}

/// Recency-weighted score of a result's history. Recent uses weigh more;
/// a use under the same query text adds a flat bonus once.
pub fn auto_score(uses: &[PastUse], current_query_text: &str, now_epoch_secs: i64) -> i64 {
    let mut score = 0;
    for past in uses {
        let age = now_epoch_secs.saturating_sub(past.used_at_epoch_secs).max(0);
        if age > 7 * SECS_PER_DAY {
            score += OLD_USE_WEIGHT;
            continue;
        }
        let days = ((age + SECS_PER_DAY - 1) / SECS_PER_DAY).clamp(1, 7);
        score += RECENCY_WEIGHTS[(7 - days) as usize];
    }

    if !current_query_text.is_empty()
        && uses.iter().any(|past| past.query_text == current_query_text)
    {
        score += SAME_QUERY_BONUS;
    }
    score
}

pub struct UsageStore {
    db: Mutex<Connection>,
}

impl UsageStore {
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    pub fn open_file(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn with_connection(db: Connection) -> Result<Self, StoreError> {
        migrate(&db)?;
        Ok(Self { db: Mutex::new(db) })
    }

    pub fn record_use_at(&self, record: &UsageRecord, used_at: i64) -> Result<(), StoreError> {
        self.db.lock().execute(
            "INSERT INTO action_history (provider_id, title, subtitle, query, used_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.provider_id,
                record.title,
                record.subtitle,
                record.query_text,
                used_at
            ],
        )?;
        Ok(())
    }

    pub fn record_query_at(&self, query_text: &str, used_at: i64) -> Result<(), StoreError> {
        if query_text.trim().is_empty() {
            return Ok(());
        }
        let db = self.db.lock();
        db.execute(
            "INSERT INTO query_history (query, used_at) VALUES (?1, ?2)
             ON CONFLICT(query) DO UPDATE SET used_at=excluded.used_at",
            params![query_text, used_at],
        )?;
        db.execute(
            "DELETE FROM query_history WHERE rowid NOT IN
             (SELECT rowid FROM query_history ORDER BY used_at DESC, rowid DESC LIMIT ?1)",
            params![QUERY_HISTORY_CAPACITY as i64],
        )?;
        Ok(())
    }

    /// Most recent distinct query texts, newest first.
    pub fn recent_queries(&self, limit: usize) -> Result<Vec<String>, StoreError> {
        let db = self.db.lock();
        let mut stmt =
            db.prepare("SELECT query FROM query_history ORDER BY used_at DESC, rowid DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit as i64], |row| row.get::<_, String>(0))?;
        let mut queries = Vec::new();
        for row in rows {
            queries.push(row?);
        }
        Ok(queries)
    }

    pub fn uses_of(
        &self,
        provider_id: &str,
        title: &str,
        subtitle: &str,
    ) -> Result<Vec<PastUse>, StoreError> {
        let db = self.db.lock();
        let mut stmt = db.prepare(
            "SELECT used_at, query FROM action_history
             WHERE provider_id = ?1 AND title = ?2 AND subtitle = ?3",
        )?;
        let rows = stmt.query_map(params![provider_id, title, subtitle], |row| {
            Ok(PastUse {
                used_at_epoch_secs: row.get(0)?,
                query_text: row.get(1)?,
            })
        })?;
        let mut uses = Vec::new();
        for row in rows {
            uses.push(row?);
        }
        Ok(uses)
    }

    pub fn score_at(
        &self,
        provider_id: &str,
        title: &str,
        subtitle: &str,
        current_query_text: &str,
        now_epoch_secs: i64,
    ) -> Result<i64, StoreError> {
        let uses = self.uses_of(provider_id, title, subtitle)?;
        Ok(auto_score(&uses, current_query_text, now_epoch_secs))
    }

    pub fn set_favorite(
        &self,
        provider_id: &str,
        title: &str,
        subtitle: &str,
        favorite: bool,
    ) -> Result<(), StoreError> {
        let db = self.db.lock();
        if favorite {
            db.execute(
                "INSERT OR IGNORE INTO favorite (provider_id, title, subtitle) VALUES (?1, ?2, ?3)",
                params![provider_id, title, subtitle],
            )?;
        } else {
            db.execute(
                "DELETE FROM favorite WHERE provider_id = ?1 AND title = ?2 AND subtitle = ?3",
                params![provider_id, title, subtitle],
            )?;
        }
        Ok(())
    }

    pub fn favorite(&self, provider_id: &str, title: &str, subtitle: &str) -> Result<bool, StoreError> {
        let db = self.db.lock();
        let mut stmt = db.prepare(
            "SELECT 1 FROM favorite WHERE provider_id = ?1 AND title = ?2 AND subtitle = ?3",
        )?;
        Ok(stmt.exists(params![provider_id, title, subtitle])?)
    }

    /// Moves the entry to the front of the MRU list, trimming it to capacity.
    pub fn touch_mru_at(&self, record: &UsageRecord, used_at: i64) -> Result<(), StoreError> {
        let db = self.db.lock();
        db.execute(
            "INSERT INTO mru (provider_id, title, subtitle, context_data, used_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(provider_id, title, subtitle)
             DO UPDATE SET context_data=excluded.context_data, used_at=excluded.used_at",
            params![
                record.provider_id,
                record.title,
                record.subtitle,
                record.context_data,
                used_at
            ],
        )?;
        db.execute(
            "DELETE FROM mru WHERE rowid NOT IN
             (SELECT rowid FROM mru ORDER BY used_at DESC, rowid DESC LIMIT ?1)",
            params![MRU_CAPACITY as i64],
        )?;
        Ok(())
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<MruEntry>, StoreError> {
        let db = self.db.lock();
        let mut stmt = db.prepare(
            "SELECT provider_id, title, subtitle, context_data, used_at FROM mru
             ORDER BY used_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit.min(MRU_CAPACITY) as i64], |row| {
            Ok(MruEntry {
                provider_id: row.get(0)?,
                title: row.get(1)?,
                subtitle: row.get(2)?,
                context_data: row.get(3)?,
                used_at_epoch_secs: row.get(4)?,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    pub fn remove_mru(&self, provider_id: &str, title: &str, subtitle: &str) -> Result<(), StoreError> {
        self.db.lock().execute(
            "DELETE FROM mru WHERE provider_id = ?1 AND title = ?2 AND subtitle = ?3",
            params![provider_id, title, subtitle],
        )?;
        Ok(())
    }
}

fn migrate(db: &Connection) -> Result<(), StoreError> {
    db.execute_batch(
        "CREATE TABLE IF NOT EXISTS action_history (
             provider_id TEXT NOT NULL,
             title TEXT NOT NULL,
             subtitle TEXT NOT NULL,
             query TEXT NOT NULL,
             used_at INTEGER NOT NULL
         );
         CREATE INDEX IF NOT EXISTS action_history_key
             ON action_history (provider_id, title, subtitle);
         CREATE TABLE IF NOT EXISTS query_history (
             query TEXT PRIMARY KEY,
             used_at INTEGER NOT NULL
         );
         CREATE TABLE IF NOT EXISTS favorite (
             provider_id TEXT NOT NULL,
             title TEXT NOT NULL,
             subtitle TEXT NOT NULL,
             PRIMARY KEY (provider_id, title, subtitle)
         );
         CREATE TABLE IF NOT EXISTS mru (
             provider_id TEXT NOT NULL,
             title TEXT NOT NULL,
             subtitle TEXT NOT NULL,
             context_data TEXT NOT NULL,
             used_at INTEGER NOT NULL,
             PRIMARY KEY (provider_id, title, subtitle)
         );",
    )?;
    Ok(())
}

pub fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl UsageHistory for UsageStore {
    fn score_for(
        &self,
        provider_id: &str,
        title: &str,
        subtitle: &str,
        current_query_text: &str,
    ) -> i64 {
        match self.score_at(provider_id, title, subtitle, current_query_text, now_epoch_secs()) {
            Ok(score) => score,
            Err(error) => {
                warn!(provider_id, %error, "usage score lookup failed");
                0
            }
        }
    }

    fn record_action(&self, record: &UsageRecord) -> Result<(), StoreError> {
        debug!(provider_id = %record.provider_id, title = %record.title, "recording action use");
        self.record_use_at(record, now_epoch_secs())
    }

    fn record_query(&self, query_text: &str) -> Result<(), StoreError> {
        self.record_query_at(query_text, now_epoch_secs())
    }

    fn record_mru(&self, record: &UsageRecord) -> Result<(), StoreError> {
        self.touch_mru_at(record, now_epoch_secs())
    }

    fn mru(&self, limit: usize) -> Result<Vec<MruEntry>, StoreError> {
        self.recent(limit)
    }
}

impl FavoritesStore for UsageStore {
    fn is_favorite(&self, provider_id: &str, title: &str, subtitle: &str) -> bool {
        match self.favorite(provider_id, title, subtitle) {
            Ok(favorite) => favorite,
            Err(error) => {
                warn!(provider_id, %error, "favorite lookup failed");
                false
            }
        }
    }
}
