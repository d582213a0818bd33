// src/app/cache.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::app::error::CacheError;
use crate::app::source::TitleInfo;
use crate::config::{resolve_relative_path, AppConfig, DEFAULT_CACHE_DIR};

pub const POSTER_CACHE_DB_FILE: &str = "poster_cache.db";

/// Create (if needed) and return the cache directory for `cfg`.
pub fn cache_dir(cfg: &AppConfig) -> PathBuf {
    let fallback = resolve_relative_path(DEFAULT_CACHE_DIR);
    let path = cfg
        .cache_dir
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| fallback.clone());

    if let Err(e) = fs::create_dir_all(&path) {
        warn!("failed to create cache dir {}: {e}", path.display());
        // Fall back to the folder next to the executable
        let _ = fs::create_dir_all(&fallback);
        return fallback;
    }
    path
}

pub fn poster_cache_path(cfg: &AppConfig) -> PathBuf {
    cache_dir(cfg).join(POSTER_CACHE_DB_FILE)
}

/// Cache identity of a movie folder. Raw names, no folding.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub category: String,
    pub folder: String,
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.category, self.folder)
    }
}

#[derive(Clone, Debug)]
pub struct CacheRow {
    pub key: CacheKey,
    pub path: PathBuf,
    pub info: Option<TitleInfo>,
    pub fetched_at: String,
}

/// A validated hit: the poster file existed when it was looked up.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedPoster {
    pub path: PathBuf,
    pub info: Option<TitleInfo>,
    pub fetched_at: String,
}

fn decode_info(key: &CacheKey, raw: Option<String>) -> Option<TitleInfo> {
    let raw = raw?;
    match serde_json::from_str(&raw) {
        Ok(info) => Some(info),
        Err(e) => {
            warn!(key = %key, "ignoring unreadable title info: {e}");
            None
        }
    }
}

/// Persistent (category, folder) -> local poster path map.
///
/// A hit is only returned while the referenced file exists; a dangling entry
/// is deleted on the read that discovers it.
pub struct PosterCache {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl PosterCache {
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let cache = Self::init(conn, path.to_path_buf())?;
        info!("Poster cache opened at {}", path.display());
        Ok(cache)
    }

    /// Session-only cache, used when the on-disk database cannot be opened.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::init(Connection::open_in_memory()?, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> Result<Self, CacheError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS poster_cache (
                category   TEXT NOT NULL,
                folder     TEXT NOT NULL,
                path       TEXT NOT NULL,
                fetched_at TEXT NOT NULL,
                info       TEXT,
                PRIMARY KEY (category, folder)
            );",
        )?;
        // databases from before title metadata
        if conn.prepare("SELECT info FROM poster_cache LIMIT 0").is_err() {
            conn.execute_batch("ALTER TABLE poster_cache ADD COLUMN info TEXT;")?;
            info!("Added title info column to {}", path.display());
        }
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key_for(category: &str, folder: &str) -> CacheKey {
        CacheKey {
            category: category.to_string(),
            folder: folder.to_string(),
        }
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a poster path. Storage errors count as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<PathBuf> {
        self.lookup(key).map(|hit| hit.path)
    }

    /// Like [`get`](Self::get), with the stored title info and timestamp.
    pub fn lookup(&self, key: &CacheKey) -> Option<CachedPoster> {
        let stored: Option<(String, String, Option<String>)> = match self
            .conn()
            .query_row(
                "SELECT path, fetched_at, info FROM poster_cache
                 WHERE category = ?1 AND folder = ?2",
                params![key.category, key.folder],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
        {
            Ok(v) => v,
            Err(err) => {
                warn!(key = %key, "poster cache lookup failed: {err}");
                return None;
            }
        };

        let (path, fetched_at, info) = stored?;
        let path = PathBuf::from(path);
        if path.is_file() {
            return Some(CachedPoster {
                path,
                info: decode_info(key, info),
                fetched_at,
            });
        }

        debug!(key = %key, path = %path.display(), "dropping stale poster cache entry");
        if let Err(err) = self.delete(key) {
            warn!(key = %key, "failed to drop stale poster cache entry: {err}");
        }
        None
    }

    /// Insert or replace the entry. `info` replaces whatever was stored,
    /// including with nothing.
    pub fn put(&self, key: &CacheKey, path: &Path, info: Option<&TitleInfo>) -> Result<(), CacheError> {
        let info_json = info.map(serde_json::to_string).transpose()?;
        self.conn().execute(
            "INSERT INTO poster_cache (category, folder, path, fetched_at, info)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (category, folder)
             DO UPDATE SET path = excluded.path, fetched_at = excluded.fetched_at,
                           info = excluded.info",
            params![
                key.category,
                key.folder,
                path.to_string_lossy().into_owned(),
                Utc::now().to_rfc3339(),
                info_json
            ],
        )?;
        Ok(())
    }

    /// Returns whether an entry was removed.
    pub fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let n = self.conn().execute(
            "DELETE FROM poster_cache WHERE category = ?1 AND folder = ?2",
            params![key.category, key.folder],
        )?;
        Ok(n > 0)
    }

    pub fn entries(&self) -> Result<Vec<CacheRow>, CacheError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT category, folder, path, fetched_at, info FROM poster_cache
             ORDER BY category, folder",
        )?;
        let rows = stmt.query_map([], |row| {
            let key = CacheKey {
                category: row.get(0)?,
                folder: row.get(1)?,
            };
            let info: Option<String> = row.get(4)?;
            Ok(CacheRow {
                path: PathBuf::from(row.get::<_, String>(2)?),
                fetched_at: row.get(3)?,
                info: decode_info(&key, info),
                key,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Remove every entry whose poster file is gone. Returns how many.
    pub fn prune_missing(&self) -> Result<usize, CacheError> {
        let mut removed = 0usize;
        for row in self.entries()? {
            if !row.path.is_file() && self.delete(&row.key)? {
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Pruned {removed} stale poster cache entries");
        }
        Ok(removed)
    }
}
