//! Key/blob cache with TTL and ETag bookkeeping
//!
//! Backs the vulnerability database loader. Entries older than the TTL are
//! evicted when read. Concurrent writers to one key resolve as last write
//! wins; [`FileCache`] writes through a temp file and a rename, so readers
//! never observe a partial entry.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Failed to write cache entry '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("Failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Seconds since the Unix epoch at which the entry was stored.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    pub data: String,
}

impl CacheEntry {
    pub fn new(data: impl Into<String>, etag: Option<&str>) -> Self {
        Self {
            timestamp: now_secs(),
            etag: etag.map(str::to_string),
            data: data.into(),
        }
    }

    fn is_expired(&self, ttl: Duration, now: u64) -> bool {
        now.saturating_sub(self.timestamp) > ttl.as_secs()
    }
}

pub trait CacheStore: Send + Sync {
    /// Returns the entry for `key`, or `None` when missing or older than the TTL.
    fn get(&self, key: &str) -> Option<CacheEntry>;

    fn set(&self, key: &str, data: &str, etag: Option<&str>) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    ttl: Duration,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    /// `<user cache dir>/vigil`, falling back to `.vigil-cache` in the working directory.
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .map(|dir| dir.join("vigil"))
            .unwrap_or_else(|| PathBuf::from(".vigil-cache"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{:x}.json", digest))
    }

    fn evict(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            debug!(path = %path.display(), error = %e, "failed to evict cache entry");
        }
    }
}

impl CacheStore for FileCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        let path = self.path_for(key);
        let content = fs::read_to_string(&path).ok()?;

        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(key, error = %e, "discarding unreadable cache entry");
                self.evict(&path);
                return None;
            }
        };

        if entry.is_expired(self.ttl, now_secs()) {
            debug!(key, "cache entry expired");
            self.evict(&path);
            return None;
        }

        Some(entry)
    }

    fn set(&self, key: &str, data: &str, etag: Option<&str>) -> Result<(), CacheError> {
        let path = self.path_for(key);
        let encoded = serde_json::to_string(&CacheEntry::new(data, etag))?;

        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Write {
            path: self.dir.clone(),
            source,
        })?;

        let tmp_path = path.with_extension(format!("json.{}.tmp", std::process::id()));
        fs::write(&tmp_path, encoded).map_err(|source| CacheError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &path).map_err(|source| CacheError::Write {
            path: path.clone(),
            source,
        })?;

        debug!(key, path = %path.display(), "cache entry stored");
        Ok(())
    }
}

#[derive(Debug)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn insert(&self, key: &str, entry: CacheEntry) {
        self.entries.lock().insert(key.to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut entries = self.entries.lock();
        let expired = entries.get(key)?.is_expired(self.ttl, now_secs());
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, data: &str, etag: Option<&str>) -> Result<(), CacheError> {
        self.insert(key, CacheEntry::new(data, etag));
        Ok(())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
