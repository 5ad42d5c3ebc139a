//! Session cache.
//!
//! Values are stored as JSON text in a [`CacheStore`], wrapped with the time
//! they were stored and an optional expiry. Reads of missing, unparsable or
//! expired entries yield `None`. Writes never fail towards the caller: when
//! the store is full the oldest entries under the known prefixes are evicted
//! and the write retried once, after which the value is simply not cached.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ControlError, Result};

pub const CACHE_VERSION_KEY: &str = "cacheVersion";
const DEFAULT_EVICTION_BATCH: usize = 5;

/// Composes `{operation}_{discriminators}_{environment}`. Discriminators are
/// sorted first so the key does not depend on input order.
pub fn cache_key<S: AsRef<str>>(operation: &str, discriminators: &[S], environment: &str) -> String {
    let mut parts: Vec<&str> = discriminators.iter().map(|d| d.as_ref()).collect();
    parts.sort_unstable();
    format!("{}_{}_{}", operation, parts.join("_"), environment)
}

/// Like [`cache_key`] but keeps the discriminators in the given order, for
/// keys whose parts have fixed roles.
pub fn ordered_cache_key<S: AsRef<str>>(operation: &str, discriminators: &[S], environment: &str) -> String {
    let parts: Vec<&str> = discriminators.iter().map(|d| d.as_ref()).collect();
    format!("{}_{}_{}", operation, parts.join("_"), environment)
}

// ------------- Stores -------------
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    /// Fails with [`ControlError::QuotaExceeded`] when the store is full.
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn keys(&self) -> Result<Vec<String>>;
}

fn poisoned<E: std::fmt::Display>(e: E) -> ControlError {
    ControlError::Storage(format!("lock poisoned: {e}"))
}

/// In-process store with an optional quota on the summed key and value bytes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self { entries: Mutex::new(HashMap::new()), quota_bytes: Some(quota_bytes) }
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().map_err(poisoned)?.get(key).cloned())
    }
    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        if let Some(quota) = self.quota_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(ControlError::QuotaExceeded);
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().map_err(poisoned)?.remove(key);
        Ok(())
    }
    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().map_err(poisoned)?.keys().cloned().collect())
    }
}

/// SQLite backed store, in memory or on disk, with an optional cap on the
/// number of entries.
pub struct SqliteStore {
    connection: Mutex<Connection>,
    max_entries: Option<usize>,
}

impl SqliteStore {
    pub fn in_memory(max_entries: Option<usize>) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, max_entries)
    }
    pub fn open(path: &str, max_entries: Option<usize>) -> Result<Self> {
        Self::with_connection(Connection::open(path)?, max_entries)
    }
    fn with_connection(connection: Connection, max_entries: Option<usize>) -> Result<Self> {
        connection.execute_batch(
            "
            create table if not exists CacheEntry (
                CacheKey text not null,
                CacheValue text not null,
                constraint unique_and_referenceable_CacheKey primary key (
                    CacheKey
                )
            );
            ",
        )?;
        Ok(Self { connection: Mutex::new(connection), max_entries })
    }
}

impl CacheStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let connection = self.connection.lock().map_err(poisoned)?;
        let value = connection
            .query_row(
                "select CacheValue from CacheEntry where CacheKey = ?",
                params![key],
                |r| r.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }
    fn set(&self, key: &str, value: &str) -> Result<()> {
        let connection = self.connection.lock().map_err(poisoned)?;
        if let Some(max) = self.max_entries {
            let others: i64 = connection.query_row(
                "select count(*) from CacheEntry where CacheKey <> ?",
                params![key],
                |r| r.get(0),
            )?;
            if usize::try_from(others).unwrap_or(usize::MAX) >= max {
                return Err(ControlError::QuotaExceeded);
            }
        }
        connection.execute(
            "insert or replace into CacheEntry (CacheKey, CacheValue) values (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }
    fn remove(&self, key: &str) -> Result<()> {
        let connection = self.connection.lock().map_err(poisoned)?;
        connection.execute("delete from CacheEntry where CacheKey = ?", params![key])?;
        Ok(())
    }
    fn keys(&self) -> Result<Vec<String>> {
        let connection = self.connection.lock().map_err(poisoned)?;
        let mut statement = connection.prepare("select CacheKey from CacheEntry")?;
        let keys = statement
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}

// ------------- Entries -------------
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry<T> {
    value: T,
    stored_at: i64,
    #[serde(default)]
    expires_at: Option<i64>,
}

// Only the bookkeeping fields, for eviction ordering.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryStamp {
    stored_at: i64,
}

/// How long non-auth lookups live. `None` means for the whole session.
/// The auth token always uses the server-provided interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachePolicy {
    pub entity_ttl: Option<Duration>,
}

// ------------- Cache -------------
pub struct SessionCache<S: CacheStore> {
    store: S,
    eviction_prefixes: Vec<String>,
    eviction_batch: usize,
}

impl<S: CacheStore> SessionCache<S> {
    pub fn new(store: S) -> Self {
        Self { store, eviction_prefixes: Vec::new(), eviction_batch: DEFAULT_EVICTION_BATCH }
    }
    /// Keys starting with any of `prefixes` may be evicted when the store is full.
    pub fn with_eviction(mut self, prefixes: &[&str], batch: usize) -> Self {
        self.eviction_prefixes = prefixes.iter().map(|p| p.to_string()).collect();
        self.eviction_batch = batch;
        self
    }
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "cache read failed");
                return None;
            }
        };
        let entry: StoredEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "discarding unparsable cache entry");
                return None;
            }
        };
        if let Some(expires_at) = entry.expires_at {
            if Utc::now().timestamp_millis() >= expires_at {
                debug!(key, "cache entry expired");
                if let Err(e) = self.store.remove(key) {
                    warn!(key, error = %e, "could not remove expired cache entry");
                }
                return None;
            }
        }
        Some(entry.value)
    }

    /// Caches `value`, optionally for `ttl`. Returns whether it was stored.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        let expires_at = match ttl {
            Some(ttl) => match Utc::now().checked_add_signed(ttl) {
                Some(at) => Some(at),
                None => {
                    warn!(key, "time to live out of range, skipping cache");
                    return false;
                }
            },
            None => None,
        };
        self.write(key, value, expires_at)
    }

    /// Caches `value` until an explicit instant.
    pub fn set_until<T: Serialize>(&self, key: &str, value: &T, expires_at: DateTime<Utc>) -> bool {
        self.write(key, value, Some(expires_at))
    }

    fn write<T: Serialize>(&self, key: &str, value: &T, expires_at: Option<DateTime<Utc>>) -> bool {
        let entry = StoredEntry {
            value,
            stored_at: Utc::now().timestamp_millis(),
            expires_at: expires_at.map(|t| t.timestamp_millis()),
        };
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "value not serializable, skipping cache");
                return false;
            }
        };
        match self.store.set(key, &raw) {
            Ok(()) => true,
            Err(ControlError::QuotaExceeded) => {
                let evicted = self.evict_oldest();
                info!(key, evicted, "cache quota exceeded, retrying after eviction");
                match self.store.set(key, &raw) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(key, error = %e, "giving up on caching");
                        false
                    }
                }
            }
            Err(e) => {
                warn!(key, error = %e, "cache write failed");
                false
            }
        }
    }

    fn evict_oldest(&self) -> usize {
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "could not list cache keys for eviction");
                return 0;
            }
        };
        let mut candidates: Vec<(i64, String)> = keys
            .into_iter()
            .filter(|k| self.eviction_prefixes.iter().any(|p| k.starts_with(p.as_str())))
            .filter_map(|k| {
                let raw = self.store.get(&k).ok().flatten()?;
                // unreadable entries are the first to go
                let stored_at = serde_json::from_str::<EntryStamp>(&raw).map(|s| s.stored_at).unwrap_or(i64::MIN);
                Some((stored_at, k))
            })
            .collect();
        candidates.sort();
        let mut evicted = 0;
        for (_, key) in candidates.into_iter().take(self.eviction_batch) {
            if self.store.remove(&key).is_ok() {
                evicted += 1;
            }
        }
        evicted
    }

    /// Removes every entry whose key satisfies `predicate`.
    pub fn invalidate<P: Fn(&str) -> bool>(&self, predicate: P) -> usize {
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "could not list cache keys");
                return 0;
            }
        };
        let mut removed = 0;
        for key in keys.iter().filter(|k| predicate(k)) {
            match self.store.remove(key) {
                Ok(()) => removed += 1,
                Err(e) => warn!(key = key.as_str(), error = %e, "could not remove cache entry"),
            }
        }
        removed
    }

    /// Removes every entry keyed under `scope`, the trailing key segment
    /// (usually the environment).
    pub fn invalidate_all(&self, scope: &str) -> usize {
        let suffix = format!("_{scope}");
        let removed = self.invalidate(|k| k.ends_with(&suffix));
        info!(scope, removed, "invalidated cache scope");
        removed
    }

    /// Keeps the cache if it was written under `version`, otherwise clears it
    /// and records the new version. Returns whether the cache was kept.
    pub fn ensure_version(&self, version: &str) -> bool {
        if self.get::<String>(CACHE_VERSION_KEY).as_deref() == Some(version) {
            return true;
        }
        let removed = self.invalidate(|_| true);
        info!(version, removed, "cache version changed, cleared");
        self.set(CACHE_VERSION_KEY, &version.to_string(), None);
        false
    }
}
