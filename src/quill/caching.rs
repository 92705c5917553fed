//! Compiled output caches
//!
//! A cache maps a view to the output it compiled to. Entries are keyed by [`fingerprint`], so a
//! view whose name, contents, variables or delimiters change misses. Caches never fail: a
//! backend that cannot answer behaves like a miss and the view is compiled again.

use crate::quill::view::{DelimiterKind, View};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

/// Stores compiled output by view.
pub trait Cache: Send + Sync {
    fn get(&self, view: &View) -> Option<String>;

    fn set(&self, view: &View, compiled: String);

    fn has(&self, view: &View) -> bool;

    /// Remove every entry.
    fn flush(&self);
}

/// Hex SHA-256 of a view's name, contents, variables and delimiters.
///
/// Each field is length-prefixed so different splits of the same bytes never collide.
/// Delimiter pairs are hashed in [`DelimiterKind::ALL`] order.
pub fn fingerprint(view: &View) -> String {
    let vars = serde_json::to_string(view.vars()).unwrap_or_default();
    let mut fields = vec![view.name(), view.contents(), vars.as_str()];
    for kind in DelimiterKind::ALL {
        let (open, close) = view.delimiters().get(kind);
        fields.push(open);
        fields.push(close);
    }
    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// A cache that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

impl Cache for NullCache {
    fn get(&self, _view: &View) -> Option<String> {
        None
    }

    fn set(&self, _view: &View, _compiled: String) {}

    fn has(&self, _view: &View) -> bool {
        false
    }

    fn flush(&self) {}
}

#[derive(Debug, Clone)]
struct CacheEntry {
    compiled: String,
    expires_at: Option<SystemTime>,
}

impl CacheEntry {
    fn new(compiled: String, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|ttl| SystemTime::now() + ttl);
        CacheEntry {
            compiled,
            expires_at,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| SystemTime::now() > expires_at)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    /// Entries currently stored, including expired ones not cleaned up yet
    pub entry_count: u64,
    /// Bytes of compiled output held
    pub memory_usage: u64,
}

impl CacheStatistics {
    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }

    /// Hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        match self.total_requests() {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }
}

/// In-memory cache with an optional time to live
#[derive(Debug, Default)]
pub struct InMemoryCache {
    store: RwLock<HashMap<String, CacheEntry>>,
    default_ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire every entry `ttl` after it is set.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Drop expired entries.
    pub fn cleanup_expired(&self) {
        self.store.write().retain(|_, entry| !entry.is_expired());
    }

    pub fn statistics(&self) -> CacheStatistics {
        let store = self.store.read();
        CacheStatistics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: store.len() as u64,
            memory_usage: store
                .values()
                .map(|entry| entry.compiled.len() as u64)
                .sum(),
        }
    }
}

impl Cache for InMemoryCache {
    fn get(&self, view: &View) -> Option<String> {
        let key = fingerprint(view);
        let found = self
            .store
            .read()
            .get(&key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.compiled.clone());
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    fn set(&self, view: &View, compiled: String) {
        let entry = CacheEntry::new(compiled, self.default_ttl);
        self.store.write().insert(fingerprint(view), entry);
    }

    fn has(&self, view: &View) -> bool {
        self.store
            .read()
            .get(&fingerprint(view))
            .is_some_and(|entry| !entry.is_expired())
    }

    fn flush(&self) {
        self.store.write().clear();
    }
}
