//! Process-wide keyed store backing the content cache.
//!
//! Values are type-erased so one store can hold every kind of lookup result.
//! Each entry may carry an absolute expiration and a dependency on another
//! key: when an entry leaves the store (removed, replaced, expired or
//! evicted), every entry depending on it leaves too.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use lru::LruCache;
use metrics::counter;
use tracing::debug;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_CACHE_HIT: &str = "lectern_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "lectern_cache_miss_total";
pub(crate) const METRIC_CACHE_EVICT: &str = "lectern_cache_evict_total";

/// A cached value. Callers downcast to the type they stored.
pub type CacheValue = Arc<dyn Any + Send + Sync>;

/// How a value is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertOptions {
    /// Entry expires this long after insertion.
    pub expires_in: Option<Duration>,
    /// Entry is removed together with this key.
    pub depends_on: Option<String>,
}

impl InsertOptions {
    pub fn expiring(duration: Duration) -> Self {
        Self {
            expires_in: Some(duration),
            depends_on: None,
        }
    }

    pub fn depending_on(key: impl Into<String>) -> Self {
        Self {
            expires_in: None,
            depends_on: Some(key.into()),
        }
    }
}

struct StoredEntry {
    value: CacheValue,
    expires_at: Option<Instant>,
    depends_on: Option<String>,
}

impl StoredEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

struct StoreInner {
    entries: LruCache<String, StoredEntry>,
    /// Reverse index: key -> keys that depend on it.
    dependents: HashMap<String, HashSet<String>>,
}

impl StoreInner {
    /// Remove `key` and, transitively, every entry depending on it.
    fn remove_cascade(&mut self, key: &str) -> Option<StoredEntry> {
        let removed = self.entries.pop(key);
        if let Some(entry) = removed.as_ref() {
            self.unlink(key, entry.depends_on.as_deref());
        }

        let mut pending: Vec<String> = self
            .dependents
            .remove(key)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();

        while let Some(dependent) = pending.pop() {
            if let Some(entry) = self.entries.pop(&dependent) {
                self.unlink(&dependent, entry.depends_on.as_deref());
                debug!(
                    target = SOURCE,
                    key = %dependent,
                    dependency = key,
                    "removed dependent cache entry"
                );
            }
            if let Some(more) = self.dependents.remove(&dependent) {
                pending.extend(more);
            }
        }

        removed
    }

    /// First expired key along `key`'s dependency chain, the entry itself included.
    ///
    /// A dependency that is not stored (yet) ends the walk.
    fn expired_link(&self, key: &str, now: Instant) -> Option<String> {
        let mut seen = HashSet::new();
        let mut current = key.to_string();
        loop {
            let entry = self.entries.peek(&current)?;
            if entry.is_expired(now) {
                return Some(current);
            }
            let next = entry.depends_on.as_ref()?;
            if !seen.insert(current) {
                return None;
            }
            current = next.clone();
        }
    }

    fn unlink(&mut self, key: &str, depends_on: Option<&str>) {
        let Some(dependency) = depends_on else {
            return;
        };
        if let Some(set) = self.dependents.get_mut(dependency) {
            set.remove(key);
            if set.is_empty() {
                self.dependents.remove(dependency);
            }
        }
    }
}

/// In-memory cache store with LRU eviction, expiration and key dependencies.
pub struct CacheStore {
    inner: RwLock<StoreInner>,
}

impl CacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                entries: LruCache::new(config.capacity_non_zero()),
                dependents: HashMap::new(),
            }),
        }
    }

    /// Look up a live entry.
    ///
    /// An entry is live while neither it nor anything along its dependency
    /// chain has expired. Expired entries are purged, with their dependents,
    /// when observed.
    pub fn get(&self, key: &str) -> Option<CacheValue> {
        let mut inner = rw_write(&self.inner, SOURCE, "get");
        let now = Instant::now();

        if let Some(expired) = inner.expired_link(key, now) {
            inner.remove_cascade(&expired);
        }

        match inner.entries.get(key) {
            Some(entry) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                Some(Arc::clone(&entry.value))
            }
            None => {
                counter!(METRIC_CACHE_MISS).increment(1);
                None
            }
        }
    }

    /// Store `value` under `key`, replacing (and cascading) any previous entry.
    ///
    /// A dependency on a key that is not present yet is kept and fires once
    /// that key is stored and later removed.
    pub fn insert(&self, key: impl Into<String>, value: CacheValue, options: InsertOptions) {
        let key = key.into();
        let mut inner = rw_write(&self.inner, SOURCE, "insert");

        if inner.entries.contains(&key) {
            inner.remove_cascade(&key);
        }

        let entry = StoredEntry {
            value,
            expires_at: options.expires_in.map(|ttl| Instant::now() + ttl),
            depends_on: options.depends_on.clone(),
        };

        if let Some((evicted, evicted_entry)) = inner.entries.push(key.clone(), entry) {
            if evicted != key {
                counter!(METRIC_CACHE_EVICT).increment(1);
                inner.unlink(&evicted, evicted_entry.depends_on.as_deref());
                inner.remove_cascade(&evicted);
            }
        }

        if let Some(dependency) = options.depends_on {
            inner.dependents.entry(dependency).or_default().insert(key);
        }
    }

    /// Remove `key` and its dependents, returning the removed value.
    pub fn remove(&self, key: &str) -> Option<CacheValue> {
        rw_write(&self.inner, SOURCE, "remove")
            .remove_cascade(key)
            .map(|entry| entry.value)
    }

    /// Keys of all live entries, most recently used first.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let inner = rw_read(&self.inner, SOURCE, "keys");
        inner
            .entries
            .iter()
            .filter(|(key, _)| inner.expired_link(key, now).is_none())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        rw_read(&self.inner, SOURCE, "len").entries.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = rw_write(&self.inner, SOURCE, "clear");
        inner.entries.clear();
        inner.dependents.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    fn store() -> CacheStore {
        CacheStore::new(&CacheConfig::default())
    }

    fn value(text: &str) -> CacheValue {
        Arc::new(text.to_string())
    }

    fn read(store: &CacheStore, key: &str) -> Option<String> {
        store
            .get(key)
            .and_then(|v| v.downcast_ref::<String>().cloned())
    }

    #[test]
    fn insert_then_get_roundtrip() {
        let store = store();
        assert!(store.get("a").is_none());

        store.insert("a", value("alpha"), InsertOptions::default());
        assert_eq!(read(&store, "a").as_deref(), Some("alpha"));

        assert!(store.remove("a").is_some());
        assert!(store.get("a").is_none());
    }

    #[test]
    fn expired_entries_are_purged_on_read() {
        let store = store();
        store.insert("a", value("alpha"), InsertOptions::expiring(Duration::ZERO));

        assert!(store.get("a").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn unexpired_entries_survive() {
        let store = store();
        store.insert(
            "a",
            value("alpha"),
            InsertOptions::expiring(Duration::from_secs(60)),
        );
        assert_eq!(read(&store, "a").as_deref(), Some("alpha"));
    }

    #[test]
    fn removing_dependency_cascades() {
        let store = store();
        store.insert("name", value("entry"), InsertOptions::default());
        store.insert("id", value("entry"), InsertOptions::depending_on("name"));
        store.insert("other", value("x"), InsertOptions::default());

        store.remove("name");

        assert!(store.get("id").is_none());
        assert_eq!(read(&store, "other").as_deref(), Some("x"));
    }

    #[test]
    fn cascade_is_transitive() {
        let store = store();
        store.insert("a", value("a"), InsertOptions::default());
        store.insert("b", value("b"), InsertOptions::depending_on("a"));
        store.insert("c", value("c"), InsertOptions::depending_on("b"));

        store.remove("a");

        assert!(store.is_empty());
    }

    #[test]
    fn replacing_an_entry_invalidates_dependents() {
        let store = store();
        store.insert("name", value("v1"), InsertOptions::default());
        store.insert("id", value("v1"), InsertOptions::depending_on("name"));

        store.insert("name", value("v2"), InsertOptions::default());

        assert!(store.get("id").is_none());
        assert_eq!(read(&store, "name").as_deref(), Some("v2"));
    }

    #[test]
    fn dependency_on_absent_key_fires_after_it_is_stored() {
        let store = store();
        store.insert("id", value("entry"), InsertOptions::depending_on("name"));
        store.insert("name", value("entry"), InsertOptions::default());
        assert!(store.get("id").is_some());

        store.remove("name");
        assert!(store.get("id").is_none());
    }

    #[test]
    fn expiring_dependency_takes_dependents_along() {
        let store = store();
        store.insert("name", value("entry"), InsertOptions::expiring(Duration::ZERO));
        store.insert("id", value("entry"), InsertOptions::depending_on("name"));

        assert!(store.get("name").is_none());
        assert!(store.get("id").is_none());
    }

    #[test]
    fn dependents_expire_with_their_dependency_without_reading_it() {
        let store = store();
        store.insert(
            "name",
            value("entry"),
            InsertOptions::expiring(Duration::from_millis(20)),
        );
        store.insert("id", value("entry"), InsertOptions::depending_on("name"));
        store.insert("view", value("entry"), InsertOptions::depending_on("id"));
        assert!(store.get("view").is_some());

        std::thread::sleep(Duration::from_millis(40));

        assert!(store.keys().is_empty());
        assert!(store.get("view").is_none());
        assert!(store.get("id").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn dependency_cycles_do_not_hang_reads() {
        let store = store();
        store.insert("a", value("a"), InsertOptions::depending_on("b"));
        store.insert("b", value("b"), InsertOptions::depending_on("a"));

        assert!(store.get("a").is_some());
        assert_eq!(store.keys().len(), 2);
    }

    #[test]
    fn lru_eviction_cascades() {
        let config = CacheConfig {
            capacity: 2,
            ..Default::default()
        };
        let store = CacheStore::new(&config);

        store.insert("name", value("entry"), InsertOptions::default());
        store.insert("id", value("entry"), InsertOptions::depending_on("name"));
        // Touch "id" so "name" is least recently used.
        assert!(store.get("id").is_some());

        store.insert("fresh", value("x"), InsertOptions::default());

        assert!(store.get("name").is_none());
        assert!(store.get("id").is_none());
        assert!(store.get("fresh").is_some());
    }

    #[test]
    fn keys_skip_expired_entries() {
        let store = store();
        store.insert("live", value("x"), InsertOptions::default());
        store.insert("dead", value("x"), InsertOptions::expiring(Duration::ZERO));

        assert_eq!(store.keys(), vec!["live".to_string()]);
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let store = store();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store.inner.write().expect("store lock should be acquired");
            panic!("poison store lock");
        }));

        store.insert("a", value("alpha"), InsertOptions::default());
        assert_eq!(read(&store, "a").as_deref(), Some("alpha"));
    }
}
