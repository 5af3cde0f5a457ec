//! Locale-aware view over the shared store.
//!
//! Every key is suffixed with the reader's locale before it reaches the
//! store, so a page cached for one language is never served to another.

use std::any::{Any, type_name};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use thiserror::Error;
use tracing::trace;

use crate::domain::locale::Locale;

use super::config::CacheConfig;
use super::flight::SingleFlight;
use super::store::{CacheStore, CacheValue, InsertOptions};

const SOURCE: &str = "cache::content";

pub(crate) const METRIC_CACHE_COALESCED: &str = "lectern_cache_coalesced_total";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("refusing to cache an absent value under `{key}`")]
    NullValue { key: String },
    #[error("cached value under `{key}` is not a `{expected}`")]
    TypeMismatch { key: String, expected: &'static str },
}

/// How an inserted value expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachePolicy {
    /// Lives until removed or evicted.
    Default,
    /// Expires this long after insertion.
    Duration(Duration),
    /// Removed together with another key of the same locale.
    DependsOn(String),
}

/// Shared cache state handed to every request.
#[derive(Clone)]
pub struct CacheHandle {
    store: Arc<CacheStore>,
    flights: Arc<SingleFlight>,
    config: Arc<CacheConfig>,
}

impl CacheHandle {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            store: Arc::new(CacheStore::new(&config)),
            flights: Arc::new(SingleFlight::new()),
            config: Arc::new(config),
        }
    }

    /// View of the cache for requests served in `locale`.
    pub fn for_locale(&self, locale: Locale) -> ContentCache {
        ContentCache {
            handle: self.clone(),
            locale,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }
}

/// Cache wrapper that keys content by locale.
#[derive(Clone)]
pub struct ContentCache {
    handle: CacheHandle,
    locale: Locale,
}

impl ContentCache {
    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    pub fn config(&self) -> &CacheConfig {
        self.handle.config()
    }

    fn locale_key(&self, key: &str) -> String {
        format!("{key}:{}", self.locale)
    }

    pub fn get(&self, key: &str) -> Option<CacheValue> {
        self.handle.store.get(&self.locale_key(key))
    }

    /// Fetch a value and downcast it to `T`.
    pub fn get_as<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: Any + Clone + Send + Sync,
    {
        self.lookup(&self.locale_key(key))
    }

    /// Store a value. Absent values are rejected rather than cached.
    pub fn insert<T>(
        &self,
        key: &str,
        value: Option<T>,
        policy: CachePolicy,
    ) -> Result<(), CacheError>
    where
        T: Any + Send + Sync,
    {
        let Some(value) = value else {
            return Err(CacheError::NullValue {
                key: key.to_string(),
            });
        };

        let options = match policy {
            CachePolicy::Default => InsertOptions::default(),
            CachePolicy::Duration(duration) => InsertOptions::expiring(duration),
            CachePolicy::DependsOn(dependency) => {
                InsertOptions::depending_on(self.locale_key(&dependency))
            }
        };

        self.handle
            .store
            .insert(self.locale_key(key), Arc::new(value), options);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<CacheValue> {
        self.handle.store.remove(&self.locale_key(key))
    }

    /// Raw store keys across all locales.
    pub fn keys(&self) -> Vec<String> {
        self.handle.store.keys()
    }

    /// Return the cached value for `key`, producing and storing it on a miss
    /// with the short expiration class.
    pub async fn get_or_insert<T, E, F, Fut>(
        &self,
        key: &str,
        producer: F,
    ) -> Result<Option<T>, E>
    where
        T: Any + Clone + Send + Sync,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        let duration = self.handle.config.short;
        self.get_or_insert_for(key, duration, producer).await
    }

    /// Return the cached value for `key`, producing and storing it on a miss.
    ///
    /// The stored value expires `duration` after insertion. A producer that
    /// yields `None` is not cached; producer errors propagate and leave the
    /// cache untouched.
    pub async fn get_or_insert_for<T, E, F, Fut>(
        &self,
        key: &str,
        duration: Duration,
        producer: F,
    ) -> Result<Option<T>, E>
    where
        T: Any + Clone + Send + Sync,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        let full_key = self.locale_key(key);
        if let Some(hit) = self.lookup::<T>(&full_key)? {
            return Ok(Some(hit));
        }

        let _flight = if self.handle.config.single_flight {
            let guard = self.handle.flights.acquire(&full_key).await;
            if let Some(hit) = self.lookup::<T>(&full_key)? {
                counter!(METRIC_CACHE_COALESCED).increment(1);
                return Ok(Some(hit));
            }
            Some(guard)
        } else {
            None
        };

        trace!(target = SOURCE, key = %full_key, "cache miss, producing value");
        let produced = producer().await?;
        if let Some(value) = produced.as_ref() {
            self.handle.store.insert(
                full_key,
                Arc::new(value.clone()),
                InsertOptions::expiring(duration),
            );
        }
        Ok(produced)
    }

    fn lookup<T>(&self, full_key: &str) -> Result<Option<T>, CacheError>
    where
        T: Any + Clone + Send + Sync,
    {
        let Some(value) = self.handle.store.get(full_key) else {
            return Ok(None);
        };
        value
            .downcast_ref::<T>()
            .cloned()
            .map(Some)
            .ok_or_else(|| CacheError::TypeMismatch {
                key: full_key.to_string(),
                expected: type_name::<T>(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug)]
    enum TestError {
        Cache(CacheError),
        Producer,
    }

    impl From<CacheError> for TestError {
        fn from(err: CacheError) -> Self {
            Self::Cache(err)
        }
    }

    fn locale(tag: &str) -> Locale {
        Locale::parse(tag).expect("valid locale")
    }

    fn handle() -> CacheHandle {
        CacheHandle::new(CacheConfig::default())
    }

    #[test]
    fn values_are_isolated_per_locale() {
        let handle = handle();
        let english = handle.for_locale(locale("en-us"));
        let french = handle.for_locale(locale("fr-fr"));

        english
            .insert("greeting", Some("hello".to_string()), CachePolicy::Default)
            .expect("insert");

        assert!(french.get("greeting").is_none());
        assert_eq!(
            english.get_as::<String>("greeting").expect("typed"),
            Some("hello".to_string())
        );
    }

    #[test]
    fn keys_carry_locale_suffix() {
        let handle = handle();
        let english = handle.for_locale(locale("en-us"));
        english
            .insert("greeting", Some(1_u32), CachePolicy::Default)
            .expect("insert");

        assert_eq!(english.keys(), vec!["greeting:en-us".to_string()]);
    }

    #[test]
    fn absent_values_are_rejected() {
        let cache = handle().for_locale(locale("en-us"));
        let result = cache.insert::<String>("missing", None, CachePolicy::Default);
        assert!(matches!(result, Err(CacheError::NullValue { key }) if key == "missing"));
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn dependency_keys_are_localized() {
        let cache = handle().for_locale(locale("en-us"));
        cache
            .insert("by-name", Some(1_u32), CachePolicy::Default)
            .expect("insert");
        cache
            .insert(
                "by-id",
                Some(1_u32),
                CachePolicy::DependsOn("by-name".to_string()),
            )
            .expect("insert");

        cache.remove("by-name");
        assert!(cache.get("by-id").is_none());
    }

    #[test]
    fn typed_read_reports_mismatch() {
        let cache = handle().for_locale(locale("en-us"));
        cache
            .insert("n", Some(5_u32), CachePolicy::Default)
            .expect("insert");

        let result = cache.get_as::<String>("n");
        assert!(matches!(result, Err(CacheError::TypeMismatch { .. })));
    }

    #[tokio::test]
    async fn producer_runs_once_then_hits() {
        let cache = handle().for_locale(locale("en-us"));
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value: Option<String> = cache
                .get_or_insert("k", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TestError>(Some("v".to_string()))
                })
                .await
                .expect("value");
            assert_eq!(value.as_deref(), Some("v"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn absent_results_are_not_cached() {
        let cache = handle().for_locale(locale("en-us"));
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value: Option<String> = cache
                .get_or_insert("k", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TestError>(None)
                })
                .await
                .expect("value");
            assert!(value.is_none());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn producer_errors_propagate_without_caching() {
        let cache = handle().for_locale(locale("en-us"));

        let result: Result<Option<String>, TestError> = cache
            .get_or_insert("k", || async { Err(TestError::Producer) })
            .await;
        assert!(matches!(result, Err(TestError::Producer)));
        assert!(cache.get("k").is_none());
    }

    #[tokio::test]
    async fn hit_with_wrong_type_is_an_error() {
        let cache = handle().for_locale(locale("en-us"));
        cache
            .insert("k", Some(5_u32), CachePolicy::Default)
            .expect("insert");

        let result: Result<Option<String>, TestError> = cache
            .get_or_insert("k", || async { Ok(Some("v".to_string())) })
            .await;
        assert!(matches!(
            result,
            Err(TestError::Cache(CacheError::TypeMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn expired_values_are_produced_again() {
        let cache = handle().for_locale(locale("en-us"));
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let _: Option<u32> = cache
                .get_or_insert_for("k", Duration::ZERO, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TestError>(Some(1))
                })
                .await
                .expect("value");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    async fn concurrent_misses(single_flight: bool) -> usize {
        let config = CacheConfig {
            single_flight,
            ..Default::default()
        };
        let cache = CacheHandle::new(config).for_locale(locale("en-us"));
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    cache
                        .get_or_insert("k", || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(30)).await;
                            Ok::<_, TestError>(Some(7_u32))
                        })
                        .await
                        .expect("value")
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.expect("task"), Some(7));
        }
        calls.load(Ordering::SeqCst)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn single_flight_coalesces_concurrent_misses() {
        assert_eq!(concurrent_misses(true).await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn without_single_flight_every_misser_produces() {
        assert!(concurrent_misses(false).await > 1);
    }
}
