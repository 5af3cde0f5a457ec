//! Cached content lookups.
//!
//! Every lookup builds its key from `ContentKey`, consults the request's
//! `ContentCache` and falls back to the repositories on a miss. Expiration
//! follows three classes from `CacheConfig`: long for archives and tag
//! clouds, medium for entries resolved by name, short for everything else.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::debug;

use crate::{
    application::{repos::ContentRepos, repos::RepoError, urls::SiteUrls},
    cache::{CacheError, CachePolicy, CategoryRef, ContentCache, ContentKey},
    domain::{
        entities::{AggregateEntry, Blog, Entry, EntryDay, FeedbackItem, LinkCategory, Tag},
        text::is_numeric,
    },
};

const SOURCE: &str = "lectern::application::lookup";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("content lookup failed")]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// How the entry was addressed in the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryRequest {
    Slug(String),
    Id(i32),
}

impl EntryRequest {
    /// Numeric segments address entries by id, anything else by name.
    pub fn from_segment(segment: &str) -> Self {
        if is_numeric(segment) {
            if let Ok(id) = segment.parse() {
                return Self::Id(id);
            }
        }
        Self::Slug(segment.to_string())
    }
}

/// Outcome of resolving an entry from a request.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryLookup {
    Found(Entry),
    /// The entry was reached by id but has a canonical name; answer with a
    /// permanent redirect to `location`.
    Redirect { location: String },
    NotFound,
}

#[derive(Clone)]
pub struct ContentLookup {
    repos: ContentRepos,
    urls: SiteUrls,
    friendly_url_separator: String,
}

impl ContentLookup {
    pub fn new(
        repos: ContentRepos,
        urls: SiteUrls,
        friendly_url_separator: impl Into<String>,
    ) -> Self {
        Self {
            repos,
            urls,
            friendly_url_separator: friendly_url_separator.into(),
        }
    }

    pub fn repos(&self) -> &ContentRepos {
        &self.repos
    }

    pub fn urls(&self) -> &SiteUrls {
        &self.urls
    }

    /// Entries published during the month containing `date`, newest first.
    pub async fn entries_for_month(
        &self,
        cache: &ContentCache,
        blog: &Blog,
        date: NaiveDate,
    ) -> Result<Vec<Entry>, LookupError> {
        let key = ContentKey::entry_month(date, blog.id).to_string();
        let entries = cache
            .get_or_insert_for(&key, cache.config().long, || async {
                let Some((from, to)) = month_bounds(blog.time_zone, date) else {
                    return Ok(Some(Vec::new()));
                };
                let entries = self
                    .repos
                    .entries
                    .list_entries_published_between(blog.id, from, to)
                    .await?;
                Ok::<_, LookupError>(Some(visible(entries, Utc::now())))
            })
            .await?;
        Ok(entries.unwrap_or_default())
    }

    pub async fn entries_for_day(
        &self,
        cache: &ContentCache,
        blog: &Blog,
        day: NaiveDate,
    ) -> Result<EntryDay, LookupError> {
        let key = ContentKey::EntryDay {
            day,
            blog_id: blog.id,
        }
        .to_string();
        let entry_day = cache
            .get_or_insert_for(&key, cache.config().long, || async {
                let Some((from, to)) = day_bounds(blog.time_zone, day) else {
                    return Ok(Some(EntryDay {
                        day,
                        entries: Vec::new(),
                    }));
                };
                let entries = self
                    .repos
                    .entries
                    .list_entries_published_between(blog.id, from, to)
                    .await?;
                Ok::<_, LookupError>(Some(EntryDay {
                    day,
                    entries: visible(entries, Utc::now()),
                }))
            })
            .await?;
        Ok(entry_day.unwrap_or(EntryDay {
            day,
            entries: Vec::new(),
        }))
    }

    pub async fn entries_by_category(
        &self,
        cache: &ContentCache,
        blog: &Blog,
        count: usize,
        category_id: i32,
    ) -> Result<Vec<Entry>, LookupError> {
        let key = ContentKey::EntriesByCategory {
            count,
            category_id,
            blog_id: blog.id,
        }
        .to_string();
        let entries = cache
            .get_or_insert(&key, || async {
                let entries = self
                    .repos
                    .entries
                    .list_entries_by_category(blog.id, category_id, count)
                    .await?;
                Ok::<_, LookupError>(Some(entries))
            })
            .await?;
        Ok(entries.unwrap_or_default())
    }

    pub async fn entries_by_tag(
        &self,
        cache: &ContentCache,
        blog: &Blog,
        count: usize,
        tag: &str,
    ) -> Result<Vec<Entry>, LookupError> {
        let key = ContentKey::EntriesByTag {
            count,
            tag: tag.to_string(),
            blog_id: blog.id,
        }
        .to_string();
        let entries = cache
            .get_or_insert(&key, || async {
                let entries = self
                    .repos
                    .entries
                    .list_entries_by_tag(blog.id, tag, count)
                    .await?;
                Ok::<_, LookupError>(Some(entries))
            })
            .await?;
        Ok(entries.unwrap_or_default())
    }

    /// Most used tags of the blog.
    pub async fn top_tags(
        &self,
        cache: &ContentCache,
        blog: &Blog,
        count: usize,
    ) -> Result<Vec<Tag>, LookupError> {
        let key = ContentKey::TopTags {
            count,
            blog_id: blog.id,
        }
        .to_string();
        let tags = cache
            .get_or_insert_for(&key, cache.config().long, || async {
                let tags = self.repos.tags.list_top_tags(blog.id, count).await?;
                Ok::<_, LookupError>(Some(tags))
            })
            .await?;
        Ok(tags.unwrap_or_default())
    }

    pub async fn feedback(
        &self,
        cache: &ContentCache,
        blog: &Blog,
        entry: &Entry,
    ) -> Result<Vec<FeedbackItem>, LookupError> {
        let key = feedback_key(blog, entry.id);
        let items = cache
            .get_or_insert(&key, || async {
                let items = self.repos.feedback.list_feedback(blog.id, entry.id).await?;
                Ok::<_, LookupError>(Some(items))
            })
            .await?;
        Ok(items.unwrap_or_default())
    }

    /// Drop cached feedback so the next read sees new comments.
    pub fn clear_comment_cache(&self, cache: &ContentCache, blog: &Blog, entry_id: i32) {
        cache.remove(&feedback_key(blog, entry_id));
    }

    pub async fn entry_by_id(
        &self,
        cache: &ContentCache,
        blog: &Blog,
        entry_id: i32,
    ) -> Result<Option<Entry>, LookupError> {
        let key = ContentKey::EntryById {
            entry_id,
            blog_id: blog.id,
        }
        .to_string();
        cache
            .get_or_insert(&key, || async {
                Ok(self.repos.entries.find_entry_by_id(blog.id, entry_id).await?)
            })
            .await
    }

    /// Resolve an entry by its friendly name.
    ///
    /// On a miss the entry is also stored under its by-id key, depending on
    /// the by-name key, so dropping the canonical entry drops both paths.
    /// Entries scheduled in the future are reported as absent.
    pub async fn entry_by_name(
        &self,
        cache: &ContentCache,
        blog: &Blog,
        name: &str,
    ) -> Result<Option<Entry>, LookupError> {
        let key = ContentKey::EntryByName {
            name: name.to_string(),
            blog_id: blog.id,
        }
        .to_string();
        let entry = cache
            .get_or_insert_for(&key, cache.config().medium, || async {
                let Some(entry) = self.repos.entries.find_entry_by_name(blog.id, name).await?
                else {
                    return Ok(None);
                };
                let id_key = ContentKey::EntryById {
                    entry_id: entry.id,
                    blog_id: blog.id,
                }
                .to_string();
                cache.insert(
                    &id_key,
                    Some(entry.clone()),
                    CachePolicy::DependsOn(key.clone()),
                )?;
                Ok::<_, LookupError>(Some(entry))
            })
            .await?;

        Ok(entry.filter(|entry| !entry.is_syndicated_after(Utc::now())))
    }

    /// Resolve a category addressed by id or by name.
    ///
    /// Numeric keys are ids. Names that miss are retried with the friendly
    /// URL separator replaced by spaces when the blog generates friendly URLs.
    pub async fn single_category(
        &self,
        cache: &ContentCache,
        blog: &Blog,
        key: &str,
    ) -> Result<Option<LinkCategory>, LookupError> {
        if is_numeric(key) {
            if let Ok(id) = key.parse() {
                return self.category_by_ref(cache, blog, CategoryRef::Id(id)).await;
            }
        }

        let found = self
            .category_by_ref(cache, blog, CategoryRef::Name(key.to_string()))
            .await?;
        if found.is_some() || !blog.auto_friendly_url_enabled || self.friendly_url_separator.is_empty()
        {
            return Ok(found);
        }

        let spaced = key.replace(self.friendly_url_separator.as_str(), " ");
        if spaced == key {
            return Ok(None);
        }
        debug!(
            target = SOURCE,
            blog = blog.id,
            category = key,
            retry = %spaced,
            "retrying category lookup with friendly name"
        );
        self.category_by_ref(cache, blog, CategoryRef::Name(spaced))
            .await
    }

    async fn category_by_ref(
        &self,
        cache: &ContentCache,
        blog: &Blog,
        category: CategoryRef,
    ) -> Result<Option<LinkCategory>, LookupError> {
        let key = ContentKey::Category {
            category: category.clone(),
            blog_id: blog.id,
        }
        .to_string();
        cache
            .get_or_insert(&key, || async {
                let found = match &category {
                    CategoryRef::Id(id) => {
                        self.repos.categories.find_category_by_id(blog.id, *id).await?
                    }
                    CategoryRef::Name(name) => {
                        self.repos
                            .categories
                            .find_category_by_name(blog.id, name)
                            .await?
                    }
                };
                Ok(found)
            })
            .await
    }

    /// Resolve the entry a request points at: by name first, then by id.
    ///
    /// An entry reached by id that has a non-numeric name yields a redirect
    /// to its canonical, fully qualified URL when `allow_redirect` is set.
    pub async fn entry_from_request(
        &self,
        cache: &ContentCache,
        blog: &Blog,
        request: &EntryRequest,
        allow_redirect: bool,
    ) -> Result<EntryLookup, LookupError> {
        let entry = match request {
            EntryRequest::Slug(slug) if !slug.is_empty() => {
                self.entry_by_name(cache, blog, slug).await?
            }
            EntryRequest::Slug(_) => None,
            EntryRequest::Id(id) => {
                let Some(entry) = self.entry_by_id(cache, blog, *id).await? else {
                    return Ok(EntryLookup::NotFound);
                };
                if allow_redirect && entry.has_canonical_name() {
                    let location = self.urls.fully_qualified(&self.urls.entry(blog, &entry));
                    return Ok(EntryLookup::Redirect { location });
                }
                Some(entry)
            }
        };

        Ok(entry.map_or(EntryLookup::NotFound, EntryLookup::Found))
    }

    /// Recent entries across all aggregated blogs.
    pub async fn aggregate_entries(
        &self,
        cache: &ContentCache,
        count: usize,
    ) -> Result<Vec<AggregateEntry>, LookupError> {
        let key = ContentKey::AggregateEntries { count }.to_string();
        let entries = cache
            .get_or_insert(&key, || async {
                let entries = self
                    .repos
                    .entries
                    .list_aggregate_entries(Utc::now(), count)
                    .await?;
                Ok::<_, LookupError>(Some(entries))
            })
            .await?;
        Ok(entries.unwrap_or_default())
    }
}

fn feedback_key(blog: &Blog, entry_id: i32) -> String {
    ContentKey::Feedback {
        entry_id,
        blog_id: blog.id,
    }
    .to_string()
}

fn visible(entries: Vec<Entry>, now: DateTime<Utc>) -> Vec<Entry> {
    entries
        .into_iter()
        .filter(|entry| !entry.is_syndicated_after(now))
        .collect()
}

fn local_midnight(tz: Tz, day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .map_or_else(|| midnight.and_utc(), |local| local.with_timezone(&Utc))
}

/// UTC bounds of the local calendar day.
fn day_bounds(tz: Tz, day: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let next = day.succ_opt()?;
    Some((local_midnight(tz, day), local_midnight(tz, next)))
}

/// UTC bounds of the local calendar month containing `date`.
fn month_bounds(tz: Tz, date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?;
    let next = first.checked_add_months(Months::new(1))?;
    Some((local_midnight(tz, first), local_midnight(tz, next)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration as ChronoDuration;
    use url::Url;

    use super::*;
    use crate::cache::{CacheConfig, CacheHandle};
    use crate::domain::locale::Locale;
    use crate::infra::memory::MemoryRepository;

    fn blog(friendly: bool) -> Blog {
        Blog {
            id: 1,
            subfolder: "alice".to_string(),
            title: "Alice".to_string(),
            subtitle: String::new(),
            author: "alice".to_string(),
            time_zone: chrono_tz::UTC,
            auto_friendly_url_enabled: friendly,
            is_aggregated: true,
        }
    }

    fn entry(id: i32, name: Option<&str>, at: DateTime<Utc>) -> Entry {
        Entry {
            id,
            blog_id: 1,
            title: format!("Entry {id}"),
            entry_name: name.map(str::to_string),
            body_html: "<p>body</p>".to_string(),
            author: "alice".to_string(),
            date_created: at,
            date_modified: at,
            date_syndicated: Some(at),
            is_active: true,
            categories: vec!["Rust Notes".to_string()],
            tags: vec!["rust".to_string()],
            enclosure: None,
        }
    }

    fn category(id: i32, title: &str) -> LinkCategory {
        LinkCategory {
            id,
            blog_id: 1,
            title: title.to_string(),
            description: None,
            is_active: true,
        }
    }

    fn march(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    struct Fixture {
        repo: Arc<MemoryRepository>,
        lookup: ContentLookup,
        cache: ContentCache,
    }

    async fn fixture() -> Fixture {
        let repo = Arc::new(MemoryRepository::new());
        repo.insert_blog(blog(true)).await;
        repo.upsert_entry(entry(7, Some("hello-world"), march(1))).await;
        repo.upsert_entry(entry(8, None, march(2))).await;
        repo.upsert_entry(entry(9, Some("2024"), march(3))).await;
        repo.insert_category(category(3, "Rust Notes")).await;

        let urls = SiteUrls::new(Url::parse("https://example.com/").unwrap(), "/");
        let lookup = ContentLookup::new(ContentRepos::from_adapter(repo.clone()), urls, "_");
        let cache = CacheHandle::new(CacheConfig::default())
            .for_locale(Locale::parse("en-us").unwrap());
        Fixture {
            repo,
            lookup,
            cache,
        }
    }

    #[tokio::test]
    async fn entry_by_id_is_cached() {
        let fx = fixture().await;
        let first = fx.lookup.entry_by_id(&fx.cache, &blog(true), 8).await.unwrap();
        let second = fx.lookup.entry_by_id(&fx.cache, &blog(true), 8).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fx.repo.query_count(), 1);
    }

    #[tokio::test]
    async fn entry_by_name_registers_dependent_id_key() {
        let fx = fixture().await;
        let blog = blog(true);
        let found = fx
            .lookup
            .entry_by_name(&fx.cache, &blog, "hello-world")
            .await
            .unwrap();
        assert_eq!(found.map(|e| e.id), Some(7));

        let by_id = fx.lookup.entry_by_id(&fx.cache, &blog, 7).await.unwrap();
        assert_eq!(by_id.map(|e| e.id), Some(7));
        assert_eq!(fx.repo.query_count(), 1, "by-id served from cache");

        fx.cache.remove("EntryNamehello-worldBlogId1");
        assert!(fx.cache.get("Entry7BlogId1").is_none());
    }

    #[tokio::test]
    async fn by_id_entry_expires_with_the_by_name_entry() {
        let mut fx = fixture().await;
        fx.cache = CacheHandle::new(CacheConfig {
            short: std::time::Duration::from_millis(30),
            medium: std::time::Duration::from_millis(30),
            ..CacheConfig::default()
        })
        .for_locale(Locale::parse("en-us").unwrap());
        let blog = blog(true);

        fx.lookup
            .entry_by_name(&fx.cache, &blog, "hello-world")
            .await
            .unwrap();
        let mut renamed = entry(7, Some("hello-world"), march(1));
        renamed.title = "Hello Again".to_string();
        fx.repo.upsert_entry(renamed).await;

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;

        let by_id = fx.lookup.entry_by_id(&fx.cache, &blog, 7).await.unwrap();
        assert_eq!(by_id.map(|e| e.title).as_deref(), Some("Hello Again"));
    }

    #[tokio::test]
    async fn future_entries_are_hidden_by_name() {
        let fx = fixture().await;
        let later = Utc::now() + ChronoDuration::days(3);
        fx.repo.upsert_entry(entry(20, Some("soon"), later)).await;

        let found = fx.lookup.entry_by_name(&fx.cache, &blog(true), "soon").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn id_request_with_canonical_name_redirects() {
        let fx = fixture().await;
        let outcome = fx
            .lookup
            .entry_from_request(&fx.cache, &blog(true), &EntryRequest::Id(7), true)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            EntryLookup::Redirect {
                location: "https://example.com/alice/archive/hello-world".to_string()
            }
        );
    }

    #[tokio::test]
    async fn id_request_without_redirect_permission_returns_entry() {
        let fx = fixture().await;
        let outcome = fx
            .lookup
            .entry_from_request(&fx.cache, &blog(true), &EntryRequest::Id(7), false)
            .await
            .unwrap();
        assert!(matches!(outcome, EntryLookup::Found(entry) if entry.id == 7));
    }

    #[tokio::test]
    async fn numeric_or_missing_names_do_not_redirect() {
        let fx = fixture().await;
        let blog = blog(true);
        let numeric = fx
            .lookup
            .entry_from_request(&fx.cache, &blog, &EntryRequest::Id(9), true)
            .await
            .unwrap();
        assert!(matches!(numeric, EntryLookup::Found(entry) if entry.id == 9));

        let unnamed = fx
            .lookup
            .entry_from_request(&fx.cache, &blog, &EntryRequest::Id(8), true)
            .await
            .unwrap();
        assert!(matches!(unnamed, EntryLookup::Found(entry) if entry.id == 8));
    }

    #[tokio::test]
    async fn unknown_requests_are_not_found() {
        let fx = fixture().await;
        let blog = blog(true);
        for request in [
            EntryRequest::Id(404),
            EntryRequest::Slug("missing".to_string()),
            EntryRequest::Slug(String::new()),
        ] {
            let outcome = fx
                .lookup
                .entry_from_request(&fx.cache, &blog, &request, true)
                .await
                .unwrap();
            assert_eq!(outcome, EntryLookup::NotFound);
        }
    }

    #[test]
    fn segments_parse_into_requests() {
        assert_eq!(EntryRequest::from_segment("42"), EntryRequest::Id(42));
        assert_eq!(
            EntryRequest::from_segment("hello"),
            EntryRequest::Slug("hello".to_string())
        );
        assert_eq!(
            EntryRequest::from_segment("99999999999"),
            EntryRequest::Slug("99999999999".to_string())
        );
    }

    #[tokio::test]
    async fn categories_resolve_by_id_name_and_friendly_name() {
        let fx = fixture().await;
        let by_id = fx.lookup.single_category(&fx.cache, &blog(true), "3").await.unwrap();
        assert_eq!(by_id.map(|c| c.id), Some(3));

        let by_name = fx
            .lookup
            .single_category(&fx.cache, &blog(true), "rust notes")
            .await
            .unwrap();
        assert_eq!(by_name.map(|c| c.id), Some(3));

        let friendly = fx
            .lookup
            .single_category(&fx.cache, &blog(true), "Rust_Notes")
            .await
            .unwrap();
        assert_eq!(friendly.map(|c| c.id), Some(3));
    }

    #[tokio::test]
    async fn friendly_retry_requires_blog_opt_in() {
        let fx = fixture().await;
        let found = fx
            .lookup
            .single_category(&fx.cache, &blog(false), "Rust_Notes")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn month_and_day_archives_filter_by_local_calendar() {
        let fx = fixture().await;
        let blog = blog(true);
        let month = fx
            .lookup
            .entries_for_month(&fx.cache, &blog, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
            .await
            .unwrap();
        assert_eq!(month.iter().map(|e| e.id).collect::<Vec<_>>(), vec![9, 8, 7]);

        let day = fx
            .lookup
            .entries_for_day(&fx.cache, &blog, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap())
            .await
            .unwrap();
        assert_eq!(day.entries.len(), 1);
        assert_eq!(day.entries[0].id, 8);
    }

    #[test]
    fn day_bounds_follow_blog_time_zone() {
        let tokyo = chrono_tz::Asia::Tokyo;
        let (from, to) = day_bounds(tokyo, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()).unwrap();
        assert_eq!(from, Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap());
        assert_eq!(to - from, ChronoDuration::days(1));
    }

    #[tokio::test]
    async fn lists_by_category_and_tag() {
        let fx = fixture().await;
        let blog = blog(true);
        let by_category = fx
            .lookup
            .entries_by_category(&fx.cache, &blog, 2, 3)
            .await
            .unwrap();
        assert_eq!(by_category.len(), 2);

        let by_tag = fx
            .lookup
            .entries_by_tag(&fx.cache, &blog, 10, "rust")
            .await
            .unwrap();
        assert_eq!(by_tag.len(), 3);

        let tags = fx.lookup.top_tags(&fx.cache, &blog, 5).await.unwrap();
        assert_eq!(tags[0].name, "rust");
        assert_eq!(tags[0].count, 3);
    }

    #[tokio::test]
    async fn clearing_comment_cache_forces_reload() {
        let fx = fixture().await;
        let blog = blog(true);
        let target = entry(7, Some("hello-world"), march(1));

        assert!(fx.lookup.feedback(&fx.cache, &blog, &target).await.unwrap().is_empty());
        fx.repo
            .insert_feedback(FeedbackItem {
                id: 1,
                entry_id: 7,
                author: "bob".to_string(),
                body: "nice".to_string(),
                source_url: None,
                date_created: march(4),
            })
            .await;
        assert!(fx.lookup.feedback(&fx.cache, &blog, &target).await.unwrap().is_empty());

        fx.lookup.clear_comment_cache(&fx.cache, &blog, 7);
        assert_eq!(fx.lookup.feedback(&fx.cache, &blog, &target).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn aggregate_lists_recent_entries_across_blogs() {
        let fx = fixture().await;
        let items = fx.lookup.aggregate_entries(&fx.cache, 2).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].entry.id, 9);
        assert_eq!(items[0].blog_subfolder, "alice");
    }
}
