//! In-process repository used for demos and tests.
//!
//! Implements every repository trait over plain vectors. Each query bumps a
//! counter so callers can observe whether a lookup reached the repository.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::application::repos::{
    BlogsRepo, CategoriesRepo, EntriesRepo, FeedbackRepo, RepoError, TagsRepo,
};
use crate::domain::entities::{AggregateEntry, Blog, Entry, FeedbackItem, LinkCategory, Tag};

#[derive(Default)]
struct MemoryState {
    blogs: Vec<Blog>,
    entries: Vec<Entry>,
    categories: Vec<LinkCategory>,
    feedback: Vec<FeedbackItem>,
}

impl MemoryState {
    fn active_entries(&self, blog_id: i32) -> impl Iterator<Item = &Entry> {
        self.entries
            .iter()
            .filter(move |entry| entry.blog_id == blog_id && entry.is_active)
    }
}

#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<MemoryState>,
    queries: AtomicUsize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queries served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::SeqCst);
    }

    pub async fn insert_blog(&self, blog: Blog) {
        let mut state = self.state.write().await;
        state.blogs.retain(|existing| existing.id != blog.id);
        state.blogs.push(blog);
    }

    /// Insert or replace an entry by id.
    pub async fn upsert_entry(&self, entry: Entry) {
        let mut state = self.state.write().await;
        state.entries.retain(|existing| existing.id != entry.id);
        state.entries.push(entry);
    }

    pub async fn insert_category(&self, category: LinkCategory) {
        let mut state = self.state.write().await;
        state.categories.retain(|existing| existing.id != category.id);
        state.categories.push(category);
    }

    pub async fn insert_feedback(&self, item: FeedbackItem) {
        self.state.write().await.feedback.push(item);
    }
}

fn newest_first(entries: &mut [Entry]) {
    entries.sort_by(|a, b| b.published_at().cmp(&a.published_at()));
}

#[async_trait]
impl BlogsRepo for MemoryRepository {
    async fn find_blog_by_subfolder(&self, subfolder: &str) -> Result<Option<Blog>, RepoError> {
        self.record_query();
        let state = self.state.read().await;
        Ok(state
            .blogs
            .iter()
            .find(|blog| blog.subfolder.eq_ignore_ascii_case(subfolder))
            .cloned())
    }

    async fn list_aggregated_blogs(&self) -> Result<Vec<Blog>, RepoError> {
        self.record_query();
        let state = self.state.read().await;
        Ok(state
            .blogs
            .iter()
            .filter(|blog| blog.is_aggregated)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EntriesRepo for MemoryRepository {
    async fn find_entry_by_id(
        &self,
        blog_id: i32,
        entry_id: i32,
    ) -> Result<Option<Entry>, RepoError> {
        self.record_query();
        let state = self.state.read().await;
        Ok(state
            .active_entries(blog_id)
            .find(|entry| entry.id == entry_id)
            .cloned())
    }

    async fn find_entry_by_name(
        &self,
        blog_id: i32,
        name: &str,
    ) -> Result<Option<Entry>, RepoError> {
        self.record_query();
        let state = self.state.read().await;
        Ok(state
            .active_entries(blog_id)
            .find(|entry| entry.entry_name.as_deref() == Some(name))
            .cloned())
    }

    async fn list_entries_published_between(
        &self,
        blog_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Entry>, RepoError> {
        self.record_query();
        let state = self.state.read().await;
        let mut entries: Vec<Entry> = state
            .active_entries(blog_id)
            .filter(|entry| {
                let at = entry.published_at();
                at >= from && at < to
            })
            .cloned()
            .collect();
        newest_first(&mut entries);
        Ok(entries)
    }

    async fn list_entries_by_category(
        &self,
        blog_id: i32,
        category_id: i32,
        limit: usize,
    ) -> Result<Vec<Entry>, RepoError> {
        self.record_query();
        let state = self.state.read().await;
        let Some(category) = state
            .categories
            .iter()
            .find(|category| category.id == category_id && category.blog_id == blog_id)
        else {
            return Ok(Vec::new());
        };

        let mut entries: Vec<Entry> = state
            .active_entries(blog_id)
            .filter(|entry| entry.categories.contains(&category.title))
            .cloned()
            .collect();
        newest_first(&mut entries);
        entries.truncate(limit);
        Ok(entries)
    }

    async fn list_entries_by_tag(
        &self,
        blog_id: i32,
        tag: &str,
        limit: usize,
    ) -> Result<Vec<Entry>, RepoError> {
        self.record_query();
        let state = self.state.read().await;
        let mut entries: Vec<Entry> = state
            .active_entries(blog_id)
            .filter(|entry| entry.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
            .cloned()
            .collect();
        newest_first(&mut entries);
        entries.truncate(limit);
        Ok(entries)
    }

    async fn list_aggregate_entries(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<AggregateEntry>, RepoError> {
        self.record_query();
        let state = self.state.read().await;
        let mut items: Vec<AggregateEntry> = state
            .blogs
            .iter()
            .filter(|blog| blog.is_aggregated)
            .flat_map(|blog| {
                state
                    .active_entries(blog.id)
                    .filter(move |entry| !entry.is_syndicated_after(now))
                    .map(move |entry| AggregateEntry {
                        blog_subfolder: blog.subfolder.clone(),
                        blog_title: blog.title.clone(),
                        entry: entry.clone(),
                    })
            })
            .collect();
        items.sort_by(|a, b| b.entry.published_at().cmp(&a.entry.published_at()));
        items.truncate(limit);
        Ok(items)
    }
}

#[async_trait]
impl CategoriesRepo for MemoryRepository {
    async fn find_category_by_id(
        &self,
        blog_id: i32,
        category_id: i32,
    ) -> Result<Option<LinkCategory>, RepoError> {
        self.record_query();
        let state = self.state.read().await;
        Ok(state
            .categories
            .iter()
            .find(|c| c.blog_id == blog_id && c.id == category_id && c.is_active)
            .cloned())
    }

    async fn find_category_by_name(
        &self,
        blog_id: i32,
        name: &str,
    ) -> Result<Option<LinkCategory>, RepoError> {
        self.record_query();
        let state = self.state.read().await;
        Ok(state
            .categories
            .iter()
            .find(|c| c.blog_id == blog_id && c.is_active && c.title.eq_ignore_ascii_case(name))
            .cloned())
    }
}

#[async_trait]
impl TagsRepo for MemoryRepository {
    async fn list_top_tags(&self, blog_id: i32, limit: usize) -> Result<Vec<Tag>, RepoError> {
        self.record_query();
        let state = self.state.read().await;
        let mut counts: HashMap<String, i64> = HashMap::new();
        for entry in state.active_entries(blog_id) {
            for tag in &entry.tags {
                *counts.entry(tag.to_ascii_lowercase()).or_default() += 1;
            }
        }

        let mut tags: Vec<Tag> = counts
            .into_iter()
            .map(|(name, count)| Tag { name, count })
            .collect();
        tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        tags.truncate(limit);
        Ok(tags)
    }
}

#[async_trait]
impl FeedbackRepo for MemoryRepository {
    async fn list_feedback(
        &self,
        blog_id: i32,
        entry_id: i32,
    ) -> Result<Vec<FeedbackItem>, RepoError> {
        self.record_query();
        let state = self.state.read().await;
        let belongs = state
            .entries
            .iter()
            .any(|entry| entry.id == entry_id && entry.blog_id == blog_id);
        if !belongs {
            return Ok(Vec::new());
        }

        let mut items: Vec<FeedbackItem> = state
            .feedback
            .iter()
            .filter(|item| item.entry_id == entry_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.date_created);
        Ok(items)
    }
}
