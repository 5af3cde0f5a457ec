//! Repository traits describing persistence adapters.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::entities::{AggregateEntry, Blog, Entry, FeedbackItem, LinkCategory, Tag};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait BlogsRepo: Send + Sync {
    async fn find_blog_by_subfolder(&self, subfolder: &str) -> Result<Option<Blog>, RepoError>;

    async fn list_aggregated_blogs(&self) -> Result<Vec<Blog>, RepoError>;
}

/// Entry queries. Every method returns active entries only.
#[async_trait]
pub trait EntriesRepo: Send + Sync {
    async fn find_entry_by_id(&self, blog_id: i32, entry_id: i32)
    -> Result<Option<Entry>, RepoError>;

    async fn find_entry_by_name(&self, blog_id: i32, name: &str)
    -> Result<Option<Entry>, RepoError>;

    /// Entries published in `[from, to)`, newest first.
    async fn list_entries_published_between(
        &self,
        blog_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Entry>, RepoError>;

    async fn list_entries_by_category(
        &self,
        blog_id: i32,
        category_id: i32,
        limit: usize,
    ) -> Result<Vec<Entry>, RepoError>;

    async fn list_entries_by_tag(
        &self,
        blog_id: i32,
        tag: &str,
        limit: usize,
    ) -> Result<Vec<Entry>, RepoError>;

    /// Most recent entries of every aggregated blog published at or before `now`.
    async fn list_aggregate_entries(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<AggregateEntry>, RepoError>;
}

#[async_trait]
pub trait CategoriesRepo: Send + Sync {
    async fn find_category_by_id(
        &self,
        blog_id: i32,
        category_id: i32,
    ) -> Result<Option<LinkCategory>, RepoError>;

    /// Case-insensitive match on the category title.
    async fn find_category_by_name(
        &self,
        blog_id: i32,
        name: &str,
    ) -> Result<Option<LinkCategory>, RepoError>;
}

#[async_trait]
pub trait TagsRepo: Send + Sync {
    /// Tags ordered by usage, most used first.
    async fn list_top_tags(&self, blog_id: i32, limit: usize) -> Result<Vec<Tag>, RepoError>;
}

#[async_trait]
pub trait FeedbackRepo: Send + Sync {
    /// Approved feedback for an entry, oldest first.
    async fn list_feedback(&self, blog_id: i32, entry_id: i32)
    -> Result<Vec<FeedbackItem>, RepoError>;
}

/// The repositories a request may consult, usually all backed by one adapter.
#[derive(Clone)]
pub struct ContentRepos {
    pub blogs: Arc<dyn BlogsRepo>,
    pub entries: Arc<dyn EntriesRepo>,
    pub categories: Arc<dyn CategoriesRepo>,
    pub tags: Arc<dyn TagsRepo>,
    pub feedback: Arc<dyn FeedbackRepo>,
}

impl ContentRepos {
    pub fn from_adapter<R>(adapter: Arc<R>) -> Self
    where
        R: BlogsRepo + EntriesRepo + CategoriesRepo + TagsRepo + FeedbackRepo + 'static,
    {
        Self {
            blogs: adapter.clone(),
            entries: adapter.clone(),
            categories: adapter.clone(),
            tags: adapter.clone(),
            feedback: adapter,
        }
    }
}
