use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    application::repos::{EntriesRepo, RepoError},
    domain::entities::{AggregateEntry, Enclosure, Entry},
};

use super::{PostgresRepositories, map_sqlx_error, util::limit};

macro_rules! entry_select {
    () => {
        "SELECT e.id, e.blog_id, e.title, e.entry_name, e.body_html, e.author, \
            e.date_created, e.date_modified, e.date_syndicated, e.is_active, \
            e.enclosure_url, e.enclosure_title, e.enclosure_size, \
            ARRAY(SELECT c.title::text FROM lectern_entry_categories ec \
                INNER JOIN lectern_link_categories c ON c.id = ec.category_id \
                WHERE ec.entry_id = e.id AND c.is_active ORDER BY c.title) AS categories, \
            ARRAY(SELECT t.tag_name::text FROM lectern_entry_tags t \
                WHERE t.entry_id = e.id ORDER BY t.tag_name) AS tags "
    };
}

const FIND_BY_ID: &str = concat!(
    entry_select!(),
    "FROM lectern_entries e WHERE e.blog_id = $1 AND e.id = $2 AND e.is_active"
);

const FIND_BY_NAME: &str = concat!(
    entry_select!(),
    "FROM lectern_entries e WHERE e.blog_id = $1 AND e.entry_name = $2 AND e.is_active"
);

const PUBLISHED_BETWEEN: &str = concat!(
    entry_select!(),
    "FROM lectern_entries e WHERE e.blog_id = $1 AND e.is_active \
     AND COALESCE(e.date_syndicated, e.date_created) >= $2 \
     AND COALESCE(e.date_syndicated, e.date_created) < $3 \
     ORDER BY COALESCE(e.date_syndicated, e.date_created) DESC, e.id DESC"
);

const BY_CATEGORY: &str = concat!(
    entry_select!(),
    "FROM lectern_entries e \
     INNER JOIN lectern_entry_categories ec ON ec.entry_id = e.id \
     WHERE e.blog_id = $1 AND ec.category_id = $2 AND e.is_active \
     ORDER BY COALESCE(e.date_syndicated, e.date_created) DESC, e.id DESC LIMIT $3"
);

const BY_TAG: &str = concat!(
    entry_select!(),
    "FROM lectern_entries e WHERE e.blog_id = $1 AND e.is_active \
     AND EXISTS (SELECT 1 FROM lectern_entry_tags t \
        WHERE t.entry_id = e.id AND LOWER(t.tag_name) = LOWER($2)) \
     ORDER BY COALESCE(e.date_syndicated, e.date_created) DESC, e.id DESC LIMIT $3"
);

const AGGREGATE: &str = concat!(
    entry_select!(),
    ", b.subfolder AS blog_subfolder, b.title AS blog_title \
     FROM lectern_entries e INNER JOIN lectern_blogs b ON b.id = e.blog_id \
     WHERE b.is_aggregated AND e.is_active \
     AND COALESCE(e.date_syndicated, e.date_created) <= $1 \
     ORDER BY COALESCE(e.date_syndicated, e.date_created) DESC, e.id DESC LIMIT $2"
);

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: i32,
    blog_id: i32,
    title: String,
    entry_name: Option<String>,
    body_html: String,
    author: String,
    date_created: DateTime<Utc>,
    date_modified: DateTime<Utc>,
    date_syndicated: Option<DateTime<Utc>>,
    is_active: bool,
    enclosure_url: Option<String>,
    enclosure_title: Option<String>,
    enclosure_size: Option<i64>,
    categories: Vec<String>,
    tags: Vec<String>,
}

impl From<EntryRow> for Entry {
    fn from(row: EntryRow) -> Self {
        let enclosure = row.enclosure_url.map(|url| Enclosure {
            title: row.enclosure_title.unwrap_or_else(|| url.clone()),
            size: row.enclosure_size.unwrap_or_default(),
            url,
        });

        Self {
            id: row.id,
            blog_id: row.blog_id,
            title: row.title,
            entry_name: row.entry_name,
            body_html: row.body_html,
            author: row.author,
            date_created: row.date_created,
            date_modified: row.date_modified,
            date_syndicated: row.date_syndicated,
            is_active: row.is_active,
            categories: row.categories,
            tags: row.tags,
            enclosure,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AggregateRow {
    #[sqlx(flatten)]
    entry: EntryRow,
    blog_subfolder: String,
    blog_title: String,
}

#[async_trait]
impl EntriesRepo for PostgresRepositories {
    async fn find_entry_by_id(
        &self,
        blog_id: i32,
        entry_id: i32,
    ) -> Result<Option<Entry>, RepoError> {
        let row = sqlx::query_as::<_, EntryRow>(FIND_BY_ID)
            .bind(blog_id)
            .bind(entry_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(Entry::from))
    }

    async fn find_entry_by_name(
        &self,
        blog_id: i32,
        name: &str,
    ) -> Result<Option<Entry>, RepoError> {
        let row = sqlx::query_as::<_, EntryRow>(FIND_BY_NAME)
            .bind(blog_id)
            .bind(name)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(Entry::from))
    }

    async fn list_entries_published_between(
        &self,
        blog_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Entry>, RepoError> {
        let rows = sqlx::query_as::<_, EntryRow>(PUBLISHED_BETWEEN)
            .bind(blog_id)
            .bind(from)
            .bind(to)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Entry::from).collect())
    }

    async fn list_entries_by_category(
        &self,
        blog_id: i32,
        category_id: i32,
        count: usize,
    ) -> Result<Vec<Entry>, RepoError> {
        let rows = sqlx::query_as::<_, EntryRow>(BY_CATEGORY)
            .bind(blog_id)
            .bind(category_id)
            .bind(limit(count))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Entry::from).collect())
    }

    async fn list_entries_by_tag(
        &self,
        blog_id: i32,
        tag: &str,
        count: usize,
    ) -> Result<Vec<Entry>, RepoError> {
        let rows = sqlx::query_as::<_, EntryRow>(BY_TAG)
            .bind(blog_id)
            .bind(tag)
            .bind(limit(count))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Entry::from).collect())
    }

    async fn list_aggregate_entries(
        &self,
        now: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<AggregateEntry>, RepoError> {
        let rows = sqlx::query_as::<_, AggregateRow>(AGGREGATE)
            .bind(now)
            .bind(limit(count))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| AggregateEntry {
                blog_subfolder: row.blog_subfolder,
                blog_title: row.blog_title,
                entry: Entry::from(row.entry),
            })
            .collect())
    }
}
