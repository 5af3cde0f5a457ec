use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    application::repos::{FeedbackRepo, RepoError},
    domain::entities::FeedbackItem,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct FeedbackRow {
    id: i32,
    entry_id: i32,
    author: String,
    body: String,
    source_url: Option<String>,
    date_created: DateTime<Utc>,
}

#[async_trait]
impl FeedbackRepo for PostgresRepositories {
    async fn list_feedback(
        &self,
        blog_id: i32,
        entry_id: i32,
    ) -> Result<Vec<FeedbackItem>, RepoError> {
        let rows = sqlx::query_as::<_, FeedbackRow>(
            r#"
            SELECT f.id, f.entry_id, f.author, f.body, f.source_url, f.date_created
            FROM lectern_feedback f
            INNER JOIN lectern_entries e ON e.id = f.entry_id
            WHERE e.blog_id = $1 AND f.entry_id = $2 AND f.is_approved
            ORDER BY f.date_created, f.id
            "#,
        )
        .bind(blog_id)
        .bind(entry_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| FeedbackItem {
                id: row.id,
                entry_id: row.entry_id,
                author: row.author,
                body: row.body,
                source_url: row.source_url,
                date_created: row.date_created,
            })
            .collect())
    }
}
