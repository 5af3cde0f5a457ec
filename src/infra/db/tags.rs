use async_trait::async_trait;

use crate::{
    application::repos::{RepoError, TagsRepo},
    domain::entities::Tag,
};

use super::{PostgresRepositories, map_sqlx_error, util::limit};

#[derive(sqlx::FromRow)]
struct TagRow {
    name: String,
    count: i64,
}

#[async_trait]
impl TagsRepo for PostgresRepositories {
    async fn list_top_tags(&self, blog_id: i32, count: usize) -> Result<Vec<Tag>, RepoError> {
        let rows = sqlx::query_as::<_, TagRow>(
            r#"
            SELECT LOWER(t.tag_name) AS name, COUNT(*) AS count
            FROM lectern_entry_tags t
            INNER JOIN lectern_entries e ON e.id = t.entry_id
            WHERE e.blog_id = $1 AND e.is_active
            GROUP BY LOWER(t.tag_name)
            ORDER BY count DESC, name
            LIMIT $2
            "#,
        )
        .bind(blog_id)
        .bind(limit(count))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| Tag {
                name: row.name,
                count: row.count,
            })
            .collect())
    }
}
