use async_trait::async_trait;

use crate::{
    application::repos::{CategoriesRepo, RepoError},
    domain::entities::LinkCategory,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    blog_id: i32,
    title: String,
    description: Option<String>,
    is_active: bool,
}

impl From<CategoryRow> for LinkCategory {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            blog_id: row.blog_id,
            title: row.title,
            description: row.description,
            is_active: row.is_active,
        }
    }
}

#[async_trait]
impl CategoriesRepo for PostgresRepositories {
    async fn find_category_by_id(
        &self,
        blog_id: i32,
        category_id: i32,
    ) -> Result<Option<LinkCategory>, RepoError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, blog_id, title, description, is_active
            FROM lectern_link_categories
            WHERE blog_id = $1 AND id = $2 AND is_active
            "#,
        )
        .bind(blog_id)
        .bind(category_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(LinkCategory::from))
    }

    async fn find_category_by_name(
        &self,
        blog_id: i32,
        name: &str,
    ) -> Result<Option<LinkCategory>, RepoError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, blog_id, title, description, is_active
            FROM lectern_link_categories
            WHERE blog_id = $1 AND LOWER(title) = LOWER($2) AND is_active
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(blog_id)
        .bind(name)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(LinkCategory::from))
    }
}
