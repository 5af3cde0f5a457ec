use async_trait::async_trait;
use chrono_tz::Tz;

use crate::{
    application::repos::{BlogsRepo, RepoError},
    domain::entities::Blog,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct BlogRow {
    id: i32,
    subfolder: String,
    title: String,
    subtitle: String,
    author: String,
    time_zone: String,
    auto_friendly_url_enabled: bool,
    is_aggregated: bool,
}

impl TryFrom<BlogRow> for Blog {
    type Error = RepoError;

    fn try_from(row: BlogRow) -> Result<Self, Self::Error> {
        let time_zone = row.time_zone.parse::<Tz>().map_err(|err| {
            RepoError::from_persistence(format!(
                "blog {} has invalid time zone `{}`: {err}",
                row.id, row.time_zone
            ))
        })?;

        Ok(Self {
            id: row.id,
            subfolder: row.subfolder,
            title: row.title,
            subtitle: row.subtitle,
            author: row.author,
            time_zone,
            auto_friendly_url_enabled: row.auto_friendly_url_enabled,
            is_aggregated: row.is_aggregated,
        })
    }
}

const BLOG_COLUMNS: &str = "SELECT id, subfolder, title, subtitle, author, time_zone, \
    auto_friendly_url_enabled, is_aggregated FROM lectern_blogs";

#[async_trait]
impl BlogsRepo for PostgresRepositories {
    async fn find_blog_by_subfolder(&self, subfolder: &str) -> Result<Option<Blog>, RepoError> {
        let sql = format!("{BLOG_COLUMNS} WHERE LOWER(subfolder) = LOWER($1)");
        let row = sqlx::query_as::<_, BlogRow>(&sql)
            .bind(subfolder)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(Blog::try_from).transpose()
    }

    async fn list_aggregated_blogs(&self) -> Result<Vec<Blog>, RepoError> {
        let sql = format!("{BLOG_COLUMNS} WHERE is_aggregated ORDER BY title, id");
        let rows = sqlx::query_as::<_, BlogRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(Blog::try_from).collect()
    }
}
