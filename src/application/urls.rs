//! Site-relative and absolute URLs for blogs, entries and archives.

use chrono::NaiveDate;
use url::Url;

use crate::config::SiteSettings;
use crate::domain::entities::{Blog, Entry, LinkCategory};
use crate::infra::http::helpers::expand_tilde_path;

#[derive(Debug, Clone)]
pub struct SiteUrls {
    public_url: Url,
    app_root: String,
}

impl SiteUrls {
    pub fn new(public_url: Url, app_root: impl Into<String>) -> Self {
        Self {
            public_url,
            app_root: app_root.into(),
        }
    }

    pub fn from_settings(site: &SiteSettings) -> Self {
        Self::new(site.public_url.clone(), site.app_root.clone())
    }

    pub fn app_root(&self) -> &str {
        &self.app_root
    }

    /// Path below the application root.
    pub fn path(&self, relative: &str) -> String {
        expand_tilde_path(
            &format!("~/{}", relative.trim_start_matches('/')),
            &self.app_root,
        )
    }

    pub fn blog(&self, blog: &Blog) -> String {
        self.path(&format!("{}/", blog.subfolder))
    }

    pub fn entry(&self, blog: &Blog, entry: &Entry) -> String {
        self.path(&format!("{}/archive/{}", blog.subfolder, entry.url_segment()))
    }

    pub fn entry_for_subfolder(&self, subfolder: &str, entry: &Entry) -> String {
        self.path(&format!("{subfolder}/archive/{}", entry.url_segment()))
    }

    pub fn month(&self, blog: &Blog, year: i32, month: u32) -> String {
        self.path(&format!("{}/archive/{year:04}/{month:02}", blog.subfolder))
    }

    pub fn day(&self, blog: &Blog, day: NaiveDate) -> String {
        self.path(&format!(
            "{}/archive/{}",
            blog.subfolder,
            day.format("%Y/%m/%d")
        ))
    }

    pub fn category(&self, blog: &Blog, category: &LinkCategory) -> String {
        self.path(&format!("{}/category/{}", blog.subfolder, category.id))
    }

    pub fn tag(&self, blog: &Blog, tag: &str) -> String {
        self.path(&format!("{}/tags/{tag}", blog.subfolder))
    }

    pub fn skin(&self, relative: &str) -> String {
        self.path(&format!("skins/{}", relative.trim_start_matches('/')))
    }

    /// Image under the shared `images/` folder.
    pub fn image(&self, name: &str) -> String {
        expand_tilde_path(&format!("~/images/{name}"), &self.app_root)
    }

    /// Absolute URL for a site path.
    pub fn fully_qualified(&self, path: &str) -> String {
        let mut url = self.public_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.set_path(path);
        url.to_string()
    }
}
