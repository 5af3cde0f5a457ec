//! Records exchanged between repositories, the cache and the public surface.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use super::text::is_numeric;

/// One blog (tenant) of a multi-blog deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct Blog {
    pub id: i32,
    /// Path segment the blog is served under, e.g. `alice` for `/alice/...`.
    pub subfolder: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub time_zone: Tz,
    /// When set, category lookups fall back to friendly-URL names.
    pub auto_friendly_url_enabled: bool,
    /// Whether the blog's entries appear on the aggregate page.
    pub is_aggregated: bool,
}

impl Blog {
    /// Current local time in the blog's configured time zone.
    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.time_zone)
    }

    /// Calendar day `instant` falls on for this blog's readers.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.time_zone).date_naive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enclosure {
    pub url: String,
    pub title: String,
    pub size: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: i32,
    pub blog_id: i32,
    pub title: String,
    /// Friendly name used in canonical URLs. Optional for legacy entries.
    pub entry_name: Option<String>,
    pub body_html: String,
    pub author: String,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    /// Publication date. Entries syndicated in the future are not yet visible.
    pub date_syndicated: Option<DateTime<Utc>>,
    pub is_active: bool,
    /// Titles of the link categories the entry is filed under.
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub enclosure: Option<Enclosure>,
}

impl Entry {
    /// True when the entry name can serve as a canonical URL segment.
    ///
    /// Numeric names are excluded because they are indistinguishable from ids
    /// and would make an id lookup redirect to itself.
    pub fn has_canonical_name(&self) -> bool {
        self.entry_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty() && !is_numeric(name))
    }

    /// URL segment for this entry: its name when present, otherwise its id.
    pub fn url_segment(&self) -> String {
        match self.entry_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => self.id.to_string(),
        }
    }

    /// Whether the entry is scheduled after `now`.
    pub fn is_syndicated_after(&self, now: DateTime<Utc>) -> bool {
        self.date_syndicated.is_some_and(|at| at > now)
    }

    /// Timestamp the entry was published at, falling back to its creation.
    pub fn published_at(&self) -> DateTime<Utc> {
        self.date_syndicated.unwrap_or(self.date_created)
    }
}

/// Entries published on one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDay {
    pub day: NaiveDate,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkCategory {
    pub id: i32,
    pub blog_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackItem {
    pub id: i32,
    pub entry_id: i32,
    pub author: String,
    pub body: String,
    pub source_url: Option<String>,
    pub date_created: DateTime<Utc>,
}

/// An entry listed on the aggregate page together with its owning blog.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateEntry {
    pub blog_subfolder: String,
    pub blog_title: String,
    pub entry: Entry,
}
