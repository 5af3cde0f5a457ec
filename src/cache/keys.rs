//! Cache key definitions.
//!
//! Each lookup owns one literal template, so keys for different kinds of
//! content never collide. The locale suffix is added by `ContentCache`, not
//! here.

use std::fmt;

use chrono::{Datelike, NaiveDate};

/// How a link category was addressed in the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CategoryRef {
    Id(i32),
    Name(String),
}

impl fmt::Display for CategoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryRef::Id(id) => write!(f, "{id}"),
            CategoryRef::Name(name) => f.write_str(name),
        }
    }
}

/// Content cache keys scoped to a blog (or, for the aggregate, to the site).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContentKey {
    EntriesByCategory {
        count: usize,
        category_id: i32,
        blog_id: i32,
    },
    EntryById {
        entry_id: i32,
        blog_id: i32,
    },
    EntryByName {
        name: String,
        blog_id: i32,
    },
    EntryDay {
        day: NaiveDate,
        blog_id: i32,
    },
    EntryMonth {
        year: i32,
        month: u32,
        blog_id: i32,
    },
    EntriesByTag {
        count: usize,
        tag: String,
        blog_id: i32,
    },
    Category {
        category: CategoryRef,
        blog_id: i32,
    },
    Feedback {
        entry_id: i32,
        blog_id: i32,
    },
    TopTags {
        count: usize,
        blog_id: i32,
    },
    AggregateEntries {
        count: usize,
    },
}

impl ContentKey {
    /// Month key for the month containing `date`.
    pub fn entry_month(date: NaiveDate, blog_id: i32) -> Self {
        Self::EntryMonth {
            year: date.year(),
            month: date.month(),
            blog_id,
        }
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKey::EntriesByCategory {
                count,
                category_id,
                blog_id,
            } => write!(f, "EC:Count{count}Category{category_id}BlogId{blog_id}"),
            ContentKey::EntryById { entry_id, blog_id } => {
                write!(f, "Entry{entry_id}BlogId{blog_id}")
            }
            ContentKey::EntryByName { name, blog_id } => {
                write!(f, "EntryName{name}BlogId{blog_id}")
            }
            ContentKey::EntryDay { day, blog_id } => {
                write!(f, "EntryDay:Date{}Blog{blog_id}", day.format("%Y%m%d"))
            }
            ContentKey::EntryMonth {
                year,
                month,
                blog_id,
            } => write!(f, "EntryMonth:Date{year:04}{month:02}Blog{blog_id}"),
            ContentKey::EntriesByTag {
                count,
                tag,
                blog_id,
            } => write!(f, "ET:Count{count}Tag{tag}BlogId{blog_id}"),
            ContentKey::Category { category, blog_id } => {
                write!(f, "LC{category}BlogId{blog_id}")
            }
            ContentKey::Feedback { entry_id, blog_id } => {
                write!(f, "ParentEntry:Comments:EntryID{entry_id}:BlogId{blog_id}")
            }
            ContentKey::TopTags { count, blog_id } => write!(f, "TagsCount{count}BlogId{blog_id}"),
            ContentKey::AggregateEntries { count } => write!(f, "Aggregate:Entries:Count{count}"),
        }
    }
}
