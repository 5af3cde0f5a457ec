use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::application::aggregate::FEED_ICON;
use crate::application::error::HttpError;
use crate::application::lookup::{ContentLookup, EntryLookup, EntryRequest, LookupError};
use crate::application::urls::SiteUrls;
use crate::cache::ContentCache;
use crate::config::SiteSettings;
use crate::domain::entities::{Blog, Entry, FeedbackItem, Tag};
use crate::infra::http::helpers::mime_type;
use crate::presentation::views::{
    BrandView, EnclosureView, EntryCard, EntryPageView, FeedbackView, LayoutChrome,
    LayoutContext, ListingView, PageMetaView, TagLink, stylesheet_links,
};

const BLOG_STYLESHEETS: [&str; 1] = ["skins/Aggregate/Simple/Style.css"];

/// Result of rendering an entry page.
pub enum EntryPage {
    Found {
        view: LayoutContext<EntryPageView>,
        last_modified: DateTime<Utc>,
    },
    Redirect {
        location: String,
    },
    NotFound,
}

/// Per-blog pages: home, entries, archives, categories and tags.
#[derive(Clone)]
pub struct BlogPageService {
    lookup: Arc<ContentLookup>,
    list_count: usize,
    tag_cloud_count: usize,
}

impl BlogPageService {
    pub fn new(lookup: Arc<ContentLookup>, site: &SiteSettings) -> Self {
        Self {
            lookup,
            list_count: site.list_count,
            tag_cloud_count: site.tag_cloud_count,
        }
    }

    fn urls(&self) -> &SiteUrls {
        self.lookup.urls()
    }

    pub async fn find_blog(&self, subfolder: &str) -> Result<Option<Blog>, HttpError> {
        Ok(self
            .lookup
            .repos()
            .blogs
            .find_blog_by_subfolder(subfolder)
            .await
            .map_err(LookupError::from)?)
    }

    fn chrome(&self, blog: &Blog, title: String, path: &str) -> LayoutChrome {
        let urls = self.urls();
        LayoutChrome {
            brand: BrandView {
                title: blog.title.clone(),
                subtitle: blog.subtitle.clone(),
                href: urls.blog(blog),
            },
            meta: PageMetaView {
                title,
                canonical: urls.fully_qualified(path),
            },
            stylesheets: stylesheet_links(urls.app_root(), BLOG_STYLESHEETS),
            feed_icon: urls.image(FEED_ICON),
        }
    }

    /// Entries of the current month with the blog's tag cloud.
    pub async fn home(
        &self,
        cache: &ContentCache,
        blog: &Blog,
    ) -> Result<LayoutContext<ListingView>, HttpError> {
        let today = blog.now().date_naive();
        let entries = self.lookup.entries_for_month(cache, blog, today).await?;
        let heading = today.format("%B %Y").to_string();
        let path = self.urls().blog(blog);
        self.listing(cache, blog, blog.title.clone(), heading, &path, &entries)
            .await
    }

    pub async fn entry(
        &self,
        cache: &ContentCache,
        blog: &Blog,
        segment: &str,
    ) -> Result<EntryPage, HttpError> {
        let request = EntryRequest::from_segment(segment);
        let entry = match self
            .lookup
            .entry_from_request(cache, blog, &request, true)
            .await?
        {
            EntryLookup::Found(entry) => entry,
            EntryLookup::Redirect { location } => return Ok(EntryPage::Redirect { location }),
            EntryLookup::NotFound => return Ok(EntryPage::NotFound),
        };

        let feedback = self.lookup.feedback(cache, blog, &entry).await?;
        let path = self.urls().entry(blog, &entry);
        let chrome = self.chrome(blog, entry.title.clone(), &path);
        let view = EntryPageView {
            entry: self.card(blog, &entry),
            categories: entry.categories.clone(),
            tags: entry
                .tags
                .iter()
                .map(|name| self.tag_link(blog, name, 0))
                .collect(),
            enclosure: entry.enclosure.as_ref().map(|enclosure| EnclosureView {
                url: enclosure.url.clone(),
                title: enclosure.title.clone(),
                mime: mime_type(&enclosure.url).to_string(),
                size: enclosure.size,
            }),
            feedback: feedback.iter().map(|item| feedback_view(blog, item)).collect(),
        };

        Ok(EntryPage::Found {
            last_modified: entry.date_modified,
            view: LayoutContext::new(chrome, view),
        })
    }

    /// Month archive; `None` for a month that does not exist.
    pub async fn month(
        &self,
        cache: &ContentCache,
        blog: &Blog,
        year: i32,
        month: u32,
    ) -> Result<Option<LayoutContext<ListingView>>, HttpError> {
        let Some(date) = NaiveDate::from_ymd_opt(year, month, 1) else {
            return Ok(None);
        };
        let entries = self.lookup.entries_for_month(cache, blog, date).await?;
        let heading = date.format("%B %Y").to_string();
        let path = self.urls().month(blog, year, month);
        self.listing(cache, blog, heading.clone(), heading, &path, &entries)
            .await
            .map(Some)
    }

    pub async fn day(
        &self,
        cache: &ContentCache,
        blog: &Blog,
        day: NaiveDate,
    ) -> Result<LayoutContext<ListingView>, HttpError> {
        let entry_day = self.lookup.entries_for_day(cache, blog, day).await?;
        let heading = day.format("%A, %B %-d, %Y").to_string();
        let path = self.urls().day(blog, day);
        self.listing(cache, blog, heading.clone(), heading, &path, &entry_day.entries)
            .await
    }

    /// Category listing; `None` when no active category matches `key`.
    pub async fn category(
        &self,
        cache: &ContentCache,
        blog: &Blog,
        key: &str,
    ) -> Result<Option<LayoutContext<ListingView>>, HttpError> {
        let Some(category) = self.lookup.single_category(cache, blog, key).await? else {
            return Ok(None);
        };
        let entries = self
            .lookup
            .entries_by_category(cache, blog, self.list_count, category.id)
            .await?;
        let path = self.urls().category(blog, &category);
        self.listing(
            cache,
            blog,
            category.title.clone(),
            category.title.clone(),
            &path,
            &entries,
        )
        .await
        .map(Some)
    }

    pub async fn tag(
        &self,
        cache: &ContentCache,
        blog: &Blog,
        tag: &str,
    ) -> Result<LayoutContext<ListingView>, HttpError> {
        let entries = self
            .lookup
            .entries_by_tag(cache, blog, self.list_count, tag)
            .await?;
        let path = self.urls().tag(blog, tag);
        let heading = format!("Tagged \u{201c}{tag}\u{201d}");
        self.listing(cache, blog, heading.clone(), heading, &path, &entries)
            .await
    }

    async fn listing(
        &self,
        cache: &ContentCache,
        blog: &Blog,
        title: String,
        heading: String,
        path: &str,
        entries: &[Entry],
    ) -> Result<LayoutContext<ListingView>, HttpError> {
        let tags = self
            .lookup
            .top_tags(cache, blog, self.tag_cloud_count)
            .await?;
        let cards: Vec<EntryCard> = entries.iter().map(|entry| self.card(blog, entry)).collect();
        let view = ListingView {
            heading,
            has_results: !cards.is_empty(),
            entries: cards,
            tags: tags.iter().map(|tag| self.cloud_link(blog, tag)).collect(),
        };
        Ok(LayoutContext::new(self.chrome(blog, title, path), view))
    }

    fn card(&self, blog: &Blog, entry: &Entry) -> EntryCard {
        let published = entry.published_at().with_timezone(&blog.time_zone);
        EntryCard {
            title: entry.title.clone(),
            href: self.urls().entry(blog, entry),
            author: entry.author.clone(),
            published: published.format("%B %-d, %Y %H:%M").to_string(),
            iso_date: published.to_rfc3339(),
            body_html: entry.body_html.clone(),
            blog: None,
        }
    }

    fn cloud_link(&self, blog: &Blog, tag: &Tag) -> TagLink {
        self.tag_link(blog, &tag.name, tag.count)
    }

    fn tag_link(&self, blog: &Blog, name: &str, count: i64) -> TagLink {
        TagLink {
            label: name.to_string(),
            href: self.urls().tag(blog, name),
            count,
        }
    }
}

fn feedback_view(blog: &Blog, item: &FeedbackItem) -> FeedbackView {
    FeedbackView {
        author: item.author.clone(),
        body: item.body.clone(),
        published: item
            .date_created
            .with_timezone(&blog.time_zone)
            .format("%B %-d, %Y %H:%M")
            .to_string(),
        source_url: item.source_url.clone(),
    }
}
