use std::sync::Arc;

use crate::application::error::HttpError;
use crate::application::lookup::{ContentLookup, LookupError};
use crate::application::urls::SiteUrls;
use crate::cache::ContentCache;
use crate::config::AggregateSettings;
use crate::domain::entities::AggregateEntry;
use crate::presentation::views::{
    AggregatePageView, BlogLink, BrandView, EntryCard, LayoutChrome, LayoutContext, PageMetaView,
    stylesheet_links,
};

/// The aggregate homepage always uses the simple aggregate skin.
const AGGREGATE_STYLESHEETS: [&str; 3] = [
    "skins/Aggregate/Simple/Style.css",
    "skins/Aggregate/Simple/blue.css",
    "scripts/jquery.lightbox-0.5.css",
];

pub(crate) const FEED_ICON: &str = "feed.svg";

/// Builds the site-wide page listing recent entries of every aggregated blog.
#[derive(Clone)]
pub struct AggregateService {
    lookup: Arc<ContentLookup>,
    settings: AggregateSettings,
}

impl AggregateService {
    pub fn new(lookup: Arc<ContentLookup>, settings: AggregateSettings) -> Self {
        Self { lookup, settings }
    }

    fn urls(&self) -> &SiteUrls {
        self.lookup.urls()
    }

    pub fn chrome(&self) -> LayoutChrome {
        let urls = self.urls();
        let home = urls.path("");
        LayoutChrome {
            brand: BrandView {
                title: self.settings.title.clone(),
                subtitle: String::new(),
                href: home.clone(),
            },
            meta: PageMetaView {
                title: self.settings.title.clone(),
                canonical: urls.fully_qualified(&home),
            },
            stylesheets: stylesheet_links(urls.app_root(), AGGREGATE_STYLESHEETS),
            feed_icon: urls.image(FEED_ICON),
        }
    }

    pub async fn page(
        &self,
        cache: &ContentCache,
    ) -> Result<LayoutContext<AggregatePageView>, HttpError> {
        let entries = self
            .lookup
            .aggregate_entries(cache, self.settings.entry_count)
            .await?;
        let blogs = self
            .lookup
            .repos()
            .blogs
            .list_aggregated_blogs()
            .await
            .map_err(LookupError::from)?;

        let urls = self.urls();
        let cards: Vec<EntryCard> = entries.iter().map(|item| self.card(item)).collect();
        let blogs = blogs
            .iter()
            .map(|blog| BlogLink {
                title: blog.title.clone(),
                href: urls.blog(blog),
            })
            .collect();

        Ok(LayoutContext::new(
            self.chrome(),
            AggregatePageView {
                has_results: !cards.is_empty(),
                entries: cards,
                blogs,
            },
        ))
    }

    fn card(&self, item: &AggregateEntry) -> EntryCard {
        let urls = self.urls();
        let published = item.entry.published_at();
        EntryCard {
            title: item.entry.title.clone(),
            href: urls.entry_for_subfolder(&item.blog_subfolder, &item.entry),
            author: item.entry.author.clone(),
            published: published.format("%B %-d, %Y").to_string(),
            iso_date: published.to_rfc3339(),
            body_html: item.entry.body_html.clone(),
            blog: Some(BlogLink {
                title: item.blog_title.clone(),
                href: urls.path(&format!("{}/", item.blog_subfolder)),
            }),
        }
    }
}
