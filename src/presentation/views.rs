use crate::application::error::HttpError;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub subtitle: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
    pub canonical: String,
}

/// Shared page frame: branding, stylesheets and the feed icon.
#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub meta: PageMetaView,
    pub stylesheets: Vec<String>,
    pub feed_icon: String,
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub meta: PageMetaView,
    pub stylesheets: Vec<String>,
    pub feed_icon: String,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            meta: chrome.meta,
            stylesheets: chrome.stylesheets,
            feed_icon: chrome.feed_icon,
            content,
        }
    }
}

#[derive(Clone)]
pub struct EntryCard {
    pub title: String,
    pub href: String,
    pub author: String,
    pub published: String,
    pub iso_date: String,
    pub body_html: String,
    /// Owning blog, shown on pages that mix blogs.
    pub blog: Option<BlogLink>,
}

#[derive(Clone)]
pub struct BlogLink {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct TagLink {
    pub label: String,
    pub href: String,
    pub count: i64,
}

pub struct ListingView {
    pub heading: String,
    pub entries: Vec<EntryCard>,
    pub tags: Vec<TagLink>,
    pub has_results: bool,
}

#[derive(Template)]
#[template(path = "listing.html")]
pub struct ListingTemplate {
    pub view: LayoutContext<ListingView>,
}

pub struct EnclosureView {
    pub url: String,
    pub title: String,
    pub mime: String,
    pub size: i64,
}

pub struct FeedbackView {
    pub author: String,
    pub body: String,
    pub published: String,
    pub source_url: Option<String>,
}

pub struct EntryPageView {
    pub entry: EntryCard,
    pub categories: Vec<String>,
    pub tags: Vec<TagLink>,
    pub enclosure: Option<EnclosureView>,
    pub feedback: Vec<FeedbackView>,
}

#[derive(Template)]
#[template(path = "entry.html")]
pub struct EntryTemplate {
    pub view: LayoutContext<EntryPageView>,
}

pub struct AggregatePageView {
    pub entries: Vec<EntryCard>,
    pub blogs: Vec<BlogLink>,
    pub has_results: bool,
}

#[derive(Template)]
#[template(path = "aggregate.html")]
pub struct AggregateTemplate {
    pub view: LayoutContext<AggregatePageView>,
}

/// Stylesheet `<link>` targets for a skin rooted at `app_root`.
pub fn stylesheet_links<'a>(
    app_root: &str,
    files: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let root = if app_root.ends_with('/') {
        app_root.to_string()
    } else {
        format!("{app_root}/")
    };
    files
        .into_iter()
        .map(|file| format!("{root}{}", file.trim_start_matches('/')))
        .collect()
}
