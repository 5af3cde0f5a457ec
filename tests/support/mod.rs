#![allow(dead_code)]

use std::sync::Arc;

use axum::{Router, body::Body, http::Request, response::Response};
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;
use url::Url;

use lectern::application::{
    aggregate::AggregateService, blog::BlogPageService, lookup::ContentLookup,
    repos::ContentRepos, urls::SiteUrls,
};
use lectern::cache::{CacheConfig, CacheHandle};
use lectern::config::Settings;
use lectern::domain::entities::{Blog, Enclosure, Entry, FeedbackItem, LinkCategory};
use lectern::infra::{
    http::{HttpState, build_router},
    memory::MemoryRepository,
};

pub struct TestSite {
    pub repo: Arc<MemoryRepository>,
    pub cache: CacheHandle,
    pub router: Router,
}

pub fn march(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
}

pub fn blog() -> Blog {
    Blog {
        id: 1,
        subfolder: "alice".to_string(),
        title: "Alice Writes".to_string(),
        subtitle: "Notes from the workshop".to_string(),
        author: "alice".to_string(),
        time_zone: chrono_tz::UTC,
        auto_friendly_url_enabled: true,
        is_aggregated: true,
    }
}

pub fn entry(id: i32, name: Option<&str>, title: &str, at: DateTime<Utc>) -> Entry {
    Entry {
        id,
        blog_id: 1,
        title: title.to_string(),
        entry_name: name.map(str::to_string),
        body_html: format!("<p>{title} body</p>"),
        author: "alice".to_string(),
        date_created: at,
        date_modified: at,
        date_syndicated: Some(at),
        is_active: true,
        categories: vec!["Rust Notes".to_string()],
        tags: vec!["rust".to_string()],
        enclosure: None,
    }
}

async fn seed(repo: &MemoryRepository) {
    repo.insert_blog(blog()).await;

    let mut hello = entry(7, Some("hello-world"), "Hello World", march(1));
    hello.enclosure = Some(Enclosure {
        url: "https://cdn.example.com/cover.png".to_string(),
        title: "Cover art".to_string(),
        size: 1024,
    });
    repo.upsert_entry(hello).await;
    repo.upsert_entry(entry(8, None, "Untitled Musings", march(2)))
        .await;

    let mut scheduled = entry(9, Some("later"), "Not Yet", march(3));
    scheduled.date_syndicated = Some(Utc::now() + chrono::Duration::days(30));
    repo.upsert_entry(scheduled).await;

    repo.insert_category(LinkCategory {
        id: 3,
        blog_id: 1,
        title: "Rust Notes".to_string(),
        description: None,
        is_active: true,
    })
    .await;

    repo.insert_feedback(FeedbackItem {
        id: 1,
        entry_id: 7,
        author: "bob".to_string(),
        body: "Nice write-up".to_string(),
        source_url: None,
        date_created: march(2),
    })
    .await;
}

pub async fn site_with(configure: impl FnOnce(&mut Settings)) -> TestSite {
    let mut settings = Settings::defaults().expect("default settings");
    settings.site.public_url = Url::parse("https://example.com/").unwrap();
    configure(&mut settings);

    let repo = Arc::new(MemoryRepository::new());
    seed(&repo).await;

    let lookup = Arc::new(ContentLookup::new(
        ContentRepos::from_adapter(repo.clone()),
        SiteUrls::from_settings(&settings.site),
        settings.site.friendly_url_separator.clone(),
    ));
    let cache = CacheHandle::new(CacheConfig::from(&settings.cache));
    let aggregate = settings
        .aggregate
        .enabled
        .then(|| Arc::new(AggregateService::new(lookup.clone(), settings.aggregate.clone())));

    let state = HttpState {
        blogs: Arc::new(BlogPageService::new(lookup, &settings.site)),
        aggregate,
        cache: cache.clone(),
        site: Arc::new(settings.site.clone()),
    };

    TestSite {
        repo,
        cache,
        router: build_router(state),
    }
}

pub async fn site() -> TestSite {
    site_with(|_| {}).await
}

impl TestSite {
    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
