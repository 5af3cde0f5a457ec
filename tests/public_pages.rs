mod support;

use axum::{
    body::Body,
    http::{
        Request, StatusCode,
        header::{ACCEPT_LANGUAGE, CONTENT_TYPE, IF_MODIFIED_SINCE, LAST_MODIFIED, LOCATION},
    },
};

use support::{body_text, site, site_with};

#[tokio::test]
async fn aggregate_page_lists_published_entries() {
    let site = site().await;

    let response = site.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert!(body.contains("Hello World"));
    assert!(body.contains("Untitled Musings"));
    assert!(!body.contains("Not Yet"), "future entries stay hidden");
    assert!(body.contains("/alice/archive/hello-world"));
    assert!(body.contains("/alice/archive/8"));
    assert!(body.contains("/skins/Aggregate/Simple/Style.css"));
    assert!(body.contains("/scripts/jquery.lightbox-0.5.css"));
    assert!(body.contains("/images/feed.svg"));
}

#[tokio::test]
async fn disabled_aggregate_page_is_not_found() {
    let site = site_with(|settings| settings.aggregate.enabled = false).await;

    let response = site.get("/").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn entry_page_renders_with_last_modified() {
    let site = site().await;

    let response = site.get("/alice/archive/hello-world").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[LAST_MODIFIED],
        "Fri, 01 Mar 2024 12:00:00 GMT"
    );

    let body = body_text(response).await;
    assert!(body.contains("<p>Hello World body</p>"));
    assert!(body.contains("Nice write-up"));
    assert!(body.contains("image/png"));
    assert!(body.contains("/alice/tags/rust"));
}

#[tokio::test]
async fn unchanged_entry_answers_not_modified() {
    let site = site().await;

    let request = Request::get("/alice/archive/hello-world")
        .header(IF_MODIFIED_SINCE, "Fri, 01 Mar 2024 12:00:00 GMT")
        .body(Body::empty())
        .unwrap();
    let response = site.send(request).await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

    let request = Request::get("/alice/archive/hello-world")
        .header(IF_MODIFIED_SINCE, "Thu, 29 Feb 2024 12:00:00 GMT")
        .body(Body::empty())
        .unwrap();
    let response = site.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn id_request_redirects_to_canonical_name() {
    let site = site().await;

    let response = site.get("/alice/archive/7").await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        response.headers()[LOCATION],
        "https://example.com/alice/archive/hello-world"
    );
}

#[tokio::test]
async fn unnamed_entry_is_served_by_id() {
    let site = site().await;

    let response = site.get("/alice/archive/8").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Untitled Musings"));
}

#[tokio::test]
async fn missing_content_is_not_found() {
    let site = site().await;

    for uri in [
        "/alice/archive/no-such-entry",
        "/alice/archive/later",
        "/bob/",
        "/alice/category/999",
        "/alice/archive/2024/13",
        "/alice/archive/2024/02/30",
    ] {
        let response = site.get(uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn configured_not_found_page_redirects() {
    let site = site_with(|settings| {
        settings.site.not_found_page = Some("~/SystemMessages/FileNotFound".to_string());
    })
    .await;

    let response = site.get("/alice/archive/no-such-entry").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[LOCATION],
        "/SystemMessages/FileNotFound"
    );
}

#[tokio::test]
async fn missing_static_files_get_a_bare_not_found() {
    let site = site_with(|settings| {
        settings.site.not_found_page = Some("~/SystemMessages/FileNotFound".to_string());
    })
    .await;

    let response = site.get("/alice/images/missing.png").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = site.get("/skins/Aggregate/Simple/missing.css").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Paths shaped like routed pages still count as static files.
    for path in ["/robots.txt", "/alice/archive/cover.png"] {
        let response = site.get(path).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
        assert!(response.headers().get(LOCATION).is_none(), "{path}");
    }

    let response = site.get("/alice/archive/missing-entry").await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn embedded_skin_is_served() {
    let site = site().await;

    let response = site.get("/skins/Aggregate/Simple/Style.css").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/css")
    );
}

#[tokio::test]
async fn archives_and_listings_render() {
    let site = site().await;

    let month = body_text(site.get("/alice/archive/2024/03").await).await;
    assert!(month.contains("March 2024"));
    assert!(month.contains("Hello World"));
    assert!(month.contains("Untitled Musings"));

    let day = body_text(site.get("/alice/archive/2024/03/02").await).await;
    assert!(day.contains("Untitled Musings"));
    assert!(!day.contains("Hello World"));

    let category = body_text(site.get("/alice/category/3").await).await;
    assert!(category.contains("Rust Notes"));
    assert!(category.contains("Hello World"));

    let friendly = site.get("/alice/category/Rust_Notes").await;
    assert_eq!(friendly.status(), StatusCode::OK);

    let tagged = body_text(site.get("/alice/tags/RUST").await).await;
    assert!(tagged.contains("Hello World"));
}

#[tokio::test]
async fn repeated_entry_requests_hit_the_cache() {
    let site = site().await;

    assert_eq!(
        site.get("/alice/archive/hello-world").await.status(),
        StatusCode::OK
    );
    let after_first = site.repo.query_count();

    assert_eq!(
        site.get("/alice/archive/hello-world").await.status(),
        StatusCode::OK
    );
    // Only the blog lookup reaches the repository the second time.
    assert_eq!(site.repo.query_count(), after_first + 1);
}

#[tokio::test]
async fn cached_content_is_partitioned_by_locale() {
    let site = site().await;

    for language in ["fr-FR,fr;q=0.9", "en-US"] {
        let request = Request::get("/alice/archive/hello-world")
            .header(ACCEPT_LANGUAGE, language)
            .body(Body::empty())
            .unwrap();
        assert_eq!(site.send(request).await.status(), StatusCode::OK);
    }

    let keys = site.cache.store().keys();
    assert!(keys.iter().any(|key| key.ends_with(":fr-fr")));
    assert!(keys.iter().any(|key| key.ends_with(":en-us")));
}

#[tokio::test]
async fn routes_nest_under_application_root() {
    let site = site_with(|settings| settings.site.app_root = "/blogs/".to_string()).await;

    let response = site.get("/blogs/alice/archive/hello-world").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("/blogs/alice/tags/rust"));

    let response = site.get("/alice/archive/hello-world").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
