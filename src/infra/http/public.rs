use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{
        HeaderMap, HeaderValue, StatusCode, Uri,
        header::{ACCEPT_LANGUAGE, LAST_MODIFIED, LOCATION},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use tracing::debug;

use crate::{
    application::{
        aggregate::AggregateService,
        blog::{BlogPageService, EntryPage},
        error::{ErrorReport, HttpError},
    },
    cache::{CacheHandle, ContentCache},
    config::SiteSettings,
    domain::{entities::Blog, locale::Locale},
    presentation::views::{
        AggregateTemplate, EntryTemplate, ListingTemplate, render_template_response,
    },
};

use super::{
    helpers::{file_not_found_response, if_modified_since_utc, is_static_file_request},
    middleware::{log_responses, set_request_context},
};

const SOURCE: &str = "lectern::http::public";

#[derive(Clone)]
pub struct HttpState {
    pub blogs: Arc<BlogPageService>,
    /// Present when the aggregate homepage is enabled.
    pub aggregate: Option<Arc<AggregateService>>,
    pub cache: CacheHandle,
    pub site: Arc<SiteSettings>,
}

impl HttpState {
    /// Cache view for the locale the request asks for.
    fn content_cache(&self, headers: &HeaderMap) -> ContentCache {
        let header = headers
            .get(ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok());
        let locale = Locale::from_accept_language(header, &self.site.default_locale);
        self.cache.for_locale(locale)
    }

    /// Static files get a bare 404; everything else the configured not-found handling.
    fn not_found(&self, uri: &Uri) -> Response {
        if is_static_file_request(uri.path()) {
            let mut response = StatusCode::NOT_FOUND.into_response();
            ErrorReport::from_message(SOURCE, StatusCode::NOT_FOUND, "static file not found")
                .attach(&mut response);
            return response;
        }
        file_not_found_response(self.site.not_found_page.as_deref(), &self.site.app_root)
    }
}

pub fn build_router(state: HttpState) -> Router {
    let app_root = state.site.app_root.trim_end_matches('/').to_string();

    let routes = Router::new()
        .route("/", get(aggregate_index))
        .route("/skins/{*path}", get(crate::infra::assets::serve_skin))
        .route("/scripts/{*path}", get(crate::infra::assets::serve_script))
        .route("/images/{*path}", get(crate::infra::assets::serve_image))
        .route("/{blog}", get(blog_home))
        .route("/{blog}/", get(blog_home))
        .route("/{blog}/archive/{key}", get(entry_detail))
        .route("/{blog}/archive/{year}/{month}", get(month_archive))
        .route("/{blog}/archive/{year}/{month}/{day}", get(day_archive))
        .route("/{blog}/category/{key}", get(category_listing))
        .route("/{blog}/tags/{tag}", get(tag_listing))
        .fallback(fallback);

    let routes = if app_root.is_empty() {
        routes.with_state(state)
    } else {
        Router::new()
            .nest(&app_root, routes.with_state(state.clone()))
            .fallback(fallback)
            .with_state(state)
    };

    routes
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn aggregate_index(
    State(state): State<HttpState>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let Some(aggregate) = state.aggregate.clone() else {
        return state.not_found(&uri);
    };

    let cache = state.content_cache(&headers);
    match aggregate.page(&cache).await {
        Ok(view) => render_template_response(AggregateTemplate { view }, StatusCode::OK),
        Err(err) => err.into_response(),
    }
}

/// Load the blog named by the first path segment or answer with not-found.
async fn resolve_blog(
    state: &HttpState,
    subfolder: &str,
    uri: &Uri,
) -> Result<Blog, Response> {
    match state.blogs.find_blog(subfolder).await {
        Ok(Some(blog)) => Ok(blog),
        Ok(None) => {
            debug!(target = SOURCE, subfolder, "unknown blog");
            Err(state.not_found(uri))
        }
        Err(err) => Err(err.into_response()),
    }
}

async fn blog_home(
    State(state): State<HttpState>,
    Path(subfolder): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let blog = match resolve_blog(&state, &subfolder, &uri).await {
        Ok(blog) => blog,
        Err(response) => return response,
    };

    let cache = state.content_cache(&headers);
    match state.blogs.home(&cache, &blog).await {
        Ok(view) => render_template_response(ListingTemplate { view }, StatusCode::OK),
        Err(err) => err.into_response(),
    }
}

async fn entry_detail(
    State(state): State<HttpState>,
    Path((subfolder, key)): Path<(String, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let blog = match resolve_blog(&state, &subfolder, &uri).await {
        Ok(blog) => blog,
        Err(response) => return response,
    };

    let cache = state.content_cache(&headers);
    match state.blogs.entry(&cache, &blog, &key).await {
        Ok(EntryPage::Found {
            view,
            last_modified,
        }) => {
            if not_modified_since(&headers, last_modified) {
                return StatusCode::NOT_MODIFIED.into_response();
            }
            let mut response = render_template_response(EntryTemplate { view }, StatusCode::OK);
            if response.status() == StatusCode::OK {
                set_last_modified(&mut response, last_modified);
            }
            response
        }
        Ok(EntryPage::Redirect { location }) => permanent_redirect(&location),
        Ok(EntryPage::NotFound) => state.not_found(&uri),
        Err(err) => err.into_response(),
    }
}

async fn month_archive(
    State(state): State<HttpState>,
    Path((subfolder, year, month)): Path<(String, String, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let (Ok(year), Ok(month)) = (year.parse::<i32>(), month.parse::<u32>()) else {
        return state.not_found(&uri);
    };
    let blog = match resolve_blog(&state, &subfolder, &uri).await {
        Ok(blog) => blog,
        Err(response) => return response,
    };

    let cache = state.content_cache(&headers);
    match state.blogs.month(&cache, &blog, year, month).await {
        Ok(Some(view)) => render_template_response(ListingTemplate { view }, StatusCode::OK),
        Ok(None) => state.not_found(&uri),
        Err(err) => err.into_response(),
    }
}

async fn day_archive(
    State(state): State<HttpState>,
    Path((subfolder, year, month, day)): Path<(String, String, String, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let Some(day) = parse_day(&year, &month, &day) else {
        return state.not_found(&uri);
    };
    let blog = match resolve_blog(&state, &subfolder, &uri).await {
        Ok(blog) => blog,
        Err(response) => return response,
    };

    let cache = state.content_cache(&headers);
    match state.blogs.day(&cache, &blog, day).await {
        Ok(view) => render_template_response(ListingTemplate { view }, StatusCode::OK),
        Err(err) => err.into_response(),
    }
}

async fn category_listing(
    State(state): State<HttpState>,
    Path((subfolder, key)): Path<(String, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let blog = match resolve_blog(&state, &subfolder, &uri).await {
        Ok(blog) => blog,
        Err(response) => return response,
    };

    let cache = state.content_cache(&headers);
    match state.blogs.category(&cache, &blog, &key).await {
        Ok(Some(view)) => render_template_response(ListingTemplate { view }, StatusCode::OK),
        Ok(None) => state.not_found(&uri),
        Err(err) => err.into_response(),
    }
}

async fn tag_listing(
    State(state): State<HttpState>,
    Path((subfolder, tag)): Path<(String, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let blog = match resolve_blog(&state, &subfolder, &uri).await {
        Ok(blog) => blog,
        Err(response) => return response,
    };

    let cache = state.content_cache(&headers);
    match state.blogs.tag(&cache, &blog, &tag).await {
        Ok(view) => render_template_response(ListingTemplate { view }, StatusCode::OK),
        Err(err) => err.into_response(),
    }
}

async fn fallback(State(state): State<HttpState>, uri: Uri) -> Response {
    state.not_found(&uri)
}

fn parse_day(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// HTTP dates carry whole seconds, so compare at that precision.
fn not_modified_since(headers: &HeaderMap, last_modified: DateTime<Utc>) -> bool {
    if_modified_since_utc(headers).is_some_and(|since| since >= last_modified.trunc_subsecs(0))
}

fn set_last_modified(response: &mut Response, last_modified: DateTime<Utc>) {
    let formatted = last_modified
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();
    if let Ok(value) = HeaderValue::from_str(&formatted) {
        response.headers_mut().insert(LAST_MODIFIED, value);
    }
}

fn permanent_redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => {
            let mut response = StatusCode::MOVED_PERMANENTLY.into_response();
            response.headers_mut().insert(LOCATION, value);
            response
        }
        Err(err) => HttpError::new(
            "infra::http::public::permanent_redirect",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Redirect target is invalid",
            err.to_string(),
        )
        .into_response(),
    }
}
