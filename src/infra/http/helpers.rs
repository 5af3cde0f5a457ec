//! Request and response helpers shared by the public handlers.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use axum::{
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{IF_MODIFIED_SINCE, LOCATION},
    },
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::application::error::ErrorReport;
use crate::domain::text::left_before;

pub use crate::domain::text::safe_file_name;

const FORWARDED_FOR: &str = "x-forwarded-for";

const STATIC_FILE_SUFFIXES: &[&str] = &[
    ".css", ".jpg", ".js", ".gif", ".png", ".xml", ".txt", ".html", ".htm",
];

/// `If-Modified-Since` as UTC, or `None` when absent or unparsable.
pub fn if_modified_since_utc(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let raw = headers.get(IF_MODIFIED_SINCE)?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }
    parse_http_date(raw)
}

fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc2822(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    // RFC 850 and asctime carry no offset; both are defined as GMT.
    ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Client address, preferring the first `X-Forwarded-For` hop.
pub fn user_ip_address(headers: &HeaderMap, remote: Option<SocketAddr>) -> Option<IpAddr> {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match forwarded {
        Some(value) => left_before(value, ",").trim().parse().ok(),
        None => remote.map(|addr| addr.ip()),
    }
}

pub fn is_static_file_request(path: &str) -> bool {
    let lowered = path.to_ascii_lowercase();
    STATIC_FILE_SUFFIXES
        .iter()
        .any(|suffix| lowered.ends_with(suffix))
}

/// Expand a leading `~/` to the application root.
pub fn expand_tilde_path(path: &str, app_root: &str) -> String {
    match path.strip_prefix('~') {
        Some(rest) if rest.starts_with('/') => {
            format!("{}{rest}", app_root.trim_end_matches('/'))
        }
        _ => path.to_string(),
    }
}

pub fn combine_web_paths(first: &str, second: &str) -> String {
    format!("{first}{second}").replace("//", "/")
}

/// Image MIME type for an enclosure URL.
///
/// Unknown extensions yield the literal `none`; a URL without an extension
/// yields an empty string.
pub fn mime_type(url: &str) -> &'static str {
    let path = left_before(left_before(url, "?"), "#");
    let Some(extension) = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
    else {
        return "";
    };

    match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        _ => "none",
    }
}

/// Not-found response: a redirect to the configured page, else a bare 404.
pub fn file_not_found_response(not_found_page: Option<&str>, app_root: &str) -> Response {
    const SOURCE: &str = "infra::http::helpers::file_not_found_response";

    let mut response = match not_found_page {
        Some(page) => {
            let target = expand_tilde_path(page, app_root);
            match HeaderValue::from_str(&target) {
                Ok(location) => {
                    let mut response = StatusCode::FOUND.into_response();
                    response.headers_mut().insert(LOCATION, location);
                    response
                }
                Err(_) => StatusCode::NOT_FOUND.into_response(),
            }
        }
        None => StatusCode::NOT_FOUND.into_response(),
    };

    ErrorReport::from_message(SOURCE, StatusCode::NOT_FOUND, "resource not found")
        .attach(&mut response);
    response
}
