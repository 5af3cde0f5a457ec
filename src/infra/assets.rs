//! Embedded skin, script and image assets.

use std::borrow::Cow;

use axum::{
    body::Body,
    extract::Path,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use include_dir::{Dir, include_dir};
use mime_guess::{Mime, MimeGuess};

use crate::application::error::ErrorReport;

static SKIN_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static/skins");
static SCRIPT_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static/scripts");
static IMAGE_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static/images");

/// Skin stylesheets, e.g. `Aggregate/Simple/Style.css`.
pub async fn serve_skin(path: Option<Path<String>>) -> Response {
    serve_static(&SKIN_ASSETS, path, "infra::assets::serve_skin")
}

pub async fn serve_script(path: Option<Path<String>>) -> Response {
    serve_static(&SCRIPT_ASSETS, path, "infra::assets::serve_script")
}

pub async fn serve_image(path: Option<Path<String>>) -> Response {
    serve_static(&IMAGE_ASSETS, path, "infra::assets::serve_image")
}

fn serve_static(
    bundle: &'static Dir<'static>,
    path: Option<Path<String>>,
    source: &'static str,
) -> Response {
    let captured = path.map(|Path(value)| value);
    match resolve_asset(bundle, captured) {
        Some(asset) => asset.into_response(),
        None => not_found_response(source),
    }
}

fn not_found_response(source: &'static str) -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    ErrorReport::from_message(source, StatusCode::NOT_FOUND, "Static asset not found")
        .attach(&mut response);
    response
}

struct Asset<'a> {
    contents: Cow<'a, [u8]>,
    mime: MimeGuess,
}

fn resolve_asset(bundle: &'static Dir<'static>, path: Option<String>) -> Option<Asset<'static>> {
    let captured = path.unwrap_or_default();
    let candidate = captured.trim_start_matches('/');

    if candidate.is_empty() || candidate.ends_with('/') || candidate.contains("..") {
        // No directory listings, no traversal.
        return None;
    }

    let file = bundle.get_file(candidate)?;
    Some(Asset {
        contents: Cow::Borrowed(file.contents()),
        mime: mime_guess::from_path(candidate),
    })
}

impl IntoResponse for Asset<'static> {
    fn into_response(self) -> Response {
        let mime = self.mime.first_or_octet_stream();
        match self.contents {
            Cow::Borrowed(slice) => build_response(Bytes::from_static(slice), mime),
            Cow::Owned(bytes) => build_response(Bytes::from(bytes), mime),
        }
    }
}

fn build_response(bytes: Bytes, mime: Mime) -> Response {
    let len = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
        headers.insert(header::CONTENT_LENGTH, value);
    }
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=86400"),
    );

    response
}
