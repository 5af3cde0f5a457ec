use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Method, Request, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

use super::helpers::user_ip_address;

const TARGET: &str = "lectern::http::response";

/// Per-request identity, available to handlers and echoed on the response.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub request_id: String,
    /// First `X-Forwarded-For` hop, else the peer address.
    pub client_ip: Option<IpAddr>,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ctx = RequestContext {
        request_id: Uuid::new_v4().to_string(),
        client_ip: user_ip_address(request.headers(), peer),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Fields shared by every failure log line.
struct Outcome {
    status: StatusCode,
    method: Method,
    uri: Uri,
    elapsed_ms: u128,
    source: &'static str,
    chain: Vec<String>,
    request_id: String,
    client_ip: String,
}

impl Outcome {
    fn detail(&self) -> &str {
        self.chain
            .first()
            .map(String::as_str)
            .unwrap_or("no diagnostic available")
    }

    fn emit(&self) {
        let path = self.uri.path();
        let query = self.uri.query().unwrap_or("");

        match self.status {
            status if status.is_server_error() => error!(
                target: TARGET,
                status = status.as_u16(),
                method = %self.method,
                path,
                query,
                elapsed_ms = self.elapsed_ms,
                source = self.source,
                detail = self.detail(),
                chain = ?self.chain,
                request_id = %self.request_id,
                client_ip = %self.client_ip,
                "request failed"
            ),
            // Missing pages are routine for a public blog.
            StatusCode::NOT_FOUND => debug!(
                target: TARGET,
                method = %self.method,
                path,
                source = self.source,
                request_id = %self.request_id,
                client_ip = %self.client_ip,
                "not found"
            ),
            status => warn!(
                target: TARGET,
                status = status.as_u16(),
                method = %self.method,
                path,
                query,
                elapsed_ms = self.elapsed_ms,
                source = self.source,
                detail = self.detail(),
                request_id = %self.request_id,
                client_ip = %self.client_ip,
                "client request error"
            ),
        }
    }
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();
    let (request_id, client_ip) = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| {
            (
                ctx.request_id.clone(),
                ctx.client_ip.map(|ip| ip.to_string()).unwrap_or_default(),
            )
        })
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let (source, chain) = response
        .extensions_mut()
        .remove::<ErrorReport>()
        .map(|report| (report.source, report.messages))
        .unwrap_or(("unknown", Vec::new()));

    Outcome {
        status,
        method,
        uri,
        elapsed_ms: started.elapsed().as_millis(),
        source,
        chain,
        request_id,
        client_ip,
    }
    .emit();

    response
}
