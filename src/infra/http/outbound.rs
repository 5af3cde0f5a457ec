//! Outbound HTTP client used for trackback and pingback style fetches.

use std::time::Duration;

use reqwest::{Client, Proxy, Response, Url, header};
use thiserror::Error;
use tracing::debug;

use crate::config::{OutboundSettings, ProxySettings};

const SOURCE: &str = "lectern::http::outbound";

/// Sent as `Referer` on every outbound request.
pub const OUTBOUND_REFERER: &str = "https://lectern.invalid/services/";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to configure outbound client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("invalid proxy configuration: {0}")]
    Proxy(#[source] reqwest::Error),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

pub fn user_agent() -> String {
    format!(
        "lectern/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// GET-only client with fixed identification headers, a timeout and an
/// optional proxy. Failures are returned as-is; nothing is retried.
#[derive(Clone, Debug)]
pub struct OutboundClient {
    client: Client,
    timeout: Duration,
}

impl OutboundClient {
    pub fn new(
        outbound: &OutboundSettings,
        proxy: Option<&ProxySettings>,
    ) -> Result<Self, FetchError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::REFERER,
            header::HeaderValue::from_static(OUTBOUND_REFERER),
        );

        let mut builder = Client::builder()
            .user_agent(user_agent())
            .default_headers(headers)
            .timeout(outbound.timeout);

        if let Some(settings) = proxy {
            let mut proxy = Proxy::all(settings.url()).map_err(FetchError::Proxy)?;
            if let Some(username) = settings.username.as_deref() {
                proxy = proxy.basic_auth(username, settings.password.as_deref().unwrap_or(""));
            }
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(FetchError::Build)?;
        Ok(Self {
            client,
            timeout: outbound.timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn get_response(&self, url: Url) -> Result<Response, FetchError> {
        debug!(target = SOURCE, url = %url, "outbound request");
        Ok(self.client.get(url).send().await?)
    }

    /// Fetch `url` and decode its body as UTF-8, replacing invalid sequences.
    pub async fn get_page_text(&self, url: Url) -> Result<String, FetchError> {
        let body = self.get_response(url).await?.bytes().await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
