//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::domain::locale::Locale;

mod cli;

pub use cli::{
    CliArgs, Command, DatabaseOverride, FetchArgs, InstallArgs, ScriptsArgs, ScriptsCommand, ServeArgs,
    ServeOverrides, SplitArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "lectern";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_CACHE_CAPACITY: usize = 10_000;
const DEFAULT_CACHE_SHORT_SECS: u64 = 10;
const DEFAULT_CACHE_MEDIUM_SECS: u64 = 20;
const DEFAULT_CACHE_LONG_SECS: u64 = 30;
const DEFAULT_APP_ROOT: &str = "/";
const DEFAULT_LOCALE: &str = "en-us";
const DEFAULT_FRIENDLY_URL_SEPARATOR: &str = "_";
const DEFAULT_LIST_COUNT: usize = 10;
const DEFAULT_TAG_CLOUD_COUNT: usize = 25;
const DEFAULT_AGGREGATE_TITLE: &str = "Lectern";
const DEFAULT_AGGREGATE_ENTRY_COUNT: usize = 15;
const DEFAULT_OUTBOUND_TIMEOUT_SECS: u64 = 60;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub site: SiteSettings,
    pub aggregate: AggregateSettings,
    pub proxy: Option<ProxySettings>,
    pub outbound: OutboundSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub capacity: usize,
    pub short_duration: Duration,
    pub medium_duration: Duration,
    pub long_duration: Duration,
    pub single_flight: bool,
}

/// Site-wide presentation settings.
#[derive(Debug, Clone)]
pub struct SiteSettings {
    /// Absolute base URL; redirects to canonical entry URLs are built from it.
    pub public_url: Url,
    /// Application root that `~/` paths expand to.
    pub app_root: String,
    /// Page to redirect to instead of answering 404.
    pub not_found_page: Option<String>,
    pub default_locale: Locale,
    /// Replaced with spaces when retrying a category lookup by friendly URL.
    pub friendly_url_separator: String,
    /// Entries listed per category or tag page.
    pub list_count: usize,
    pub tag_cloud_count: usize,
}

#[derive(Debug, Clone)]
pub struct AggregateSettings {
    pub enabled: bool,
    pub title: String,
    pub entry_count: usize,
}

#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub host: String,
    /// Without a port the proxy is addressed by host alone.
    pub port: Option<u16>,
    /// Credentials are only sent when a username is configured.
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxySettings {
    pub fn url(&self) -> String {
        match self.port {
            Some(port) => format!("http://{}:{port}", self.host),
            None => format!("http://{}", self.host),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutboundSettings {
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("LECTERN").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Install(args)) => raw.apply_database_override(&args.database),
        Some(Command::Scripts(_)) | Some(Command::Fetch(_)) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    site: RawSiteSettings,
    aggregate: RawAggregateSettings,
    proxy: RawProxySettings,
    outbound: RawOutboundSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache.capacity = Some(capacity);
        }
        if let Some(enabled) = overrides.cache_single_flight {
            self.cache.single_flight = Some(enabled);
        }
        if let Some(url) = overrides.site_public_url.as_ref() {
            self.site.public_url = Some(url.clone());
        }
        if let Some(enabled) = overrides.aggregate_enabled {
            self.aggregate.enabled = Some(enabled);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    /// Settings built from built-in defaults alone, ignoring files and environment.
    pub fn defaults() -> Result<Self, LoadError> {
        Self::from_raw(RawSettings::default())
    }

    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            site,
            aggregate,
            proxy,
            outbound,
        } = raw;

        let server = build_server_settings(server)?;
        let site = build_site_settings(site, server.addr)?;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            aggregate: build_aggregate_settings(aggregate)?,
            proxy: build_proxy_settings(proxy)?,
            outbound: build_outbound_settings(outbound)?,
            server,
            site,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_value = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = non_zero_u32(max_value.into(), "database.max_connections")?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let capacity = cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY);
    if capacity == 0 {
        return Err(LoadError::invalid(
            "cache.capacity",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        capacity,
        short_duration: positive_seconds(
            cache.short_seconds.unwrap_or(DEFAULT_CACHE_SHORT_SECS),
            "cache.short_seconds",
        )?,
        medium_duration: positive_seconds(
            cache.medium_seconds.unwrap_or(DEFAULT_CACHE_MEDIUM_SECS),
            "cache.medium_seconds",
        )?,
        long_duration: positive_seconds(
            cache.long_seconds.unwrap_or(DEFAULT_CACHE_LONG_SECS),
            "cache.long_seconds",
        )?,
        single_flight: cache.single_flight.unwrap_or(true),
    })
}

fn build_site_settings(site: RawSiteSettings, addr: SocketAddr) -> Result<SiteSettings, LoadError> {
    let public_url = match site.public_url {
        Some(raw) => Url::parse(raw.trim())
            .map_err(|err| LoadError::invalid("site.public_url", err.to_string()))?,
        None => Url::parse(&format!("http://{addr}/"))
            .map_err(|err| LoadError::invalid("site.public_url", err.to_string()))?,
    };
    if public_url.cannot_be_a_base() {
        return Err(LoadError::invalid(
            "site.public_url",
            "must be an absolute base URL",
        ));
    }

    let app_root = site
        .app_root
        .unwrap_or_else(|| DEFAULT_APP_ROOT.to_string());
    if !app_root.starts_with('/') {
        return Err(LoadError::invalid("site.app_root", "must start with `/`"));
    }

    let not_found_page = site.not_found_page.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let locale_raw = site
        .default_locale
        .unwrap_or_else(|| DEFAULT_LOCALE.to_string());
    let default_locale = Locale::parse(&locale_raw)
        .map_err(|err| LoadError::invalid("site.default_locale", err.to_string()))?;

    let friendly_url_separator = site
        .friendly_url_separator
        .unwrap_or_else(|| DEFAULT_FRIENDLY_URL_SEPARATOR.to_string());
    if friendly_url_separator.is_empty() {
        return Err(LoadError::invalid(
            "site.friendly_url_separator",
            "must not be empty",
        ));
    }

    let list_count = site.list_count.unwrap_or(DEFAULT_LIST_COUNT);
    if list_count == 0 {
        return Err(LoadError::invalid(
            "site.list_count",
            "must be greater than zero",
        ));
    }

    Ok(SiteSettings {
        public_url,
        app_root,
        not_found_page,
        default_locale,
        friendly_url_separator,
        list_count,
        tag_cloud_count: site.tag_cloud_count.unwrap_or(DEFAULT_TAG_CLOUD_COUNT),
    })
}

fn build_aggregate_settings(
    aggregate: RawAggregateSettings,
) -> Result<AggregateSettings, LoadError> {
    let entry_count = aggregate
        .entry_count
        .unwrap_or(DEFAULT_AGGREGATE_ENTRY_COUNT);
    if entry_count == 0 {
        return Err(LoadError::invalid(
            "aggregate.entry_count",
            "must be greater than zero",
        ));
    }

    Ok(AggregateSettings {
        enabled: aggregate.enabled.unwrap_or(true),
        title: aggregate
            .title
            .unwrap_or_else(|| DEFAULT_AGGREGATE_TITLE.to_string()),
        entry_count,
    })
}

fn build_proxy_settings(proxy: RawProxySettings) -> Result<Option<ProxySettings>, LoadError> {
    let Some(host) = proxy.host.filter(|host| !host.trim().is_empty()) else {
        return Ok(None);
    };

    let port = proxy.port.filter(|port| *port != 0);

    let username = proxy
        .username
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    let password = username.as_ref().and(proxy.password);

    Ok(Some(ProxySettings {
        host: host.trim().to_string(),
        port,
        username,
        password,
    }))
}

fn build_outbound_settings(outbound: RawOutboundSettings) -> Result<OutboundSettings, LoadError> {
    let timeout = positive_seconds(
        outbound
            .timeout_seconds
            .unwrap_or(DEFAULT_OUTBOUND_TIMEOUT_SECS),
        "outbound.timeout_seconds",
    )?;
    Ok(OutboundSettings { timeout })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    capacity: Option<usize>,
    short_seconds: Option<u64>,
    medium_seconds: Option<u64>,
    long_seconds: Option<u64>,
    single_flight: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    public_url: Option<String>,
    app_root: Option<String>,
    not_found_page: Option<String>,
    default_locale: Option<String>,
    friendly_url_separator: Option<String>,
    list_count: Option<usize>,
    tag_cloud_count: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAggregateSettings {
    enabled: Option<bool>,
    title: Option<String>,
    entry_count: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawProxySettings {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawOutboundSettings {
    timeout_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn positive_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

#[cfg(test)]
mod tests;
