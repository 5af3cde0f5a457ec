use std::{future::IntoFuture, net::SocketAddr, process, sync::Arc};

use lectern::{
    application::{
        aggregate::AggregateService, blog::BlogPageService, error::AppError,
        lookup::ContentLookup, repos::ContentRepos, urls::SiteUrls,
    },
    cache::{CacheConfig, CacheHandle},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState, OutboundClient},
        memory::MemoryRepository,
        telemetry,
    },
    install,
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Install(_) => run_install(settings).await,
        config::Command::Scripts(args) => run_scripts(args),
        config::Command::Fetch(args) => run_fetch(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repos = init_repositories(&settings).await?;
    let state = build_http_state(repos, &settings);
    serve_http(&settings, state).await
}

async fn connect_database(settings: &config::Settings) -> Result<PostgresRepositories, AppError> {
    if settings.database.url.is_none() {
        return Err(InfraError::configuration("database url is not configured").into());
    }

    PostgresRepositories::connect(&settings.database)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

async fn init_repositories(settings: &config::Settings) -> Result<ContentRepos, AppError> {
    if settings.database.url.is_none() {
        warn!("no database url configured; serving from an empty in-memory repository");
        return Ok(ContentRepos::from_adapter(Arc::new(MemoryRepository::new())));
    }

    let repositories = connect_database(settings).await?;
    repositories
        .health_check()
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(ContentRepos::from_adapter(Arc::new(repositories)))
}

fn build_http_state(repos: ContentRepos, settings: &config::Settings) -> HttpState {
    let urls = SiteUrls::from_settings(&settings.site);
    let lookup = Arc::new(ContentLookup::new(
        repos,
        urls,
        settings.site.friendly_url_separator.clone(),
    ));

    let aggregate = settings
        .aggregate
        .enabled
        .then(|| Arc::new(AggregateService::new(lookup.clone(), settings.aggregate.clone())));

    HttpState {
        blogs: Arc::new(BlogPageService::new(lookup, &settings.site)),
        aggregate,
        cache: CacheHandle::new(CacheConfig::from(&settings.cache)),
        site: Arc::new(settings.site.clone()),
    }
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move { shutdown.notified().await }
    });
    let mut server = tokio::spawn(server.into_future());

    tokio::select! {
        result = &mut server => return server_result(result),
        _ = tokio::signal::ctrl_c() => {}
    }

    info!("shutdown requested; draining connections");
    shutdown.notify_one();

    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(result) => server_result(result),
        Err(_) => {
            warn!(
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "graceful shutdown timed out"
            );
            Ok(())
        }
    }
}

fn server_result(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn run_install(settings: config::Settings) -> Result<(), AppError> {
    let repositories = connect_database(&settings).await?;
    let executed = install::install(repositories.pool())
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    println!("Applied {executed} installation batches");
    Ok(())
}

fn run_scripts(args: config::ScriptsArgs) -> Result<(), AppError> {
    match args.command {
        config::ScriptsCommand::Split(split) => {
            let written = install::split_to_dir(&split.name, &split.out)
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            for path in &written {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}

async fn run_fetch(settings: config::Settings, args: config::FetchArgs) -> Result<(), AppError> {
    let client = OutboundClient::new(&settings.outbound, settings.proxy.as_ref())
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let body = client
        .get_page_text(args.url)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    println!("{body}");
    Ok(())
}
