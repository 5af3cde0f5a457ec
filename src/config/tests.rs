use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn cache_settings_use_correct_defaults() {
    let settings = Settings::defaults().expect("valid settings");

    assert_eq!(settings.cache.capacity, 10_000);
    assert_eq!(settings.cache.short_duration, Duration::from_secs(10));
    assert_eq!(settings.cache.medium_duration, Duration::from_secs(20));
    assert_eq!(settings.cache.long_duration, Duration::from_secs(30));
    assert!(settings.cache.single_flight);
}

#[test]
fn cache_settings_can_be_overridden_via_cli() {
    let mut raw = RawSettings::default();
    raw.cache.long_seconds = Some(120);
    let overrides = ServeOverrides {
        cache_capacity: Some(64),
        cache_single_flight: Some(false),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.cache.capacity, 64);
    assert!(!settings.cache.single_flight);
    assert_eq!(settings.cache.long_duration, Duration::from_secs(120));
    // Untouched classes keep their defaults.
    assert_eq!(settings.cache.short_duration, Duration::from_secs(10));
}

#[test]
fn zero_cache_duration_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.short_seconds = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero duration");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.short_seconds",
            ..
        }
    ));
}

#[test]
fn site_defaults_follow_listener_address() {
    let settings = Settings::defaults().expect("valid settings");

    assert_eq!(settings.site.public_url.as_str(), "http://127.0.0.1:3000/");
    assert_eq!(settings.site.app_root, "/");
    assert_eq!(settings.site.default_locale.as_str(), "en-us");
    assert_eq!(settings.site.friendly_url_separator, "_");
    assert!(settings.site.not_found_page.is_none());
}

#[test]
fn blank_not_found_page_is_treated_as_unset() {
    let mut raw = RawSettings::default();
    raw.site.not_found_page = Some("   ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.site.not_found_page.is_none());
}

#[test]
fn invalid_default_locale_is_rejected() {
    let mut raw = RawSettings::default();
    raw.site.default_locale = Some("en us".to_string());

    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "site.default_locale",
            ..
        })
    ));
}

#[test]
fn outbound_timeout_defaults_to_sixty_seconds() {
    let settings = Settings::defaults().expect("valid settings");
    assert_eq!(settings.outbound.timeout, Duration::from_secs(60));
    assert!(settings.proxy.is_none());
}

#[test]
fn proxy_without_port_uses_host_alone() {
    let mut raw = RawSettings::default();
    raw.proxy.host = Some("proxy.internal".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    let proxy = settings.proxy.expect("proxy configured");
    assert_eq!(proxy.port, None);
    assert_eq!(proxy.url(), "http://proxy.internal");
}

#[test]
fn proxy_ignores_credentials_without_username() {
    let mut raw = RawSettings::default();
    raw.proxy.host = Some("proxy.internal".to_string());
    raw.proxy.port = Some(3128);
    raw.proxy.username = Some("  ".to_string());
    raw.proxy.password = Some("secret".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    let proxy = settings.proxy.expect("proxy configured");
    assert!(proxy.username.is_none());
    assert!(proxy.password.is_none());
}

#[test]
fn proxy_settings_resolve_with_credentials() {
    let mut raw = RawSettings::default();
    raw.proxy.host = Some("proxy.internal".to_string());
    raw.proxy.port = Some(8080);
    raw.proxy.username = Some("svc".to_string());
    raw.proxy.password = Some("secret".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    let proxy = settings.proxy.expect("proxy configured");
    assert_eq!(proxy.url(), "http://proxy.internal:8080");
    assert_eq!(proxy.username.as_deref(), Some("svc"));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["lectern"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "lectern",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--database-url",
        "postgres://override",
        "--cache-single-flight=false",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.database_url.as_deref(),
                Some("postgres://override")
            );
            assert_eq!(serve.overrides.cache_single_flight, Some(false));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_install_arguments() {
    let args = CliArgs::parse_from([
        "lectern",
        "install",
        "--database-url",
        "postgres://example",
    ]);

    match args.command.expect("install command") {
        Command::Install(install) => {
            assert_eq!(
                install.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_scripts_split_arguments() {
    let args = CliArgs::parse_from([
        "lectern",
        "scripts",
        "split",
        "Installation.01.00.00.sql",
        "--out",
        "/tmp/batches",
    ]);

    match args.command.expect("scripts command") {
        Command::Scripts(scripts) => match scripts.command {
            ScriptsCommand::Split(split) => {
                assert_eq!(split.name, "Installation.01.00.00.sql");
                assert_eq!(split.out, std::path::Path::new("/tmp/batches"));
            }
        },
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_fetch_requires_absolute_url() {
    let args = CliArgs::parse_from(["lectern", "fetch", "https://example.com/feed"]);
    match args.command.expect("fetch command") {
        Command::Fetch(fetch) => assert_eq!(fetch.url.as_str(), "https://example.com/feed"),
        _ => panic!("wrong command parsed"),
    }

    assert!(CliArgs::try_parse_from(["lectern", "fetch", "not a url"]).is_err());
}
