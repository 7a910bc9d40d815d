//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const ENV_PREFIX: &str = "FOGLIO";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";

/// Command-line arguments for the Foglio binary.
#[derive(Debug, Parser)]
#[command(name = "foglio", version, about = "Foglio wiki document server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOGLIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Foglio HTTP service.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the public listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the public listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the macro-expansion service endpoint.
    #[arg(long = "render-endpoint", value_name = "URL")]
    pub render_endpoint: Option<String>,

    /// Override the macro-expansion request timeout.
    #[arg(long = "render-timeout-seconds", value_name = "SECONDS")]
    pub render_timeout_seconds: Option<u64>,

    /// Override the canonical public site URL.
    #[arg(long = "site-public-url", value_name = "URL")]
    pub site_public_url: Option<String>,

    /// Override the default (source) locale.
    #[arg(long = "site-default-locale", value_name = "LOCALE")]
    pub site_default_locale: Option<String>,

    /// Override the content-experiment catalog path.
    #[arg(long = "experiments-file", value_name = "PATH")]
    pub experiments_file: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration value for `{field}`: {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub endpoint: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub public_url: String,
    pub default_locale: String,
}

#[derive(Debug, Clone)]
pub struct ExperimentsSettings {
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub logging: LoggingSettings,
    pub render: RenderSettings,
    pub site: SiteSettings,
    pub experiments: ExperimentsSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    server: RawServer,
    database: RawDatabase,
    logging: RawLogging,
    render: RawRender,
    site: RawSite,
    experiments: RawExperiments,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawServer {
    host: Option<String>,
    public_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLogging {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRender {
    endpoint: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSite {
    public_url: Option<String>,
    default_locale: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawExperiments {
    file: Option<PathBuf>,
}

/// Parse CLI arguments and load settings with file → env → CLI precedence.
pub fn load_with_cli() -> Result<(CliArgs, Settings), ConfigError> {
    let cli = CliArgs::parse();
    let overrides = match &cli.command {
        Some(Command::Serve(args)) => args.overrides.clone(),
        None => ServeOverrides::default(),
    };
    let settings = load(cli.config_file.as_deref(), &overrides)?;
    Ok((cli, settings))
}

pub fn load(
    config_file: Option<&std::path::Path>,
    overrides: &ServeOverrides,
) -> Result<Settings, ConfigError> {
    let mut builder =
        Config::builder().add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path.to_path_buf()).required(true));
    }

    let raw: RawSettings = builder
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()?;

    resolve(raw, overrides)
}

fn resolve(raw: RawSettings, overrides: &ServeOverrides) -> Result<Settings, ConfigError> {
    let host = overrides
        .server_host
        .clone()
        .or(raw.server.host)
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = overrides
        .public_port
        .or(raw.server.public_port)
        .unwrap_or(DEFAULT_PUBLIC_PORT);
    let public_addr = format!("{host}:{port}")
        .parse::<SocketAddr>()
        .map_err(|err| ConfigError::invalid("server.host", err.to_string()))?;

    let level_text = overrides
        .log_level
        .clone()
        .or(raw.logging.level)
        .unwrap_or_else(|| "info".to_string());
    let level = LevelFilter::from_str(&level_text)
        .map_err(|err| ConfigError::invalid("logging.level", err.to_string()))?;
    let format = match overrides.log_json.or(raw.logging.json).unwrap_or(false) {
        true => LogFormat::Json,
        false => LogFormat::Compact,
    };

    let max_connections = overrides
        .database_max_connections
        .or(raw.database.max_connections)
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = NonZeroU32::new(max_connections)
        .ok_or_else(|| ConfigError::invalid("database.max_connections", "must be nonzero"))?;

    let timeout_seconds = overrides
        .render_timeout_seconds
        .or(raw.render.timeout_seconds)
        .unwrap_or(DEFAULT_RENDER_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        return Err(ConfigError::invalid(
            "render.timeout_seconds",
            "must be nonzero",
        ));
    }

    Ok(Settings {
        server: ServerSettings { public_addr },
        database: DatabaseSettings {
            url: overrides.database_url.clone().or(raw.database.url),
            max_connections,
        },
        logging: LoggingSettings { level, format },
        render: RenderSettings {
            endpoint: overrides.render_endpoint.clone().or(raw.render.endpoint),
            timeout: Duration::from_secs(timeout_seconds),
        },
        site: SiteSettings {
            public_url: overrides
                .site_public_url
                .clone()
                .or(raw.site.public_url)
                .unwrap_or_else(|| DEFAULT_PUBLIC_URL.to_string()),
            default_locale: overrides
                .site_default_locale
                .clone()
                .or(raw.site.default_locale)
                .unwrap_or_else(|| crate::domain::locales::DEFAULT_LOCALE.to_string()),
        },
        experiments: ExperimentsSettings {
            file: overrides.experiments_file.clone().or(raw.experiments.file),
        },
    })
}
