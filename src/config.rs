//! Configuration module for wireprobe.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values, and both over the
//! per-probe defaults.

use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the probe client
#[derive(Parser, Debug)]
#[command(name = "wireprobe")]
#[command(author = "wireprobe authors")]
#[command(version = "0.1.0")]
#[command(about = "Manual TCP test client for echo, HTTP and proxy servers", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Target host name or address
    #[arg(short = 'H', long, global = true)]
    pub host: Option<String>,

    /// Target port
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Number of request/response rounds (0 = loop forever)
    #[arg(short = 'n', long, global = true)]
    pub iterations: Option<u64>,

    /// Sleep between rounds, in milliseconds
    #[arg(short, long, global = true)]
    pub interval_ms: Option<u64>,

    /// Keep the connection open for one more interval after the last round
    #[arg(long, global = true)]
    pub linger: Option<bool>,

    /// Connect, read and write timeout in milliseconds (0 = none)
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Receive buffer size for unframed probes
    #[arg(long, global = true)]
    pub buffer_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub probe: ProbeCommand,
}

/// Which server to poke.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ProbeCommand {
    /// Exchange length-prefixed frames with a framed echo server
    Echo {
        /// Message body; defaults to a greeting tagged with the client id
        #[arg(long)]
        message: Option<String>,
        /// How many times the message is repeated inside one frame
        #[arg(long)]
        repeat: Option<usize>,
        /// Reject echoed frames whose length prefix exceeds this many bytes
        #[arg(long)]
        max_frame_size: Option<u32>,
    },
    /// Send a raw HTTP/1.1 request and print the first response chunk
    Http {
        /// Request method
        #[arg(long)]
        method: Option<String>,
        /// Request path
        #[arg(long)]
        path: Option<String>,
        /// Request header as `Name: value` (repeatable)
        #[arg(long = "header")]
        headers: Vec<String>,
        /// Request body
        #[arg(long)]
        body: Option<String>,
    },
    /// Send raw text through a reverse proxy and print what comes back
    Proxy {
        /// Message to send; defaults to a greeting tagged with the client id
        #[arg(long)]
        message: Option<String>,
    },
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub probe: RoundsConfig,
    #[serde(default)]
    pub echo: EchoConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection target configuration
#[derive(Debug, Deserialize)]
pub struct TargetConfig {
    /// Host to connect to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port; falls back to the probe's default
    pub port: Option<u16>,
    /// Socket timeout in milliseconds (0 = none)
    #[serde(default)]
    pub timeout_ms: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
            timeout_ms: 0,
        }
    }
}

/// Loop configuration shared by all probes
#[derive(Debug, Deserialize)]
pub struct RoundsConfig {
    pub iterations: Option<u64>,
    pub interval_ms: Option<u64>,
    pub linger: Option<bool>,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for RoundsConfig {
    fn default() -> Self {
        Self {
            iterations: None,
            interval_ms: None,
            linger: None,
            buffer_size: default_buffer_size(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct EchoConfig {
    pub message: Option<String>,
    pub repeat: Option<usize>,
    pub max_frame_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct HttpConfig {
    pub method: Option<String>,
    pub path: Option<String>,
    pub headers: Option<Vec<String>>,
    pub body: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ProxyConfig {
    pub message: Option<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_buffer_size() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

const DEFAULT_ECHO_REPEAT: usize = 100;
const DEFAULT_HTTP_HEADER: &str = "Test-Header: Wohoop";
const DEFAULT_HTTP_BODY: &str = "Helloooo this is body!";

/// Framed echo probe settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoSettings {
    pub message: Option<String>,
    pub repeat: usize,
    pub max_frame_size: Option<u32>,
}

/// Raw HTTP probe settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Reverse proxy probe settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub message: Option<String>,
}

/// Resolved probe selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Echo(EchoSettings),
    Http(HttpSettings),
    Proxy(ProxySettings),
}

impl Probe {
    pub fn name(&self) -> &'static str {
        match self {
            Probe::Echo(_) => "echo",
            Probe::Http(_) => "http",
            Probe::Proxy(_) => "proxy",
        }
    }

    fn default_port(&self) -> u16 {
        match self {
            Probe::Echo(_) | Probe::Http(_) => 8080,
            Probe::Proxy(_) => 9000,
        }
    }

    /// HTTP is a one-shot request; the others loop until interrupted.
    fn default_iterations(&self) -> u64 {
        match self {
            Probe::Http(_) => 1,
            Probe::Echo(_) | Probe::Proxy(_) => 0,
        }
    }

    /// HTTP holds the connection after its reply; the looping probes don't.
    fn default_linger(&self) -> bool {
        matches!(self, Probe::Http(_))
    }

    fn default_interval_ms(&self) -> u64 {
        match self {
            Probe::Echo(_) | Probe::Http(_) => 5000,
            Probe::Proxy(_) => 1000,
        }
    }
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// 0 means loop until an error ends the run
    pub iterations: u64,
    pub interval: Duration,
    /// Sleep `interval` once more after the last round before disconnecting
    pub linger: bool,
    pub timeout: Option<Duration>,
    pub buffer_size: usize,
    pub log_level: String,
    pub probe: Probe,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Read the TOML file named by `cli`, if any, and merge.
    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence).
    pub fn merge(cli: CliArgs, file: TomlConfig) -> Result<Self, ConfigError> {
        let probe = match cli.probe {
            ProbeCommand::Echo {
                message,
                repeat,
                max_frame_size,
            } => Probe::Echo(EchoSettings {
                message: message.or(file.echo.message),
                repeat: repeat
                    .or(file.echo.repeat)
                    .unwrap_or(DEFAULT_ECHO_REPEAT),
                max_frame_size: max_frame_size.or(file.echo.max_frame_size),
            }),
            ProbeCommand::Http {
                method,
                path,
                headers,
                body,
            } => {
                let raw_headers = if !headers.is_empty() {
                    headers
                } else {
                    file.http
                        .headers
                        .unwrap_or_else(|| vec![DEFAULT_HTTP_HEADER.to_string()])
                };
                Probe::Http(HttpSettings {
                    method: method
                        .or(file.http.method)
                        .unwrap_or_else(|| "GET".to_string()),
                    path: path
                        .or(file.http.path)
                        .unwrap_or_else(|| "/minimal".to_string()),
                    headers: raw_headers
                        .iter()
                        .map(|h| parse_header(h))
                        .collect::<Result<Vec<_>, _>>()?,
                    body: body
                        .or(file.http.body)
                        .unwrap_or_else(|| DEFAULT_HTTP_BODY.to_string()),
                })
            }
            ProbeCommand::Proxy { message } => Probe::Proxy(ProxySettings {
                message: message.or(file.proxy.message),
            }),
        };

        let timeout_ms = cli.timeout_ms.unwrap_or(file.target.timeout_ms);

        Ok(Config {
            host: cli.host.unwrap_or(file.target.host),
            port: cli
                .port
                .or(file.target.port)
                .unwrap_or_else(|| probe.default_port()),
            iterations: cli
                .iterations
                .or(file.probe.iterations)
                .unwrap_or_else(|| probe.default_iterations()),
            interval: Duration::from_millis(
                cli.interval_ms
                    .or(file.probe.interval_ms)
                    .unwrap_or_else(|| probe.default_interval_ms()),
            ),
            linger: cli
                .linger
                .or(file.probe.linger)
                .unwrap_or_else(|| probe.default_linger()),
            timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
            buffer_size: cli.buffer_size.unwrap_or(file.probe.buffer_size).max(1),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                file.logging.level
            },
            probe,
        })
    }
}

/// Split `Name: value` into its parts.
fn parse_header(raw: &str) -> Result<(String, String), ConfigError> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(ConfigError::InvalidHeader(raw.to_string())),
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    InvalidHeader(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidHeader(raw) => {
                write!(f, "Invalid header '{raw}', expected 'Name: value'")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
