//! Configuration module for the ccredis client.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::protocols::resp::parser::{Limits, DEFAULT_MAX_BULK_LEN, DEFAULT_MAX_DEPTH};
use crate::protocols::resp::reader::DEFAULT_CHUNK_SIZE;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Command-line arguments for the client
#[derive(Parser, Debug, Default)]
#[command(name = "ccredis")]
#[command(version = "0.1.0")]
#[command(about = "A basic Redis CLI client", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Redis server host
    #[arg(long)]
    pub host: Option<String>,

    /// Redis server port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Reply read timeout in milliseconds (0 = wait forever)
    #[arg(long)]
    pub read_timeout_ms: Option<u64>,

    /// Connect timeout in milliseconds
    #[arg(long)]
    pub connect_timeout_ms: Option<u64>,

    /// Path to the JSON command table used by `help`
    #[arg(long)]
    pub commands: Option<PathBuf>,

    /// Maximum array nesting accepted in a reply
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Maximum bulk string length accepted in a reply, in bytes
    #[arg(long)]
    pub max_bulk_len: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection-related configuration
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 0 disables the timeout
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            read_timeout_ms: default_read_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_chunk_size: default_read_chunk_size(),
        }
    }
}

/// Decoder limits
#[derive(Debug, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_bulk_len")]
    pub max_bulk_len: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_bulk_len: default_max_bulk_len(),
        }
    }
}

/// Command table location
#[derive(Debug, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_commands_path")]
    pub path: PathBuf,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            path: default_commands_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
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
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_read_timeout_ms() -> u64 {
    30_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_read_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_max_bulk_len() -> usize {
    DEFAULT_MAX_BULK_LEN
}

fn default_commands_path() -> PathBuf {
    PathBuf::from("commands.json")
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// `None` blocks until the server answers
    pub read_timeout: Option<Duration>,
    pub connect_timeout: Duration,
    pub read_chunk_size: usize,
    pub limits: Limits,
    pub commands_path: PathBuf,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config::resolve(CliArgs::default(), TomlConfig::default())
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Config::resolve(cli, toml_config))
    }

    /// Merge CLI args with TOML config (CLI takes precedence)
    pub fn resolve(cli: CliArgs, toml_config: TomlConfig) -> Self {
        let read_timeout_ms = cli
            .read_timeout_ms
            .unwrap_or(toml_config.client.read_timeout_ms);

        Config {
            host: cli.host.unwrap_or(toml_config.client.host),
            port: cli.port.unwrap_or(toml_config.client.port),
            read_timeout: (read_timeout_ms > 0).then(|| Duration::from_millis(read_timeout_ms)),
            connect_timeout: Duration::from_millis(
                cli.connect_timeout_ms
                    .unwrap_or(toml_config.client.connect_timeout_ms),
            ),
            read_chunk_size: toml_config.client.read_chunk_size.max(1),
            limits: Limits {
                max_depth: cli.max_depth.unwrap_or(toml_config.protocol.max_depth),
                max_bulk_len: cli
                    .max_bulk_len
                    .unwrap_or(toml_config.protocol.max_bulk_len),
            },
            commands_path: cli.commands.unwrap_or(toml_config.commands.path),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        }
    }

    /// `host:port`, as shown in the prompt
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {err}", path = .0.display(), err = .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{path}': {err}", path = .0.display(), err = .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
}
