//! CLI argument definitions for the zmai server.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::{Path, PathBuf};

use zmai_core::config::ZmaiConfig;
use zmai_core::error::ZmaiError;

/// zmai - chat backend with conversation history, web search and
/// pluggable language models.
#[derive(Parser, Debug)]
#[command(name = "zmai", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Address to bind the API server to.
    #[arg(long = "host")]
    pub host: Option<String>,

    /// Data directory for the database, conversation files and prompt.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Where the configuration comes from, and whether it was asked for.
    ///
    /// Priority: --config flag > ZMAI_CONFIG env var > ~/.zmai/config.toml.
    pub fn config_source(&self) -> ConfigSource {
        if let Some(ref p) = self.config {
            return ConfigSource::Explicit(p.clone());
        }
        if let Ok(p) = std::env::var("ZMAI_CONFIG") {
            if !p.is_empty() {
                return ConfigSource::Explicit(PathBuf::from(p));
            }
        }
        ConfigSource::Default(default_config_path())
    }

    /// Write every flag that was given over the loaded configuration.
    pub fn apply_to(&self, config: &mut ZmaiConfig) {
        if let Some(port) = self.port {
            config.general.port = port;
        }
        if let Some(ref host) = self.host {
            config.general.host = host.clone();
        }
        if let Some(ref dir) = self.data_dir {
            config.general.data_dir = dir.to_string_lossy().to_string();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}

/// A configuration file location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Named by `--config` or `ZMAI_CONFIG`; it must exist and parse.
    Explicit(PathBuf),
    /// The per-user default; defaults apply when it does not exist.
    Default(PathBuf),
}

impl ConfigSource {
    pub fn path(&self) -> &Path {
        match self {
            ConfigSource::Explicit(p) | ConfigSource::Default(p) => p,
        }
    }

    /// Read the file. Only a missing default file falls back to defaults.
    pub fn load(&self) -> Result<ZmaiConfig, ZmaiError> {
        match self {
            ConfigSource::Explicit(path) => ZmaiConfig::load(path).map_err(|e| match e {
                ZmaiError::Io(io) => {
                    ZmaiError::Config(format!("Cannot read {}: {}", path.display(), io))
                }
                other => other,
            }),
            ConfigSource::Default(path) => match ZmaiConfig::load_optional(path)? {
                Some(config) => Ok(config),
                None => {
                    tracing::info!(path = %path.display(), "No configuration file, using defaults");
                    Ok(ZmaiConfig::default())
                }
            },
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".zmai").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".zmai").join("config.toml");
    }
    PathBuf::from("config.toml")
}
