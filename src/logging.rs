//! Logging System
//!
//! Structured logging on top of `tracing`. The level, format and destination
//! come from the `[logging]` config section, overridden by environment:
//!
//! - `VERSA_LOG`: full `EnvFilter` directive string
//! - `VERSA_LOG_FORMAT`: `text` or `json`
//! - `VERSA_LOG_OUTPUT`: `stdout`, `stderr` or `file`
//! - `VERSA_LOG_MODULES`: extra `module=level` pairs, comma separated

use crate::error::VersionError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// json or text
    #[serde(default = "default_format")]
    pub format: String,

    /// stdout, stderr or file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path when `output` is `file`
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// Colored output (text format on a terminal stream only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    // stdout carries command output
    "stderr".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from(".versa/versa.log")
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: default_log_file(),
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), String> {
        parse_format(&self.format)?;
        parse_output(&self.output)?;
        if !matches!(
            self.level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error" | "off"
        ) {
            return Err(format!("Invalid log level: {}", self.level));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogOutput {
    Stdout,
    Stderr,
    File,
}

fn parse_format(format: &str) -> Result<LogFormat, String> {
    match format {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(format!("Invalid log format: {} (must be 'json' or 'text')", other)),
    }
}

fn parse_output(output: &str) -> Result<LogOutput, String> {
    match output {
        "stdout" => Ok(LogOutput::Stdout),
        "stderr" => Ok(LogOutput::Stderr),
        "file" => Ok(LogOutput::File),
        other => Err(format!(
            "Invalid log output: {} (must be 'stdout', 'stderr' or 'file')",
            other
        )),
    }
}

/// Install the global subscriber.
///
/// Priority (highest first): `VERSA_LOG*` environment variables, the given
/// config, built-in defaults.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), VersionError> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);

    let filter = build_env_filter(config)?;
    let format = std::env::var("VERSA_LOG_FORMAT")
        .ok()
        .and_then(|f| parse_format(&f).ok())
        .map_or_else(|| parse_format(&config.format), Ok)
        .map_err(VersionError::ConfigError)?;
    let output = std::env::var("VERSA_LOG_OUTPUT")
        .ok()
        .map_or_else(|| parse_output(&config.output), |o| parse_output(&o))
        .map_err(VersionError::ConfigError)?;

    let writer = match output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::File => BoxMakeWriter::new(Mutex::new(open_log_file(config)?)),
    };

    let registry = Registry::default().with(filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(config.color && output != LogOutput::File)
                    .with_writer(writer),
            )
            .try_init(),
    };
    installed.map_err(|e| VersionError::ConfigError(format!("Failed to install log subscriber: {}", e)))
}

fn open_log_file(config: &LoggingConfig) -> Result<std::fs::File, VersionError> {
    if let Some(parent) = config.file.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| VersionError::ConfigError(format!("Failed to create log directory: {}", e)))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)
        .map_err(|e| VersionError::ConfigError(format!("Failed to open log file {:?}: {}", config.file, e)))
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, VersionError> {
    if let Ok(filter) = EnvFilter::try_from_env("VERSA_LOG") {
        return Ok(filter);
    }
    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(&config.level);
    let mut directives: Vec<String> = config
        .modules
        .iter()
        .map(|(module, level)| format!("{}={}", module, level))
        .collect();
    if let Ok(modules) = std::env::var("VERSA_LOG_MODULES") {
        directives.extend(parse_module_directives(&modules));
    }
    for directive in directives {
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| VersionError::ConfigError(format!("Invalid log directive {}: {}", directive, e)))?,
        );
    }
    Ok(filter)
}

fn parse_module_directives(pairs: &str) -> Vec<String> {
    pairs.split(',')
        .filter_map(|pair| {
            let (module, level) = pair.split_once('=')?;
            let (module, level) = (module.trim(), level.trim());
            if module.is_empty() || level.is_empty() {
                None
            } else {
                Some(format!("{}={}", module, level))
            }
        })
        .collect()
}
