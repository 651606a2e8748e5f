//! Configuration management for procnotify.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel, OutputFormat};
use procnotify::codec::MIN_ENVELOPE_LEN;
use procnotify::{parse_event_flags, ListenerConfig, Pid, ANY, DEFAULT_RECEIVE_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_EVENTS: &str = "all";
pub const DEFAULT_FORMAT: &str = "text";
pub const DEFAULT_LOG_LEVEL: &str = "info";

const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "/etc/procnotify/procnotify.yaml",
    "/etc/procnotify/procnotify.yml",
    "/etc/procnotify/procnotify.json",
    "/etc/procnotify/procnotify.toml",
    "./procnotify.yaml",
    "./procnotify.yml",
    "./procnotify.json",
];

/// Effective configuration of the procnotify binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Processes to watch; empty or absent means every process
    pub pids: Option<Vec<Pid>>,
    /// Event kind names (fork, exec, exit, uid, gid, sid, all)
    pub events: Option<Vec<String>>,
    /// "text" | "json"
    pub format: Option<String>,

    // Logging
    pub log_level: Option<String>,

    // Listener tuning
    #[serde(alias = "receive-timeout-ms")]
    pub receive_timeout_ms: Option<u64>,
    #[serde(alias = "buffer-size")]
    pub buffer_size: Option<usize>,

    #[serde(alias = "print-stats")]
    pub print_stats: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pids: None,
            events: Some(vec![DEFAULT_EVENTS.to_string()]),
            format: Some(DEFAULT_FORMAT.to_string()),
            log_level: Some(DEFAULT_LOG_LEVEL.to_string()),
            receive_timeout_ms: Some(DEFAULT_RECEIVE_TIMEOUT.as_millis() as u64),
            buffer_size: None,
            print_stats: Some(false),
        }
    }
}

impl Config {
    /// Pids to subscribe; the wildcard when none are configured.
    pub fn watch_pids(&self) -> Vec<Pid> {
        match self.pids.as_deref() {
            Some(pids) if !pids.is_empty() => pids.to_vec(),
            _ => vec![ANY],
        }
    }

    /// Interest mask built from the configured event names.
    pub fn event_mask(&self) -> Result<u32, String> {
        match self.events.as_deref() {
            Some(names) if !names.is_empty() => parse_event_flags(names),
            _ => parse_event_flags(&[DEFAULT_EVENTS]),
        }
    }

    pub fn output_format(&self) -> OutputFormat {
        self.format
            .as_deref()
            .and_then(OutputFormat::from_name)
            .unwrap_or(OutputFormat::Text)
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .and_then(LogLevel::from_name)
            .unwrap_or(LogLevel::Info)
    }

    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            receive_timeout: self
                .receive_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_RECEIVE_TIMEOUT),
            buffer_size: self.buffer_size,
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Err(name) = cfg.event_mask() {
        return Err(format!(
            "Invalid event name '{}', expected one of fork, exec, exit, uid, gid, sid, all",
            name
        )
        .into());
    }

    if let Some(format) = cfg.format.as_deref() {
        if OutputFormat::from_name(format).is_none() {
            return Err(format!("Invalid format '{}', expected 'text' or 'json'", format).into());
        }
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if LogLevel::from_name(level).is_none() {
            return Err(format!(
                "Invalid log_level '{}', expected off, error, warn, info, debug or trace",
                level
            )
            .into());
        }
    }

    if let Some(pid) = cfg.pids.iter().flatten().find(|&&pid| pid < ANY) {
        return Err(format!("Invalid pid {}, expected a process id or -1 for all", pid).into());
    }

    if cfg.receive_timeout_ms == Some(0) {
        return Err("receive_timeout_ms must be greater than 0".into());
    }

    if let Some(size) = cfg.buffer_size {
        if size < MIN_ENVELOPE_LEN {
            return Err(format!(
                "buffer_size {} is below the minimum datagram size of {} bytes",
                size, MIN_ENVELOPE_LEN
            )
            .into());
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if !args.pids.is_empty() {
        config.pids = Some(args.pids.clone());
    }

    // Parse comma-separated event names
    if let Some(events) = &args.events {
        config.events = Some(
            events
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        );
    }

    if let Some(format) = args.format {
        config.format = Some(format.as_str().to_string());
    }
    if let Some(level) = &args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }
    if let Some(ms) = args.receive_timeout_ms {
        config.receive_timeout_ms = Some(ms);
    }
    if let Some(size) = args.buffer_size {
        config.buffer_size = Some(size);
    }
    if args.print_stats {
        config.print_stats = Some(true);
    }

    Ok(config)
}

/// Configuration loading with multiple format support.
///
/// An explicit path must exist; without one the default locations are tried
/// and the built-in defaults apply when none is present.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) if !p.exists() => {
            return Err(format!("Config file not found: {}", p.display()).into());
        }
        Some(p) => p.to_path_buf(),
        None => match DEFAULT_CONFIG_PATHS
            .iter()
            .find(|p| Path::new(p).exists())
            .map(PathBuf::from)
        {
            Some(p) => p,
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders configuration in the requested format
pub fn render_config(
    config: &Config,
    format: &ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, &format)?);
    Ok(())
}
