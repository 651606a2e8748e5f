//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from(default_file_name(&format)),
    };

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

fn default_file_name(format: &ConfigFormat) -> &'static str {
    match format {
        ConfigFormat::Yaml => "procnotify.yaml",
        ConfigFormat::Json => "procnotify.json",
        ConfigFormat::Toml => "procnotify.toml",
    }
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# procnotify Configuration
# ========================
#
# Subscriptions
# -------------
# pids: null                   # Process ids to watch (null or [] = every process)
# events: ["all"]              # fork, exec, exit, uid, gid, sid, all
#                              # Children of a pid watched for exec are followed.
#
# Output
# ------
# format: "text"               # text | json (one object per line)
# print_stats: false           # Print listener counters on exit
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace (stderr)
#
# Listener Tuning
# ---------------
# receive_timeout_ms: 250      # Upper bound on shutdown latency
# buffer_size: null            # Receive buffer in bytes (null = page size)
"#;

    format!("{comments}\n{yaml}")
}
