//! procnotify - version 0.1.0
//!
//! Prints process lifecycle events from the netlink process connector.
//! This is the main entry point that sets up logging, handles subcommands and
//! runs the event loop.

mod cli;
mod commands;
mod config;
mod output;
mod startup_checks;

use anyhow::{anyhow, Context};
use chrono::Utc;
use clap::Parser;
use procnotify::{EventStreams, Watcher};
use std::io::{self, Write};
use tokio::signal;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn};

use cli::{Args, Commands, LogLevel, OutputFormat};
use commands::{command_check_requirements, command_config};
use config::{resolve_config, show_config, validate_effective_config, Config};
use output::{render, render_stats, Notification};

/// Initializes tracing logging subsystem with configured log level.
///
/// Logs go to stderr; stdout carries only event output.
fn setup_logging(config: &Config) {
    let level = config.log_level();
    let max_level = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_writer(io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    debug!("Logging initialized with level: {:?}", level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> anyhow::Result<Config> {
    let config = resolve_config(args).map_err(|e| anyhow!("Failed to load configuration: {}", e))?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Writes one line to stdout. A closed pipe ends monitoring.
fn emit_line(line: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", line)?;
    stdout.flush()
}

/// Prints events from every queue until shutdown or until stdout goes away.
async fn print_events(events: &mut EventStreams, format: OutputFormat) -> anyhow::Result<()> {
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let notification = tokio::select! {
            _ = &mut shutdown => break,
            Some(ev) = events.fork.recv() => Notification::Fork(ev),
            Some(ev) = events.exec.recv() => Notification::Exec(ev),
            Some(ev) = events.exit.recv() => Notification::Exit(ev),
            Some(ev) = events.uid.recv() => Notification::IdChange(ev),
            Some(ev) = events.sid.recv() => Notification::Session(ev),
            Some(err) = events.error.recv() => {
                warn!("Process event error: {}", err);
                continue;
            }
        };

        let line = render(&notification, format, Utc::now())?;
        if let Err(e) = emit_line(&line) {
            if e.kind() == io::ErrorKind::BrokenPipe {
                debug!("stdout closed, stopping");
                break;
            }
            return Err(e).context("Failed to write event");
        }
    }

    Ok(())
}

/// Subscribes the configured pids and prints events until shutdown.
async fn monitor(config: &Config) -> anyhow::Result<()> {
    let mask = config
        .event_mask()
        .map_err(|name| anyhow!("Unknown event name '{}'", name))?;
    let format = config.output_format();

    let (mut watcher, mut events) = Watcher::with_config(config.listener_config())
        .context("Failed to subscribe to process events")?;

    for pid in config.watch_pids() {
        watcher.watch(pid, mask)?;
        info!("Watching pid {} (flags={:#010x})", pid, mask);
    }

    let result = print_events(&mut events, format).await;

    let stats = watcher.stats();
    tokio::task::spawn_blocking(move || watcher.close())
        .await
        .context("Listener shutdown task failed")?
        .context("Failed to close process event listener")?;

    if config.print_stats.unwrap_or(false) {
        let line = render_stats(&stats, format)?;
        if format == OutputFormat::Json {
            emit_line(&line)?;
        } else {
            eprintln!("{}", line);
        }
    }

    result
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config =
            resolve_config(&args).map_err(|e| anyhow!("Failed to load configuration: {}", e))?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format.clone())
            .map_err(|e| anyhow!("Failed to render configuration: {}", e));
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        return match command {
            Commands::CheckRequirements => {
                let config = resolve_config(&args)
                    .map_err(|e| anyhow!("Failed to load configuration: {}", e))?;
                setup_logging(&config);
                if command_check_requirements(&config) {
                    Ok(())
                } else {
                    std::process::exit(1);
                }
            }

            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output.clone(), format.clone(), *commented)
                .map_err(|e| anyhow!("Failed to write configuration: {}", e)),
        };
    }

    // Load configuration for monitoring mode
    let config = load_validated_config(&args)?;

    setup_logging(&config);

    info!("Starting procnotify");

    let receive_timeout = config.listener_config().receive_timeout;
    if let Err(e) = startup_checks::validate_requirements(false, receive_timeout) {
        error!("❌ Startup validation failed: {}", e);
        error!("   Subscribing anyway; the kernel has the final word");
        // Continue anyway - don't fail hard
    }

    monitor(&config).await?;

    info!("procnotify stopped gracefully");
    Ok(())
}
