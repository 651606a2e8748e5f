//! Startup requirement validation for procnotify.
//!
//! This module validates that the process has the privileges the netlink
//! process connector requires before monitoring starts.

use nix::unistd::geteuid;
use procnotify::channel;
use procnotify::ListenerError;
use std::fs;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Bit of CAP_NET_ADMIN in the capability sets of `/proc/<pid>/status`.
const CAP_NET_ADMIN: u32 = 12;

/// Validate all runtime requirements
///
/// With `probe_connector`, also opens and closes a connector socket, which
/// briefly subscribes to process events.
pub fn validate_requirements(
    probe_connector: bool,
    receive_timeout: Duration,
) -> Result<(), ValidationError> {
    info!("🔍 Validating runtime requirements...");

    check_user_privileges()?;

    if probe_connector {
        check_connector(receive_timeout)?;
    }

    info!("✅ All runtime requirements validated");
    Ok(())
}

/// Check if running with sufficient privileges
fn check_user_privileges() -> Result<(), ValidationError> {
    if geteuid().is_root() {
        info!("✅ Running as root (uid=0)");
        return Ok(());
    }

    match fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| has_capability(&status, CAP_NET_ADMIN))
    {
        Some(true) => {
            info!("✅ Running with CAP_NET_ADMIN");
            Ok(())
        }
        Some(false) => {
            error!("❌ Not running as root and CAP_NET_ADMIN is missing");
            error!("   The kernel only delivers process events to privileged listeners.");
            error!("");
            error!("   Solutions:");
            error!("   1. Run as root");
            error!("   2. Grant the capability:");
            error!("      setcap cap_net_admin+ep /path/to/procnotify");
            Err(ValidationError::InsufficientPermissions(
                "CAP_NET_ADMIN not in effective set".to_string(),
            ))
        }
        None => {
            warn!("⚠️  Could not read capabilities from /proc/self/status");
            Ok(()) // Continue but warn
        }
    }
}

/// Whether `cap` is set in the `CapEff` line of a `/proc/<pid>/status` dump.
fn has_capability(status: &str, cap: u32) -> Option<bool> {
    let line = status.lines().find(|l| l.starts_with("CapEff:"))?;
    let hex = line.trim_start_matches("CapEff:").trim();
    let mask = u64::from_str_radix(hex, 16).ok()?;
    Some(mask & (1u64 << cap) != 0)
}

/// Check that a connector socket can be opened, bound and subscribed
fn check_connector(receive_timeout: Duration) -> Result<(), ValidationError> {
    debug!("Probing netlink process connector...");

    match channel::probe(receive_timeout) {
        Ok(()) => {
            info!("✅ Netlink process connector is available");
            Ok(())
        }
        Err(ListenerError::UnsupportedPlatform) => {
            error!("❌ The process connector only exists on Linux");
            Err(ValidationError::ConnectorUnavailable(
                ListenerError::UnsupportedPlatform,
            ))
        }
        Err(e) => {
            error!("❌ Cannot subscribe to process events: {}", e);
            error!("   Check that the kernel was built with CONFIG_PROC_EVENTS=y");
            Err(ValidationError::ConnectorUnavailable(e))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("Process connector unavailable: {0}")]
    ConnectorUnavailable(#[source] ListenerError),
}
