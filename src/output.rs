//! Event rendering for the procnotify binary.
//!
//! Text lines are meant for people (`EXEC 1234`); JSON lines carry every
//! field plus the local receive time and are meant for other programs.

use chrono::{DateTime, Utc};
use procnotify::{
    ExecEvent, ExitEvent, ForkEvent, IdChangeEvent, IdKind, SessionEvent, StatsSnapshot,
};
use serde::Serialize;

use crate::cli::OutputFormat;

/// One event taken off any of the listener queues.
#[derive(Debug, Clone)]
pub enum Notification {
    Fork(ForkEvent),
    Exec(ExecEvent),
    Exit(ExitEvent),
    IdChange(IdChangeEvent),
    Session(SessionEvent),
}

impl Notification {
    pub fn name(&self) -> &'static str {
        match self {
            Notification::Fork(_) => "fork",
            Notification::Exec(_) => "exec",
            Notification::Exit(_) => "exit",
            Notification::IdChange(ev) => match ev.kind {
                IdKind::Uid => "uid",
                IdKind::Gid => "gid",
            },
            Notification::Session(_) => "sid",
        }
    }
}

#[derive(Serialize)]
struct JsonLine<'a, T: Serialize> {
    event: &'static str,
    #[serde(flatten)]
    data: &'a T,
    received_at: DateTime<Utc>,
}

fn json_line<T: Serialize>(
    event: &'static str,
    data: &T,
    received_at: DateTime<Utc>,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&JsonLine {
        event,
        data,
        received_at,
    })
}

fn text_line(notification: &Notification) -> String {
    match notification {
        Notification::Fork(ev) => format!("FORK {} -> {}", ev.parent_pid, ev.child_pid),
        Notification::Exec(ev) => format!("EXEC {}", ev.pid),
        Notification::Exit(ev) => format!(
            "EXIT {} code={} signal={}",
            ev.pid, ev.exit_code, ev.exit_signal
        ),
        Notification::IdChange(ev) => format!(
            "{} {} real={} effective={}",
            notification.name().to_ascii_uppercase(),
            ev.pid,
            ev.real_id,
            ev.effective_id
        ),
        Notification::Session(ev) => format!("SID {}", ev.pid),
    }
}

/// Renders one event as a single output line (without the newline).
pub fn render(
    notification: &Notification,
    format: OutputFormat,
    received_at: DateTime<Utc>,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Text => Ok(text_line(notification)),
        OutputFormat::Json => {
            let name = notification.name();
            match notification {
                Notification::Fork(ev) => json_line(name, ev, received_at),
                Notification::Exec(ev) => json_line(name, ev, received_at),
                Notification::Exit(ev) => json_line(name, ev, received_at),
                Notification::IdChange(ev) => json_line(name, ev, received_at),
                Notification::Session(ev) => json_line(name, ev, received_at),
            }
        }
    }
}

/// Renders the end-of-run statistics summary.
pub fn render_stats(
    stats: &StatsSnapshot,
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => json_line("stats", stats, Utc::now()),
        OutputFormat::Text => Ok(format!(
            "STATS datagrams={} events={} ignored={} errors={} forks_followed={} watches_expired={}",
            stats.datagrams_received,
            stats.events_emitted,
            stats.messages_ignored,
            stats.errors_published,
            stats.forks_followed,
            stats.watches_expired
        )),
    }
}
