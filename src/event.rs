//! Process event kinds and the typed events delivered to subscribers.
//!
//! The flag values are the kernel's `enum what` from `<linux/cn_proc.h>`.
//! They double as the interest bitmask used by the watch table.

use serde::Serialize;

/// Logical process id (the kernel's thread-group id).
pub type Pid = i32;

/// Wildcard subscription key: matches every process without its own entry.
pub const ANY: Pid = -1;

pub const PROC_EVENT_NONE: u32 = 0x0000_0000;
pub const PROC_EVENT_FORK: u32 = 0x0000_0001;
pub const PROC_EVENT_EXEC: u32 = 0x0000_0002;
pub const PROC_EVENT_UID: u32 = 0x0000_0004;
pub const PROC_EVENT_GID: u32 = 0x0000_0040;
pub const PROC_EVENT_SID: u32 = 0x0000_0080;
pub const PROC_EVENT_PTRACE: u32 = 0x0000_0100;
pub const PROC_EVENT_COMM: u32 = 0x0000_0200;
pub const PROC_EVENT_COREDUMP: u32 = 0x4000_0000;
pub const PROC_EVENT_EXIT: u32 = 0x8000_0000;

/// Every kind the dispatcher routes to a queue.
pub const PROC_EVENT_ALL: u32 = PROC_EVENT_FORK
    | PROC_EVENT_EXEC
    | PROC_EVENT_EXIT
    | PROC_EVENT_GID
    | PROC_EVENT_SID
    | PROC_EVENT_UID;

/// Names accepted by [`parse_event_flags`], with their flag values.
pub const EVENT_NAMES: &[(&str, u32)] = &[
    ("fork", PROC_EVENT_FORK),
    ("exec", PROC_EVENT_EXEC),
    ("exit", PROC_EVENT_EXIT),
    ("uid", PROC_EVENT_UID),
    ("gid", PROC_EVENT_GID),
    ("sid", PROC_EVENT_SID),
    ("all", PROC_EVENT_ALL),
];

/// Parses a list of event names (case-insensitive) into an interest mask.
///
/// Returns the offending name on the first unknown entry.
pub fn parse_event_flags<S: AsRef<str>>(names: &[S]) -> Result<u32, String> {
    let mut mask = 0u32;
    for name in names {
        let name = name.as_ref().trim().to_ascii_lowercase();
        match EVENT_NAMES.iter().find(|(n, _)| *n == name) {
            Some((_, flag)) => mask |= flag,
            None => return Err(name),
        }
    }
    Ok(mask)
}

/// Kernel timing information attached to every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventOrigin {
    pub cpu: u32,
    pub timestamp_ns: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForkEvent {
    pub parent_pid: Pid,
    pub child_pid: Pid,
    pub origin: EventOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecEvent {
    pub pid: Pid,
    pub origin: EventOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExitEvent {
    pub pid: Pid,
    pub exit_code: u32,
    pub exit_signal: u32,
    pub origin: EventOrigin,
}

/// Which credential changed in an [`IdChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdKind {
    Uid,
    Gid,
}

/// uid or gid change. Both are delivered on the uid queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdChangeEvent {
    pub pid: Pid,
    pub kind: IdKind,
    /// Real id (ruid / rgid).
    pub real_id: u32,
    /// Effective id (euid / egid).
    pub effective_id: u32,
    pub origin: EventOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionEvent {
    pub pid: Pid,
    pub origin: EventOrigin,
}
