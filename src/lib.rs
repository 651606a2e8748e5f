//! procnotify - Linux process lifecycle notifications
//!
//! This library subscribes to the kernel's netlink process connector and
//! forwards fork, exec, exit, uid/gid and session events for the processes a
//! caller is interested in. The kernel broadcasts events for every process on
//! the host; filtering happens locally against a watch table.
//!
//! # Features
//!
//! - **Per-pid or host-wide subscriptions**: watch a pid, or [`ANY`] process
//! - **Fork following**: children of a process watched for exec are watched too
//! - **Automatic cleanup**: a watch ends when its process exits
//! - **Isolated failures**: bad datagrams land on an error queue, the loop keeps running
//!
//! # Usage
//!
//! ```no_run
//! use procnotify::{Watcher, PROC_EVENT_EXEC, PROC_EVENT_EXIT};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let (mut watcher, mut events) = Watcher::new()?;
//! watcher.watch(1234, PROC_EVENT_EXEC | PROC_EVENT_EXIT)?;
//!
//! while let Some(exec) = events.exec.recv().await {
//!     println!("pid {} called exec", exec.pid);
//! }
//!
//! watcher.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! On systems without the process connector, [`Watcher::new`] fails with
//! [`ListenerError::UnsupportedPlatform`].

pub mod channel;
pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod stats;
pub mod watch;
pub mod watcher;

// Re-export main types for convenience
pub use channel::{KernelChannel, Transport};
pub use codec::{ByteOrder, Payload, ProcEventHeader, WireCodec};
pub use dispatcher::{Dispatcher, EventStreams};
pub use error::{DecodeError, EventError, ListenerError, WatchError};
pub use event::{
    parse_event_flags, EventOrigin, ExecEvent, ExitEvent, ForkEvent, IdChangeEvent, IdKind, Pid,
    SessionEvent, ANY, PROC_EVENT_ALL, PROC_EVENT_COMM, PROC_EVENT_COREDUMP, PROC_EVENT_EXEC,
    PROC_EVENT_EXIT, PROC_EVENT_FORK, PROC_EVENT_GID, PROC_EVENT_NONE, PROC_EVENT_PTRACE,
    PROC_EVENT_SID, PROC_EVENT_UID,
};
pub use stats::{ListenerStats, StatsSnapshot};
pub use watch::WatchTable;
pub use watcher::{ListenerConfig, Watcher, DEFAULT_RECEIVE_TIMEOUT};
