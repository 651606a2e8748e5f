//! Error types for the listener.
//!
//! Construction and shutdown failures are returned to the caller as
//! [`ListenerError`]. Everything that goes wrong while the read loop is
//! running is published on the error queue as an [`EventError`] and never
//! stops the loop.

use std::io;

use crate::event::Pid;

/// Fatal errors from building or tearing down a listener.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to create netlink connector socket: {0}")]
    Socket(#[source] io::Error),

    #[error("failed to bind to the process event multicast group: {0}")]
    Bind(#[source] io::Error),

    #[error("failed to send control message to the connector: {0}")]
    Send(#[source] io::Error),

    #[error("failed to set socket option: {0}")]
    SocketOption(#[source] io::Error),

    #[error("process event connector is not supported on this platform")]
    UnsupportedPlatform,

    #[error("failed to spawn dispatcher thread: {0}")]
    ThreadSpawn(#[source] io::Error),

    #[error("dispatcher thread panicked")]
    DispatcherPanicked,
}

/// Per-message failures delivered on the error queue.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("receive failed: {0}")]
    Transport(#[from] io::Error),

    #[error("invalid message: {len} bytes is shorter than a netlink header")]
    InvalidMessage { len: usize },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Wire format violations found by the codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed envelope: need {needed} bytes, have {available}")]
    MalformedEnvelope { needed: usize, available: usize },

    #[error("payload length mismatch: header declares {declared} bytes, {available} available")]
    PayloadLengthMismatch { declared: usize, available: usize },

    #[error("truncated {what}: need {needed} bytes, have {available}")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },
}

/// Errors from subscription calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchError {
    #[error("watcher is closed")]
    Closed,

    #[error("watch for pid={0} does not exist")]
    NotWatched(Pid),
}
