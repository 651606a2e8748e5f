//! Dispatcher: the read loop that turns datagrams into subscriber events.
//!
//! Per datagram: validate the length, walk its netlink messages, decode the
//! connector payload, consult the watch table and push typed events onto the
//! per-kind queues. Every failure is confined to the message that caused it
//! and reported on the error queue; the loop keeps running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace, warn};

use crate::channel::{is_timeout, Transport};
use crate::codec::{Envelope, Payload, ProcEventHeader, WireCodec, NLMSG_HDRLEN};
use crate::error::{EventError, WatchError};
use crate::event::{
    EventOrigin, ExecEvent, ExitEvent, ForkEvent, IdChangeEvent, Pid, SessionEvent,
    PROC_EVENT_EXEC, PROC_EVENT_EXIT, PROC_EVENT_FORK, PROC_EVENT_SID, PROC_EVENT_UID,
};
use crate::stats::ListenerStats;
use crate::watch::WatchTable;

/// Sending halves of the event queues, owned by the dispatcher.
#[derive(Debug, Clone)]
pub struct EventSenders {
    fork: UnboundedSender<ForkEvent>,
    exec: UnboundedSender<ExecEvent>,
    exit: UnboundedSender<ExitEvent>,
    uid: UnboundedSender<IdChangeEvent>,
    sid: UnboundedSender<SessionEvent>,
    error: UnboundedSender<EventError>,
}

/// Receiving halves of the event queues, handed to the subscriber.
///
/// The queues are unbounded: a slow consumer grows memory rather than
/// stalling the read loop. They close once the dispatcher stops.
#[derive(Debug)]
pub struct EventStreams {
    pub fork: UnboundedReceiver<ForkEvent>,
    pub exec: UnboundedReceiver<ExecEvent>,
    pub exit: UnboundedReceiver<ExitEvent>,
    /// uid and gid changes.
    pub uid: UnboundedReceiver<IdChangeEvent>,
    pub sid: UnboundedReceiver<SessionEvent>,
    pub error: UnboundedReceiver<EventError>,
}

/// Creates one queue per event kind plus the error queue.
pub fn event_queues() -> (EventSenders, EventStreams) {
    let (fork_tx, fork_rx) = mpsc::unbounded_channel();
    let (exec_tx, exec_rx) = mpsc::unbounded_channel();
    let (exit_tx, exit_rx) = mpsc::unbounded_channel();
    let (uid_tx, uid_rx) = mpsc::unbounded_channel();
    let (sid_tx, sid_rx) = mpsc::unbounded_channel();
    let (error_tx, error_rx) = mpsc::unbounded_channel();

    (
        EventSenders {
            fork: fork_tx,
            exec: exec_tx,
            exit: exit_tx,
            uid: uid_tx,
            sid: sid_tx,
            error: error_tx,
        },
        EventStreams {
            fork: fork_rx,
            exec: exec_rx,
            exit: exit_rx,
            uid: uid_rx,
            sid: sid_rx,
            error: error_rx,
        },
    )
}

pub struct Dispatcher {
    codec: WireCodec,
    watches: Arc<WatchTable>,
    senders: EventSenders,
    stats: Arc<ListenerStats>,
}

impl Dispatcher {
    pub fn new(
        codec: WireCodec,
        watches: Arc<WatchTable>,
        senders: EventSenders,
        stats: Arc<ListenerStats>,
    ) -> Self {
        Self {
            codec,
            watches,
            senders,
            stats,
        }
    }

    /// Receives and handles datagrams until `stop` is set.
    ///
    /// `stop` is checked before every receive, so the transport's receive
    /// timeout bounds how long a stop request can go unnoticed.
    pub fn run(&self, transport: &mut dyn Transport, stop: &AtomicBool, buffer_size: usize) {
        let mut buf = vec![0u8; buffer_size];
        debug!("Dispatcher started (buffer {} bytes)", buffer_size);

        while !stop.load(Ordering::Acquire) {
            match transport.receive(&mut buf) {
                Ok(n) => self.handle_datagram(&buf[..n]),
                Err(e) if is_timeout(&e) => continue,
                Err(e) => self.publish_error(EventError::Transport(e)),
            }
        }

        debug!("Dispatcher stopped");
    }

    /// Handles one datagram as received from the socket.
    pub fn handle_datagram(&self, datagram: &[u8]) {
        ListenerStats::incr(&self.stats.datagrams_received);
        trace!("Received datagram of {} bytes", datagram.len());

        if datagram.len() < NLMSG_HDRLEN {
            self.publish_error(EventError::InvalidMessage {
                len: datagram.len(),
            });
            return;
        }

        let mut rest = datagram;
        while rest.len() >= NLMSG_HDRLEN {
            let (envelope, payload) = match self.codec.decode_envelope(rest) {
                Ok(decoded) => decoded,
                Err(e) => {
                    self.publish_error(e.into());
                    return;
                }
            };
            self.handle_message(&envelope, payload);
            rest = &rest[envelope.aligned_len().min(rest.len())..];
        }
    }

    fn handle_message(&self, envelope: &Envelope, payload: &[u8]) {
        if !envelope.is_done() || !envelope.is_proc_event() {
            trace!(
                "Ignoring netlink message type={} connector={:?}",
                envelope.netlink.msg_type,
                envelope.connector
            );
            self.ignore();
            return;
        }

        let (header, data) = match self.codec.decode_event_header(payload) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.publish_error(e.into());
                return;
            }
        };
        match self.codec.decode_payload(header.what, data) {
            Ok(event) => self.route(&header, event),
            Err(e) => self.publish_error(e.into()),
        }
    }

    fn route(&self, header: &ProcEventHeader, payload: Payload) {
        let origin = EventOrigin {
            cpu: header.cpu,
            timestamp_ns: header.timestamp_ns,
        };

        match payload {
            Payload::Fork {
                parent_tgid,
                child_tgid,
                ..
            } => {
                // Children of a process watched for exec inherit its watch.
                if self
                    .watches
                    .follow_fork(parent_tgid, child_tgid, PROC_EVENT_EXEC)
                {
                    ListenerStats::incr(&self.stats.forks_followed);
                }
                if self.watches.is_watching(parent_tgid, PROC_EVENT_FORK) {
                    let event = ForkEvent {
                        parent_pid: parent_tgid,
                        child_pid: child_tgid,
                        origin,
                    };
                    self.emit(&self.senders.fork, event);
                } else {
                    self.ignore();
                }
            }
            Payload::Exec { tgid, .. } => {
                if self.watches.is_watching(tgid, PROC_EVENT_EXEC) {
                    self.emit(&self.senders.exec, ExecEvent { pid: tgid, origin });
                } else {
                    self.ignore();
                }
            }
            Payload::Exit {
                tgid,
                exit_code,
                exit_signal,
                ..
            } => {
                if self.watches.is_watching(tgid, PROC_EVENT_EXIT) {
                    self.expire(tgid);
                    let event = ExitEvent {
                        pid: tgid,
                        exit_code,
                        exit_signal,
                        origin,
                    };
                    self.emit(&self.senders.exit, event);
                } else {
                    self.ignore();
                }
            }
            Payload::Id {
                kind,
                tgid,
                real_id,
                effective_id,
                ..
            } => {
                // gid changes are gated on uid interest, and both end the watch
                // like an exit does.
                if self.watches.is_watching(tgid, PROC_EVENT_UID) {
                    self.expire(tgid);
                    let event = IdChangeEvent {
                        pid: tgid,
                        kind,
                        real_id,
                        effective_id,
                        origin,
                    };
                    self.emit(&self.senders.uid, event);
                } else {
                    self.ignore();
                }
            }
            Payload::Sid { tgid, .. } => {
                if self.watches.is_watching(tgid, PROC_EVENT_SID) {
                    self.expire(tgid);
                    self.emit(&self.senders.sid, SessionEvent { pid: tgid, origin });
                } else {
                    self.ignore();
                }
            }
            Payload::Ptrace { .. }
            | Payload::Comm { .. }
            | Payload::Coredump { .. }
            | Payload::Ignored { .. } => {
                trace!("Ignoring event kind {:#010x}", header.what);
                self.ignore();
            }
        }
    }

    /// Drops the explicit watch for `pid`. Matches through the wildcard have
    /// no entry to drop.
    fn expire(&self, pid: Pid) {
        match self.watches.unsubscribe(pid) {
            Ok(()) => ListenerStats::incr(&self.stats.watches_expired),
            Err(WatchError::NotWatched(_)) | Err(WatchError::Closed) => {}
        }
    }

    fn emit<T>(&self, queue: &UnboundedSender<T>, event: T) {
        if queue.send(event).is_ok() {
            ListenerStats::incr(&self.stats.events_emitted);
        } else {
            trace!("Event queue closed by subscriber, dropping event");
        }
    }

    fn ignore(&self) {
        ListenerStats::incr(&self.stats.messages_ignored);
    }

    fn publish_error(&self, err: EventError) {
        warn!("Process event error: {}", err);
        ListenerStats::incr(&self.stats.errors_published);
        let _ = self.senders.error.send(err);
    }
}
