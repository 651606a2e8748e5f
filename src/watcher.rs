//! Subscriber-facing listener.
//!
//! A [`Watcher`] owns the background reader thread and the watch table.
//! Events arrive on the [`EventStreams`] returned alongside it.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::channel::{page_size, KernelChannel, Transport};
use crate::codec::{WireCodec, MIN_ENVELOPE_LEN};
use crate::dispatcher::{event_queues, Dispatcher, EventStreams};
use crate::error::{ListenerError, WatchError};
use crate::event::Pid;
use crate::stats::{ListenerStats, StatsSnapshot};
use crate::watch::WatchTable;

pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(250);

/// Listener tuning.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Upper bound on how long a pending receive delays shutdown.
    /// Zero is replaced by [`DEFAULT_RECEIVE_TIMEOUT`], since a receive
    /// without a timeout could keep [`Watcher::close`] waiting forever.
    pub receive_timeout: Duration,
    /// Receive buffer size; defaults to the host page size.
    pub buffer_size: Option<usize>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            buffer_size: None,
        }
    }
}

impl ListenerConfig {
    fn effective_receive_timeout(&self) -> Duration {
        if self.receive_timeout.is_zero() {
            DEFAULT_RECEIVE_TIMEOUT
        } else {
            self.receive_timeout
        }
    }

    fn effective_buffer_size(&self) -> usize {
        self.buffer_size.unwrap_or_else(page_size).max(MIN_ENVELOPE_LEN)
    }
}

/// Process event listener.
///
/// Subscriptions are purely local: the kernel always delivers every event,
/// and [`Watcher::watch`] only changes what the dispatcher forwards.
pub struct Watcher {
    watches: Arc<WatchTable>,
    stats: Arc<ListenerStats>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<io::Result<()>>>,
}

impl Watcher {
    /// Opens the kernel channel with default settings and starts listening.
    pub fn new() -> Result<(Self, EventStreams), ListenerError> {
        Self::with_config(ListenerConfig::default())
    }

    pub fn with_config(config: ListenerConfig) -> Result<(Self, EventStreams), ListenerError> {
        if config.receive_timeout.is_zero() {
            warn!(
                "Receive timeout of zero would block shutdown, using {:?}",
                DEFAULT_RECEIVE_TIMEOUT
            );
        }
        let channel = KernelChannel::open(config.effective_receive_timeout())?;
        Self::with_transport(channel, config)
    }

    /// Starts the read loop on an arbitrary datagram source.
    pub fn with_transport<T>(
        transport: T,
        config: ListenerConfig,
    ) -> Result<(Self, EventStreams), ListenerError>
    where
        T: Transport + 'static,
    {
        let (senders, streams) = event_queues();
        let watches = Arc::new(WatchTable::new());
        let stats = Arc::new(ListenerStats::new());
        let stop = Arc::new(AtomicBool::new(false));

        let dispatcher = Dispatcher::new(
            WireCodec::native(),
            Arc::clone(&watches),
            senders,
            Arc::clone(&stats),
        );
        let buffer_size = config.effective_buffer_size();
        let thread_stop = Arc::clone(&stop);
        let mut transport = transport;

        let reader = thread::Builder::new()
            .name("procnotify-reader".into())
            .spawn(move || {
                dispatcher.run(&mut transport, &thread_stop, buffer_size);
                transport.close()
            })
            .map_err(ListenerError::ThreadSpawn)?;

        info!("Process event listener started");
        Ok((
            Self {
                watches,
                stats,
                stop,
                reader: Some(reader),
            },
            streams,
        ))
    }

    /// Subscribes `pid` (or [`crate::ANY`]) to the event kinds in `flags`.
    /// Repeated calls for the same pid add to its mask.
    ///
    /// With exec interest, every child forked by a watched process gets an
    /// entry of its own. Only [`Watcher::remove_watch`] or an exit, uid/gid
    /// or sid event the entry is watched for drops it, so a wildcard watch
    /// for exec without exit grows the table with every fork on the host.
    pub fn watch(&self, pid: Pid, flags: u32) -> Result<(), WatchError> {
        if self.is_closed() {
            return Err(WatchError::Closed);
        }
        self.watches.subscribe(pid, flags);
        Ok(())
    }

    /// Drops every subscription for `pid`.
    pub fn remove_watch(&self, pid: Pid) -> Result<(), WatchError> {
        self.watches.unsubscribe(pid)
    }

    pub fn is_watching(&self, pid: Pid, kind: u32) -> bool {
        self.watches.is_watching(pid, kind)
    }

    /// Number of watch entries, including the wildcard and followed children.
    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Stops the reader thread, sends IGNORE and releases the socket.
    ///
    /// Waits at most about one receive timeout for the thread to notice.
    /// Calling it again is a no-op.
    pub fn close(&mut self) -> Result<(), ListenerError> {
        if self.stop.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let Some(reader) = self.reader.take() else {
            self.watches.clear();
            return Ok(());
        };
        debug!("Waiting for reader thread to stop");
        let joined = reader.join();
        // Cleared only once the reader is gone, so a fork being handled
        // cannot re-insert a child entry.
        self.watches.clear();
        match joined {
            Ok(Ok(())) => {
                info!("Process event listener stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(ListenerError::Send(e)),
            Err(_) => Err(ListenerError::DispatcherPanicked),
        }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Error while closing process event listener: {}", e);
        }
    }
}
