//! Kernel channel: the netlink connector socket.
//!
//! The channel binds to the process event multicast group, sends the LISTEN
//! handshake on open and IGNORE on close, and hands raw datagrams to the read
//! loop. It does not interpret events.
//!
//! The read loop talks to the channel through the [`Transport`] trait, so a
//! recorded or synthetic datagram source can stand in for the kernel.

use std::io;
use std::time::Duration;

use crate::codec::NLMSG_HDRLEN;
use crate::error::ListenerError;

#[cfg(not(target_os = "linux"))]
pub use unsupported::KernelChannel;
#[cfg(target_os = "linux")]
pub use linux::KernelChannel;

/// A blocking source of netlink datagrams.
pub trait Transport: Send {
    /// Receives one datagram into `buf`, returning its length.
    ///
    /// Implementations should give up after a bounded time so the read loop
    /// can notice a stop request; a timeout is reported as
    /// [`io::ErrorKind::WouldBlock`] or [`io::ErrorKind::TimedOut`].
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Unsubscribes from the kernel and releases the underlying resource.
    fn close(&mut self) -> io::Result<()>;
}

/// True for receive errors that only mean "nothing arrived in time".
pub fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

/// Host page size, the receive buffer size used by default.
#[cfg(unix)]
pub fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

#[cfg(not(unix))]
pub fn page_size() -> usize {
    4096
}

fn short_read(len: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("short read: {len} bytes, netlink header needs {NLMSG_HDRLEN}"),
    )
}

/// Opens a channel and closes it again. Used by requirement checks.
pub fn probe(receive_timeout: Duration) -> Result<(), ListenerError> {
    let mut channel = KernelChannel::open(receive_timeout)?;
    channel.close().map_err(ListenerError::Send)
}

#[cfg(target_os = "linux")]
mod linux {
    use std::io;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
    use std::time::Duration;

    use nix::errno::Errno;
    use nix::sys::socket::{
        bind, recv, sendto, setsockopt, sockopt, MsgFlags, NetlinkAddr,
    };
    use nix::sys::time::TimeVal;
    use tracing::{debug, info};

    use super::{short_read, Transport};
    use crate::codec::{ControlOp, WireCodec, CN_IDX_PROC, NLMSG_HDRLEN};
    use crate::error::ListenerError;

    /// Netlink connector socket subscribed to process events.
    pub struct KernelChannel {
        fd: Option<OwnedFd>,
        addr: NetlinkAddr,
        seq: u32,
        codec: WireCodec,
    }

    impl KernelChannel {
        /// Creates the socket, binds it to the process event group and sends
        /// LISTEN. Any failure is returned; nothing is retried.
        pub fn open(receive_timeout: Duration) -> Result<Self, ListenerError> {
            // SAFETY: socket has no preconditions; a non-negative return is a
            // freshly created descriptor that nothing else owns.
            let raw = unsafe {
                libc::socket(
                    libc::AF_NETLINK,
                    libc::SOCK_DGRAM | libc::SOCK_CLOEXEC,
                    libc::NETLINK_CONNECTOR,
                )
            };
            if raw < 0 {
                return Err(ListenerError::Socket(io::Error::last_os_error()));
            }
            // SAFETY: `raw` is a valid, owned descriptor (checked above).
            let fd = unsafe { OwnedFd::from_raw_fd(raw) };

            let addr = NetlinkAddr::new(0, CN_IDX_PROC);
            bind(fd.as_raw_fd(), &addr).map_err(|e| ListenerError::Bind(e.into()))?;

            if !receive_timeout.is_zero() {
                set_receive_timeout(&fd, receive_timeout).map_err(ListenerError::SocketOption)?;
            }

            let mut channel = Self {
                fd: Some(fd),
                addr,
                seq: 0,
                codec: WireCodec::native(),
            };
            channel
                .send_control(ControlOp::Listen)
                .map_err(ListenerError::Send)?;

            info!(
                "Subscribed to process events (netlink connector, receive timeout {:?})",
                receive_timeout
            );
            Ok(channel)
        }

        /// Sequence number of the last control message sent.
        pub fn sequence(&self) -> u32 {
            self.seq
        }

        fn raw_fd(&self) -> io::Result<RawFd> {
            self.fd
                .as_ref()
                .map(|fd| fd.as_raw_fd())
                .ok_or_else(|| Errno::EBADF.into())
        }

        fn send_control(&mut self, op: ControlOp) -> io::Result<()> {
            let fd = self.raw_fd()?;
            self.seq = self.seq.wrapping_add(1);
            let buf = self.codec.encode_control(op, self.seq, std::process::id());

            sendto(fd, &buf, &self.addr, MsgFlags::empty())?;
            debug!("Sent {:?} control message (seq={})", op, self.seq);
            Ok(())
        }
    }

    impl Transport for KernelChannel {
        fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let fd = self.raw_fd()?;
            let n = recv(fd, buf, MsgFlags::empty())?;
            if n < NLMSG_HDRLEN {
                return Err(short_read(n));
            }
            Ok(n)
        }

        /// Sends IGNORE, then releases the socket even if the send failed.
        fn close(&mut self) -> io::Result<()> {
            let result = self.send_control(ControlOp::Ignore);
            if self.fd.take().is_some() {
                info!("Process event channel closed");
            }
            result
        }
    }

    fn set_receive_timeout(fd: &OwnedFd, timeout: Duration) -> io::Result<()> {
        let tv = TimeVal::new(
            timeout.as_secs() as libc::time_t,
            timeout.subsec_micros() as libc::suseconds_t,
        );
        setsockopt(fd, sockopt::ReceiveTimeout, &tv)?;
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use nix::sys::socket::{socket, AddressFamily, SockFlag, SockType};

        #[test]
        fn test_closed_channel_reports_bad_descriptor() {
            let mut channel = KernelChannel {
                fd: None,
                addr: NetlinkAddr::new(0, CN_IDX_PROC),
                seq: 7,
                codec: WireCodec::native(),
            };
            let mut buf = [0u8; 64];
            let err = channel.receive(&mut buf).unwrap_err();
            assert_eq!(err.raw_os_error(), Some(libc::EBADF));

            // Close fails the same way, before a sequence number is spent.
            let err = channel.close().unwrap_err();
            assert_eq!(err.raw_os_error(), Some(libc::EBADF));
            assert_eq!(channel.sequence(), 7);
        }

        #[test]
        fn test_receive_timeout_applies_to_socket() {
            let fd = socket(
                AddressFamily::Unix,
                SockType::Datagram,
                SockFlag::SOCK_CLOEXEC,
                None,
            )
            .unwrap();
            set_receive_timeout(&fd, Duration::from_secs(2)).unwrap();

            let tv = nix::sys::socket::getsockopt(&fd, sockopt::ReceiveTimeout).unwrap();
            assert_eq!(tv.tv_sec(), 2);
            assert_eq!(tv.tv_usec(), 0);
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod unsupported {
    use std::io;
    use std::time::Duration;

    use super::Transport;
    use crate::error::ListenerError;

    /// Placeholder on systems without the process connector.
    pub struct KernelChannel {
        _private: (),
    }

    impl KernelChannel {
        pub fn open(_receive_timeout: Duration) -> Result<Self, ListenerError> {
            Err(ListenerError::UnsupportedPlatform)
        }

        pub fn sequence(&self) -> u32 {
            0
        }
    }

    impl Transport for KernelChannel {
        fn receive(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::Unsupported))
        }

        fn close(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
