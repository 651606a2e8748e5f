//! Shared helpers for the integration tests.
//!
//! `InjectedTransport` stands in for the netlink socket: datagrams pushed into
//! its sender are handed to the read loop in order.

#![allow(dead_code)]

use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use procnotify::{ListenerConfig, Payload, ProcEventHeader, Transport, WireCodec};

pub const RECEIVE_TIMEOUT: Duration = Duration::from_millis(10);
pub const EVENT_WAIT: Duration = Duration::from_secs(2);

pub struct InjectedTransport {
    rx: Receiver<Vec<u8>>,
}

impl InjectedTransport {
    pub fn new() -> (Self, Sender<Vec<u8>>) {
        let (tx, rx) = mpsc::channel();
        (Self { rx }, tx)
    }
}

impl Transport for InjectedTransport {
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.rx.recv_timeout(RECEIVE_TIMEOUT) {
            Ok(datagram) => {
                let n = datagram.len().min(buf.len());
                buf[..n].copy_from_slice(&datagram[..n]);
                Ok(n)
            }
            Err(RecvTimeoutError::Timeout) => Err(io::Error::from(io::ErrorKind::WouldBlock)),
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(RECEIVE_TIMEOUT);
                Err(io::Error::from(io::ErrorKind::WouldBlock))
            }
        }
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn test_config() -> ListenerConfig {
    ListenerConfig {
        receive_timeout: RECEIVE_TIMEOUT,
        buffer_size: None,
    }
}

/// Kernel-format datagram for `payload`.
pub fn datagram(payload: Payload) -> Vec<u8> {
    let header = ProcEventHeader {
        what: payload.what(),
        cpu: 1,
        timestamp_ns: 1_000_000,
    };
    WireCodec::native().encode_event(1, &header, &payload)
}

pub fn exec(pid: i32) -> Vec<u8> {
    datagram(Payload::Exec { pid, tgid: pid })
}

pub fn exit(pid: i32, exit_code: u32) -> Vec<u8> {
    datagram(Payload::Exit {
        pid,
        tgid: pid,
        exit_code,
        exit_signal: 17,
    })
}

pub fn fork(parent: i32, child: i32) -> Vec<u8> {
    datagram(Payload::Fork {
        parent_pid: parent,
        parent_tgid: parent,
        child_pid: child,
        child_tgid: child,
    })
}
