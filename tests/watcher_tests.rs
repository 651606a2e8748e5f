//! End-to-end tests for the listener.
//!
//! Datagrams are injected through an in-memory transport and the resulting
//! events are read from the public queues, exercising the reader thread,
//! codec, watch table and dispatcher together.

mod helpers;

use helpers::{datagram, exec, exit, fork, test_config, InjectedTransport, EVENT_WAIT};
use procnotify::{
    EventError, Payload, Watcher, ANY, PROC_EVENT_ALL, PROC_EVENT_EXEC, PROC_EVENT_EXIT,
    PROC_EVENT_FORK,
};
use std::time::{Duration, Instant};
use tokio::time::timeout;

#[tokio::test]
async fn test_exec_then_exit_for_watched_pid() {
    let (transport, inject) = InjectedTransport::new();
    let (mut watcher, mut events) = Watcher::with_transport(transport, test_config()).unwrap();

    watcher.watch(100, PROC_EVENT_EXEC | PROC_EVENT_EXIT).unwrap();

    inject.send(exec(100)).unwrap();
    let ev = timeout(EVENT_WAIT, events.exec.recv()).await.unwrap().unwrap();
    assert_eq!(ev.pid, 100);

    inject.send(exit(100, 0)).unwrap();
    let ev = timeout(EVENT_WAIT, events.exit.recv()).await.unwrap().unwrap();
    assert_eq!(ev.pid, 100);
    assert_eq!(ev.exit_code, 0);

    assert!(events.exec.try_recv().is_err(), "exactly one exec event");
    assert!(events.exit.try_recv().is_err(), "exactly one exit event");
    assert!(!watcher.is_watching(100, PROC_EVENT_EXIT));
    assert!(events.error.try_recv().is_err());

    watcher.close().unwrap();
}

#[tokio::test]
async fn test_unwatched_pid_produces_nothing() {
    let (transport, inject) = InjectedTransport::new();
    let (mut watcher, mut events) = Watcher::with_transport(transport, test_config()).unwrap();

    watcher.watch(100, PROC_EVENT_EXEC).unwrap();
    inject.send(exec(200)).unwrap();
    inject.send(exec(100)).unwrap();

    // The second datagram is processed after the first, so once it shows up
    // the first has been filtered out.
    let ev = timeout(EVENT_WAIT, events.exec.recv()).await.unwrap().unwrap();
    assert_eq!(ev.pid, 100);
    assert!(events.exec.try_recv().is_err());

    watcher.close().unwrap();
}

#[tokio::test]
async fn test_fork_follow_delivers_child_exec() {
    let (transport, inject) = InjectedTransport::new();
    let (mut watcher, mut events) = Watcher::with_transport(transport, test_config()).unwrap();

    watcher.watch(ANY, PROC_EVENT_EXEC).unwrap();
    inject.send(fork(500, 501)).unwrap();
    inject.send(exec(501)).unwrap();

    let ev = timeout(EVENT_WAIT, events.exec.recv()).await.unwrap().unwrap();
    assert_eq!(ev.pid, 501);
    assert!(watcher.is_watching(501, PROC_EVENT_EXEC));
    assert_eq!(watcher.stats().forks_followed, 1);

    watcher.close().unwrap();
}

#[tokio::test]
async fn test_child_follows_explicit_parent_after_parent_exits() {
    let (transport, inject) = InjectedTransport::new();
    let (mut watcher, mut events) = Watcher::with_transport(transport, test_config()).unwrap();

    watcher
        .watch(10, PROC_EVENT_FORK | PROC_EVENT_EXEC | PROC_EVENT_EXIT)
        .unwrap();
    inject.send(fork(10, 11)).unwrap();
    inject.send(exit(10, 0)).unwrap();
    inject.send(exec(11)).unwrap();

    let ev = timeout(EVENT_WAIT, events.fork.recv()).await.unwrap().unwrap();
    assert_eq!((ev.parent_pid, ev.child_pid), (10, 11));
    let ev = timeout(EVENT_WAIT, events.exit.recv()).await.unwrap().unwrap();
    assert_eq!(ev.pid, 10);
    let ev = timeout(EVENT_WAIT, events.exec.recv()).await.unwrap().unwrap();
    assert_eq!(ev.pid, 11);

    assert!(!watcher.is_watching(10, PROC_EVENT_EXEC));
    assert!(watcher.is_watching(11, PROC_EVENT_EXIT));

    watcher.close().unwrap();
}

#[tokio::test]
async fn test_short_datagram_is_isolated() {
    let (transport, inject) = InjectedTransport::new();
    let (mut watcher, mut events) = Watcher::with_transport(transport, test_config()).unwrap();

    watcher.watch(ANY, PROC_EVENT_EXEC).unwrap();
    inject.send(vec![0u8; 8]).unwrap();
    inject.send(exec(42)).unwrap();

    let err = timeout(EVENT_WAIT, events.error.recv()).await.unwrap().unwrap();
    assert!(matches!(err, EventError::InvalidMessage { len: 8 }));

    let ev = timeout(EVENT_WAIT, events.exec.recv()).await.unwrap().unwrap();
    assert_eq!(ev.pid, 42);
    assert!(events.error.try_recv().is_err(), "exactly one error");

    watcher.close().unwrap();
}

#[tokio::test]
async fn test_truncated_payload_is_reported() {
    let (transport, inject) = InjectedTransport::new();
    let (mut watcher, mut events) = Watcher::with_transport(transport, test_config()).unwrap();

    watcher.watch(ANY, PROC_EVENT_EXEC).unwrap();
    let mut bad = exec(7);
    bad.truncate(50);
    inject.send(bad).unwrap();
    inject.send(exec(8)).unwrap();

    let err = timeout(EVENT_WAIT, events.error.recv()).await.unwrap().unwrap();
    assert!(matches!(err, EventError::Decode(_)));
    let ev = timeout(EVENT_WAIT, events.exec.recv()).await.unwrap().unwrap();
    assert_eq!(ev.pid, 8);

    watcher.close().unwrap();
}

#[tokio::test]
async fn test_unknown_kinds_are_silent() {
    let (transport, inject) = InjectedTransport::new();
    let (mut watcher, mut events) = Watcher::with_transport(transport, test_config()).unwrap();

    watcher.watch(ANY, PROC_EVENT_ALL).unwrap();
    inject.send(datagram(Payload::Ignored { what: 0 })).unwrap();
    inject.send(datagram(Payload::Ignored { what: 0x0000_0400 })).unwrap();
    inject
        .send(datagram(Payload::Coredump { pid: 3, tgid: 3 }))
        .unwrap();
    inject.send(exec(9)).unwrap();

    let ev = timeout(EVENT_WAIT, events.exec.recv()).await.unwrap().unwrap();
    assert_eq!(ev.pid, 9);

    assert!(events.error.try_recv().is_err());
    assert!(events.fork.try_recv().is_err());
    assert!(events.exit.try_recv().is_err());
    assert!(events.uid.try_recv().is_err());
    assert!(events.sid.try_recv().is_err());
    assert_eq!(watcher.stats().messages_ignored, 3);

    watcher.close().unwrap();
}

#[tokio::test]
async fn test_close_is_prompt_and_closes_queues() {
    let (transport, _inject) = InjectedTransport::new();
    let (mut watcher, mut events) = Watcher::with_transport(transport, test_config()).unwrap();

    let started = Instant::now();
    watcher.close().unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));

    let next = timeout(EVENT_WAIT, events.exec.recv()).await.unwrap();
    assert!(next.is_none());
}

#[test]
fn test_blocking_consumer() {
    let (transport, inject) = InjectedTransport::new();
    let (mut watcher, mut events) = Watcher::with_transport(transport, test_config()).unwrap();

    watcher.watch(77, PROC_EVENT_EXIT).unwrap();
    inject.send(exit(77, 256)).unwrap();

    let ev = events.exit.blocking_recv().unwrap();
    assert_eq!(ev.pid, 77);
    assert_eq!(ev.exit_code, 256);

    watcher.close().unwrap();
}
