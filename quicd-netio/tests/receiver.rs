//! Receiver tests over loopback UDP and injected failing sockets.

use crossbeam_channel::{unbounded, Receiver as Chan, Sender};
use quicd_netio::{DatagramSocket, LoopExit, NetIoConfig, Receiver};
use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn config() -> NetIoConfig {
    NetIoConfig {
        bind_addresses: vec![SocketAddr::from((Ipv4Addr::LOCALHOST, 0))],
        poll_interval_ms: 10,
        ..NetIoConfig::default()
    }
}

fn loopback_socket() -> Arc<UdpSocket> {
    Arc::new(UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap())
}

/// Socket that blocks until told to fail.
struct ScriptedSocket {
    errors: Chan<io::ErrorKind>,
}

impl ScriptedSocket {
    fn new() -> (Arc<Self>, Sender<io::ErrorKind>) {
        let (tx, rx) = unbounded();
        (Arc::new(Self { errors: rx }), tx)
    }
}

impl DatagramSocket for ScriptedSocket {
    fn recv_from(&self, _buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        match self.errors.recv() {
            Ok(kind) => Err(io::Error::from(kind)),
            Err(_) => Err(io::Error::from(io::ErrorKind::BrokenPipe)),
        }
    }

    fn send_to(&self, buf: &[u8], _target: SocketAddr) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(SocketAddr::from((Ipv4Addr::LOCALHOST, 9)))
    }

    fn set_read_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_datagrams_from_two_sockets_arrive() {
    let receiver = Receiver::new(&config());
    let a = loopback_socket();
    let b = loopback_socket();
    receiver.add_socket(a.clone()).unwrap();
    receiver.add_socket(b.clone()).unwrap();
    assert_eq!(receiver.socket_count(), 2);

    let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let targets = [a.local_addr().unwrap(), b.local_addr().unwrap()];
    for i in 0..20u8 {
        sender.send_to(&[i], targets[usize::from(i % 2)]).unwrap();
    }

    let mut per_socket: HashMap<SocketAddr, Vec<(u8, u64)>> = HashMap::new();
    for _ in 0..20 {
        let packet = receiver
            .get_timeout(Duration::from_secs(2))
            .expect("datagram lost on loopback");
        assert_eq!(packet.source, sender.local_addr().unwrap());
        per_socket
            .entry(packet.local.unwrap())
            .or_default()
            .push((packet.data[0], packet.sequence));
    }
    assert!(!receiver.has_more());

    for (local, received) in &per_socket {
        assert_eq!(received.len(), 10, "socket {}", local);
        // Per-socket FIFO, with increasing sequence numbers.
        for pair in received.windows(2) {
            assert!(pair[0].0 < pair[1].0);
            assert!(pair[0].1 < pair[1].1);
        }
    }

    let exits = receiver.shutdown();
    assert_eq!(exits.len(), 2);
    assert!(exits.iter().all(|(_, exit)| matches!(exit, LoopExit::Shutdown)));
}

#[test]
fn test_get_timeout_on_idle_receiver() {
    let receiver = Receiver::bind(&config()).unwrap();
    assert!(receiver.get_timeout(Duration::from_millis(30)).is_none());
    assert!(!receiver.has_more());
}

#[test]
fn test_shutdown_does_not_abort() {
    let receiver = Receiver::bind(&config()).unwrap();
    let abort = receiver.abort_signal();
    receiver.shutdown();
    assert!(abort.try_recv().is_err());
    assert!(receiver.is_closing());
}

#[test]
fn test_failing_socket_reports_once() {
    let receiver = Receiver::new(&config());
    let abort = receiver.abort_signal();
    let (first, fail_first) = ScriptedSocket::new();
    let (second, fail_second) = ScriptedSocket::new();
    let first_id = receiver.add_socket(first).unwrap();
    receiver.add_socket(second).unwrap();

    fail_first.send(io::ErrorKind::ConnectionReset).unwrap();
    let failure = abort.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(failure.socket, first_id);
    assert_eq!(failure.error.kind(), io::ErrorKind::ConnectionReset);

    fail_second.send(io::ErrorKind::ConnectionReset).unwrap();
    thread::sleep(Duration::from_millis(50));
    assert!(abort.try_recv().is_err());

    let exits = receiver.shutdown();
    assert!(exits
        .iter()
        .all(|(_, exit)| matches!(exit, LoopExit::Failed(_))));
}

#[test]
fn test_timeouts_are_not_failures() {
    let receiver = Receiver::new(&config());
    let abort = receiver.abort_signal();
    let (socket, script) = ScriptedSocket::new();
    receiver.add_socket(socket).unwrap();

    script.send(io::ErrorKind::WouldBlock).unwrap();
    script.send(io::ErrorKind::TimedOut).unwrap();
    thread::sleep(Duration::from_millis(50));
    assert!(abort.try_recv().is_err());

    // The loop is still reading; shutdown is noticed at the next tick.
    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(Duration::from_millis(30));
            let _ = script.send(io::ErrorKind::WouldBlock);
        });
        let exits = receiver.shutdown();
        assert!(matches!(exits[0].1, LoopExit::Shutdown));
    });
}

#[test]
fn test_removed_socket_failure_not_reported() {
    let receiver = Arc::new(Receiver::new(&config()));
    let abort = receiver.abort_signal();
    let (socket, script) = ScriptedSocket::new();
    let id = receiver.add_socket(socket).unwrap();

    let remover = {
        let receiver = Arc::clone(&receiver);
        thread::spawn(move || receiver.remove_socket(id))
    };
    // Let removal mark the socket before the read fails.
    thread::sleep(Duration::from_millis(50));
    script.send(io::ErrorKind::ConnectionAborted).unwrap();

    let exit = remover.join().unwrap().unwrap();
    assert!(matches!(exit, LoopExit::Removed));
    assert!(abort.try_recv().is_err());
    assert_eq!(receiver.socket_count(), 0);
}

#[test]
fn test_removed_socket_stops_delivering() {
    let receiver = Receiver::new(&config());
    let socket = loopback_socket();
    let addr = socket.local_addr().unwrap();
    let id = receiver.add_socket(socket).unwrap();

    let exit = receiver.remove_socket(id).unwrap();
    assert!(matches!(exit, LoopExit::Removed));

    let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    sender.send_to(b"late", addr).unwrap();
    assert!(receiver.get_timeout(Duration::from_millis(50)).is_none());
}

/// Socket whose read fails as soon as it is no longer registered.
struct FailsOnceUnregistered {
    receiver: Chan<Arc<Receiver>>,
}

impl DatagramSocket for FailsOnceUnregistered {
    fn recv_from(&self, _buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let receiver = self
            .receiver
            .recv()
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
        while receiver.socket_count() > 0 {
            thread::yield_now();
        }
        Err(io::Error::from(io::ErrorKind::ConnectionReset))
    }

    fn send_to(&self, buf: &[u8], _target: SocketAddr) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(SocketAddr::from((Ipv4Addr::LOCALHOST, 9)))
    }

    fn set_read_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_failure_right_after_removal_not_reported() {
    let receiver = Arc::new(Receiver::new(&config()));
    let abort = receiver.abort_signal();
    let (tx, rx) = unbounded();
    let id = receiver
        .add_socket(Arc::new(FailsOnceUnregistered { receiver: rx }))
        .unwrap();
    tx.send(Arc::clone(&receiver)).unwrap();

    let exit = receiver.remove_socket(id).unwrap();
    assert!(matches!(exit, LoopExit::Removed));
    assert!(abort.try_recv().is_err());
}
