//! Multi-socket datagram receiver.
//!
//! Every registered socket is read by its own OS thread. Datagrams from all
//! sockets land in one channel the consumer drains with [`Receiver::get`]
//! and friends. Order is FIFO per socket and best effort across sockets.
//!
//! A thread blocked in `recv_from` cannot be interrupted, so each socket
//! carries a read timeout. A timed-out read is the tick at which a read
//! loop checks whether the receiver is closing or its socket was removed.
//!
//! The first socket that fails for any other reason is reported once on the
//! abort signal. Failures during shutdown or after removal are expected and
//! only logged.

use crate::error::{NetIoError, Result};
use crate::netio::config::NetIoConfig;
use crate::netio::socket::{bind_udp_socket, DatagramSocket};
use bytes::Bytes;
use crossbeam_channel::{bounded, unbounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace};

/// Handle of a registered socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketId(usize);

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One received datagram.
#[derive(Debug, Clone)]
pub struct RawPacket {
    pub data: Bytes,
    pub source: SocketAddr,
    /// Address of the socket it arrived on
    pub local: Option<SocketAddr>,
    pub received_at: Instant,
    /// Receiver-wide arrival counter
    pub sequence: u64,
}

/// Fatal socket error delivered on the abort signal.
#[derive(Debug)]
pub struct ReceiverFailure {
    pub socket: SocketId,
    pub local_addr: Option<SocketAddr>,
    pub error: io::Error,
}

/// Why a read loop ended.
#[derive(Debug)]
pub enum LoopExit {
    Shutdown,
    Removed,
    Failed(io::Error),
}

struct Shared {
    closing: AtomicBool,
    aborted: AtomicBool,
    sequence: AtomicU64,
    abort_tx: Sender<ReceiverFailure>,
    max_datagram_size: usize,
}

struct SocketEntry {
    socket: Arc<dyn DatagramSocket>,
    removed: Arc<AtomicBool>,
    handle: JoinHandle<LoopExit>,
}

struct SocketTable {
    next_id: usize,
    entries: HashMap<SocketId, SocketEntry>,
    /// Dropped at shutdown so `get` returns `None` once the loops are gone
    tx: Option<Sender<RawPacket>>,
}

pub struct Receiver {
    shared: Arc<Shared>,
    sockets: Mutex<SocketTable>,
    rx: crossbeam_channel::Receiver<RawPacket>,
    abort_rx: crossbeam_channel::Receiver<ReceiverFailure>,
    poll_interval: Duration,
}

impl Receiver {
    pub fn new(config: &NetIoConfig) -> Self {
        let (tx, rx) = unbounded();
        let (abort_tx, abort_rx) = bounded(1);
        Self {
            shared: Arc::new(Shared {
                closing: AtomicBool::new(false),
                aborted: AtomicBool::new(false),
                sequence: AtomicU64::new(0),
                abort_tx,
                max_datagram_size: config.max_datagram_size,
            }),
            sockets: Mutex::new(SocketTable {
                next_id: 0,
                entries: HashMap::new(),
                tx: Some(tx),
            }),
            rx,
            abort_rx,
            poll_interval: config.poll_interval(),
        }
    }

    /// Bind every configured address and start reading from all of them.
    pub fn bind(config: &NetIoConfig) -> anyhow::Result<Self> {
        let receiver = Self::new(config);
        for addr in &config.bind_addresses {
            let socket = bind_udp_socket(*addr, config)?;
            receiver.add_socket(Arc::new(socket))?;
        }
        Ok(receiver)
    }

    /// Register a socket and start its read loop.
    pub fn add_socket(&self, socket: Arc<dyn DatagramSocket>) -> Result<SocketId> {
        let mut table = self.sockets.lock();
        let tx = table.tx.clone().ok_or(NetIoError::Closed)?;
        socket.set_read_timeout(Some(self.poll_interval))?;

        let id = SocketId(table.next_id);
        let removed = Arc::new(AtomicBool::new(false));
        let handle = {
            let socket = Arc::clone(&socket);
            let removed = Arc::clone(&removed);
            let shared = Arc::clone(&self.shared);
            thread::Builder::new()
                .name(format!("quicd-recv-{}", id.0))
                .spawn(move || read_loop(id, socket, removed, shared, tx))
                .map_err(NetIoError::Spawn)?
        };

        table.next_id += 1;
        table.entries.insert(
            id,
            SocketEntry {
                socket,
                removed,
                handle,
            },
        );
        Ok(id)
    }

    /// Stop reading from a socket and wait for its loop to end.
    pub fn remove_socket(&self, id: SocketId) -> Result<LoopExit> {
        let entry = {
            let mut table = self.sockets.lock();
            let entry = table
                .entries
                .remove(&id)
                .ok_or(NetIoError::UnknownSocket(id))?;
            entry.removed.store(true, Ordering::Release);
            entry
        };
        entry
            .handle
            .join()
            .map_err(|_| NetIoError::WorkerPanicked(id))
    }

    /// Socket registered under `id`, for sending from the same address.
    pub fn socket(&self, id: SocketId) -> Option<Arc<dyn DatagramSocket>> {
        self.sockets
            .lock()
            .entries
            .get(&id)
            .map(|entry| Arc::clone(&entry.socket))
    }

    pub fn socket_count(&self) -> usize {
        self.sockets.lock().entries.len()
    }

    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.sockets
            .lock()
            .entries
            .values()
            .filter_map(|entry| entry.socket.local_addr().ok())
            .collect()
    }

    /// Block until a datagram arrives. `None` once shut down and drained.
    pub fn get(&self) -> Option<RawPacket> {
        self.rx.recv().ok()
    }

    /// Wait at most `timeout` for a datagram.
    pub fn get_timeout(&self, timeout: Duration) -> Option<RawPacket> {
        match self.rx.recv_timeout(timeout) {
            Ok(packet) => Some(packet),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn get_timeout_secs(&self, secs: u64) -> Option<RawPacket> {
        self.get_timeout(Duration::from_secs(secs))
    }

    /// Whether a datagram is waiting. Never blocks.
    pub fn has_more(&self) -> bool {
        !self.rx.is_empty()
    }

    /// One-shot signal carrying the first fatal socket failure.
    pub fn abort_signal(&self) -> crossbeam_channel::Receiver<ReceiverFailure> {
        self.abort_rx.clone()
    }

    pub fn is_closing(&self) -> bool {
        self.shared.closing.load(Ordering::Acquire)
    }

    /// Stop every read loop and wait for them. Datagrams already queued can
    /// still be taken with `get`.
    pub fn shutdown(&self) -> Vec<(SocketId, LoopExit)> {
        self.shared.closing.store(true, Ordering::Release);
        let entries: Vec<(SocketId, SocketEntry)> = {
            let mut table = self.sockets.lock();
            table.tx = None;
            table.entries.drain().collect()
        };
        info!(sockets = entries.len(), "receiver shutting down");

        entries
            .into_iter()
            .map(|(id, entry)| {
                let exit = entry.handle.join().unwrap_or_else(|_| {
                    error!(socket = %id, "receive thread panicked");
                    LoopExit::Failed(io::Error::new(io::ErrorKind::Other, "receive thread panicked"))
                });
                (id, exit)
            })
            .collect()
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        if !self.sockets.lock().entries.is_empty() {
            self.shutdown();
        }
    }
}

impl fmt::Debug for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("sockets", &self.socket_count())
            .field("closing", &self.is_closing())
            .field("queued", &self.rx.len())
            .finish()
    }
}

fn read_loop(
    id: SocketId,
    socket: Arc<dyn DatagramSocket>,
    removed: Arc<AtomicBool>,
    shared: Arc<Shared>,
    tx: Sender<RawPacket>,
) -> LoopExit {
    let local = socket.local_addr().ok();
    let mut buf = vec![0u8; shared.max_datagram_size];
    debug!(socket = %id, ?local, "read loop started");

    let exit = loop {
        if shared.closing.load(Ordering::Acquire) {
            break LoopExit::Shutdown;
        }
        if removed.load(Ordering::Acquire) {
            break LoopExit::Removed;
        }

        match socket.recv_from(&mut buf) {
            Ok((len, source)) => {
                let packet = RawPacket {
                    data: Bytes::copy_from_slice(&buf[..len]),
                    source,
                    local,
                    received_at: Instant::now(),
                    sequence: shared.sequence.fetch_add(1, Ordering::Relaxed),
                };
                trace!(socket = %id, len, from = %source, "datagram received");
                if tx.send(packet).is_err() {
                    break LoopExit::Shutdown;
                }
            }
            Err(e) if is_tick(&e) => continue,
            Err(e) => {
                if shared.closing.load(Ordering::Acquire) {
                    debug!(socket = %id, error = %e, "read failed during shutdown");
                    break LoopExit::Shutdown;
                }
                if removed.load(Ordering::Acquire) {
                    debug!(socket = %id, error = %e, "read failed after removal");
                    break LoopExit::Removed;
                }
                error!(socket = %id, ?local, error = %e, "socket read failed");
                report_failure(&shared, id, local, &e);
                break LoopExit::Failed(e);
            }
        }
    };

    debug!(socket = %id, ?exit, "read loop stopped");
    exit
}

/// Read timeouts and signal interruptions only wake the loop.
fn is_tick(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

fn report_failure(shared: &Shared, socket: SocketId, local_addr: Option<SocketAddr>, e: &io::Error) {
    if shared.aborted.swap(true, Ordering::AcqRel) {
        return;
    }
    let failure = ReceiverFailure {
        socket,
        local_addr,
        error: io::Error::new(e.kind(), e.to_string()),
    };
    let _ = shared.abort_tx.try_send(failure);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, UdpSocket};

    fn config() -> NetIoConfig {
        NetIoConfig {
            bind_addresses: vec![SocketAddr::from((Ipv4Addr::LOCALHOST, 0))],
            poll_interval_ms: 10,
            ..NetIoConfig::default()
        }
    }

    #[test]
    fn test_empty_receiver() {
        let receiver = Receiver::new(&config());
        assert!(!receiver.has_more());
        assert!(receiver.get_timeout(Duration::from_millis(20)).is_none());
        assert_eq!(receiver.socket_count(), 0);
    }

    #[test]
    fn test_remove_unknown_socket() {
        let receiver = Receiver::new(&config());
        assert!(matches!(
            receiver.remove_socket(SocketId(7)),
            Err(NetIoError::UnknownSocket(SocketId(7)))
        ));
    }

    #[test]
    fn test_add_after_shutdown_rejected() {
        let receiver = Receiver::new(&config());
        receiver.shutdown();
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        assert!(matches!(
            receiver.add_socket(Arc::new(socket)),
            Err(NetIoError::Closed)
        ));
    }

    #[test]
    fn test_get_returns_none_after_shutdown() {
        let receiver = Receiver::bind(&config()).unwrap();
        receiver.shutdown();
        assert!(receiver.get().is_none());
    }

    #[test]
    fn test_is_tick() {
        assert!(is_tick(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(is_tick(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(!is_tick(&io::Error::from(io::ErrorKind::ConnectionReset)));
    }
}
