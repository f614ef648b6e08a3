use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Largest UDP payload read in one call by default.
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 1500;

/// Read timeout of every socket, the tick at which read loops check for
/// shutdown and removal.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetIoConfig {
    /// Local addresses to bind, one socket and one read thread each.
    pub bind_addresses: Vec<SocketAddr>,

    /// Enable SO_REUSEADDR.
    pub reuse_address: bool,

    /// Enable SO_REUSEPORT where the platform has it.
    pub reuse_port: bool,

    /// Optional kernel receive buffer size (SO_RCVBUF).
    pub socket_recv_buffer_size: Option<usize>,

    /// Optional kernel send buffer size (SO_SNDBUF).
    pub socket_send_buffer_size: Option<usize>,

    /// Read timeout in milliseconds. Bounds how long shutdown and
    /// socket removal take to be noticed.
    pub poll_interval_ms: u64,

    /// Receive buffer per read; longer datagrams are truncated by the kernel.
    pub max_datagram_size: usize,
}

impl NetIoConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for NetIoConfig {
    fn default() -> Self {
        Self {
            bind_addresses: vec![SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))],
            reuse_address: false,
            reuse_port: false,
            socket_recv_buffer_size: None,
            socket_send_buffer_size: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
        }
    }
}
