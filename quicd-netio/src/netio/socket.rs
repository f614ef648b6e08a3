//! UDP socket creation and the socket seam used by the receiver.
//!
//! Sockets are created with socket2 so buffer sizes and address reuse can be
//! set before binding, then handed out as plain `std::net::UdpSocket`s.

use crate::netio::config::NetIoConfig;
use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket as Socket2, Type};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

/// What the receiver and the driver need from a datagram socket.
///
/// `recv_from` blocks until a datagram arrives or the read timeout expires.
/// A timeout surfaces as `WouldBlock` or `TimedOut` depending on the platform.
pub trait DatagramSocket: Send + Sync + 'static {
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize>;

    fn local_addr(&self) -> io::Result<SocketAddr>;

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;
}

impl DatagramSocket for UdpSocket {
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf)
    }

    fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, target)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        UdpSocket::set_read_timeout(self, timeout)
    }
}

/// Create, configure and bind a UDP socket.
///
/// The socket is left in blocking mode with the configured poll interval
/// as its read timeout.
pub fn bind_udp_socket(bind_addr: SocketAddr, config: &NetIoConfig) -> Result<UdpSocket> {
    let domain = match bind_addr {
        SocketAddr::V4(_) => Domain::IPV4,
        SocketAddr::V6(_) => Domain::IPV6,
    };

    let socket =
        Socket2::new(domain, Type::DGRAM, Some(Protocol::UDP)).context("creating UDP socket")?;

    if config.reuse_address {
        socket
            .set_reuse_address(true)
            .context("setting SO_REUSEADDR")?;
    }

    if config.reuse_port {
        configure_reuse_port(&socket).context("setting SO_REUSEPORT")?;
    }

    if let Some(size) = config.socket_recv_buffer_size {
        socket
            .set_recv_buffer_size(size)
            .with_context(|| format!("setting SO_RCVBUF to {}", size))?;
    }

    if let Some(size) = config.socket_send_buffer_size {
        socket
            .set_send_buffer_size(size)
            .with_context(|| format!("setting SO_SNDBUF to {}", size))?;
    }

    if let SocketAddr::V6(addr) = bind_addr {
        socket
            .set_only_v6(!addr.ip().is_unspecified())
            .context("setting IPV6_V6ONLY")?;
    }

    socket
        .bind(&bind_addr.into())
        .with_context(|| format!("binding UDP socket to {}", bind_addr))?;

    let udp_socket: UdpSocket = socket.into();
    udp_socket
        .set_read_timeout(Some(config.poll_interval()))
        .context("setting read timeout")?;

    tracing::debug!(addr = %bind_addr, "UDP socket bound");
    Ok(udp_socket)
}

#[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
fn configure_reuse_port(socket: &Socket2) -> io::Result<()> {
    socket.set_reuse_port(true)
}

#[cfg(not(all(unix, not(any(target_os = "solaris", target_os = "illumos")))))]
fn configure_reuse_port(_socket: &Socket2) -> io::Result<()> {
    tracing::warn!("SO_REUSEPORT not available on this platform");
    Ok(())
}
