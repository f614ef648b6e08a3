//! quicd-netio: runtime side of the QUIC transport core.
//!
//! Blocking UDP I/O on OS threads, configuration loading, logging
//! initialisation, and a driver that connects the pure
//! [`quicd_transport::Connection`] to real sockets.

pub mod config;
pub mod driver;
pub mod error;
pub mod netio;
pub mod telemetry;

pub use config::{load_config, EndpointConfig, TransportSettings};
pub use driver::ConnectionDriver;
pub use error::{NetIoError, Result};
pub use netio::{
    bind_udp_socket, DatagramSocket, LoopExit, NetIoConfig, RawPacket, Receiver, ReceiverFailure,
    SocketId,
};
pub use telemetry::{init_logging, LoggingConfig};
