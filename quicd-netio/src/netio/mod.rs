//! Network I/O: UDP sockets and the multi-socket receiver.

pub mod config;
pub mod receiver;
pub mod socket;

pub use config::NetIoConfig;
pub use receiver::{LoopExit, RawPacket, Receiver, ReceiverFailure, SocketId};
pub use socket::{bind_udp_socket, DatagramSocket};
