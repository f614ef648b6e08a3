//! quicd-transport: QUIC transport core (RFC 9000)
//!
//! Wire codecs and the client connection state machine, with no I/O.
//!
//! # Module Organization
//!
//! - `varint`: Variable-length integer codec
//! - `frames`: Frame parsing and serialization
//! - `packet`: Long header, short header and Retry packets
//! - `send`: Send request queue and packet assembly
//! - `recovery`: Congestion budget interface
//! - `transport`: Transport parameters
//! - `stream`: Stream id allocation
//! - `connection`: Connection validation state machine

#![forbid(unsafe_code)]

pub mod connection;
pub mod error;
pub mod frames;
pub mod packet;
pub mod recovery;
pub mod send;
pub mod stream;
pub mod transport;
pub mod types;
pub mod varint;

// Re-export key types
pub use connection::{
    CloseReason, Connection, ConnectionConfig, ConnectionEvent, ConnectionState, RetryState,
};
pub use error::{Error, Result, TransportError};
pub use frames::Frame;
pub use packet::{
    DatagramIterator, InitialPacket, LongHeader, Packet, PacketProtection, PacketType, Plaintext,
    RetryPacket,
};
pub use recovery::{CongestionController, FixedWindow};
pub use send::{PacketAssembler, SendRequest, SendRequestQueue};
pub use stream::StreamIdAllocator;
pub use transport::{TransportParameters, TransportParametersBuilder};
pub use types::{ConnectionId, Side, StreamDirection, StreamId, Token};
pub use varint::{VarInt, VarIntCodec};
