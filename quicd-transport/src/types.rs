//! # Core QUIC Types (RFC 8999, RFC 9000)
//!
//! Identifiers and small value types shared by the codec and the
//! connection state machine.

#![forbid(unsafe_code)]

use crate::error::{Error, Result};
use bytes::Bytes;
use core::time::Duration;

// ============================================================================
// Connection ID (RFC 9000 Section 5.1, RFC 8999 Section 5.3)
// ============================================================================

/// Maximum length of a Connection ID (20 bytes per RFC 9000)
pub const MAX_CID_LENGTH: usize = 20;

/// Connection ID - Version-independent identifier (RFC 8999 Section 5.3)
///
/// Connection IDs are opaque byte sequences chosen by endpoints.
/// Zero-length CIDs are permitted.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId {
    bytes: Bytes,
}

impl ConnectionId {
    /// Create a new ConnectionId from bytes
    ///
    /// Returns None if length exceeds MAX_CID_LENGTH
    pub fn new(bytes: Bytes) -> Option<Self> {
        if bytes.len() > MAX_CID_LENGTH {
            return None;
        }
        Some(Self { bytes })
    }

    /// Create from a borrowed slice (copies data)
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        Self::new(Bytes::copy_from_slice(slice))
    }

    /// Like [`ConnectionId::new`], reporting the offending length as an error.
    pub fn try_new(bytes: Bytes) -> Result<Self> {
        let len = bytes.len();
        Self::new(bytes).ok_or(Error::InvalidConnectionId(len))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap clone of the underlying buffer.
    pub fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Create an empty (zero-length) connection ID
    pub fn empty() -> Self {
        Self {
            bytes: Bytes::new(),
        }
    }
}

impl core::fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ConnectionId({:02x?})", &self.bytes[..])
    }
}

impl core::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for byte in &self.bytes[..] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

// ============================================================================
// Packet Number (RFC 9000 Section 12.3)
// ============================================================================

/// Packet Number - Monotonically increasing per packet number space
pub type PacketNumber = u64;

/// Maximum packet number value (2^62 - 1)
pub const MAX_PACKET_NUMBER: u64 = (1u64 << 62) - 1;

/// Packet Number Space
///
/// Each space owns an independent counter. 0-RTT and 1-RTT are kept apart
/// here so that a counter is never shared between two packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketNumberSpace {
    Initial = 0,
    Handshake = 1,
    ZeroRtt = 2,
    OneRtt = 3,
}

impl PacketNumberSpace {
    pub const ALL: [PacketNumberSpace; 4] = [
        PacketNumberSpace::Initial,
        PacketNumberSpace::Handshake,
        PacketNumberSpace::ZeroRtt,
        PacketNumberSpace::OneRtt,
    ];

    /// Index into per-space tables.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

// ============================================================================
// Stream ID (RFC 9000 Section 2.1)
// ============================================================================

/// Stream ID - Identifies a bidirectional or unidirectional stream
///
/// The two least significant bits encode stream type and initiator:
/// - Bit 0: Initiator (0=client, 1=server)
/// - Bit 1: Direction (0=bidirectional, 1=unidirectional)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u64);

/// Maximum stream ID value (2^62 - 1)
pub const MAX_STREAM_ID: u64 = (1u64 << 62) - 1;

impl StreamId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// First stream id of the given class (the two type bits).
    pub fn base(initiator: StreamInitiator, direction: StreamDirection) -> Self {
        let mut id = 0;
        if initiator == StreamInitiator::Server {
            id |= 0x01;
        }
        if direction == StreamDirection::Unidirectional {
            id |= 0x02;
        }
        Self(id)
    }

    pub fn initiator(&self) -> StreamInitiator {
        if self.0 & 0x01 == 0 {
            StreamInitiator::Client
        } else {
            StreamInitiator::Server
        }
    }

    pub fn direction(&self) -> StreamDirection {
        if self.0 & 0x02 == 0 {
            StreamDirection::Bidirectional
        } else {
            StreamDirection::Unidirectional
        }
    }

    pub fn is_bidirectional(&self) -> bool {
        self.direction() == StreamDirection::Bidirectional
    }

    pub fn is_unidirectional(&self) -> bool {
        self.direction() == StreamDirection::Unidirectional
    }

    /// Zero-based position of this id within its class.
    pub fn sequence(&self) -> u64 {
        self.0 >> 2
    }
}

impl core::fmt::Display for StreamId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stream Direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDirection {
    Bidirectional,
    Unidirectional,
}

/// Stream Initiator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamInitiator {
    Client,
    Server,
}

impl From<Side> for StreamInitiator {
    fn from(side: Side) -> Self {
        match side {
            Side::Client => StreamInitiator::Client,
            Side::Server => StreamInitiator::Server,
        }
    }
}

pub type StreamOffset = u64;

// ============================================================================
// Endpoint Side
// ============================================================================

/// Which end of the connection this endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Client,
    Server,
}

impl Side {
    pub fn is_client(self) -> bool {
        self == Side::Client
    }

    pub fn is_server(self) -> bool {
        self == Side::Server
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Client => Side::Server,
            Side::Server => Side::Client,
        }
    }
}

// ============================================================================
// Token (RFC 9000 Section 8.1)
// ============================================================================

/// Address validation token from a Retry packet or a NEW_TOKEN frame.
///
/// Whether a packet carries a token at all is expressed with
/// `Option<Token>`; a present token may still be empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    bytes: Bytes,
}

impl Token {
    pub fn new(bytes: Bytes) -> Self {
        Self { bytes }
    }

    pub fn from_slice(slice: &[u8]) -> Self {
        Self {
            bytes: Bytes::copy_from_slice(slice),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ============================================================================
// Protocol Constants
// ============================================================================

/// QUIC version 1 (RFC 9000)
pub const QUIC_VERSION_1: u32 = 0x0000_0001;

/// Default maximum UDP payload size (RFC 9000 Section 14)
pub const DEFAULT_MAX_UDP_PAYLOAD_SIZE: usize = 1200;

/// Client Initial datagrams must be at least this large (RFC 9000 Section 14.1)
pub const MIN_INITIAL_PACKET_SIZE: usize = 1200;

/// Fixed AEAD expansion assumed by size estimates (AES-GCM / ChaCha20 tag).
pub const AEAD_EXPANSION: usize = 16;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_MAX_STREAMS_BIDI: u64 = 100;

pub const DEFAULT_MAX_STREAMS_UNI: u64 = 100;

pub const DEFAULT_INITIAL_MAX_DATA: u64 = 15 * 1024 * 1024;

pub const DEFAULT_INITIAL_MAX_STREAM_DATA: u64 = 6 * 1024 * 1024;

pub type StatelessResetToken = [u8; 16];

// ============================================================================
// Unit Tests
// ============================================================================
