//! # QUIC Frame Types (RFC 9000 Section 19)
//!
//! QUIC packets contain one or more frames carrying control or application data.
//!
//! ## Frame Classification:
//! - **ACK-eliciting**: STREAM, CRYPTO, NEW_TOKEN, etc. (require acknowledgment)
//! - **Non-ACK-eliciting**: ACK, CONNECTION_CLOSE, PADDING
//!
//! Frames own their payloads as [`Bytes`], so a parsed frame is a cheap
//! slice of the datagram it came from and can outlive the parse call.

#![forbid(unsafe_code)]

use crate::types::{PacketNumber, StreamDirection, StreamId, StreamOffset, Token};
use crate::varint::VarInt;
use bytes::Bytes;

/// Frame Type Constants (RFC 9000 Section 19)
pub const FRAME_TYPE_PADDING: u8 = 0x00;
pub const FRAME_TYPE_PING: u8 = 0x01;
pub const FRAME_TYPE_ACK: u8 = 0x02;
pub const FRAME_TYPE_ACK_ECN: u8 = 0x03;
pub const FRAME_TYPE_CRYPTO: u8 = 0x06;
pub const FRAME_TYPE_NEW_TOKEN: u8 = 0x07;
pub const FRAME_TYPE_STREAM_BASE: u8 = 0x08; // 0x08-0x0f
pub const FRAME_TYPE_MAX_DATA: u8 = 0x10;
pub const FRAME_TYPE_MAX_STREAM_DATA: u8 = 0x11;
pub const FRAME_TYPE_MAX_STREAMS_BIDI: u8 = 0x12;
pub const FRAME_TYPE_MAX_STREAMS_UNI: u8 = 0x13;
pub const FRAME_TYPE_CONNECTION_CLOSE_QUIC: u8 = 0x1c;
pub const FRAME_TYPE_CONNECTION_CLOSE_APP: u8 = 0x1d;
pub const FRAME_TYPE_HANDSHAKE_DONE: u8 = 0x1e;

/// STREAM Frame Flag Bits (RFC 9000 Section 19.8)
///
/// - Bit 0 (FIN): Last frame in stream
/// - Bit 1 (LEN): Length field present
/// - Bit 2 (OFF): Offset field present
pub const STREAM_FRAME_BIT_FIN: u8 = 0x01;
pub const STREAM_FRAME_BIT_LEN: u8 = 0x02;
pub const STREAM_FRAME_BIT_OFF: u8 = 0x04;

/// A single QUIC frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A run of PADDING bytes. The count is the number of zero bytes.
    Padding(usize),
    Ping,
    Ack(AckFrame),
    Crypto(CryptoFrame),
    NewToken(NewTokenFrame),
    Stream(StreamFrame),
    MaxData(VarInt),
    MaxStreamData(MaxStreamDataFrame),
    MaxStreams(MaxStreamsFrame),
    ConnectionClose(ConnectionCloseFrame),
    HandshakeDone,
}

impl Frame {
    /// Wire frame type of this frame.
    pub fn frame_type(&self) -> u64 {
        let ty = match self {
            Frame::Padding(_) => FRAME_TYPE_PADDING,
            Frame::Ping => FRAME_TYPE_PING,
            Frame::Ack(ack) if ack.ecn.is_some() => FRAME_TYPE_ACK_ECN,
            Frame::Ack(_) => FRAME_TYPE_ACK,
            Frame::Crypto(_) => FRAME_TYPE_CRYPTO,
            Frame::NewToken(_) => FRAME_TYPE_NEW_TOKEN,
            Frame::Stream(stream) => stream.type_byte(),
            Frame::MaxData(_) => FRAME_TYPE_MAX_DATA,
            Frame::MaxStreamData(_) => FRAME_TYPE_MAX_STREAM_DATA,
            Frame::MaxStreams(f) => match f.direction {
                StreamDirection::Bidirectional => FRAME_TYPE_MAX_STREAMS_BIDI,
                StreamDirection::Unidirectional => FRAME_TYPE_MAX_STREAMS_UNI,
            },
            Frame::ConnectionClose(close) if close.application => FRAME_TYPE_CONNECTION_CLOSE_APP,
            Frame::ConnectionClose(_) => FRAME_TYPE_CONNECTION_CLOSE_QUIC,
            Frame::HandshakeDone => FRAME_TYPE_HANDSHAKE_DONE,
        };
        u64::from(ty)
    }

    /// RFC 9002 Section 2: everything except ACK, PADDING and
    /// CONNECTION_CLOSE elicits an acknowledgment.
    pub fn is_ack_eliciting(&self) -> bool {
        !matches!(
            self,
            Frame::Padding(_) | Frame::Ack(_) | Frame::ConnectionClose(_)
        )
    }

    pub fn is_padding(&self) -> bool {
        matches!(self, Frame::Padding(_))
    }
}

/// ACK Frame (RFC 9000 Section 19.3)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckFrame {
    /// Largest packet number being acknowledged
    pub largest_acknowledged: PacketNumber,

    /// Encoded ack delay (scaled by the ack_delay_exponent)
    pub ack_delay: VarInt,

    /// Number of packets before largest_acknowledged that are also acknowledged
    pub first_range: VarInt,

    /// Additional (gap, length) ranges in descending order
    pub ranges: Vec<AckRange>,

    /// ECN counts, present only in ACK_ECN frames
    pub ecn: Option<EcnCounts>,
}

impl AckFrame {
    /// Acknowledge a single packet number.
    pub fn single(pn: PacketNumber) -> Self {
        Self {
            largest_acknowledged: pn,
            ack_delay: 0,
            first_range: 0,
            ranges: Vec::new(),
            ecn: None,
        }
    }

    /// Smallest packet number covered by the first range.
    pub fn smallest_in_first_range(&self) -> Option<PacketNumber> {
        self.largest_acknowledged.checked_sub(self.first_range)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckRange {
    pub gap: VarInt,
    pub length: VarInt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcnCounts {
    pub ect0: VarInt,
    pub ect1: VarInt,
    pub ce: VarInt,
}

/// CRYPTO Frame (RFC 9000 Section 19.6)
///
/// Carries TLS handshake bytes for the packet number space it is sent in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoFrame {
    pub offset: VarInt,
    pub data: Bytes,
}

/// NEW_TOKEN Frame (RFC 9000 Section 19.7)
///
/// Token for the client to present in the Initial of a future connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTokenFrame {
    pub token: Token,
}

/// STREAM Frame (RFC 9000 Section 19.8)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    pub stream_id: StreamId,
    pub offset: StreamOffset,
    pub data: Bytes,
    pub fin: bool,
}

impl StreamFrame {
    /// Encoded frames always carry explicit OFF and LEN fields so they can be
    /// placed anywhere in a packet.
    pub fn type_byte(&self) -> u8 {
        let mut ty = FRAME_TYPE_STREAM_BASE | STREAM_FRAME_BIT_OFF | STREAM_FRAME_BIT_LEN;
        if self.fin {
            ty |= STREAM_FRAME_BIT_FIN;
        }
        ty
    }
}

/// MAX_STREAM_DATA Frame (RFC 9000 Section 19.10)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxStreamDataFrame {
    pub stream_id: StreamId,
    pub maximum: VarInt,
}

/// MAX_STREAMS Frame (RFC 9000 Section 19.11)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxStreamsFrame {
    pub direction: StreamDirection,
    pub maximum: VarInt,
}

/// CONNECTION_CLOSE Frame (RFC 9000 Section 19.19)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionCloseFrame {
    pub error_code: VarInt,
    /// Frame type that triggered the error (transport variant only)
    pub frame_type: Option<VarInt>,
    pub reason: Bytes,
    /// True for the application variant (0x1d)
    pub application: bool,
}

impl ConnectionCloseFrame {
    pub fn transport(error: crate::error::TransportError, reason: &'static str) -> Self {
        Self {
            error_code: error.code(),
            frame_type: Some(0),
            reason: Bytes::from_static(reason.as_bytes()),
            application: false,
        }
    }
}
