//! # Packet Type Definitions (RFC 9000 Section 17)
//!
//! First-byte layout and the fields shared by every long-header packet.

#![forbid(unsafe_code)]

use crate::error::{Error, Result};
use crate::types::{ConnectionId, PacketNumberSpace};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// QUIC Protocol Version (RFC 9000 Section 15)
pub type Version = u32;

/// Version used for Version Negotiation packets
pub const VERSION_NEGOTIATION: Version = 0x0000_0000;

/// Header Form Bit (RFC 9000 Section 17.2)
pub const HEADER_FORM_BIT: u8 = 0x80;

/// Fixed Bit, must be 1 in every version 1 packet
pub const FIXED_BIT: u8 = 0x40;

/// Long Packet Type Mask (bits 4-5)
pub const LONG_PACKET_TYPE_MASK: u8 = 0x30;

pub const LONG_PACKET_TYPE_INITIAL: u8 = 0x00;
pub const LONG_PACKET_TYPE_0RTT: u8 = 0x10;
pub const LONG_PACKET_TYPE_HANDSHAKE: u8 = 0x20;
pub const LONG_PACKET_TYPE_RETRY: u8 = 0x30;

/// Packet Number Length Mask (bits 0-1), encodes length - 1
pub const PACKET_NUMBER_LENGTH_MASK: u8 = 0x03;

/// Short header spin bit (RFC 9000 Section 17.4)
pub const SPIN_BIT: u8 = 0x20;

/// Short header key phase bit
pub const KEY_PHASE_BIT: u8 = 0x04;

/// Packet Type (RFC 9000 Section 17)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Initial,
    ZeroRtt,
    Handshake,
    Retry,
    /// Short header packet
    OneRtt,
}

impl PacketType {
    /// Classify a packet by its first byte.
    pub fn from_first_byte(first_byte: u8) -> Self {
        if first_byte & HEADER_FORM_BIT == 0 {
            return PacketType::OneRtt;
        }
        match first_byte & LONG_PACKET_TYPE_MASK {
            LONG_PACKET_TYPE_INITIAL => PacketType::Initial,
            LONG_PACKET_TYPE_0RTT => PacketType::ZeroRtt,
            LONG_PACKET_TYPE_HANDSHAKE => PacketType::Handshake,
            _ => PacketType::Retry,
        }
    }

    /// Type bits for a long header first byte. Zero for short headers.
    pub fn long_type_bits(self) -> u8 {
        match self {
            PacketType::Initial => LONG_PACKET_TYPE_INITIAL,
            PacketType::ZeroRtt => LONG_PACKET_TYPE_0RTT,
            PacketType::Handshake => LONG_PACKET_TYPE_HANDSHAKE,
            PacketType::Retry => LONG_PACKET_TYPE_RETRY,
            PacketType::OneRtt => 0,
        }
    }

    pub fn is_long_header(self) -> bool {
        !matches!(self, PacketType::OneRtt)
    }

    /// Packet number space for this packet type. Retry packets have none.
    pub fn packet_number_space(self) -> Option<PacketNumberSpace> {
        match self {
            PacketType::Initial => Some(PacketNumberSpace::Initial),
            PacketType::Handshake => Some(PacketNumberSpace::Handshake),
            PacketType::ZeroRtt => Some(PacketNumberSpace::ZeroRtt),
            PacketType::OneRtt => Some(PacketNumberSpace::OneRtt),
            PacketType::Retry => None,
        }
    }
}

/// Fields common to every long header packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongHeader {
    pub version: Version,
    pub dcid: ConnectionId,
    pub scid: ConnectionId,
}

impl LongHeader {
    pub fn new(version: Version, dcid: ConnectionId, scid: ConnectionId) -> Self {
        Self {
            version,
            dcid,
            scid,
        }
    }

    /// Bytes taken by version and both length-prefixed connection ids.
    pub fn encoded_len(&self) -> usize {
        4 + 1 + self.dcid.len() + 1 + self.scid.len()
    }

    /// Write `first_byte`, the version and both connection ids.
    pub(crate) fn encode_prefix(&self, first_byte: u8, out: &mut BytesMut) {
        out.put_u8(first_byte);
        out.put_u32(self.version);
        out.put_u8(self.dcid.len() as u8);
        out.put_slice(self.dcid.as_bytes());
        out.put_u8(self.scid.len() as u8);
        out.put_slice(self.scid.as_bytes());
    }

    /// Read the first byte, version and both connection ids.
    pub(crate) fn parse_prefix(buf: &mut Bytes) -> Result<(u8, LongHeader)> {
        if buf.remaining() < 7 {
            return Err(Error::short(7, buf.remaining()));
        }
        let first_byte = buf.get_u8();
        if first_byte & HEADER_FORM_BIT == 0 {
            return Err(Error::MalformedPacket("short header where long header expected"));
        }
        if first_byte & FIXED_BIT == 0 {
            return Err(Error::MalformedPacket("fixed bit not set"));
        }
        let version = buf.get_u32();
        let dcid = parse_cid(buf)?;
        let scid = parse_cid(buf)?;
        Ok((first_byte, LongHeader::new(version, dcid, scid)))
    }
}

/// Read a one-byte length followed by a connection id of that length.
pub(crate) fn parse_cid(buf: &mut Bytes) -> Result<ConnectionId> {
    if !buf.has_remaining() {
        return Err(Error::short(1, 0));
    }
    let len = buf.get_u8() as usize;
    if buf.remaining() < len {
        return Err(Error::short(len, buf.remaining()));
    }
    ConnectionId::try_new(buf.split_to(len))
}

/// Reject a buffer whose first byte is not of the `expected` type.
pub(crate) fn expect_type(buf: &[u8], expected: PacketType) -> Result<()> {
    let first = *buf.first().ok_or(Error::short(1, 0))?;
    let found = PacketType::from_first_byte(first);
    if found != expected {
        return Err(Error::WrongPacketType { expected, found });
    }
    Ok(())
}
