//! # QUIC Packets (RFC 9000 Section 17)
//!
//! [`Packet`] is the closed set of packet forms the endpoint understands.
//! Each variant has its own typed parser that checks the type bits first;
//! [`Packet::parse`] dispatches on the first byte.

pub mod long;
pub mod number;
pub mod protection;
pub mod short;
pub mod types;

pub use long::{InitialPacket, LongPacket, RetryPacket};
pub use protection::{PacketProtection, Plaintext};
pub use short::ShortPacket;
pub use types::{LongHeader, PacketType, Version};

use crate::error::{Error, Result};
use crate::frames::Frame;
use crate::types::{ConnectionId, PacketNumber, PacketNumberSpace};
use bytes::{Bytes, BytesMut};

/// A parsed or to-be-sent packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Initial(InitialPacket),
    Handshake(LongPacket),
    ZeroRtt(LongPacket),
    Retry(RetryPacket),
    OneRtt(ShortPacket),
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Initial(_) => PacketType::Initial,
            Packet::Handshake(_) => PacketType::Handshake,
            Packet::ZeroRtt(_) => PacketType::ZeroRtt,
            Packet::Retry(_) => PacketType::Retry,
            Packet::OneRtt(_) => PacketType::OneRtt,
        }
    }

    pub fn space(&self) -> Option<PacketNumberSpace> {
        self.packet_type().packet_number_space()
    }

    pub fn dcid(&self) -> &ConnectionId {
        match self {
            Packet::Initial(p) => &p.header.dcid,
            Packet::Handshake(p) | Packet::ZeroRtt(p) => &p.header.dcid,
            Packet::Retry(p) => &p.header.dcid,
            Packet::OneRtt(p) => &p.dcid,
        }
    }

    /// Packet number as carried on the wire. Retry packets have none.
    pub fn packet_number(&self) -> Option<PacketNumber> {
        match self {
            Packet::Initial(p) => Some(p.packet_number),
            Packet::Handshake(p) | Packet::ZeroRtt(p) => Some(p.packet_number),
            Packet::OneRtt(p) => Some(p.packet_number),
            Packet::Retry(_) => None,
        }
    }

    /// Bytes the packet number occupies on the wire.
    pub fn packet_number_len(&self) -> Option<usize> {
        match self {
            Packet::Initial(p) => Some(p.pn_len),
            Packet::Handshake(p) | Packet::ZeroRtt(p) => Some(p.pn_len),
            Packet::OneRtt(p) => Some(p.pn_len),
            Packet::Retry(_) => None,
        }
    }

    pub fn frames(&self) -> &[Frame] {
        match self {
            Packet::Initial(p) => &p.frames,
            Packet::Handshake(p) | Packet::ZeroRtt(p) => &p.frames,
            Packet::OneRtt(p) => &p.frames,
            Packet::Retry(_) => &[],
        }
    }

    pub fn is_ack_eliciting(&self) -> bool {
        self.frames().iter().any(Frame::is_ack_eliciting)
    }

    /// Parse one packet from the front of `buf`.
    ///
    /// `short_dcid_len` is the length of the connection ids this endpoint
    /// issued, needed to read short headers.
    pub fn parse(
        buf: &mut Bytes,
        short_dcid_len: usize,
        protection: &dyn PacketProtection,
    ) -> Result<Packet> {
        let first = *buf.first().ok_or(Error::short(1, 0))?;
        let packet_type = PacketType::from_first_byte(first);
        if packet_type.is_long_header() {
            if buf.len() < 5 {
                return Err(Error::short(5, buf.len()));
            }
            let version = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
            if version == types::VERSION_NEGOTIATION {
                return Err(Error::UnsupportedVersion(version));
            }
        }

        let packet = match packet_type {
            PacketType::Initial => Packet::Initial(InitialPacket::parse(buf, protection)?),
            PacketType::Handshake => {
                Packet::Handshake(LongPacket::parse(buf, packet_type, protection)?)
            }
            PacketType::ZeroRtt => Packet::ZeroRtt(LongPacket::parse(buf, packet_type, protection)?),
            PacketType::Retry => Packet::Retry(RetryPacket::parse(buf)?),
            PacketType::OneRtt => {
                Packet::OneRtt(ShortPacket::parse(buf, short_dcid_len, protection)?)
            }
        };
        Ok(packet)
    }

    pub fn encode(&self, protection: &dyn PacketProtection, out: &mut BytesMut) -> Result<()> {
        match self {
            Packet::Initial(p) => p.encode(protection, out),
            Packet::Handshake(p) | Packet::ZeroRtt(p) => p.encode(protection, out),
            Packet::Retry(p) => {
                p.encode(out);
                Ok(())
            }
            Packet::OneRtt(p) => p.encode(protection, out),
        }
    }

    pub fn to_bytes(&self, protection: &dyn PacketProtection) -> Result<Bytes> {
        let mut out = BytesMut::with_capacity(crate::types::MIN_INITIAL_PACKET_SIZE);
        self.encode(protection, &mut out)?;
        Ok(out.freeze())
    }
}

/// Iterates over the coalesced packets of one datagram
/// (RFC 9000 Section 12.2).
///
/// Stops after the first packet that fails to parse, since the position of
/// any following packet is then unknown.
pub struct DatagramIterator<'a> {
    buf: Bytes,
    short_dcid_len: usize,
    protection: &'a dyn PacketProtection,
    failed: bool,
}

impl<'a> DatagramIterator<'a> {
    pub fn new(
        datagram: Bytes,
        short_dcid_len: usize,
        protection: &'a dyn PacketProtection,
    ) -> Self {
        Self {
            buf: datagram,
            short_dcid_len,
            protection,
            failed: false,
        }
    }
}

impl Iterator for DatagramIterator<'_> {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.buf.is_empty() {
            return None;
        }
        let result = Packet::parse(&mut self.buf, self.short_dcid_len, self.protection);
        self.failed = result.is_err();
        Some(result)
    }
}
