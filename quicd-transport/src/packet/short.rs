//! # Short Header Packets (RFC 9000 Section 17.3)
//!
//! ```text
//! 1-RTT Packet {
//!   Header Form (1) = 0, Fixed Bit (1) = 1, Spin Bit (1),
//!   Reserved Bits (2), Key Phase (1), Packet Number Length (2),
//!   Destination Connection ID (0..160),
//!   Packet Number (8..32),
//!   Packet Payload (8..),
//! }
//! ```
//!
//! The connection id length is not on the wire; the receiver supplies the
//! length of the ids it issued. The payload runs to the end of the datagram.

#![forbid(unsafe_code)]

use super::number;
use super::protection::PacketProtection;
use super::types::*;
use crate::error::{Error, Result, TransportError};
use crate::frames::Frame;
use crate::types::{ConnectionId, PacketNumber, PacketNumberSpace};
use bytes::{Buf, BufMut, Bytes, BytesMut};

const SHORT_RESERVED_BITS: u8 = 0x18;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortPacket {
    pub dcid: ConnectionId,
    pub spin: bool,
    pub key_phase: bool,
    pub packet_number: PacketNumber,
    pub pn_len: usize,
    pub frames: Vec<Frame>,
}

impl ShortPacket {
    pub fn new(dcid: ConnectionId, packet_number: PacketNumber, frames: Vec<Frame>) -> Self {
        Self {
            dcid,
            spin: false,
            key_phase: false,
            packet_number,
            pn_len: number::encode_length(packet_number, None),
            frames,
        }
    }

    pub fn encode(&self, protection: &dyn PacketProtection, out: &mut BytesMut) -> Result<()> {
        if !(1..=4).contains(&self.pn_len) {
            return Err(Error::MalformedPacket("packet number length out of range"));
        }
        let mut first_byte = FIXED_BIT | (self.pn_len as u8 - 1);
        if self.spin {
            first_byte |= SPIN_BIT;
        }
        if self.key_phase {
            first_byte |= KEY_PHASE_BIT;
        }

        let mut payload = BytesMut::new();
        for frame in &self.frames {
            frame.encode(&mut payload)?;
        }

        let start = out.len();
        out.put_u8(first_byte);
        out.put_slice(self.dcid.as_bytes());
        number::write(self.packet_number, self.pn_len, out);
        protection.seal(
            PacketNumberSpace::OneRtt,
            self.packet_number,
            &out[start..],
            &mut payload,
        )?;
        out.extend_from_slice(&payload);
        Ok(())
    }

    /// Parse a 1-RTT packet. Consumes the rest of `buf`.
    pub fn parse(
        buf: &mut Bytes,
        dcid_len: usize,
        protection: &dyn PacketProtection,
    ) -> Result<Self> {
        expect_type(buf, PacketType::OneRtt)?;
        let original = buf.clone();

        let first_byte = buf.get_u8();
        if first_byte & FIXED_BIT == 0 {
            return Err(Error::MalformedPacket("fixed bit not set"));
        }
        if first_byte & SHORT_RESERVED_BITS != 0 {
            return Err(Error::Transport(TransportError::ProtocolViolation));
        }
        if buf.remaining() < dcid_len {
            return Err(Error::short(dcid_len, buf.remaining()));
        }
        let dcid = ConnectionId::try_new(buf.split_to(dcid_len))?;

        let pn_len = (first_byte & PACKET_NUMBER_LENGTH_MASK) as usize + 1;
        let packet_number = number::read(buf, pn_len)?;
        let header_len = original.len() - buf.len();

        let sealed = buf.split_to(buf.len());
        let payload = protection.open(
            PacketNumberSpace::OneRtt,
            packet_number,
            &original[..header_len],
            sealed,
        )?;

        Ok(Self {
            dcid,
            spin: first_byte & SPIN_BIT != 0,
            key_phase: first_byte & KEY_PHASE_BIT != 0,
            packet_number,
            pn_len,
            frames: Frame::parse_all(payload)?,
        })
    }
}
