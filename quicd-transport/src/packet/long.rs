//! # Long Header Packets (RFC 9000 Section 17.2)
//!
//! ```text
//! Initial Packet {
//!   Header Form (1) = 1, Fixed Bit (1) = 1, Long Packet Type (2) = 0,
//!   Reserved Bits (2), Packet Number Length (2),
//!   Version (32),
//!   Destination Connection ID Length (8), Destination Connection ID (0..160),
//!   Source Connection ID Length (8), Source Connection ID (0..160),
//!   Token Length (i), Token (..),
//!   Length (i),
//!   Packet Number (8..32),
//!   Packet Payload (8..),
//! }
//! ```
//!
//! Handshake and 0-RTT packets share the layout without the token fields.
//! Retry packets carry the original destination connection id explicitly
//! and use the rest of the datagram as the retry token.
//!
//! Parsers consume exactly one packet from the front of the buffer so that
//! coalesced packets can be read one after another. On error the buffer
//! position is unspecified and the rest of the datagram should be dropped.

#![forbid(unsafe_code)]

use super::number;
use super::protection::PacketProtection;
use super::types::*;
use crate::error::{Error, Result, TransportError};
use crate::frames::Frame;
use crate::types::{ConnectionId, PacketNumber, Token, AEAD_EXPANSION};
use crate::varint::VarIntCodec;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Reserved bits of a long header first byte (after header protection removal)
const LONG_RESERVED_BITS: u8 = 0x0c;

// ============================================================================
// Initial
// ============================================================================

/// Initial packet (RFC 9000 Section 17.2.2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialPacket {
    pub header: LongHeader,
    /// `None` is sent as a zero token length.
    pub token: Option<Token>,
    pub packet_number: PacketNumber,
    /// Bytes used on the wire for the packet number (1-4)
    pub pn_len: usize,
    pub frames: Vec<Frame>,
}

impl InitialPacket {
    pub fn new(
        header: LongHeader,
        token: Option<Token>,
        packet_number: PacketNumber,
        frames: Vec<Frame>,
    ) -> Self {
        Self {
            header,
            token,
            packet_number,
            pn_len: number::encode_length(packet_number, None),
            frames,
        }
    }

    /// Sum of the encoded sizes of all frames.
    pub fn payload_len(&self) -> usize {
        self.frames.iter().map(Frame::encoded_len).sum()
    }

    /// Estimated size of the protected packet on the wire.
    ///
    /// Assumes a two-byte Length field and a fixed AEAD expansion of
    /// [`AEAD_EXPANSION`] bytes. This is an approximation: a payload small
    /// enough for a one-byte Length, or a cipher with another tag size,
    /// makes the real packet differ from the estimate.
    pub fn estimated_size(&self) -> usize {
        let token = match &self.token {
            Some(token) if !token.is_empty() => {
                VarIntCodec::size(token.len() as u64) + token.len()
            }
            _ => 1,
        };
        1 + self.header.encoded_len() + token + 2 + self.pn_len + self.payload_len() + AEAD_EXPANSION
    }

    /// Append PADDING until the estimated size reaches `minimum`.
    ///
    /// Client Initial datagrams must be at least 1200 bytes
    /// (RFC 9000 Section 14.1).
    pub fn ensure_size(&mut self, minimum: usize) {
        let estimate = self.estimated_size();
        if estimate < minimum {
            self.frames.push(Frame::Padding(minimum - estimate));
        }
    }

    pub fn encode(&self, protection: &dyn PacketProtection, out: &mut BytesMut) -> Result<()> {
        let token = self.token.as_ref().map_or(&[][..], Token::as_bytes);
        encode_long(
            PacketType::Initial,
            &self.header,
            Some(token),
            self.packet_number,
            self.pn_len,
            &self.frames,
            protection,
            out,
        )
    }

    /// Parse one Initial packet from the front of `buf`.
    ///
    /// Fails with [`Error::WrongPacketType`] if the type bits say otherwise.
    pub fn parse(buf: &mut Bytes, protection: &dyn PacketProtection) -> Result<Self> {
        let parsed = parse_long(buf, PacketType::Initial, protection)?;
        let token = parsed
            .token
            .filter(|token| !token.is_empty())
            .map(Token::new);
        Ok(Self {
            header: parsed.header,
            token,
            packet_number: parsed.packet_number,
            pn_len: parsed.pn_len,
            frames: parsed.frames,
        })
    }
}

// ============================================================================
// Handshake / 0-RTT
// ============================================================================

/// Handshake (RFC 9000 Section 17.2.4) or 0-RTT (Section 17.2.3) packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongPacket {
    pub packet_type: PacketType,
    pub header: LongHeader,
    pub packet_number: PacketNumber,
    pub pn_len: usize,
    pub frames: Vec<Frame>,
}

impl LongPacket {
    pub fn handshake(header: LongHeader, packet_number: PacketNumber, frames: Vec<Frame>) -> Self {
        Self::with_type(PacketType::Handshake, header, packet_number, frames)
    }

    pub fn zero_rtt(header: LongHeader, packet_number: PacketNumber, frames: Vec<Frame>) -> Self {
        Self::with_type(PacketType::ZeroRtt, header, packet_number, frames)
    }

    fn with_type(
        packet_type: PacketType,
        header: LongHeader,
        packet_number: PacketNumber,
        frames: Vec<Frame>,
    ) -> Self {
        Self {
            packet_type,
            header,
            packet_number,
            pn_len: number::encode_length(packet_number, None),
            frames,
        }
    }

    pub fn encode(&self, protection: &dyn PacketProtection, out: &mut BytesMut) -> Result<()> {
        encode_long(
            self.packet_type,
            &self.header,
            None,
            self.packet_number,
            self.pn_len,
            &self.frames,
            protection,
            out,
        )
    }

    /// Parse a packet of type `expected` (Handshake or 0-RTT).
    pub fn parse(
        buf: &mut Bytes,
        expected: PacketType,
        protection: &dyn PacketProtection,
    ) -> Result<Self> {
        if !matches!(expected, PacketType::Handshake | PacketType::ZeroRtt) {
            return Err(Error::MalformedPacket("not a handshake or 0-rtt packet type"));
        }
        let parsed = parse_long(buf, expected, protection)?;
        Ok(Self {
            packet_type: expected,
            header: parsed.header,
            packet_number: parsed.packet_number,
            pn_len: parsed.pn_len,
            frames: parsed.frames,
        })
    }
}

// ============================================================================
// Retry
// ============================================================================

/// Retry packet.
///
/// ```text
/// Retry Packet {
///   Header Form (1) = 1, Fixed Bit (1) = 1, Long Packet Type (2) = 3, Unused (4),
///   Version (32),
///   DCID Len (8), Destination Connection ID (0..160),
///   SCID Len (8), Source Connection ID (0..160),
///   ODCID Len (8), Original Destination Connection ID (0..160),
///   Retry Token (..),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPacket {
    pub header: LongHeader,
    /// Destination connection id of the client's first Initial
    pub original_dcid: ConnectionId,
    pub token: Token,
}

impl RetryPacket {
    pub fn encode(&self, out: &mut BytesMut) {
        self.header
            .encode_prefix(HEADER_FORM_BIT | FIXED_BIT | LONG_PACKET_TYPE_RETRY, out);
        out.put_u8(self.original_dcid.len() as u8);
        out.put_slice(self.original_dcid.as_bytes());
        out.put_slice(self.token.as_bytes());
    }

    /// Parse a Retry packet. The token runs to the end of `buf`.
    pub fn parse(buf: &mut Bytes) -> Result<Self> {
        expect_type(buf, PacketType::Retry)?;
        let (_, header) = LongHeader::parse_prefix(buf)?;
        let original_dcid = parse_cid(buf)?;
        let token = Token::new(buf.split_to(buf.len()));
        Ok(Self {
            header,
            original_dcid,
            token,
        })
    }
}

// ============================================================================
// Shared body codec
// ============================================================================

struct ParsedLong {
    header: LongHeader,
    token: Option<Bytes>,
    packet_number: PacketNumber,
    pn_len: usize,
    frames: Vec<Frame>,
}

#[allow(clippy::too_many_arguments)]
fn encode_long(
    packet_type: PacketType,
    header: &LongHeader,
    token: Option<&[u8]>,
    packet_number: PacketNumber,
    pn_len: usize,
    frames: &[Frame],
    protection: &dyn PacketProtection,
    out: &mut BytesMut,
) -> Result<()> {
    let space = packet_type
        .packet_number_space()
        .ok_or(Error::MalformedPacket("packet type has no packet number space"))?;
    if !(1..=4).contains(&pn_len) {
        return Err(Error::MalformedPacket("packet number length out of range"));
    }

    let mut payload = BytesMut::with_capacity(frames.iter().map(Frame::encoded_len).sum());
    for frame in frames {
        frame.encode(&mut payload)?;
    }
    let length = pn_len + payload.len() + protection.tag_len(space);

    let start = out.len();
    let first_byte = HEADER_FORM_BIT | FIXED_BIT | packet_type.long_type_bits() | (pn_len as u8 - 1);
    header.encode_prefix(first_byte, out);
    if let Some(token) = token {
        VarIntCodec::put_prefixed(token, out)?;
    }
    VarIntCodec::put(length as u64, out)?;
    number::write(packet_number, pn_len, out);

    protection.seal(space, packet_number, &out[start..], &mut payload)?;
    out.extend_from_slice(&payload);
    Ok(())
}

fn parse_long(
    buf: &mut Bytes,
    expected: PacketType,
    protection: &dyn PacketProtection,
) -> Result<ParsedLong> {
    expect_type(buf, expected)?;
    let space = expected
        .packet_number_space()
        .ok_or(Error::MalformedPacket("packet type has no packet number space"))?;

    let original = buf.clone();
    let (first_byte, header) = LongHeader::parse_prefix(buf)?;
    if first_byte & LONG_RESERVED_BITS != 0 {
        return Err(Error::Transport(TransportError::ProtocolViolation));
    }

    let token = if expected == PacketType::Initial {
        Some(VarIntCodec::get_prefixed(buf)?)
    } else {
        None
    };

    let length = usize::try_from(VarIntCodec::get(buf)?)
        .map_err(|_| Error::MalformedPacket("length field overflows"))?;
    if buf.remaining() < length {
        return Err(Error::short(length, buf.remaining()));
    }
    let pn_len = (first_byte & PACKET_NUMBER_LENGTH_MASK) as usize + 1;
    if length < pn_len {
        return Err(Error::MalformedPacket("length shorter than packet number"));
    }

    let packet_number = number::read(buf, pn_len)?;
    let header_len = original.len() - buf.len();
    let sealed = buf.split_to(length - pn_len);
    let payload = protection.open(space, packet_number, &original[..header_len], sealed)?;
    let frames = Frame::parse_all(payload)?;

    Ok(ParsedLong {
        header,
        token,
        packet_number,
        pn_len,
        frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::CryptoFrame;
    use crate::packet::protection::testing::XorAead;
    use crate::packet::protection::Plaintext;
    use crate::types::{MIN_INITIAL_PACKET_SIZE, QUIC_VERSION_1};

    fn header() -> LongHeader {
        LongHeader::new(
            QUIC_VERSION_1,
            ConnectionId::from_slice(&[0x0a; 8]).unwrap(),
            ConnectionId::from_slice(&[0x0c; 4]).unwrap(),
        )
    }

    fn crypto(len: usize) -> Frame {
        Frame::Crypto(CryptoFrame {
            offset: 0,
            data: Bytes::from(vec![0x16; len]),
        })
    }

    fn encode(packet: &InitialPacket, protection: &dyn PacketProtection) -> Bytes {
        let mut out = BytesMut::new();
        packet.encode(protection, &mut out).unwrap();
        out.freeze()
    }

    mod initial_tests {
        use super::*;

        #[test]
        fn test_initial_wire_layout() {
            let packet = InitialPacket::new(header(), None, 0, vec![Frame::Ping]);
            let bytes = encode(&packet, &Plaintext);

            // 1 1 00 00 00: Initial, 1-byte packet number
            assert_eq!(bytes[0], 0xc0);
            assert_eq!(&bytes[1..5], &[0, 0, 0, 1]);
            assert_eq!(bytes[5], 8);
            assert_eq!(&bytes[6..14], &[0x0a; 8]);
            assert_eq!(bytes[14], 4);
            assert_eq!(&bytes[15..19], &[0x0c; 4]);
            // no token
            assert_eq!(bytes[19], 0x00);
            // Length = packet number + PING
            assert_eq!(bytes[20], 2);
            assert_eq!(bytes[21], 0);
            assert_eq!(bytes[22], 0x01);
            assert_eq!(bytes.len(), 23);
        }

        #[test]
        fn test_initial_with_token_parses_back() {
            let token = Token::from_slice(&[1, 2, 3]);
            let packet = InitialPacket::new(header(), Some(token.clone()), 1, vec![crypto(40)]);
            let mut bytes = encode(&packet, &XorAead);

            let parsed = InitialPacket::parse(&mut bytes, &XorAead).unwrap();
            assert_eq!(parsed.token, Some(token));
            assert_eq!(parsed.header, packet.header);
            assert_eq!(parsed.packet_number, 1);
            assert_eq!(parsed.frames, packet.frames);
            assert!(bytes.is_empty());
        }

        #[test]
        fn test_zero_length_token_means_no_token() {
            let packet = InitialPacket::new(header(), Some(Token::from_slice(&[])), 0, vec![Frame::Ping]);
            let mut bytes = encode(&packet, &Plaintext);
            assert_eq!(bytes[19], 0x00);
            let parsed = InitialPacket::parse(&mut bytes, &Plaintext).unwrap();
            assert_eq!(parsed.token, None);
        }

        #[test]
        fn test_truncated_token_rejected() {
            // Token length 10 with only 2 bytes present
            let mut raw = vec![0xc0, 0, 0, 0, 1, 0, 0, 10, 0xaa, 0xbb];
            raw.truncate(10);
            let mut bytes = Bytes::from(raw);
            assert!(matches!(
                InitialPacket::parse(&mut bytes, &Plaintext),
                Err(Error::BufferTooShort { .. })
            ));
        }

        #[test]
        fn test_wrong_type_is_reported() {
            let packet = LongPacket::handshake(header(), 0, vec![Frame::Ping]);
            let mut out = BytesMut::new();
            packet.encode(&Plaintext, &mut out).unwrap();
            let mut bytes = out.freeze();
            assert!(matches!(
                InitialPacket::parse(&mut bytes, &Plaintext),
                Err(Error::WrongPacketType {
                    expected: PacketType::Initial,
                    found: PacketType::Handshake
                })
            ));
            // Nothing consumed
            assert_eq!(bytes[0] & LONG_PACKET_TYPE_MASK, LONG_PACKET_TYPE_HANDSHAKE);
        }

        #[test]
        fn test_length_exceeding_datagram() {
            let packet = InitialPacket::new(header(), None, 0, vec![crypto(10)]);
            let bytes = encode(&packet, &Plaintext);
            let mut truncated = bytes.slice(..bytes.len() - 3);
            assert!(InitialPacket::parse(&mut truncated, &Plaintext).is_err());
        }

        #[test]
        fn test_tampered_payload_rejected() {
            let packet = InitialPacket::new(header(), None, 3, vec![crypto(10)]);
            let mut raw = BytesMut::from(&encode(&packet, &XorAead)[..]);
            let last = raw.len() - 1;
            raw[last] ^= 0xff;
            let mut bytes = raw.freeze();
            assert!(matches!(
                InitialPacket::parse(&mut bytes, &XorAead),
                Err(Error::Protection)
            ));
        }
    }

    mod padding_tests {
        use super::*;

        #[test]
        fn test_ensure_size_pads_small_packet() {
            let mut packet = InitialPacket::new(header(), None, 0, vec![crypto(200)]);
            packet.ensure_size(MIN_INITIAL_PACKET_SIZE);
            assert_eq!(packet.estimated_size(), MIN_INITIAL_PACKET_SIZE);
            assert!(matches!(packet.frames.last(), Some(Frame::Padding(_))));

            // With a 16-byte tag the estimate is exact for this packet.
            assert_eq!(encode(&packet, &XorAead).len(), MIN_INITIAL_PACKET_SIZE);
            // Without a tag the packet is exactly the AEAD expansion smaller.
            assert_eq!(
                encode(&packet, &Plaintext).len(),
                MIN_INITIAL_PACKET_SIZE - AEAD_EXPANSION
            );
        }

        #[test]
        fn test_ensure_size_with_token() {
            let token = Token::from_slice(&[1, 2, 3]);
            let mut packet = InitialPacket::new(header(), Some(token), 1, vec![crypto(100)]);
            packet.ensure_size(MIN_INITIAL_PACKET_SIZE);
            assert_eq!(encode(&packet, &XorAead).len(), MIN_INITIAL_PACKET_SIZE);
        }

        #[test]
        fn test_ensure_size_leaves_large_packet() {
            let mut packet = InitialPacket::new(header(), None, 0, vec![crypto(1300)]);
            packet.ensure_size(MIN_INITIAL_PACKET_SIZE);
            assert_eq!(packet.frames.len(), 1);
        }

        #[test]
        fn test_padding_survives_parse() {
            let mut packet = InitialPacket::new(header(), None, 0, vec![crypto(20)]);
            packet.ensure_size(MIN_INITIAL_PACKET_SIZE);
            let mut bytes = encode(&packet, &XorAead);
            let parsed = InitialPacket::parse(&mut bytes, &XorAead).unwrap();
            assert_eq!(parsed.frames, packet.frames);
        }
    }

    mod retry_tests {
        use super::*;

        #[test]
        fn test_retry_layout() {
            let retry = RetryPacket {
                header: LongHeader::new(
                    QUIC_VERSION_1,
                    ConnectionId::from_slice(&[0x0c; 4]).unwrap(),
                    ConnectionId::from_slice(&[0x0b; 4]).unwrap(),
                ),
                original_dcid: ConnectionId::from_slice(&[0x0a; 8]).unwrap(),
                token: Token::from_slice(&[1, 2, 3]),
            };
            let mut out = BytesMut::new();
            retry.encode(&mut out);
            assert_eq!(out[0], 0xf0);
            assert_eq!(&out[out.len() - 3..], &[1, 2, 3]);

            let mut bytes = out.freeze();
            assert_eq!(RetryPacket::parse(&mut bytes).unwrap(), retry);
        }

        #[test]
        fn test_retry_parse_rejects_initial() {
            let packet = InitialPacket::new(header(), None, 0, vec![Frame::Ping]);
            let mut bytes = encode(&packet, &Plaintext);
            assert!(matches!(
                RetryPacket::parse(&mut bytes),
                Err(Error::WrongPacketType {
                    expected: PacketType::Retry,
                    found: PacketType::Initial
                })
            ));
        }
    }

    mod handshake_tests {
        use super::*;

        #[test]
        fn test_handshake_round_trip() {
            let packet = LongPacket::handshake(header(), 300, vec![crypto(30), Frame::Ping]);
            assert_eq!(packet.pn_len, 2);
            let mut out = BytesMut::new();
            packet.encode(&XorAead, &mut out).unwrap();
            assert_eq!(out[0], 0xe1);
            let mut bytes = out.freeze();
            let parsed = LongPacket::parse(&mut bytes, PacketType::Handshake, &XorAead).unwrap();
            assert_eq!(parsed, packet);
        }

        #[test]
        fn test_zero_rtt_type_bits() {
            let packet = LongPacket::zero_rtt(header(), 0, vec![Frame::Ping]);
            let mut out = BytesMut::new();
            packet.encode(&Plaintext, &mut out).unwrap();
            assert_eq!(out[0] & LONG_PACKET_TYPE_MASK, LONG_PACKET_TYPE_0RTT);
        }
    }
}
