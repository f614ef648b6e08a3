//! Variable-Length Integer Encoding (RFC 9000 Section 16)
//!
//! The two most significant bits of the first byte select the encoded
//! length: 00=1 byte, 01=2 bytes, 10=4 bytes, 11=8 bytes. The remaining
//! bits hold the value in network byte order. Encoders always pick the
//! shortest form.

#![forbid(unsafe_code)]

use crate::error::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::{self, Read};

/// Variable-length integer value. Always below 2^62.
pub type VarInt = u64;

/// Maximum value for VarInt (2^62 - 1)
pub const VARINT_MAX: u64 = (1u64 << 62) - 1;

/// VarInt encoding and decoding utilities
pub struct VarIntCodec;

impl VarIntCodec {
    /// Encoded length implied by the first byte of a varint.
    #[inline]
    pub fn length_from_first_byte(first: u8) -> usize {
        1 << (first >> 6)
    }

    /// Calculate the encoded size for a given value
    #[inline]
    pub fn size(value: VarInt) -> usize {
        if value < 0x40 {
            1
        } else if value < 0x4000 {
            2
        } else if value < 0x4000_0000 {
            4
        } else {
            8
        }
    }

    /// Decode a VarInt from the front of a byte slice.
    ///
    /// Returns `(value, bytes_consumed)`.
    pub fn decode(buf: &[u8]) -> Result<(VarInt, usize)> {
        let first = *buf.first().ok_or(Error::short(1, 0))?;
        let len = Self::length_from_first_byte(first);
        if buf.len() < len {
            return Err(Error::short(len, buf.len()));
        }

        let value = buf[1..len]
            .iter()
            .fold(u64::from(first & 0x3f), |acc, b| (acc << 8) | u64::from(*b));
        Ok((value, len))
    }

    /// Decode a VarInt from a cursor, advancing it past the field.
    ///
    /// The cursor is left untouched on error.
    pub fn get<B: Buf>(buf: &mut B) -> Result<VarInt> {
        if !buf.has_remaining() {
            return Err(Error::short(1, 0));
        }
        let len = Self::length_from_first_byte(buf.chunk()[0]);
        if buf.remaining() < len {
            return Err(Error::short(len, buf.remaining()));
        }

        let mut scratch = [0u8; 8];
        buf.copy_to_slice(&mut scratch[..len]);
        let (value, _) = Self::decode(&scratch[..len])?;
        Ok(value)
    }

    /// Blocking decode from a byte source, consuming exactly the bytes of
    /// the field and nothing more.
    pub fn read<R: Read + ?Sized>(reader: &mut R) -> Result<VarInt> {
        let mut first = [0u8; 1];
        read_full(reader, &mut first, 1)?;
        let len = Self::length_from_first_byte(first[0]);

        let mut rest = [0u8; 7];
        read_full(reader, &mut rest[..len - 1], len)?;

        let value = rest[..len - 1]
            .iter()
            .fold(u64::from(first[0] & 0x3f), |acc, b| (acc << 8) | u64::from(*b));
        Ok(value)
    }

    /// Encode a VarInt into a buffer, returning bytes written
    pub fn encode(value: VarInt, buf: &mut [u8]) -> Result<usize> {
        if value > VARINT_MAX {
            return Err(Error::VarIntOutOfRange(value));
        }
        let len = Self::size(value);
        if buf.len() < len {
            return Err(Error::short(len, buf.len()));
        }

        let prefix: u8 = match len {
            1 => 0x00,
            2 => 0x40,
            4 => 0x80,
            _ => 0xc0,
        };
        let be = value.to_be_bytes();
        buf[..len].copy_from_slice(&be[8 - len..]);
        buf[0] |= prefix;
        Ok(len)
    }

    /// Append the shortest encoding of `value` to `buf`.
    pub fn put<B: BufMut>(value: VarInt, buf: &mut B) -> Result<()> {
        let mut scratch = [0u8; 8];
        let len = Self::encode(value, &mut scratch)?;
        buf.put_slice(&scratch[..len]);
        Ok(())
    }

    /// Encode `value` to a freshly allocated buffer.
    pub fn to_bytes(value: VarInt) -> Result<Bytes> {
        let mut out = BytesMut::with_capacity(8);
        Self::put(value, &mut out)?;
        Ok(out.freeze())
    }

    /// Append a length-prefixed byte string (varint length, then bytes).
    pub fn put_prefixed<B: BufMut>(bytes: &[u8], buf: &mut B) -> Result<()> {
        Self::put(bytes.len() as u64, buf)?;
        buf.put_slice(bytes);
        Ok(())
    }

    /// Read a varint length prefix and then exactly that many bytes.
    pub fn get_prefixed(buf: &mut Bytes) -> Result<Bytes> {
        let mut peek = &buf[..];
        let len = Self::get(&mut peek)?;
        let header = buf.len() - peek.len();
        let len = usize::try_from(len).map_err(|_| Error::short(usize::MAX, buf.len()))?;
        if peek.len() < len {
            return Err(Error::short(header + len, buf.len()));
        }
        buf.advance(header);
        Ok(buf.split_to(len))
    }
}

fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8], field_len: usize) -> Result<()> {
    let already = field_len - buf.len();
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Err(Error::short(field_len, already + filled)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Boundary values and their expected encoded lengths.
    const BOUNDARIES: [(u64, usize); 8] = [
        (0, 1),
        (63, 1),
        (64, 2),
        (16383, 2),
        (16384, 4),
        (1073741823, 4),
        (1073741824, 8),
        (4611686018427387903, 8),
    ];

    mod encode_tests {
        use super::*;

        #[test]
        fn test_boundary_lengths() {
            for (value, len) in BOUNDARIES {
                let encoded = VarIntCodec::to_bytes(value).unwrap();
                assert_eq!(encoded.len(), len, "value {}", value);
                assert_eq!(VarIntCodec::size(value), len);
            }
        }

        #[test]
        fn test_out_of_range_rejected() {
            let err = VarIntCodec::to_bytes(1u64 << 62).unwrap_err();
            assert!(matches!(err, Error::VarIntOutOfRange(v) if v == 1u64 << 62));

            let mut buf = [0u8; 8];
            assert!(VarIntCodec::encode(u64::MAX, &mut buf).is_err());
        }

        #[test]
        fn test_rfc_examples() {
            // RFC 9000 Appendix A.1
            assert_eq!(
                &VarIntCodec::to_bytes(151288809941952652).unwrap()[..],
                &[0xc2, 0x19, 0x7c, 0x5e, 0xff, 0x14, 0xe8, 0x8c]
            );
            assert_eq!(
                &VarIntCodec::to_bytes(494878333).unwrap()[..],
                &[0x9d, 0x7f, 0x3e, 0x7d]
            );
            assert_eq!(&VarIntCodec::to_bytes(15293).unwrap()[..], &[0x7b, 0xbd]);
            assert_eq!(&VarIntCodec::to_bytes(37).unwrap()[..], &[0x25]);
        }

        #[test]
        fn test_encode_into_short_buffer() {
            let mut buf = [0u8; 1];
            assert!(matches!(
                VarIntCodec::encode(64, &mut buf),
                Err(Error::BufferTooShort { needed: 2, available: 1 })
            ));
        }
    }

    mod decode_tests {
        use super::*;

        #[test]
        fn test_boundaries_round_trip() {
            for (value, len) in BOUNDARIES {
                let encoded = VarIntCodec::to_bytes(value).unwrap();
                assert_eq!(VarIntCodec::decode(&encoded).unwrap(), (value, len));
            }
        }

        #[test]
        fn test_non_minimal_encoding_accepted() {
            // RFC 9000 Section 16: 37 may also be encoded in two bytes
            assert_eq!(VarIntCodec::decode(&[0x40, 0x25]).unwrap(), (37, 2));
        }

        #[test]
        fn test_truncated_is_size_error() {
            assert!(matches!(
                VarIntCodec::decode(&[]),
                Err(Error::BufferTooShort { needed: 1, available: 0 })
            ));
            assert!(matches!(
                VarIntCodec::decode(&[0x9d, 0x7f]),
                Err(Error::BufferTooShort { needed: 4, available: 2 })
            ));
        }

        #[test]
        fn test_cursor_advances_exactly() {
            let mut buf = Bytes::from_static(&[0x7b, 0xbd, 0x25, 0xff]);
            assert_eq!(VarIntCodec::get(&mut buf).unwrap(), 15293);
            assert_eq!(VarIntCodec::get(&mut buf).unwrap(), 37);
            assert_eq!(buf.remaining(), 1);
        }

        #[test]
        fn test_cursor_untouched_on_error() {
            let mut buf = Bytes::from_static(&[0xc0, 0x00]);
            assert!(VarIntCodec::get(&mut buf).is_err());
            assert_eq!(buf.remaining(), 2);
        }

        #[test]
        fn test_reader_consumes_only_the_field() {
            let data = [0x9d, 0x7f, 0x3e, 0x7d, 0xaa, 0xbb];
            let mut reader = &data[..];
            assert_eq!(VarIntCodec::read(&mut reader).unwrap(), 494878333);
            assert_eq!(reader, &[0xaa, 0xbb]);
        }

        #[test]
        fn test_reader_truncated() {
            let data = [0xc2, 0x19, 0x7c];
            let mut reader = &data[..];
            assert!(matches!(
                VarIntCodec::read(&mut reader),
                Err(Error::BufferTooShort { needed: 8, available: 3 })
            ));
        }

        #[test]
        fn test_prefixed_round_trip() {
            let mut out = BytesMut::new();
            VarIntCodec::put_prefixed(&[1, 2, 3], &mut out).unwrap();
            out.put_u8(0x99);
            let mut buf = out.freeze();
            assert_eq!(&VarIntCodec::get_prefixed(&mut buf).unwrap()[..], &[1, 2, 3]);
            assert_eq!(&buf[..], &[0x99]);
        }

        #[test]
        fn test_prefixed_truncated_leaves_buffer() {
            let mut buf = Bytes::from_static(&[0x05, 1, 2]);
            assert!(VarIntCodec::get_prefixed(&mut buf).is_err());
            assert_eq!(buf.len(), 3);
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_round_trip(value in 0u64..=VARINT_MAX) {
                let encoded = VarIntCodec::to_bytes(value).unwrap();
                prop_assert_eq!(encoded.len(), VarIntCodec::size(value));
                prop_assert_eq!(VarIntCodec::decode(&encoded).unwrap(), (value, encoded.len()));
                let mut reader = &encoded[..];
                prop_assert_eq!(VarIntCodec::read(&mut reader).unwrap(), value);
            }
        }
    }
}
