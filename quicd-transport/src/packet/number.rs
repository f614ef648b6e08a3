//! # Packet Number Encoding/Decoding (RFC 9000 Section 17.1)
//!
//! Packet numbers are sent truncated to 1-4 bytes. The sender picks the
//! length from the distance to the largest acknowledged packet; the
//! receiver rebuilds the full value from the truncated bits and the next
//! packet number it expects.

#![forbid(unsafe_code)]

use crate::error::{Error, Result};
use crate::types::PacketNumber;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Number of bytes needed to send `full_pn` (RFC 9000 Appendix A.2)
///
/// `largest_acked` is `None` before the peer acknowledged anything in the
/// packet number space.
pub fn encode_length(full_pn: PacketNumber, largest_acked: Option<PacketNumber>) -> usize {
    let num_unacked = match largest_acked {
        Some(acked) => full_pn.saturating_sub(acked),
        None => full_pn + 1,
    };

    // One extra bit so the receiver can tell ahead from behind.
    let num_bits = (64 - num_unacked.leading_zeros()) as usize + 1;

    if num_bits <= 8 {
        1
    } else if num_bits <= 16 {
        2
    } else if num_bits <= 24 {
        3
    } else {
        4
    }
}

/// Write the low `len` bytes of `pn` in network byte order.
pub fn write(pn: PacketNumber, len: usize, out: &mut BytesMut) {
    let be = pn.to_be_bytes();
    out.put_slice(&be[8 - len..]);
}

/// Read a `len`-byte truncated packet number.
pub fn read(buf: &mut Bytes, len: usize) -> Result<u64> {
    if !(1..=4).contains(&len) {
        return Err(Error::MalformedPacket("packet number length out of range"));
    }
    if buf.remaining() < len {
        return Err(Error::short(len, buf.remaining()));
    }
    Ok(buf.get_uint(len))
}

/// Decode a truncated packet number to its full value (RFC 9000 Appendix A.3)
///
/// * `truncated_pn` - The truncated packet number from the packet header
/// * `pn_nbits` - Number of bits in the truncated encoding (8, 16, 24, or 32)
/// * `expected_pn` - The expected next packet number (largest_received + 1)
pub fn decode(truncated_pn: u64, pn_nbits: usize, expected_pn: PacketNumber) -> Result<PacketNumber> {
    if !matches!(pn_nbits, 8 | 16 | 24 | 32) {
        return Err(Error::MalformedPacket("packet number length out of range"));
    }

    let pn_win = 1u64 << pn_nbits;
    let pn_hwin = pn_win / 2;
    let pn_mask = pn_win - 1;

    let candidate = (expected_pn & !pn_mask) | truncated_pn;

    if candidate + pn_hwin <= expected_pn && candidate < (1u64 << 62) - pn_win {
        Ok(candidate + pn_win)
    } else if candidate > expected_pn + pn_hwin && candidate >= pn_win {
        Ok(candidate - pn_win)
    } else {
        Ok(candidate)
    }
}
