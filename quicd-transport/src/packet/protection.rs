//! # Packet Protection (RFC 9001 Section 5)
//!
//! Key derivation, AEAD and header protection belong to the TLS layer.
//! The codec only needs to seal a serialized payload and open a received
//! one, and to know how many bytes sealing adds.

use crate::error::{Error, Result};
use crate::types::{PacketNumber, PacketNumberSpace};
use bytes::{Bytes, BytesMut};

/// Payload protection provided by the crypto collaborator.
///
/// `header` is the complete packet header including the packet number and
/// is used as associated data.
pub trait PacketProtection: Send + Sync {
    /// Bytes added by sealing a payload in `space`.
    fn tag_len(&self, space: PacketNumberSpace) -> usize;

    /// Encrypt `payload` in place and append the authentication tag.
    fn seal(
        &self,
        space: PacketNumberSpace,
        packet_number: PacketNumber,
        header: &[u8],
        payload: &mut BytesMut,
    ) -> Result<()>;

    /// Verify and decrypt a received payload (tag included).
    fn open(
        &self,
        space: PacketNumberSpace,
        packet_number: PacketNumber,
        header: &[u8],
        payload: Bytes,
    ) -> Result<Bytes>;
}

/// Identity protection with no tag.
///
/// For tooling, fuzzing and tests where the TLS layer is absent.
#[derive(Debug, Default, Clone, Copy)]
pub struct Plaintext;

impl PacketProtection for Plaintext {
    fn tag_len(&self, _space: PacketNumberSpace) -> usize {
        0
    }

    fn seal(
        &self,
        _space: PacketNumberSpace,
        _packet_number: PacketNumber,
        _header: &[u8],
        _payload: &mut BytesMut,
    ) -> Result<()> {
        Ok(())
    }

    fn open(
        &self,
        _space: PacketNumberSpace,
        _packet_number: PacketNumber,
        _header: &[u8],
        payload: Bytes,
    ) -> Result<Bytes> {
        Ok(payload)
    }
}

/// Check performed by every `open` on a tagged payload.
pub(crate) fn check_tag_room(payload: &Bytes, tag_len: usize) -> Result<()> {
    if payload.len() < tag_len {
        return Err(Error::Protection);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    //! A stand-in AEAD: XORs the payload with the low packet number byte
    //! and appends a 16-byte tag of that byte.

    use super::*;
    use bytes::BufMut;

    pub(crate) struct XorAead;

    impl PacketProtection for XorAead {
        fn tag_len(&self, _space: PacketNumberSpace) -> usize {
            16
        }

        fn seal(
            &self,
            _space: PacketNumberSpace,
            packet_number: PacketNumber,
            _header: &[u8],
            payload: &mut BytesMut,
        ) -> Result<()> {
            let key = packet_number as u8;
            for b in payload.iter_mut() {
                *b ^= key;
            }
            payload.put_bytes(key, 16);
            Ok(())
        }

        fn open(
            &self,
            _space: PacketNumberSpace,
            packet_number: PacketNumber,
            _header: &[u8],
            payload: Bytes,
        ) -> Result<Bytes> {
            check_tag_room(&payload, 16)?;
            let key = packet_number as u8;
            let (body, tag) = payload.split_at(payload.len() - 16);
            if tag.iter().any(|b| *b != key) {
                return Err(Error::Protection);
            }
            Ok(body.iter().map(|b| b ^ key).collect::<Vec<u8>>().into())
        }
    }
}
