//! QUIC Error Types
//!
//! Two layers of errors live here:
//! - [`TransportError`]: the RFC 9000 Section 20.1 wire codes carried in
//!   CONNECTION_CLOSE frames and surfaced when a connection dies.
//! - [`Error`]: everything the codec and state machine can report to a
//!   caller, including local faults that never reach the wire.

#![forbid(unsafe_code)]

use crate::packet::PacketType;
use thiserror::Error;

/// Transport Error Codes as defined in RFC 9000 Section 20.1
///
/// These errors trigger immediate connection closure and are sent in
/// CONNECTION_CLOSE frames of type 0x1c.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[repr(u64)]
pub enum TransportError {
    /// No error (0x00) - Used for graceful shutdown
    #[error("NO_ERROR")]
    NoError = 0x00,

    /// Internal Error (0x01) - Implementation error
    #[error("INTERNAL_ERROR")]
    InternalError = 0x01,

    /// Connection Refused (0x02) - Server refuses connection
    #[error("CONNECTION_REFUSED")]
    ConnectionRefused = 0x02,

    /// Flow Control Error (0x03) - Peer exceeded flow control limits
    #[error("FLOW_CONTROL_ERROR")]
    FlowControlError = 0x03,

    /// Stream Limit Error (0x04) - Stream limit exceeded
    #[error("STREAM_LIMIT_ERROR")]
    StreamLimitError = 0x04,

    /// Stream State Error (0x05) - Frame received in invalid stream state
    #[error("STREAM_STATE_ERROR")]
    StreamStateError = 0x05,

    /// Final Size Error (0x06) - Final size violation
    #[error("FINAL_SIZE_ERROR")]
    FinalSizeError = 0x06,

    /// Frame Encoding Error (0x07) - Frame encoding error
    #[error("FRAME_ENCODING_ERROR")]
    FrameEncodingError = 0x07,

    /// Transport Parameter Error (0x08) - Invalid transport parameters
    #[error("TRANSPORT_PARAMETER_ERROR")]
    TransportParameterError = 0x08,

    /// Connection ID Limit Error (0x09) - Connection ID limit exceeded
    #[error("CONNECTION_ID_LIMIT_ERROR")]
    ConnectionIdLimitError = 0x09,

    /// Protocol Violation (0x0a) - Generic protocol violation
    #[error("PROTOCOL_VIOLATION")]
    ProtocolViolation = 0x0a,

    /// Invalid Token (0x0b) - Invalid retry or NEW_TOKEN token
    #[error("INVALID_TOKEN")]
    InvalidToken = 0x0b,

    /// Application Error (0x0c) - Application closed connection
    #[error("APPLICATION_ERROR")]
    ApplicationError = 0x0c,

    /// Crypto Buffer Exceeded (0x0d) - CRYPTO data buffer overflowed
    #[error("CRYPTO_BUFFER_EXCEEDED")]
    CryptoBufferExceeded = 0x0d,

    /// Key Update Error (0x0e) - Key update error
    #[error("KEY_UPDATE_ERROR")]
    KeyUpdateError = 0x0e,

    /// AEAD Limit Reached (0x0f) - AEAD usage limit reached
    #[error("AEAD_LIMIT_REACHED")]
    AeadLimitReached = 0x0f,

    /// No Viable Path (0x10) - No viable network path
    #[error("NO_VIABLE_PATH")]
    NoViablePath = 0x10,
}

impl TransportError {
    /// Wire value of this error code.
    pub fn code(self) -> u64 {
        self as u64
    }

    /// Map a wire value back to a known code.
    ///
    /// Crypto errors (0x0100-0x01ff) and unknown codes return `None`.
    pub fn from_code(code: u64) -> Option<Self> {
        let err = match code {
            0x00 => Self::NoError,
            0x01 => Self::InternalError,
            0x02 => Self::ConnectionRefused,
            0x03 => Self::FlowControlError,
            0x04 => Self::StreamLimitError,
            0x05 => Self::StreamStateError,
            0x06 => Self::FinalSizeError,
            0x07 => Self::FrameEncodingError,
            0x08 => Self::TransportParameterError,
            0x09 => Self::ConnectionIdLimitError,
            0x0a => Self::ProtocolViolation,
            0x0b => Self::InvalidToken,
            0x0c => Self::ApplicationError,
            0x0d => Self::CryptoBufferExceeded,
            0x0e => Self::KeyUpdateError,
            0x0f => Self::AeadLimitReached,
            0x10 => Self::NoViablePath,
            _ => return None,
        };
        Some(err)
    }
}

/// Generic Result Type for QUIC Operations
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the codec, the send scheduler and the
/// connection state machine.
#[derive(Debug, Error)]
pub enum Error {
    /// Encoding a value that does not fit in 62 bits.
    #[error("varint value {0} is out of range (max 2^62-1)")]
    VarIntOutOfRange(u64),

    /// Input ended in the middle of a field, or an output buffer is too small.
    #[error("buffer too short: needed {needed} bytes, {available} available")]
    BufferTooShort { needed: usize, available: usize },

    /// Structurally invalid packet.
    #[error("malformed packet: {0}")]
    MalformedPacket(&'static str),

    /// A typed parser was handed bytes of another packet type. This is a
    /// caller bug, never a property of untrusted input.
    #[error("wrong packet type: expected {expected:?}, found {found:?}")]
    WrongPacketType {
        expected: PacketType,
        found: PacketType,
    },

    /// Connection ID longer than 20 bytes.
    #[error("connection id length {0} exceeds 20 bytes")]
    InvalidConnectionId(usize),

    /// Version field does not match any version this endpoint speaks.
    #[error("unsupported version 0x{0:08x}")]
    UnsupportedVersion(u32),

    /// A deferred frame producer returned more bytes than it was granted.
    #[error("produced frame of {produced} bytes exceeds budget of {budget} bytes")]
    FrameExceedsBudget { produced: usize, budget: usize },

    /// Payload protection collaborator rejected the packet.
    #[error("packet protection failure")]
    Protection,

    /// Transport-level protocol error. Fatal for the connection.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Operation on a connection that already reached its terminal state.
    #[error("connection closed")]
    ConnectionClosed,

    /// Underlying byte source failed while decoding from a reader.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn short(needed: usize, available: usize) -> Self {
        Error::BufferTooShort { needed, available }
    }

    /// The wire code that should close the connection for this error, if any.
    pub fn transport_code(&self) -> Option<TransportError> {
        match self {
            Error::Transport(e) => Some(*e),
            Error::MalformedPacket(_) | Error::BufferTooShort { .. } => {
                Some(TransportError::FrameEncodingError)
            }
            Error::InvalidConnectionId(_) => Some(TransportError::ProtocolViolation),
            _ => None,
        }
    }

    pub fn is_transport_parameter_error(&self) -> bool {
        matches!(
            self,
            Error::Transport(TransportError::TransportParameterError)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_codes_round_trip() {
        for code in 0x00..=0x10 {
            let err = TransportError::from_code(code).unwrap();
            assert_eq!(err.code(), code);
        }
        assert_eq!(TransportError::from_code(0x11), None);
        assert_eq!(TransportError::from_code(0x0128), None);
    }

    #[test]
    fn test_transport_parameter_error_code() {
        // RFC 9000 Section 20.1
        assert_eq!(TransportError::TransportParameterError.code(), 0x08);
        let err: Error = TransportError::TransportParameterError.into();
        assert!(err.is_transport_parameter_error());
        assert_eq!(
            err.transport_code(),
            Some(TransportError::TransportParameterError)
        );
    }

    #[test]
    fn test_display_includes_detail() {
        let err = Error::VarIntOutOfRange(1 << 62);
        assert!(err.to_string().contains("out of range"));

        let err = Error::WrongPacketType {
            expected: PacketType::Initial,
            found: PacketType::Retry,
        };
        assert!(err.to_string().contains("Retry"));
    }
}
