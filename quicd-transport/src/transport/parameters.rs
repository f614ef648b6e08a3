//! # Transport Parameters (RFC 9000 Section 18)
//!
//! Transport parameters are exchanged during the TLS handshake to
//! configure connection behavior. Each parameter is encoded as a
//! type-length-value (TLV) tuple:
//!
//! ```text
//! Transport Parameter {
//!   Transport Parameter ID (i),
//!   Transport Parameter Length (i),
//!   Transport Parameter Value (..),
//! }
//! ```

#![forbid(unsafe_code)]

use crate::error::{Error, Result, TransportError};
use crate::types::*;
use crate::varint::{VarInt, VarIntCodec};
use bytes::{Buf, Bytes, BytesMut};
use std::collections::HashSet;

/// Transport Parameter ID (RFC 9000 Section 18.2)
pub type TransportParameterId = VarInt;

// Transport Parameter IDs
pub const TP_ORIGINAL_DESTINATION_CONNECTION_ID: TransportParameterId = 0x00;
pub const TP_MAX_IDLE_TIMEOUT: TransportParameterId = 0x01;
pub const TP_STATELESS_RESET_TOKEN: TransportParameterId = 0x02;
pub const TP_MAX_UDP_PAYLOAD_SIZE: TransportParameterId = 0x03;
pub const TP_INITIAL_MAX_DATA: TransportParameterId = 0x04;
pub const TP_INITIAL_MAX_STREAM_DATA_BIDI_LOCAL: TransportParameterId = 0x05;
pub const TP_INITIAL_MAX_STREAM_DATA_BIDI_REMOTE: TransportParameterId = 0x06;
pub const TP_INITIAL_MAX_STREAM_DATA_UNI: TransportParameterId = 0x07;
pub const TP_INITIAL_MAX_STREAMS_BIDI: TransportParameterId = 0x08;
pub const TP_INITIAL_MAX_STREAMS_UNI: TransportParameterId = 0x09;
pub const TP_ACK_DELAY_EXPONENT: TransportParameterId = 0x0a;
pub const TP_MAX_ACK_DELAY: TransportParameterId = 0x0b;
pub const TP_DISABLE_ACTIVE_MIGRATION: TransportParameterId = 0x0c;
pub const TP_ACTIVE_CONNECTION_ID_LIMIT: TransportParameterId = 0x0e;
pub const TP_INITIAL_SOURCE_CONNECTION_ID: TransportParameterId = 0x0f;
pub const TP_RETRY_SOURCE_CONNECTION_ID: TransportParameterId = 0x10;

/// Transport Parameters Structure (RFC 9000 Section 18)
///
/// Absent optional parameters take their RFC defaults when read through
/// the accessor methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportParameters {
    // Connection IDs
    pub original_destination_connection_id: Option<ConnectionId>,
    pub initial_source_connection_id: Option<ConnectionId>,
    pub retry_source_connection_id: Option<ConnectionId>,

    // Stateless Reset
    pub stateless_reset_token: Option<StatelessResetToken>,

    // Idle Timeout
    pub max_idle_timeout: Option<VarInt>, // milliseconds

    // Flow Control
    pub initial_max_data: VarInt,
    pub initial_max_stream_data_bidi_local: VarInt,
    pub initial_max_stream_data_bidi_remote: VarInt,
    pub initial_max_stream_data_uni: VarInt,

    // Stream Limits
    pub initial_max_streams_bidi: VarInt,
    pub initial_max_streams_uni: VarInt,

    // Packet Size
    pub max_udp_payload_size: Option<VarInt>, // default: 65527

    // ACK Parameters
    pub ack_delay_exponent: Option<VarInt>, // default: 3
    pub max_ack_delay: Option<VarInt>,      // milliseconds, default: 25

    // Migration
    pub disable_active_migration: bool,

    // Connection ID Management
    pub active_connection_id_limit: Option<VarInt>, // default: 2

    /// Parameters this endpoint does not interpret (including
    /// preferred_address), kept in arrival order.
    pub unknown_parameters: Vec<(TransportParameterId, Bytes)>,
}

impl Default for TransportParameters {
    fn default() -> Self {
        Self::default_client()
    }
}

impl TransportParameters {
    /// Parameters with nothing set: what a peer declares by sending an
    /// empty extension.
    pub fn empty() -> Self {
        Self {
            original_destination_connection_id: None,
            initial_source_connection_id: None,
            retry_source_connection_id: None,
            stateless_reset_token: None,
            max_idle_timeout: None,
            initial_max_data: 0,
            initial_max_stream_data_bidi_local: 0,
            initial_max_stream_data_bidi_remote: 0,
            initial_max_stream_data_uni: 0,
            initial_max_streams_bidi: 0,
            initial_max_streams_uni: 0,
            max_udp_payload_size: None,
            ack_delay_exponent: None,
            max_ack_delay: None,
            disable_active_migration: false,
            active_connection_id_limit: None,
            unknown_parameters: Vec::new(),
        }
    }

    /// Create default client parameters
    pub fn default_client() -> Self {
        Self {
            max_idle_timeout: Some(DEFAULT_IDLE_TIMEOUT.as_millis() as VarInt),
            initial_max_data: DEFAULT_INITIAL_MAX_DATA,
            initial_max_stream_data_bidi_local: DEFAULT_INITIAL_MAX_STREAM_DATA,
            initial_max_stream_data_bidi_remote: DEFAULT_INITIAL_MAX_STREAM_DATA,
            initial_max_stream_data_uni: DEFAULT_INITIAL_MAX_STREAM_DATA,
            initial_max_streams_bidi: DEFAULT_MAX_STREAMS_BIDI,
            initial_max_streams_uni: DEFAULT_MAX_STREAMS_UNI,
            max_udp_payload_size: Some(DEFAULT_MAX_UDP_PAYLOAD_SIZE as VarInt),
            active_connection_id_limit: Some(2),
            ..Self::empty()
        }
    }

    pub fn max_udp_payload_size(&self) -> VarInt {
        self.max_udp_payload_size.unwrap_or(65527)
    }

    pub fn ack_delay_exponent(&self) -> VarInt {
        self.ack_delay_exponent.unwrap_or(3)
    }

    pub fn max_ack_delay(&self) -> VarInt {
        self.max_ack_delay.unwrap_or(25)
    }

    pub fn active_connection_id_limit(&self) -> VarInt {
        self.active_connection_id_limit.unwrap_or(2)
    }

    /// Validate transport parameters
    ///
    /// Checks that all parameters are within valid ranges per RFC 9000.
    pub fn validate(&self) -> Result<()> {
        // max_udp_payload_size must be >= 1200
        if let Some(size) = self.max_udp_payload_size {
            if size < 1200 {
                return Err(Error::Transport(TransportError::TransportParameterError));
            }
        }

        // ack_delay_exponent must be <= 20
        if let Some(exp) = self.ack_delay_exponent {
            if exp > 20 {
                return Err(Error::Transport(TransportError::TransportParameterError));
            }
        }

        // max_ack_delay must be < 2^14
        if let Some(delay) = self.max_ack_delay {
            if delay >= (1 << 14) {
                return Err(Error::Transport(TransportError::TransportParameterError));
            }
        }

        // active_connection_id_limit must be >= 2
        if let Some(limit) = self.active_connection_id_limit {
            if limit < 2 {
                return Err(Error::Transport(TransportError::TransportParameterError));
            }
        }

        // Stream counts cannot exceed 2^60 (RFC 9000 Section 4.6)
        if self.initial_max_streams_bidi > (1 << 60) || self.initial_max_streams_uni > (1 << 60) {
            return Err(Error::Transport(TransportError::TransportParameterError));
        }

        Ok(())
    }

    /// Serialize as the value of the quic_transport_parameters extension.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        fn put_cid(buf: &mut BytesMut, id: TransportParameterId, cid: &Option<ConnectionId>) -> Result<()> {
            if let Some(cid) = cid {
                VarIntCodec::put(id, buf)?;
                VarIntCodec::put_prefixed(cid.as_bytes(), buf)?;
            }
            Ok(())
        }

        fn put_int(buf: &mut BytesMut, id: TransportParameterId, value: VarInt) -> Result<()> {
            VarIntCodec::put(id, buf)?;
            VarIntCodec::put(VarIntCodec::size(value) as u64, buf)?;
            VarIntCodec::put(value, buf)
        }

        put_cid(buf, TP_ORIGINAL_DESTINATION_CONNECTION_ID, &self.original_destination_connection_id)?;
        if let Some(timeout) = self.max_idle_timeout {
            put_int(buf, TP_MAX_IDLE_TIMEOUT, timeout)?;
        }
        if let Some(token) = &self.stateless_reset_token {
            VarIntCodec::put(TP_STATELESS_RESET_TOKEN, buf)?;
            VarIntCodec::put_prefixed(token, buf)?;
        }
        if let Some(size) = self.max_udp_payload_size {
            put_int(buf, TP_MAX_UDP_PAYLOAD_SIZE, size)?;
        }

        for (id, value) in [
            (TP_INITIAL_MAX_DATA, self.initial_max_data),
            (TP_INITIAL_MAX_STREAM_DATA_BIDI_LOCAL, self.initial_max_stream_data_bidi_local),
            (TP_INITIAL_MAX_STREAM_DATA_BIDI_REMOTE, self.initial_max_stream_data_bidi_remote),
            (TP_INITIAL_MAX_STREAM_DATA_UNI, self.initial_max_stream_data_uni),
            (TP_INITIAL_MAX_STREAMS_BIDI, self.initial_max_streams_bidi),
            (TP_INITIAL_MAX_STREAMS_UNI, self.initial_max_streams_uni),
        ] {
            if value != 0 {
                put_int(buf, id, value)?;
            }
        }

        if let Some(exp) = self.ack_delay_exponent {
            put_int(buf, TP_ACK_DELAY_EXPONENT, exp)?;
        }
        if let Some(delay) = self.max_ack_delay {
            put_int(buf, TP_MAX_ACK_DELAY, delay)?;
        }
        if self.disable_active_migration {
            VarIntCodec::put(TP_DISABLE_ACTIVE_MIGRATION, buf)?;
            VarIntCodec::put(0, buf)?;
        }
        if let Some(limit) = self.active_connection_id_limit {
            put_int(buf, TP_ACTIVE_CONNECTION_ID_LIMIT, limit)?;
        }
        put_cid(buf, TP_INITIAL_SOURCE_CONNECTION_ID, &self.initial_source_connection_id)?;
        put_cid(buf, TP_RETRY_SOURCE_CONNECTION_ID, &self.retry_source_connection_id)?;

        for (id, value) in &self.unknown_parameters {
            VarIntCodec::put(*id, buf)?;
            VarIntCodec::put_prefixed(value, buf)?;
        }
        Ok(())
    }

    /// Parse the peer's quic_transport_parameters extension.
    ///
    /// Any malformed or repeated parameter is a TRANSPORT_PARAMETER_ERROR.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        Self::decode_inner(Bytes::copy_from_slice(buf))
            .map_err(|_| Error::Transport(TransportError::TransportParameterError))
    }

    fn decode_inner(mut buf: Bytes) -> Result<Self> {
        let mut params = Self::empty();
        let mut seen = HashSet::new();

        while buf.has_remaining() {
            let id = VarIntCodec::get(&mut buf)?;
            let value = VarIntCodec::get_prefixed(&mut buf)?;
            if !seen.insert(id) {
                return Err(Error::Transport(TransportError::TransportParameterError));
            }

            match id {
                TP_ORIGINAL_DESTINATION_CONNECTION_ID => {
                    params.original_destination_connection_id = Some(ConnectionId::try_new(value)?)
                }
                TP_INITIAL_SOURCE_CONNECTION_ID => {
                    params.initial_source_connection_id = Some(ConnectionId::try_new(value)?)
                }
                TP_RETRY_SOURCE_CONNECTION_ID => {
                    params.retry_source_connection_id = Some(ConnectionId::try_new(value)?)
                }
                TP_STATELESS_RESET_TOKEN => {
                    let token: StatelessResetToken = value[..]
                        .try_into()
                        .map_err(|_| Error::MalformedPacket("stateless reset token length"))?;
                    params.stateless_reset_token = Some(token);
                }
                TP_DISABLE_ACTIVE_MIGRATION => {
                    if !value.is_empty() {
                        return Err(Error::MalformedPacket("disable_active_migration has a value"));
                    }
                    params.disable_active_migration = true;
                }
                TP_MAX_IDLE_TIMEOUT => params.max_idle_timeout = Some(int_value(value)?),
                TP_MAX_UDP_PAYLOAD_SIZE => params.max_udp_payload_size = Some(int_value(value)?),
                TP_INITIAL_MAX_DATA => params.initial_max_data = int_value(value)?,
                TP_INITIAL_MAX_STREAM_DATA_BIDI_LOCAL => {
                    params.initial_max_stream_data_bidi_local = int_value(value)?
                }
                TP_INITIAL_MAX_STREAM_DATA_BIDI_REMOTE => {
                    params.initial_max_stream_data_bidi_remote = int_value(value)?
                }
                TP_INITIAL_MAX_STREAM_DATA_UNI => params.initial_max_stream_data_uni = int_value(value)?,
                TP_INITIAL_MAX_STREAMS_BIDI => params.initial_max_streams_bidi = int_value(value)?,
                TP_INITIAL_MAX_STREAMS_UNI => params.initial_max_streams_uni = int_value(value)?,
                TP_ACK_DELAY_EXPONENT => params.ack_delay_exponent = Some(int_value(value)?),
                TP_MAX_ACK_DELAY => params.max_ack_delay = Some(int_value(value)?),
                TP_ACTIVE_CONNECTION_ID_LIMIT => {
                    params.active_connection_id_limit = Some(int_value(value)?)
                }
                _ => params.unknown_parameters.push((id, value)),
            }
        }
        Ok(params)
    }
}

/// An integer parameter value is exactly one varint.
fn int_value(value: Bytes) -> Result<VarInt> {
    let (v, used) = VarIntCodec::decode(&value)?;
    if used != value.len() {
        return Err(Error::MalformedPacket("trailing bytes in integer parameter"));
    }
    Ok(v)
}

/// Transport Parameters Builder
///
/// Fluent interface for constructing transport parameters.
pub struct TransportParametersBuilder {
    params: TransportParameters,
}

impl TransportParametersBuilder {
    /// Start from empty parameters (every value absent or zero).
    pub fn new() -> Self {
        Self {
            params: TransportParameters::empty(),
        }
    }

    pub fn original_destination_connection_id(mut self, cid: ConnectionId) -> Self {
        self.params.original_destination_connection_id = Some(cid);
        self
    }

    pub fn initial_source_connection_id(mut self, cid: ConnectionId) -> Self {
        self.params.initial_source_connection_id = Some(cid);
        self
    }

    pub fn retry_source_connection_id(mut self, cid: ConnectionId) -> Self {
        self.params.retry_source_connection_id = Some(cid);
        self
    }

    pub fn initial_max_data(mut self, max_data: VarInt) -> Self {
        self.params.initial_max_data = max_data;
        self
    }

    pub fn initial_max_streams_bidi(mut self, max_streams: VarInt) -> Self {
        self.params.initial_max_streams_bidi = max_streams;
        self
    }

    pub fn initial_max_streams_uni(mut self, max_streams: VarInt) -> Self {
        self.params.initial_max_streams_uni = max_streams;
        self
    }

    pub fn max_udp_payload_size(mut self, size: VarInt) -> Self {
        self.params.max_udp_payload_size = Some(size);
        self
    }

    pub fn ack_delay_exponent(mut self, exponent: VarInt) -> Self {
        self.params.ack_delay_exponent = Some(exponent);
        self
    }

    /// Build without range checks, for constructing invalid peers in tests
    /// and tools.
    pub fn build_unchecked(self) -> TransportParameters {
        self.params
    }

    pub fn build(self) -> Result<TransportParameters> {
        self.params.validate()?;
        Ok(self.params)
    }
}

impl Default for TransportParametersBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(bytes: &[u8]) -> ConnectionId {
        ConnectionId::from_slice(bytes).unwrap()
    }

    mod codec_tests {
        use super::*;

        #[test]
        fn test_full_parameter_set_round_trip() {
            let mut params = TransportParameters::default_client();
            params.original_destination_connection_id = Some(cid(&[1, 2, 3, 4]));
            params.initial_source_connection_id = Some(cid(&[5, 6]));
            params.retry_source_connection_id = Some(cid(&[0x0b; 4]));
            params.stateless_reset_token = Some([0xee; 16]);
            params.ack_delay_exponent = Some(8);
            params.max_ack_delay = Some(40);
            params.disable_active_migration = true;
            params.unknown_parameters.push((0x2ab2, Bytes::from_static(b"grease")));

            let mut buf = BytesMut::new();
            params.encode(&mut buf).unwrap();
            assert_eq!(TransportParameters::decode(&buf).unwrap(), params);
        }

        #[test]
        fn test_empty_extension() {
            let params = TransportParameters::decode(&[]).unwrap();
            assert_eq!(params, TransportParameters::empty());
            assert_eq!(params.max_udp_payload_size(), 65527);
            assert_eq!(params.ack_delay_exponent(), 3);
            assert_eq!(params.active_connection_id_limit(), 2);
        }

        #[test]
        fn test_integer_value_layout() {
            // initial_max_streams_bidi = 100: id 0x08, length 2, value 0x40 0x64
            let params = TransportParameters::decode(&[0x08, 0x02, 0x40, 0x64]).unwrap();
            assert_eq!(params.initial_max_streams_bidi, 100);
        }

        #[test]
        fn test_duplicate_parameter_rejected() {
            let raw = [0x04, 0x01, 0x10, 0x04, 0x01, 0x20];
            assert!(TransportParameters::decode(&raw)
                .unwrap_err()
                .is_transport_parameter_error());
        }

        #[test]
        fn test_truncated_value_rejected() {
            assert!(TransportParameters::decode(&[0x00, 0x08, 0x01, 0x02])
                .unwrap_err()
                .is_transport_parameter_error());
        }

        #[test]
        fn test_integer_with_trailing_bytes_rejected() {
            assert!(TransportParameters::decode(&[0x04, 0x02, 0x10, 0x00]).is_err());
        }

        #[test]
        fn test_bad_reset_token_length() {
            assert!(TransportParameters::decode(&[0x02, 0x02, 0x00, 0x00]).is_err());
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_defaults_are_valid() {
            assert!(TransportParameters::default_client().validate().is_ok());
            assert!(TransportParameters::empty().validate().is_ok());
        }

        #[test]
        fn test_small_udp_payload_rejected() {
            let result = TransportParametersBuilder::new()
                .max_udp_payload_size(1199)
                .build();
            assert!(result.unwrap_err().is_transport_parameter_error());
        }

        #[test]
        fn test_ack_delay_exponent_limit() {
            assert!(TransportParametersBuilder::new()
                .ack_delay_exponent(21)
                .build()
                .is_err());
            assert!(TransportParametersBuilder::new()
                .ack_delay_exponent(20)
                .build()
                .is_ok());
        }

        #[test]
        fn test_too_many_streams_rejected() {
            let params = TransportParametersBuilder::new()
                .initial_max_streams_uni((1 << 60) + 1)
                .build_unchecked();
            assert!(params.validate().is_err());
        }
    }
}
