//! Endpoint configuration.
//!
//! # Example
//!
//! ```toml
//! [netio]
//! bind_addresses = ["0.0.0.0:0"]
//! poll_interval_ms = 100
//!
//! [transport]
//! min_initial_size = 1200
//! max_packet_size = 1200
//! initial_max_streams_bidi = 100
//!
//! [logging]
//! level = "debug"
//! ```

pub mod loader;
pub mod validation;


pub use loader::{load_config, load_config_with_prefix};
pub use validation::ConfigValidator;

use crate::netio::NetIoConfig;
use crate::telemetry::LoggingConfig;
use quicd_transport::transport::{TransportParameters, TransportParametersBuilder};
use quicd_transport::types::{
    DEFAULT_IDLE_TIMEOUT, DEFAULT_INITIAL_MAX_DATA, DEFAULT_INITIAL_MAX_STREAM_DATA,
    DEFAULT_MAX_STREAMS_BIDI, DEFAULT_MAX_STREAMS_UNI, DEFAULT_MAX_UDP_PAYLOAD_SIZE,
    MIN_INITIAL_PACKET_SIZE, QUIC_VERSION_1,
};
use quicd_transport::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration composing all subsystems.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub netio: NetIoConfig,
    pub transport: TransportSettings,
    pub logging: LoggingConfig,
}

/// Connection-level settings, converted into the transport's
/// [`ConnectionConfig`] for every new connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Version written into long headers.
    pub version: u32,

    /// Client Initial packets are padded to at least this many bytes.
    pub min_initial_size: usize,

    /// Largest packet this endpoint sends.
    pub max_packet_size: usize,

    /// Idle timeout in milliseconds.
    pub idle_timeout_ms: u64,

    /// Length of the connection ids this endpoint issues.
    pub connection_id_length: usize,

    pub initial_max_data: u64,
    pub initial_max_stream_data: u64,
    pub initial_max_streams_bidi: u64,
    pub initial_max_streams_uni: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            version: QUIC_VERSION_1,
            min_initial_size: MIN_INITIAL_PACKET_SIZE,
            max_packet_size: DEFAULT_MAX_UDP_PAYLOAD_SIZE,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT.as_millis() as u64,
            connection_id_length: 8,
            initial_max_data: DEFAULT_INITIAL_MAX_DATA,
            initial_max_stream_data: DEFAULT_INITIAL_MAX_STREAM_DATA,
            initial_max_streams_bidi: DEFAULT_MAX_STREAMS_BIDI,
            initial_max_streams_uni: DEFAULT_MAX_STREAMS_UNI,
        }
    }
}

impl TransportSettings {
    /// Parameters advertised to the peer.
    pub fn local_transport_parameters(&self) -> TransportParameters {
        let mut params = TransportParametersBuilder::new()
            .initial_max_data(self.initial_max_data)
            .initial_max_streams_bidi(self.initial_max_streams_bidi)
            .initial_max_streams_uni(self.initial_max_streams_uni)
            .max_udp_payload_size(self.max_packet_size as u64)
            .build_unchecked();
        params.max_idle_timeout = Some(self.idle_timeout_ms);
        params.initial_max_stream_data_bidi_local = self.initial_max_stream_data;
        params.initial_max_stream_data_bidi_remote = self.initial_max_stream_data;
        params.initial_max_stream_data_uni = self.initial_max_stream_data;
        params
    }

    pub fn to_connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            version: self.version,
            local_params: self.local_transport_parameters(),
            min_initial_size: self.min_initial_size,
            max_packet_size: self.max_packet_size,
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
        }
    }
}

impl EndpointConfig {
    /// Validate the entire configuration.
    ///
    /// Returns every problem found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.netio.validate() {
            errors.extend(e);
        }
        if let Err(e) = self.transport.validate() {
            errors.extend(e);
        }

        if self.transport.max_packet_size > self.netio.max_datagram_size {
            errors.push(format!(
                "transport.max_packet_size ({}) exceeds netio.max_datagram_size ({})",
                self.transport.max_packet_size, self.netio.max_datagram_size
            ));
        }

        validation::validate_resource_limits(self);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
