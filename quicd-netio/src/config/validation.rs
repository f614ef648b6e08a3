//! Configuration validation utilities.

use super::{EndpointConfig, TransportSettings};
use crate::netio::NetIoConfig;
use quicd_transport::types::MIN_INITIAL_PACKET_SIZE;

/// Largest UDP payload over IPv4 or IPv6 (RFC 9000 Section 18.2).
const MAX_UDP_PAYLOAD: usize = 65527;

/// Configuration validator trait.
pub trait ConfigValidator {
    /// Validate the configuration.
    ///
    /// Returns `Ok(())` if valid, or a list of error messages if invalid.
    fn validate(&self) -> Result<(), Vec<String>>;
}

impl ConfigValidator for NetIoConfig {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.bind_addresses.is_empty() {
            errors.push("netio.bind_addresses must not be empty".to_string());
        }
        if self.poll_interval_ms == 0 {
            errors.push("netio.poll_interval_ms must be > 0".to_string());
        }
        if !(MIN_INITIAL_PACKET_SIZE..=MAX_UDP_PAYLOAD).contains(&self.max_datagram_size) {
            errors.push(format!(
                "netio.max_datagram_size ({}) must be between {} and {}",
                self.max_datagram_size, MIN_INITIAL_PACKET_SIZE, MAX_UDP_PAYLOAD
            ));
        }
        for size in [self.socket_recv_buffer_size, self.socket_send_buffer_size]
            .into_iter()
            .flatten()
        {
            if size == 0 {
                errors.push("netio socket buffer sizes must be > 0".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl ConfigValidator for TransportSettings {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.version == 0 {
            errors.push("transport.version 0 is reserved for version negotiation".to_string());
        }
        if self.min_initial_size < MIN_INITIAL_PACKET_SIZE {
            errors.push(format!(
                "transport.min_initial_size ({}) must be at least {}",
                self.min_initial_size, MIN_INITIAL_PACKET_SIZE
            ));
        }
        if !(MIN_INITIAL_PACKET_SIZE..=MAX_UDP_PAYLOAD).contains(&self.max_packet_size) {
            errors.push(format!(
                "transport.max_packet_size ({}) must be between {} and {}",
                self.max_packet_size, MIN_INITIAL_PACKET_SIZE, MAX_UDP_PAYLOAD
            ));
        }
        if self.connection_id_length > 20 {
            errors.push(format!(
                "transport.connection_id_length ({}) must be at most 20",
                self.connection_id_length
            ));
        }
        if self.initial_max_streams_bidi > 1 << 60 || self.initial_max_streams_uni > 1 << 60 {
            errors.push("transport stream limits must not exceed 2^60".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Log combinations that are legal but likely unintended.
pub fn validate_resource_limits(config: &EndpointConfig) {
    let mut warnings = Vec::new();

    if let Some(size) = config.netio.socket_recv_buffer_size {
        if size < config.netio.max_datagram_size * 16 {
            warnings.push(format!(
                "socket_recv_buffer_size ({}) holds fewer than 16 datagrams of {} bytes",
                size, config.netio.max_datagram_size
            ));
        }
    }

    if config.netio.poll_interval_ms > 5_000 {
        warnings.push(format!(
            "poll_interval_ms ({}) delays shutdown by up to that long",
            config.netio.poll_interval_ms
        ));
    }

    for warning in &warnings {
        tracing::warn!("{}", warning);
    }
}
