//! # Congestion Controller Interface (RFC 9002)
//!
//! Algorithms (NewReno, CUBIC, BBR) live outside this crate and plug in
//! through [`CongestionController`].

#![forbid(unsafe_code)]

/// Congestion Window (bytes)
pub type CongestionWindow = u64;

/// Bytes sent but not yet acknowledged or declared lost
pub type BytesInFlight = u64;

/// Queryable send budget of a congestion controller.
pub trait CongestionController {
    /// Current congestion window in bytes.
    fn congestion_window(&self) -> CongestionWindow;

    /// Bytes currently in flight.
    fn bytes_in_flight(&self) -> BytesInFlight;

    /// Bytes that may be sent right now. Can change between packets.
    fn bytes_available(&self) -> u64 {
        self.congestion_window()
            .saturating_sub(self.bytes_in_flight())
    }

    /// Called for every packet handed to the network.
    fn on_packet_sent(&mut self, size: usize);

    /// Called when a sent packet leaves the network (acknowledged or lost).
    fn on_packet_released(&mut self, size: usize);
}

/// Window that never grows or shrinks.
///
/// Useful where no real algorithm is wired in yet, and in tests.
#[derive(Debug, Clone)]
pub struct FixedWindow {
    window: CongestionWindow,
    in_flight: BytesInFlight,
}

impl FixedWindow {
    pub fn new(window: CongestionWindow) -> Self {
        Self {
            window,
            in_flight: 0,
        }
    }
}

impl CongestionController for FixedWindow {
    fn congestion_window(&self) -> CongestionWindow {
        self.window
    }

    fn bytes_in_flight(&self) -> BytesInFlight {
        self.in_flight
    }

    fn on_packet_sent(&mut self, size: usize) {
        self.in_flight = self.in_flight.saturating_add(size as u64);
    }

    fn on_packet_released(&mut self, size: usize) {
        self.in_flight = self.in_flight.saturating_sub(size as u64);
    }
}
