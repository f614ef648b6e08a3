//! # Congestion Budget (RFC 9002 Section 7)
//!
//! The transport core never runs a congestion algorithm itself. Before
//! building each packet it asks the controller how many bytes it may put
//! on the wire, and reports every packet it hands out.

pub mod traits;

pub use traits::{CongestionController, FixedWindow};
