//! Transport parameter negotiation.

pub mod parameters;

pub use parameters::{TransportParameters, TransportParametersBuilder};
