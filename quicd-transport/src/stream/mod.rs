//! # Stream Identifiers (RFC 9000 Section 2.1)

pub mod manager;

pub use manager::StreamIdAllocator;

pub use crate::types::StreamId;
