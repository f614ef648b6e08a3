//! # QUIC Frame Parsing and Types (RFC 9000 Section 12.4, 19)

pub mod parse;
pub mod types;

pub use parse::FrameIterator;
pub use types::*;
