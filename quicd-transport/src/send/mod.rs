//! Outbound frame scheduling.

pub mod assembler;
pub mod queue;

pub use assembler::PacketAssembler;
pub use queue::{SendRequest, SendRequestQueue};
