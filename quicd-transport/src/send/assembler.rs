//! Packs queued frames into the room one packet has left.

#![forbid(unsafe_code)]

use super::queue::SendRequestQueue;
use crate::frames::Frame;
use crate::recovery::CongestionController;
use tracing::warn;

/// Chooses the payload budget for a packet and fills it from a queue.
#[derive(Debug, Clone, Copy)]
pub struct PacketAssembler {
    max_packet_size: usize,
}

impl PacketAssembler {
    pub fn new(max_packet_size: usize) -> Self {
        Self { max_packet_size }
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    /// Bytes available for frames in the next packet.
    ///
    /// The congestion budget is read fresh on every call since it changes
    /// from one packet to the next. `overhead` covers the header and AEAD tag.
    pub fn payload_budget(&self, overhead: usize, congestion: &dyn CongestionController) -> usize {
        let available = usize::try_from(congestion.bytes_available()).unwrap_or(usize::MAX);
        self.max_packet_size
            .min(available)
            .saturating_sub(overhead)
    }

    /// Take frames from `queue` until nothing else fits.
    ///
    /// A request whose producer overruns its budget is dropped with a
    /// warning and assembly continues with the remaining room.
    pub fn assemble(
        &self,
        queue: &SendRequestQueue,
        overhead: usize,
        congestion: &dyn CongestionController,
    ) -> Vec<Frame> {
        let mut remaining = self.payload_budget(overhead, congestion);
        let mut frames = Vec::new();

        while let Some(request) = queue.next(remaining) {
            match request.produce(remaining) {
                Ok(frame) => {
                    remaining -= frame.encoded_len();
                    frames.push(frame);
                }
                Err(err) => warn!(error = %err, remaining, "dropping oversized frame"),
            }
        }
        frames
    }
}
