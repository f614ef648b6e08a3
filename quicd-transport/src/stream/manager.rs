//! # Stream ID Allocation (RFC 9000 Section 2.1, 4.6)
//!
//! Each of the four stream classes (initiator x direction) numbers its
//! streams from the class base upward in steps of 4, so the two low bits
//! of every id stay equal to the class bits.

#![forbid(unsafe_code)]

use crate::error::{Error, Result, TransportError};
use crate::types::{Side, StreamDirection, StreamId, StreamInitiator, MAX_STREAM_ID};

/// Hands out locally initiated stream ids and enforces the peer's limits.
#[derive(Debug, Clone)]
pub struct StreamIdAllocator {
    /// Local side (Client or Server)
    side: Side,

    /// Next id per class, indexed by the two class bits
    next: [u64; 4],

    /// Peer's bidirectional stream limit, unknown until its parameters arrive
    max_streams_bidi: Option<u64>,

    /// Peer's unidirectional stream limit
    max_streams_uni: Option<u64>,
}

impl StreamIdAllocator {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            next: [0, 1, 2, 3],
            max_streams_bidi: None,
            max_streams_uni: None,
        }
    }

    /// Allocate the next locally initiated stream id of `direction`.
    ///
    /// Fails with STREAM_LIMIT_ERROR once the peer's declared limit for the
    /// class is used up. Before the peer declared limits, ids are not capped.
    pub fn allocate(&mut self, direction: StreamDirection) -> Result<StreamId> {
        let base = StreamId::base(StreamInitiator::from(self.side), direction);
        let slot = &mut self.next[base.value() as usize];
        let id = StreamId(*slot);

        let limit = match direction {
            StreamDirection::Bidirectional => self.max_streams_bidi,
            StreamDirection::Unidirectional => self.max_streams_uni,
        };
        if let Some(limit) = limit {
            if id.sequence() >= limit {
                return Err(Error::Transport(TransportError::StreamLimitError));
            }
        }
        if id.value() > MAX_STREAM_ID {
            return Err(Error::Transport(TransportError::StreamLimitError));
        }

        *slot += 4;
        Ok(id)
    }

    /// Number of streams of `direction` opened locally so far.
    pub fn opened(&self, direction: StreamDirection) -> u64 {
        let base = StreamId::base(StreamInitiator::from(self.side), direction);
        StreamId(self.next[base.value() as usize]).sequence()
    }

    /// Apply the initial limits from the peer's transport parameters.
    ///
    /// A MAX_STREAMS frame seen earlier is never lowered.
    pub fn set_peer_limits(&mut self, max_streams_bidi: u64, max_streams_uni: u64) {
        self.update_peer_max_streams(StreamDirection::Bidirectional, max_streams_bidi);
        self.update_peer_max_streams(StreamDirection::Unidirectional, max_streams_uni);
    }

    /// Apply a MAX_STREAMS frame. Limits only ever grow (RFC 9000 Section 19.11).
    pub fn update_peer_max_streams(&mut self, direction: StreamDirection, max_streams: u64) {
        let limit = match direction {
            StreamDirection::Bidirectional => &mut self.max_streams_bidi,
            StreamDirection::Unidirectional => &mut self.max_streams_uni,
        };
        *limit = Some(limit.map_or(max_streams, |current| current.max(max_streams)));
    }
}
