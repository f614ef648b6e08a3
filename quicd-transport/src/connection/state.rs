//! # Connection State Machine (RFC 9000 Section 5, 8.1, 17.2.5)
//!
//! Pure state machine - accepts packets, transport parameters and time,
//! produces packets and events. Packet protection and I/O are the caller's.
//!
//! The client starts in [`ConnectionState::Initial`] with a first flight
//! built by [`Connection::connect`]. A Retry whose original destination
//! connection id matches that first flight moves it to
//! [`ConnectionState::RetryReceived`] exactly once; the server's transport
//! parameters are then checked against what the Retry told us.

#![forbid(unsafe_code)]

use crate::error::{Error, Result, TransportError};
use crate::frames::{AckFrame, CryptoFrame, Frame, StreamFrame};
use crate::packet::{
    number, InitialPacket, LongHeader, LongPacket, Packet, RetryPacket, ShortPacket, Version,
};
use crate::recovery::CongestionController;
use crate::send::{PacketAssembler, SendRequestQueue};
use crate::stream::StreamIdAllocator;
use crate::transport::TransportParameters;
use crate::types::{
    ConnectionId, PacketNumber, PacketNumberSpace, Side, StreamDirection, StreamId, StreamOffset,
    Token, AEAD_EXPANSION, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_UDP_PAYLOAD_SIZE,
    MIN_INITIAL_PACKET_SIZE, QUIC_VERSION_1,
};
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

// ============================================================================
// States and Events
// ============================================================================

/// Connection State (RFC 9000 Section 5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// First flight sent, waiting for the server
    Initial,

    /// A Retry was accepted and the Initial resent with its token
    RetryReceived,

    /// Handshake confirmed (HANDSHAKE_DONE received)
    Established,

    /// Terminal
    Closed,
}

/// Whether this connection went through address validation by Retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    NotReceived,
    Accepted,
}

/// Why a connection reached [`ConnectionState::Closed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// This endpoint detected a fatal error
    Local(TransportError),

    /// The peer sent CONNECTION_CLOSE
    Peer {
        error_code: u64,
        reason: Bytes,
        application: bool,
    },

    /// Nothing was received for the idle timeout
    IdleTimeout,
}

/// Connection Event (Application Notifications)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// CRYPTO data for the TLS layer
    CryptoData {
        space: PacketNumberSpace,
        offset: u64,
        data: Bytes,
    },

    /// Token from NEW_TOKEN, for a future connection to the same server
    NewToken(Token),

    /// Stream data from the peer
    StreamData {
        stream_id: StreamId,
        offset: StreamOffset,
        data: Bytes,
        fin: bool,
    },

    /// Handshake confirmed
    Established,

    /// Connection closed
    Closed(CloseReason),
}

/// Connection Configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Version written into long headers
    pub version: Version,

    /// Local transport parameters
    pub local_params: TransportParameters,

    /// Client Initial packets are padded to at least this size
    pub min_initial_size: usize,

    /// Maximum packet size to send
    pub max_packet_size: usize,

    /// Idle timeout
    pub idle_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            version: QUIC_VERSION_1,
            local_params: TransportParameters::default(),
            min_initial_size: MIN_INITIAL_PACKET_SIZE,
            max_packet_size: DEFAULT_MAX_UDP_PAYLOAD_SIZE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Client side of a QUIC connection up to handshake confirmation, plus
/// the frame plumbing of an established connection.
pub struct Connection {
    /// Connection side (Client or Server)
    side: Side,

    state: ConnectionState,
    retry_state: RetryState,

    config: ConnectionConfig,

    /// Source Connection ID
    scid: ConnectionId,

    /// Destination Connection ID; replaced by a Retry or the server's first packet
    dcid: ConnectionId,

    /// DCID of the very first Initial
    original_dcid: ConnectionId,

    /// SCID of the accepted Retry
    retry_source_cid: Option<ConnectionId>,

    /// Token carried by every Initial after a Retry
    token: Option<Token>,

    /// Latest NEW_TOKEN, kept for the next connection
    new_token: Option<Token>,

    /// CRYPTO payload of the first flight, resent after a Retry
    initial_crypto: Option<Bytes>,

    /// Set once any Initial or Handshake packet arrives from the server
    peer_responded: bool,

    /// Next packet number to send, per space
    next_packet_number: [PacketNumber; 4],

    /// Largest packet number received, per space
    largest_received: [Option<PacketNumber>; 4],

    /// Largest ack-eliciting packet not yet acknowledged, per space
    pending_acks: [Option<PacketNumber>; 4],

    /// Ready-made Initial packets waiting for the congestion budget
    pending_initials: VecDeque<InitialPacket>,

    /// Application frames, sent in OneRtt packets only
    send_queue: Arc<SendRequestQueue>,
    /// CRYPTO frames for the Handshake space
    handshake_queue: SendRequestQueue,
    handshake_crypto_offset: StreamOffset,
    assembler: PacketAssembler,
    streams: StreamIdAllocator,
    stream_offsets: HashMap<StreamId, StreamOffset>,

    peer_params: Option<TransportParameters>,
    error: Option<TransportError>,
    events: VecDeque<ConnectionEvent>,
    last_activity: Option<Instant>,
}

impl Connection {
    /// Create the client end of a connection.
    ///
    /// `dcid` is the randomly chosen destination id of the first Initial and
    /// becomes the original destination connection id.
    pub fn new_client(config: ConnectionConfig, dcid: ConnectionId, scid: ConnectionId) -> Self {
        let assembler = PacketAssembler::new(config.max_packet_size);
        Self {
            side: Side::Client,
            state: ConnectionState::Initial,
            retry_state: RetryState::NotReceived,
            config,
            scid,
            original_dcid: dcid.clone(),
            dcid,
            retry_source_cid: None,
            token: None,
            new_token: None,
            initial_crypto: None,
            peer_responded: false,
            next_packet_number: [0; 4],
            largest_received: [None; 4],
            pending_acks: [None; 4],
            pending_initials: VecDeque::new(),
            send_queue: Arc::new(SendRequestQueue::new()),
            handshake_queue: SendRequestQueue::new(),
            handshake_crypto_offset: 0,
            assembler,
            streams: StreamIdAllocator::new(Side::Client),
            stream_offsets: HashMap::new(),
            peer_params: None,
            error: None,
            events: VecDeque::new(),
            last_activity: None,
        }
    }

    /// Queue the first Initial carrying `crypto_data` (the TLS ClientHello).
    pub fn connect(&mut self, crypto_data: Bytes) -> Result<()> {
        self.ensure_open()?;
        if self.initial_crypto.is_some() {
            return Err(Error::Transport(TransportError::InternalError));
        }
        self.initial_crypto = Some(crypto_data);
        self.queue_initial();
        info!(dcid = %self.dcid, scid = %self.scid, "connecting");
        Ok(())
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retry_state(&self) -> RetryState {
        self.retry_state
    }

    pub fn source_cid(&self) -> &ConnectionId {
        &self.scid
    }

    pub fn destination_cid(&self) -> &ConnectionId {
        &self.dcid
    }

    pub fn original_destination_cid(&self) -> &ConnectionId {
        &self.original_dcid
    }

    /// Token sent in Initial packets, set by an accepted Retry.
    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    /// Most recent NEW_TOKEN received.
    pub fn new_token(&self) -> Option<&Token> {
        self.new_token.as_ref()
    }

    /// Fatal error that closed the connection, if any.
    pub fn error(&self) -> Option<TransportError> {
        self.error
    }

    /// Parameters this endpoint advertises.
    pub fn local_params(&self) -> &TransportParameters {
        &self.config.local_params
    }

    pub fn peer_params(&self) -> Option<&TransportParameters> {
        self.peer_params.as_ref()
    }

    /// Queue shared with producers on other threads.
    pub fn send_queue(&self) -> Arc<SendRequestQueue> {
        Arc::clone(&self.send_queue)
    }

    pub fn next_packet_number(&self, space: PacketNumberSpace) -> PacketNumber {
        self.next_packet_number[space.index()]
    }

    pub fn largest_received(&self, space: PacketNumberSpace) -> Option<PacketNumber> {
        self.largest_received[space.index()]
    }

    /// Deadline after which [`Connection::handle_timeout`] closes the connection.
    pub fn idle_deadline(&self) -> Option<Instant> {
        self.last_activity.map(|at| at + self.config.idle_timeout)
    }

    // ------------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------------

    /// Process one packet already parsed and unprotected.
    pub fn process_packet(&mut self, packet: Packet, now: Instant) -> Result<()> {
        self.ensure_open()?;
        self.last_activity = Some(now);

        let (space, truncated, pn_len) = match (&packet, packet.space()) {
            (Packet::Retry(retry), _) => {
                self.on_retry(retry);
                return Ok(());
            }
            (_, Some(space)) => (
                space,
                packet.packet_number().unwrap_or_default(),
                packet.packet_number_len().unwrap_or(4),
            ),
            (_, None) => return Ok(()),
        };

        let expected = self.largest_received[space.index()].map_or(0, |pn| pn + 1);
        let packet_number = number::decode(truncated, pn_len * 8, expected)?;
        trace!(?space, packet_number, "packet received");

        if matches!(packet, Packet::Initial(_) | Packet::Handshake(_)) {
            self.on_server_packet(&packet);
        }

        let largest = &mut self.largest_received[space.index()];
        *largest = Some(largest.map_or(packet_number, |pn| pn.max(packet_number)));
        if packet.is_ack_eliciting() {
            let pending = &mut self.pending_acks[space.index()];
            *pending = Some(pending.map_or(packet_number, |pn| pn.max(packet_number)));
        }

        let frames = match packet {
            Packet::Initial(p) => p.frames,
            Packet::Handshake(p) | Packet::ZeroRtt(p) => p.frames,
            Packet::OneRtt(p) => p.frames,
            Packet::Retry(_) => Vec::new(),
        };
        for frame in frames {
            if let Err(err) = self.on_frame(space, frame) {
                if let Some(code) = err.transport_code() {
                    self.fail(code);
                }
                return Err(err);
            }
            if self.state == ConnectionState::Closed {
                break;
            }
        }
        Ok(())
    }

    /// Check and apply the server's transport parameters (RFC 9000 Section 7.3).
    ///
    /// Any violation closes the connection with TRANSPORT_PARAMETER_ERROR.
    pub fn on_transport_parameters(&mut self, params: TransportParameters) -> Result<()> {
        self.ensure_open()?;
        if let Err(err) = self.check_peer_params(&params) {
            warn!(error = %err, "rejecting peer transport parameters");
            self.fail(TransportError::TransportParameterError);
            return Err(Error::Transport(TransportError::TransportParameterError));
        }

        self.streams
            .set_peer_limits(params.initial_max_streams_bidi, params.initial_max_streams_uni);
        let peer_max = usize::try_from(params.max_udp_payload_size()).unwrap_or(usize::MAX);
        self.assembler = PacketAssembler::new(self.config.max_packet_size.min(peer_max));
        debug!(
            max_streams_bidi = params.initial_max_streams_bidi,
            max_streams_uni = params.initial_max_streams_uni,
            "peer transport parameters accepted"
        );
        self.peer_params = Some(params);
        Ok(())
    }

    /// Decode the server's encoded transport parameters and apply them.
    pub fn on_transport_parameter_bytes(&mut self, encoded: &[u8]) -> Result<()> {
        self.ensure_open()?;
        match TransportParameters::decode(encoded) {
            Ok(params) => self.on_transport_parameters(params),
            Err(err) => {
                warn!(error = %err, "undecodable peer transport parameters");
                self.fail(TransportError::TransportParameterError);
                Err(Error::Transport(TransportError::TransportParameterError))
            }
        }
    }

    /// Close the connection if it has been idle past the deadline.
    pub fn handle_timeout(&mut self, now: Instant) {
        if self.state == ConnectionState::Closed {
            return;
        }
        if self.idle_deadline().is_some_and(|deadline| now >= deadline) {
            info!("idle timeout");
            self.close(CloseReason::IdleTimeout);
        }
    }

    // ------------------------------------------------------------------------
    // Streams
    // ------------------------------------------------------------------------

    /// Open a locally initiated stream.
    pub fn open_stream(&mut self, direction: StreamDirection) -> Result<StreamId> {
        self.ensure_open()?;
        let id = self.streams.allocate(direction)?;
        self.stream_offsets.insert(id, 0);
        debug!(stream_id = %id, "stream opened");
        Ok(id)
    }

    /// Queue `data` on an open stream, split into frames that fit a packet.
    pub fn send_stream(&mut self, stream_id: StreamId, data: Bytes, fin: bool) -> Result<()> {
        self.ensure_open()?;
        let chunk = self.frame_data_len();
        let offset = self
            .stream_offsets
            .get_mut(&stream_id)
            .ok_or(Error::Transport(TransportError::StreamStateError))?;

        let mut remaining = data;
        loop {
            let piece = remaining.split_to(remaining.len().min(chunk));
            let last = remaining.is_empty();
            let frame = StreamFrame {
                stream_id,
                offset: *offset,
                data: piece,
                fin: fin && last,
            };
            *offset += frame.data.len() as u64;
            self.send_queue.add_frame(Frame::Stream(frame));
            if last {
                break;
            }
        }
        Ok(())
    }

    /// Queue handshake CRYPTO data (the client Finished) for Handshake packets.
    pub fn send_handshake_crypto(&mut self, data: Bytes) -> Result<()> {
        self.ensure_open()?;
        let chunk = self.frame_data_len();
        let mut remaining = data;
        while !remaining.is_empty() {
            let piece = remaining.split_to(remaining.len().min(chunk));
            let offset = self.handshake_crypto_offset;
            self.handshake_crypto_offset += piece.len() as u64;
            self.handshake_queue
                .add_frame(Frame::Crypto(CryptoFrame { offset, data: piece }));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------------

    /// Next packet to send, or `None` if nothing fits or nothing is pending.
    ///
    /// Initial packets go first, then ACK-only Initial packets, then Handshake
    /// packets (ACK and handshake CRYPTO only). Application frames wait in the
    /// send queue until the connection is established and go out in OneRtt.
    pub fn poll_transmit(&mut self, congestion: &dyn CongestionController) -> Option<Packet> {
        if self.state == ConnectionState::Closed {
            return None;
        }
        let available = usize::try_from(congestion.bytes_available()).unwrap_or(usize::MAX);

        if let Some(initial) = self.pending_initials.front() {
            if initial.estimated_size() > available {
                trace!(available, "initial blocked by congestion window");
                return None;
            }
            return self.pending_initials.pop_front().map(Packet::Initial);
        }

        if let Some(largest) = self.pending_acks[PacketNumberSpace::Initial.index()] {
            let mut packet = self.initial_packet(vec![Frame::Ack(AckFrame::single(largest))]);
            packet.ensure_size(self.config.min_initial_size);
            if packet.estimated_size() > available {
                return None;
            }
            self.pending_acks[PacketNumberSpace::Initial.index()] = None;
            self.next_packet_number[PacketNumberSpace::Initial.index()] += 1;
            return Some(Packet::Initial(packet));
        }

        if let Some(packet) = self.build_packet(PacketNumberSpace::Handshake, congestion) {
            return Some(packet);
        }
        if self.state == ConnectionState::Established {
            return self.build_packet(PacketNumberSpace::OneRtt, congestion);
        }
        None
    }

    pub fn poll_event(&mut self) -> Option<ConnectionEvent> {
        self.events.pop_front()
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn ensure_open(&self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    /// Largest CRYPTO or STREAM payload that fits one packet with a long
    /// header, the tag and the frame header.
    fn frame_data_len(&self) -> usize {
        self.config
            .max_packet_size
            .saturating_sub(1 + 4 + 1 + 20 + 1 + 20 + 2 + 4 + AEAD_EXPANSION + 1 + 8 + 8 + 4)
            .max(1)
    }

    fn initial_packet(&self, frames: Vec<Frame>) -> InitialPacket {
        let header = LongHeader::new(self.config.version, self.dcid.clone(), self.scid.clone());
        InitialPacket::new(
            header,
            self.token.clone(),
            self.next_packet_number[PacketNumberSpace::Initial.index()],
            frames,
        )
    }

    /// Build an Initial carrying the first-flight CRYPTO data and queue it.
    fn queue_initial(&mut self) {
        let Some(crypto) = self.initial_crypto.clone() else {
            return;
        };
        let mut frames = Vec::with_capacity(3);
        if let Some(largest) = self.pending_acks[PacketNumberSpace::Initial.index()].take() {
            frames.push(Frame::Ack(AckFrame::single(largest)));
        }
        frames.push(Frame::Crypto(CryptoFrame {
            offset: 0,
            data: crypto,
        }));
        let mut packet = self.initial_packet(frames);
        packet.ensure_size(self.config.min_initial_size);
        self.next_packet_number[PacketNumberSpace::Initial.index()] += 1;
        self.pending_initials.push_back(packet);
    }

    fn on_retry(&mut self, retry: &RetryPacket) {
        if self.state != ConnectionState::Initial || self.retry_state != RetryState::NotReceived {
            debug!(state = ?self.state, "discarding retry outside initial state");
            return;
        }
        if retry.header.dcid != self.scid {
            debug!(dcid = %retry.header.dcid, "discarding retry for another connection");
            return;
        }
        if self.peer_responded || self.initial_crypto.is_none() {
            debug!("discarding unexpected retry");
            return;
        }
        if retry.original_dcid != self.original_dcid {
            debug!(
                expected = %self.original_dcid,
                found = %retry.original_dcid,
                "discarding retry with mismatched original destination id"
            );
            return;
        }
        if retry.token.is_empty() {
            debug!("discarding retry without token");
            return;
        }

        info!(new_dcid = %retry.header.scid, token_len = retry.token.len(), "retry accepted");
        self.state = ConnectionState::RetryReceived;
        self.retry_state = RetryState::Accepted;
        self.dcid = retry.header.scid.clone();
        self.retry_source_cid = Some(retry.header.scid.clone());
        self.token = Some(retry.token.clone());
        self.pending_initials.clear();
        self.queue_initial();
    }

    /// The first long header packet from the server fixes its connection id.
    fn on_server_packet(&mut self, packet: &Packet) {
        if self.peer_responded {
            return;
        }
        let header = match packet {
            Packet::Initial(p) => &p.header,
            Packet::Handshake(p) => &p.header,
            _ => return,
        };
        self.peer_responded = true;
        if header.scid != self.dcid {
            debug!(dcid = %header.scid, "adopting server connection id");
            self.dcid = header.scid.clone();
        }
    }

    fn check_peer_params(&self, params: &TransportParameters) -> Result<()> {
        params.validate()?;
        let violation = Error::Transport(TransportError::TransportParameterError);
        match self.retry_state {
            RetryState::Accepted => {
                if params.original_destination_connection_id.as_ref() != Some(&self.original_dcid) {
                    return Err(violation);
                }
                if let Some(rscid) = &params.retry_source_connection_id {
                    if Some(rscid) != self.retry_source_cid.as_ref() {
                        return Err(violation);
                    }
                }
            }
            RetryState::NotReceived => {
                if params.original_destination_connection_id.is_some()
                    || params.retry_source_connection_id.is_some()
                {
                    return Err(violation);
                }
            }
        }
        Ok(())
    }

    fn on_frame(&mut self, space: PacketNumberSpace, frame: Frame) -> Result<()> {
        let handshake_space = matches!(
            space,
            PacketNumberSpace::Initial | PacketNumberSpace::Handshake
        );
        match frame {
            Frame::Padding(_) | Frame::Ping | Frame::Ack(_) => {}
            Frame::Crypto(crypto) => self.events.push_back(ConnectionEvent::CryptoData {
                space,
                offset: crypto.offset,
                data: crypto.data,
            }),
            Frame::ConnectionClose(close) => {
                info!(error_code = close.error_code, "peer closed connection");
                self.close(CloseReason::Peer {
                    error_code: close.error_code,
                    reason: close.reason,
                    application: close.application,
                });
            }
            _ if handshake_space => {
                return Err(Error::Transport(TransportError::ProtocolViolation));
            }
            Frame::NewToken(frame) => {
                if self.side.is_server() {
                    return Err(Error::Transport(TransportError::ProtocolViolation));
                }
                debug!(token_len = frame.token.len(), "new token received");
                self.new_token = Some(frame.token.clone());
                self.events.push_back(ConnectionEvent::NewToken(frame.token));
            }
            Frame::HandshakeDone => {
                if self.side.is_server() {
                    return Err(Error::Transport(TransportError::ProtocolViolation));
                }
                if self.state != ConnectionState::Established {
                    info!("handshake confirmed");
                    self.state = ConnectionState::Established;
                    self.events.push_back(ConnectionEvent::Established);
                }
            }
            Frame::MaxStreams(frame) => {
                self.streams
                    .update_peer_max_streams(frame.direction, frame.maximum);
            }
            Frame::Stream(frame) => self.events.push_back(ConnectionEvent::StreamData {
                stream_id: frame.stream_id,
                offset: frame.offset,
                data: frame.data,
                fin: frame.fin,
            }),
            Frame::MaxData(_) | Frame::MaxStreamData(_) => {}
        }
        Ok(())
    }

    fn build_packet(
        &mut self,
        space: PacketNumberSpace,
        congestion: &dyn CongestionController,
    ) -> Option<Packet> {
        let packet_number = self.next_packet_number[space.index()];
        let pn_len = number::encode_length(packet_number, None);
        let header_len = match space {
            PacketNumberSpace::OneRtt => 1 + self.dcid.len() + pn_len,
            _ => {
                let header =
                    LongHeader::new(self.config.version, self.dcid.clone(), self.scid.clone());
                1 + header.encoded_len() + 2 + pn_len
            }
        };

        let mut frames = Vec::new();
        let mut overhead = header_len + AEAD_EXPANSION;
        let ack = self.pending_acks[space.index()].map(AckFrame::single);
        if let Some(ack) = ack {
            let frame = Frame::Ack(ack);
            overhead += frame.encoded_len();
            let budget = self
                .assembler
                .payload_budget(header_len + AEAD_EXPANSION, congestion);
            if budget < frame.encoded_len() {
                return None;
            }
            frames.push(frame);
        }
        let queue: &SendRequestQueue = match space {
            PacketNumberSpace::OneRtt => &*self.send_queue,
            _ => &self.handshake_queue,
        };
        frames.extend(self.assembler.assemble(queue, overhead, congestion));
        if frames.is_empty() {
            return None;
        }
        self.pending_acks[space.index()] = None;
        self.next_packet_number[space.index()] += 1;

        let packet = match space {
            PacketNumberSpace::OneRtt => {
                Packet::OneRtt(ShortPacket::new(self.dcid.clone(), packet_number, frames))
            }
            _ => Packet::Handshake(LongPacket::handshake(
                LongHeader::new(self.config.version, self.dcid.clone(), self.scid.clone()),
                packet_number,
                frames,
            )),
        };
        trace!(?space, packet_number, "packet assembled");
        Some(packet)
    }

    /// Close with a locally detected error. Nothing is sent afterwards.
    fn fail(&mut self, error: TransportError) {
        if self.state == ConnectionState::Closed {
            return;
        }
        warn!(%error, "closing connection");
        self.error = Some(error);
        self.close(CloseReason::Local(error));
    }

    fn close(&mut self, reason: CloseReason) {
        self.state = ConnectionState::Closed;
        self.pending_initials.clear();
        self.pending_acks = [None; 4];
        self.send_queue.clear();
        self.handshake_queue.clear();
        self.events.push_back(ConnectionEvent::Closed(reason));
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("side", &self.side)
            .field("state", &self.state)
            .field("retry_state", &self.retry_state)
            .field("scid", &self.scid)
            .field("dcid", &self.dcid)
            .finish_non_exhaustive()
    }
}
