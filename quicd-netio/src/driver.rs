//! Connection driver: receiver → packet codec → state machine → socket.
//!
//! The connection itself never touches the network. The driver owns the
//! glue: it parses datagrams handed over by a [`Receiver`], feeds the
//! packets to the connection, and writes every packet the connection is
//! willing to send under the congestion budget.

use crate::error::Result;
use crate::netio::{DatagramSocket, RawPacket, Receiver};
use bytes::BytesMut;
use parking_lot::Mutex;
use quicd_transport::packet::DatagramIterator;
use quicd_transport::types::DEFAULT_MAX_UDP_PAYLOAD_SIZE;
use quicd_transport::{
    CongestionController, Connection, ConnectionEvent, ConnectionState, PacketProtection,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

pub struct ConnectionDriver {
    connection: Mutex<Connection>,
    socket: Arc<dyn DatagramSocket>,
    peer: SocketAddr,
    protection: Box<dyn PacketProtection>,
    congestion: Mutex<Box<dyn CongestionController + Send>>,
}

impl ConnectionDriver {
    pub fn new(
        connection: Connection,
        socket: Arc<dyn DatagramSocket>,
        peer: SocketAddr,
        protection: Box<dyn PacketProtection>,
        congestion: Box<dyn CongestionController + Send>,
    ) -> Self {
        Self {
            connection: Mutex::new(connection),
            socket,
            peer,
            protection,
            congestion: Mutex::new(congestion),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.lock().state()
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_connection<R>(&self, f: impl FnOnce(&mut Connection) -> R) -> R {
        let mut connection = self.connection.lock();
        f(&mut *connection)
    }

    pub fn poll_event(&self) -> Option<ConnectionEvent> {
        self.connection.lock().poll_event()
    }

    /// Send everything the connection has ready. Returns the datagram count.
    pub fn flush(&self) -> Result<usize> {
        let mut connection = self.connection.lock();
        let mut congestion = self.congestion.lock();
        let mut sent = 0;

        while let Some(packet) = connection.poll_transmit(&**congestion) {
            let mut out = BytesMut::with_capacity(DEFAULT_MAX_UDP_PAYLOAD_SIZE);
            packet.encode(self.protection.as_ref(), &mut out)?;
            self.socket.send_to(&out, self.peer)?;
            congestion.on_packet_sent(out.len());
            trace!(
                packet_type = ?packet.packet_type(),
                len = out.len(),
                peer = %self.peer,
                "packet sent"
            );
            sent += 1;
        }
        Ok(sent)
    }

    /// Feed one datagram to the connection.
    ///
    /// Datagrams from other addresses are ignored. Undecodable packets are
    /// dropped along with whatever follows them in the datagram; errors from
    /// the connection itself are returned.
    pub fn handle_datagram(&self, datagram: RawPacket) -> Result<()> {
        if datagram.source != self.peer {
            debug!(from = %datagram.source, "ignoring datagram from unknown peer");
            return Ok(());
        }

        let mut connection = self.connection.lock();
        let dcid_len = connection.source_cid().len();
        for parsed in DatagramIterator::new(datagram.data, dcid_len, self.protection.as_ref()) {
            match parsed {
                Ok(packet) => connection.process_packet(packet, datagram.received_at)?,
                Err(e) => {
                    debug!(error = %e, sequence = datagram.sequence, "dropping undecodable packet");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Wait up to `timeout` for one datagram, process it, and flush.
    ///
    /// Returns whether a datagram was processed.
    pub fn poll_once(&self, receiver: &Receiver, timeout: Duration) -> Result<bool> {
        self.flush()?;
        let received = match receiver.get_timeout(timeout) {
            Some(datagram) => {
                self.handle_datagram(datagram)?;
                true
            }
            None => false,
        };
        self.connection.lock().handle_timeout(Instant::now());
        self.flush()?;
        Ok(received)
    }
}
