//! Error type for the runtime side.

use crate::netio::SocketId;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetIoError {
    #[error("socket {0} is not registered")]
    UnknownSocket(SocketId),

    #[error("receiver is shut down")]
    Closed,

    #[error("failed to spawn receive thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("socket error: {0}")]
    Socket(#[from] io::Error),

    #[error("receive thread for socket {0} panicked")]
    WorkerPanicked(SocketId),

    #[error(transparent)]
    Transport(#[from] quicd_transport::Error),
}

pub type Result<T> = std::result::Result<T, NetIoError>;
