//! Netplay error types.

use nextui_netproto::PacketType;
use thiserror::Error;

use crate::state::SessionState;

#[derive(Error, Debug)]
pub enum NetplayError {
    #[error("not hosting")]
    NotHosting,

    #[error("not connected to host")]
    NotConnected,

    #[error("session already active")]
    AlreadyActive,

    #[error("operation not allowed in state {0:?}")]
    InvalidState(SessionState),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("discovery is not running")]
    DiscoveryDisabled,

    #[error("partial send: {sent} of {expected} bytes")]
    PartialSend { sent: usize, expected: usize },

    #[error("unexpected packet: {0:?}")]
    UnexpectedPacket(PacketType),

    #[error("state is only delivered through StateReceived events")]
    StatePollUnsupported,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] nextui_netproto::ProtoError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
