use crate::error::ProtoError;

pub mod discovery;
pub mod input;
pub mod sync;

/// A typed packet payload with a fixed binary layout.
///
/// Payloads are not tied to a single [`crate::PacketType`]: discovery
/// requests and responses share [`discovery::DiscoveryInfo`], pings and
/// pongs share [`sync::Ping`].
pub trait Message: Sized {
    /// Serialize into the wire layout.
    fn to_bytes(&self) -> Vec<u8>;

    /// Parse from a payload slice.
    fn from_bytes(buf: &[u8]) -> Result<Self, ProtoError>;
}
