use strum::FromRepr;

/// Packet type carried in [`crate::header::Header::packet_type`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr)]
pub enum PacketType {
    Discovery = 0,
    DiscoveryResponse = 1,
    ConnectRequest = 2,
    ConnectResponse = 3,
    Disconnect = 4,
    InputState = 5,
    StateSync = 6,
    Ping = 7,
    Pong = 8,
}

/// Session role advertised in discovery payloads.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, FromRepr)]
pub enum Role {
    #[default]
    None = 0,
    Host = 1,
    Client = 2,
}
