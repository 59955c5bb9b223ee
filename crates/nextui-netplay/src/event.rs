use std::net::IpAddr;

use bytes::Bytes;
use nextui_netproto::messages::input::InputState;

use crate::state::SessionState;

/// A peer that answered a discovery broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub device_name: String,
    pub ip: IpAddr,
    /// TCP port to connect to when joining this device.
    pub port: u16,
    pub is_host: bool,
    pub player_count: u8,
}

/// Events emitted synchronously from the poll functions.
#[derive(Debug, Clone)]
pub enum NetplayEvent {
    /// Remote controller state arrived. `slot` is the client slot on a host
    /// and always 0 on a client; `frame` is the sender's frame count.
    InputReceived {
        slot: usize,
        frame: u32,
        input: InputState,
    },
    /// An opaque state blob arrived.
    StateReceived { frame: u32, data: Bytes },
    DeviceDiscovered(DeviceDescriptor),
    ConnectionStateChanged(SessionState),
}
