use crate::{header::Header, packet_type::PacketType};

/// A decoded packet borrowing its payload from the receive buffer.
#[derive(Debug, Clone, Copy)]
pub struct PacketView<'a> {
    pub header: Header,
    pub packet_type: PacketType,
    pub payload: &'a [u8],
}

impl<'a> PacketView<'a> {
    pub fn new(header: Header, packet_type: PacketType, payload: &'a [u8]) -> Self {
        Self {
            header,
            packet_type,
            payload,
        }
    }

    pub fn sequence(&self) -> u32 {
        self.header.sequence
    }
}
