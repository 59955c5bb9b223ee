use crate::{
    constants::DEVICE_NAME_MAX, error::ProtoError, messages::Message, packet_type::Role,
};

/// Payload of `Discovery` and `DiscoveryResponse` packets.
///
/// Wire layout (66 bytes):
/// - 0..64  device name, UTF-8, NUL-padded (at most 63 name bytes)
/// - 64     role
/// - 65     player count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryInfo {
    pub device_name: String,
    pub role: Role,
    pub player_count: u8,
}

impl DiscoveryInfo {
    pub const ENCODED_LEN: usize = DEVICE_NAME_MAX + 2;

    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        let name = truncate_device_name(&self.device_name);
        out[..name.len()].copy_from_slice(name.as_bytes());
        out[DEVICE_NAME_MAX] = self.role as u8;
        out[DEVICE_NAME_MAX + 1] = self.player_count;
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtoError> {
        if buf.len() < Self::ENCODED_LEN {
            return Err(ProtoError::PayloadLength {
                expected: Self::ENCODED_LEN,
                actual: buf.len(),
            });
        }

        let name_field = &buf[..DEVICE_NAME_MAX];
        let name_len = name_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(DEVICE_NAME_MAX);
        let device_name = String::from_utf8_lossy(&name_field[..name_len]).into_owned();

        let role_byte = buf[DEVICE_NAME_MAX];
        let role = Role::from_repr(role_byte).ok_or(ProtoError::UnknownRole(role_byte))?;

        Ok(Self {
            device_name,
            role,
            player_count: buf[DEVICE_NAME_MAX + 1],
        })
    }
}

impl Message for DiscoveryInfo {
    fn to_bytes(&self) -> Vec<u8> {
        self.encode().to_vec()
    }

    fn from_bytes(buf: &[u8]) -> Result<Self, ProtoError> {
        Self::decode(buf)
    }
}

/// Clip a device name so it fits the name field with a terminating NUL,
/// without splitting a UTF-8 sequence.
pub fn truncate_device_name(name: &str) -> &str {
    let max = DEVICE_NAME_MAX - 1;
    if name.len() <= max {
        return name;
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}
