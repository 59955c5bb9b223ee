use crate::{
    constants::{HEADER_LEN, MAGIC, MAX_PAYLOAD, PROTOCOL_VERSION},
    error::ProtoError,
    packet_type::PacketType,
};

/// Packet header (wire format).
///
/// Encoding rules:
/// - Fixed size: exactly `HEADER_LEN` bytes.
/// - Integer fields are written in the byte order of the encoding host.
///   Peers on hosts with a different endianness will not understand each
///   other; existing devices rely on this layout so it is kept as is.
/// - Layout is defined by `encode_into()` / `decode()` offsets below.
///
/// Decode rules:
/// - Requires `buf.len() >= HEADER_LEN`.
/// - Requires `magic == MAGIC` and `version == PROTOCOL_VERSION`.
/// - Requires `length <= MAX_PAYLOAD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Raw packet type. `decode()` does not resolve it; see [`PacketType`].
    pub packet_type: u8,

    /// Wire-format version. `decode()` rejects versions != `PROTOCOL_VERSION`.
    pub version: u8,

    /// Payload length in bytes.
    pub length: u16,

    /// Sender sequence number. Input and state packets carry the frame count.
    pub sequence: u32,
}

impl Header {
    /// Header size in bytes for the current wire layout.
    pub const LEN: usize = HEADER_LEN;

    /// Create a header for `packet_type` with an empty payload.
    pub fn new(packet_type: PacketType, sequence: u32) -> Self {
        Self {
            packet_type: packet_type as u8,
            version: PROTOCOL_VERSION,
            length: 0,
            sequence,
        }
    }

    /// Encode this header into `out` using the current fixed wire layout.
    ///
    /// Offsets (bytes):
    /// - 0..4   magic
    /// - 4      packet_type
    /// - 5      version
    /// - 6..8   length (u16)
    /// - 8..12  sequence (u32)
    pub fn encode_into(&self, out: &mut [u8; HEADER_LEN]) {
        out[0..4].copy_from_slice(&MAGIC.to_ne_bytes());
        out[4] = self.packet_type;
        out[5] = self.version;
        out[6..8].copy_from_slice(&self.length.to_ne_bytes());
        out[8..12].copy_from_slice(&self.sequence.to_ne_bytes());
    }

    /// Decode the header at the start of `buf`.
    ///
    /// Only the first `HEADER_LEN` bytes are inspected; whether the payload is
    /// actually present is checked by [`crate::codec::decode_packet`].
    pub fn decode(buf: &[u8]) -> Result<Header, ProtoError> {
        if buf.len() < HEADER_LEN {
            return Err(ProtoError::TooShort);
        }

        let magic = read_u32(buf, 0)?;
        if magic != MAGIC {
            return Err(ProtoError::BadMagic(magic));
        }

        let packet_type = buf[4];
        let version = buf[5];
        if version != PROTOCOL_VERSION {
            return Err(ProtoError::UnsupportedVersion(version));
        }

        let length = read_u16(buf, 6)?;
        if usize::from(length) > MAX_PAYLOAD {
            return Err(ProtoError::PayloadTooLarge(usize::from(length)));
        }

        let sequence = read_u32(buf, 8)?;

        Ok(Header {
            packet_type,
            version,
            length,
            sequence,
        })
    }

    /// Total packet size (header + payload) described by this header.
    pub fn packet_len(&self) -> usize {
        HEADER_LEN + usize::from(self.length)
    }
}

fn read_u32(buf: &[u8], start: usize) -> Result<u32, ProtoError> {
    let bytes: [u8; 4] = buf
        .get(start..start + 4)
        .ok_or(ProtoError::TooShort)?
        .try_into()
        .map_err(|_| ProtoError::TooShort)?;
    Ok(u32::from_ne_bytes(bytes))
}

fn read_u16(buf: &[u8], start: usize) -> Result<u16, ProtoError> {
    let bytes: [u8; 2] = buf
        .get(start..start + 2)
        .ok_or(ProtoError::TooShort)?
        .try_into()
        .map_err(|_| ProtoError::TooShort)?;
    Ok(u16::from_ne_bytes(bytes))
}
