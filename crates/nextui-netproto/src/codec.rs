use crate::{
    constants::{HEADER_LEN, MAX_PAYLOAD},
    error::ProtoError,
    header::Header,
    messages::Message,
    packet::PacketView,
    packet_type::PacketType,
};

/// Encode a packet from raw payload bytes.
///
/// Fails with [`ProtoError::PayloadTooLarge`] if the payload does not fit in a
/// single packet.
pub fn encode_packet(
    packet_type: PacketType,
    sequence: u32,
    payload: &[u8],
) -> Result<Vec<u8>, ProtoError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(ProtoError::PayloadTooLarge(payload.len()));
    }

    let mut header = Header::new(packet_type, sequence);
    header.length = payload.len() as u16;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    let mut hbuf = [0u8; HEADER_LEN];
    header.encode_into(&mut hbuf);
    out.extend_from_slice(&hbuf);
    out.extend_from_slice(payload);
    Ok(out)
}

/// Encode a typed payload as a packet of the given type.
///
/// # Example
/// ```ignore
/// use nextui_netproto::{PacketType, encode_message, messages::sync::Ping};
///
/// let packet = encode_message(PacketType::Ping, frame, &Ping { t_ms: 1000 })?;
/// ```
pub fn encode_message<T: Message>(
    packet_type: PacketType,
    sequence: u32,
    payload: &T,
) -> Result<Vec<u8>, ProtoError> {
    encode_packet(packet_type, sequence, &payload.to_bytes())
}

/// Decode one packet from the start of `buf`.
///
/// Bytes past the declared payload length are ignored, so this works on both
/// UDP datagrams and slices cut out of a TCP stream.
pub fn decode_packet(buf: &[u8]) -> Result<PacketView<'_>, ProtoError> {
    let header = Header::decode(buf)?;

    let needed = header.packet_len();
    if buf.len() < needed {
        return Err(ProtoError::Truncated {
            needed,
            actual: buf.len(),
        });
    }

    let packet_type = PacketType::from_repr(header.packet_type)
        .ok_or(ProtoError::UnknownPacketType(header.packet_type))?;

    Ok(PacketView::new(header, packet_type, &buf[HEADER_LEN..needed]))
}

/// Decode as many complete packets as `in_buf` holds.
///
/// Returns the decoded views plus the number of bytes they occupy; a trailing
/// partial packet is left for the next call. Any header that fails
/// validation aborts the whole batch, since the stream can no longer be
/// trusted to be aligned on a packet boundary.
pub fn try_decode_packets(in_buf: &[u8]) -> Result<(Vec<PacketView<'_>>, usize), ProtoError> {
    let mut packets = Vec::new();
    let mut offset = 0usize;

    loop {
        let rest = &in_buf[offset..];
        if rest.len() < HEADER_LEN {
            break;
        }

        let header = Header::decode(rest)?;
        let total_needed = header.packet_len();
        if rest.len() < total_needed {
            break;
        }

        packets.push(decode_packet(&rest[..total_needed])?);
        offset += total_needed;
    }

    Ok((packets, offset))
}
