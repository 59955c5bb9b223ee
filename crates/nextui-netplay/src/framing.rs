use bytes::{Buf, Bytes, BytesMut};
use nextui_netproto::{Header, PacketType, ProtoError, try_decode_packets};

/// A single decoded packet that owns its payload bytes.
#[derive(Debug, Clone)]
pub struct PacketOwned {
    pub header: Header,
    pub packet_type: PacketType,
    pub payload: Bytes,
}

impl PacketOwned {
    pub fn sequence(&self) -> u32 {
        self.header.sequence
    }
}

/// Reassembles packets from a TCP byte stream.
///
/// A single read may carry several packets or end halfway through one, so
/// received bytes are appended here and only complete packets are handed out.
#[derive(Debug)]
pub struct PacketFramer {
    buf: BytesMut,
}

impl PacketFramer {
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(initial_capacity),
        }
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes waiting for the rest of their packet.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Decode every complete packet currently buffered.
    ///
    /// On a validation error the buffer is discarded: once a header is bad
    /// there is no way to find the next packet boundary in the stream.
    pub fn drain_packets(&mut self) -> Result<Vec<PacketOwned>, ProtoError> {
        let (views, consumed) = match try_decode_packets(&self.buf) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.buf.clear();
                return Err(e);
            }
        };

        let out = views
            .into_iter()
            .map(|v| PacketOwned {
                header: v.header,
                packet_type: v.packet_type,
                payload: Bytes::copy_from_slice(v.payload),
            })
            .collect();

        self.buf.advance(consumed);
        Ok(out)
    }
}
