use crate::{error::ProtoError, messages::Message};

/// Timestamp carried by `Ping` packets and echoed back unchanged in `Pong`.
///
/// `t_ms` is the sender's monotonic clock in milliseconds; only the sender
/// ever interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping {
    pub t_ms: u32,
}

impl Ping {
    pub const ENCODED_LEN: usize = 4;
}

impl Message for Ping {
    fn to_bytes(&self) -> Vec<u8> {
        self.t_ms.to_ne_bytes().to_vec()
    }

    fn from_bytes(buf: &[u8]) -> Result<Self, ProtoError> {
        let bytes: [u8; Self::ENCODED_LEN] =
            buf.try_into().map_err(|_| ProtoError::PayloadLength {
                expected: Self::ENCODED_LEN,
                actual: buf.len(),
            })?;
        Ok(Self {
            t_ms: u32::from_ne_bytes(bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_payload_is_exactly_four_bytes() {
        let bytes = Ping { t_ms: 1000 }.to_bytes();
        assert_eq!(bytes.len(), 4);
        assert_eq!(Ping::from_bytes(&bytes).unwrap().t_ms, 1000);

        assert!(Ping::from_bytes(&[]).is_err());
        assert!(Ping::from_bytes(&[0; 5]).is_err());
    }
}
