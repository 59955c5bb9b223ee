use crate::{error::ProtoError, messages::Message};

/// One analog stick position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Stick {
    pub x: i16,
    pub y: i16,
}

/// Controller snapshot for one player.
///
/// Wire layout (16 bytes, host byte order):
/// - 0      port
/// - 1      reserved (always 0)
/// - 2..4   buttons (u16)
/// - 4..8   analog x, y
/// - 8..12  left stick x, y
/// - 12..16 right stick x, y
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct InputState {
    pub port: u8,
    pub buttons: u16,
    pub analog: Stick,
    pub left: Stick,
    pub right: Stick,
}

impl InputState {
    pub const ENCODED_LEN: usize = 16;

    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[0] = self.port;
        out[2..4].copy_from_slice(&self.buttons.to_ne_bytes());
        let axes = [
            self.analog.x,
            self.analog.y,
            self.left.x,
            self.left.y,
            self.right.x,
            self.right.y,
        ];
        for (i, axis) in axes.iter().enumerate() {
            let at = 4 + i * 2;
            out[at..at + 2].copy_from_slice(&axis.to_ne_bytes());
        }
        out
    }

    /// Parse an input payload. Longer payloads are accepted and the excess
    /// ignored; shorter ones are rejected.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtoError> {
        if buf.len() < Self::ENCODED_LEN {
            return Err(ProtoError::PayloadLength {
                expected: Self::ENCODED_LEN,
                actual: buf.len(),
            });
        }

        let axis = |i: usize| {
            let at = 4 + i * 2;
            i16::from_ne_bytes([buf[at], buf[at + 1]])
        };

        Ok(Self {
            port: buf[0],
            buttons: u16::from_ne_bytes([buf[2], buf[3]]),
            analog: Stick {
                x: axis(0),
                y: axis(1),
            },
            left: Stick {
                x: axis(2),
                y: axis(3),
            },
            right: Stick {
                x: axis(4),
                y: axis(5),
            },
        })
    }
}

impl Message for InputState {
    fn to_bytes(&self) -> Vec<u8> {
        self.encode().to_vec()
    }

    fn from_bytes(buf: &[u8]) -> Result<Self, ProtoError> {
        Self::decode(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_layout_is_locked() {
        let input = InputState {
            port: 2,
            buttons: 0x8001,
            analog: Stick { x: -1, y: 2 },
            left: Stick { x: 300, y: -300 },
            right: Stick {
                x: i16::MAX,
                y: i16::MIN,
            },
        };

        let bytes = input.encode();
        assert_eq!(bytes[0], 2);
        assert_eq!(bytes[1], 0);
        assert_eq!(u16::from_ne_bytes([bytes[2], bytes[3]]), 0x8001);
        assert_eq!(i16::from_ne_bytes([bytes[4], bytes[5]]), -1);
        assert_eq!(i16::from_ne_bytes([bytes[10], bytes[11]]), -300);
        assert_eq!(i16::from_ne_bytes([bytes[14], bytes[15]]), i16::MIN);

        assert_eq!(InputState::decode(&bytes).unwrap(), input);
    }

    #[test]
    fn short_input_is_rejected() {
        assert_eq!(
            InputState::decode(&[0u8; 15]),
            Err(ProtoError::PayloadLength {
                expected: 16,
                actual: 15
            })
        );
    }
}
