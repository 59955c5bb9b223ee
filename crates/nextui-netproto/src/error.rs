use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtoError {
    #[error("bad magic {0:#010x}")]
    BadMagic(u32),
    #[error("unsupported version {0}")]
    UnsupportedVersion(u8),
    #[error("buffer too short")]
    TooShort,
    #[error("truncated packet: need {needed} bytes, have {actual}")]
    Truncated { needed: usize, actual: usize },
    #[error("payload too large: {0}")]
    PayloadTooLarge(usize),
    #[error("unknown packet type: {0}")]
    UnknownPacketType(u8),
    #[error("unknown role: {0}")]
    UnknownRole(u8),
    #[error("payload length mismatch: expected {expected}, got {actual}")]
    PayloadLength { expected: usize, actual: usize },
}
