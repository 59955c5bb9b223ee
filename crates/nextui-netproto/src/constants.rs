/// Magic number at the beginning of every packet ("NPAY").
/// Used to quickly reject unrelated or corrupted data.
pub const MAGIC: u32 = 0x4E50_4159;

/// Wire-format protocol version.
/// Bump this only for breaking changes to the header layout or payload formats.
pub const PROTOCOL_VERSION: u8 = 1;

/// Fixed header length in bytes (wire format).
pub const HEADER_LEN: usize = 12;

/// Largest packet (header + payload) either side will build or accept.
pub const MAX_PACKET_SIZE: usize = 4096;

/// Largest payload that fits in a single packet.
pub const MAX_PAYLOAD: usize = MAX_PACKET_SIZE - HEADER_LEN;

/// TCP control port. The host listens here, clients connect to it.
pub const NETPLAY_PORT: u16 = 55435;

/// UDP port used for discovery broadcasts and responses.
pub const DISCOVERY_PORT: u16 = 55436;

/// Maximum number of simultaneously connected clients on a host.
pub const MAX_PEERS: usize = 4;

/// Size of the NUL-padded device name field in discovery payloads.
pub const DEVICE_NAME_MAX: usize = 64;
