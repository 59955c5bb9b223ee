//! Wire protocol for NextUI LAN netplay.
//!
//! Every packet is a fixed 12-byte [`header::Header`] followed by a
//! type-specific payload. The same framing is used on the TCP control
//! connection and on the UDP discovery socket.

pub mod codec;
pub mod constants;
pub mod error;
pub mod header;
pub mod messages;
pub mod packet;
pub mod packet_type;

pub use codec::{decode_packet, encode_message, encode_packet, try_decode_packets};
pub use error::ProtoError;
pub use header::Header;
pub use packet::PacketView;
pub use packet_type::{PacketType, Role};
