//! NextUI LAN Netplay
//!
//! Peer discovery, host/client connection management, per-frame input and
//! state exchange, and latency measurement over the `nextui-netproto` wire
//! format. Everything runs on non-blocking std sockets driven by the
//! caller's frame loop; there are no background threads.
//!
//! # Architecture
//!
//! - [`session`]: Session object, shared state and outbound input/state/ping
//! - `host`: Accept loop and per-client dispatch (host role)
//! - `client`: Connect handshake and receive loop (client role)
//! - `discovery`: UDP broadcast announcements and responses
//! - [`latency`]: Ping/pong round-trip tracking
//! - [`event`]: Events delivered to the embedding application
//! - [`error`]: Error types

mod client;
pub mod config;
mod discovery;
pub mod error;
pub mod event;
pub mod framing;
mod host;
pub mod latency;
mod peer;
pub mod session;
pub mod state;

// Re-export commonly used types
pub use config::NetplayConfig;
pub use error::NetplayError;
pub use event::{DeviceDescriptor, NetplayEvent};
pub use nextui_netproto::constants::{DISCOVERY_PORT, MAX_PEERS, NETPLAY_PORT};
pub use nextui_netproto::messages::input::{InputState, Stick};
pub use session::NetplaySession;
pub use state::{Role, SessionState};
