use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use nextui_netproto::constants::{DISCOVERY_PORT, NETPLAY_PORT};

/// Default bound for both the TCP connect and the ConnectResponse wait.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Session configuration.
///
/// The defaults match what devices on the LAN expect; tests and tools
/// override ports and addresses to run several sessions on one machine.
#[derive(Debug, Clone)]
pub struct NetplayConfig {
    /// Name advertised in discovery packets. Clipped to 63 bytes.
    pub device_name: String,

    /// Local address for the host listener and the discovery socket.
    pub bind_ip: IpAddr,

    /// TCP control port. `0` lets the OS pick one when hosting.
    pub tcp_port: u16,

    /// Local UDP discovery port.
    pub discovery_port: u16,

    /// Where discovery broadcasts are sent.
    pub broadcast_addr: SocketAddr,

    /// Bound on establishing the TCP connection to a host.
    pub connect_timeout: Duration,

    /// Bound on waiting for the host's ConnectResponse.
    pub handshake_timeout: Duration,
}

impl NetplayConfig {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            ..Self::default()
        }
    }
}

impl Default for NetplayConfig {
    fn default() -> Self {
        Self {
            device_name: String::new(),
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            tcp_port: NETPLAY_PORT,
            discovery_port: DISCOVERY_PORT,
            broadcast_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), DISCOVERY_PORT),
            connect_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}
