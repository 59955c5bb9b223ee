//! LAN discovery over UDP broadcast.
//!
//! A device announces itself with a `Discovery` broadcast; every listening
//! device answers the sender directly with a `DiscoveryResponse`, which
//! surfaces as [`NetplayEvent::DeviceDiscovered`]. Nothing is retried:
//! callers broadcast periodically and poll every tick.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

use nextui_netproto::{
    PacketType, decode_packet, encode_message,
    constants::MAX_PACKET_SIZE,
    messages::discovery::DiscoveryInfo,
};
use tracing::{debug, info, trace, warn};

use crate::{
    error::NetplayError,
    event::{DeviceDescriptor, NetplayEvent},
    session::{NetplaySession, SessionInner},
    state::Role,
};

/// Upper bound on datagrams handled by a single `poll_discovery` call.
const MAX_DATAGRAMS_PER_POLL: usize = 16;

impl NetplaySession {
    /// Bind the discovery socket. Calling it again while running is a no-op.
    pub fn start_discovery(&self) -> Result<(), NetplayError> {
        if self.inner.lock().discovery.is_some() {
            debug!("discovery already running");
            return Ok(());
        }

        let socket = UdpSocket::bind(SocketAddr::new(
            self.config.bind_ip,
            self.config.discovery_port,
        ))?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;
        let local = socket.local_addr()?;

        self.inner.lock().discovery = Some(Arc::new(socket));
        info!(%local, "discovery started");
        Ok(())
    }

    pub fn stop_discovery(&self) {
        if self.inner.lock().discovery.take().is_some() {
            info!("discovery stopped");
        }
    }

    pub fn discovery_enabled(&self) -> bool {
        self.inner.lock().discovery.is_some()
    }

    /// Local address of the discovery socket, when running.
    pub fn discovery_addr(&self) -> Option<SocketAddr> {
        let inner = self.inner.lock();
        inner.discovery.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Broadcast a `Discovery` announcement. Returns the bytes sent.
    pub fn broadcast_discovery(&self) -> Result<usize, NetplayError> {
        let (socket, info, nonce) = {
            let inner = self.inner.lock();
            let socket = inner
                .discovery
                .clone()
                .ok_or(NetplayError::DiscoveryDisabled)?;
            let count = if inner.role == Role::Host { 1 } else { 0 };
            (socket, self.advertisement(&inner, count), inner.discovery_nonce)
        };

        let packet = encode_message(PacketType::Discovery, nonce, &info)?;
        let target = self.config.broadcast_addr;
        let sent = socket.send_to(&packet, target).inspect_err(|e| {
            warn!(%target, error = %e, "failed to send discovery broadcast");
        })?;
        if sent != packet.len() {
            return Err(NetplayError::PartialSend {
                sent,
                expected: packet.len(),
            });
        }

        trace!(%target, bytes = sent, "discovery broadcast");
        Ok(sent)
    }

    /// Handle one discovery datagram received from `from`.
    ///
    /// A `Discovery` request is answered directly to `from`; a
    /// `DiscoveryResponse` is reported as a discovered device. Anything else
    /// is rejected.
    pub fn handle_discovery_packet(
        &self,
        data: &[u8],
        from: SocketAddr,
    ) -> Result<(), NetplayError> {
        let packet = decode_packet(data)?;

        match packet.packet_type {
            PacketType::Discovery => {
                let (socket, info, nonce) = {
                    let inner = self.inner.lock();
                    let socket = inner
                        .discovery
                        .clone()
                        .ok_or(NetplayError::DiscoveryDisabled)?;
                    let count = if inner.role == Role::Host {
                        inner.client_count() as u8 + 1
                    } else {
                        0
                    };
                    (socket, self.advertisement(&inner, count), inner.discovery_nonce)
                };

                if packet.sequence() == nonce {
                    trace!(%from, "ignoring own discovery broadcast");
                    return Ok(());
                }

                let response =
                    encode_message(PacketType::DiscoveryResponse, packet.sequence(), &info)?;
                match socket.send_to(&response, from) {
                    Ok(_) => debug!(%from, "answered discovery"),
                    Err(e) => warn!(%from, error = %e, "failed to answer discovery"),
                }
                Ok(())
            }
            PacketType::DiscoveryResponse => {
                let info = DiscoveryInfo::decode(packet.payload)?;
                let device = DeviceDescriptor {
                    device_name: info.device_name,
                    ip: from.ip(),
                    port: self.config.tcp_port,
                    is_host: info.role == Role::Host,
                    player_count: info.player_count,
                };
                debug!(%from, name = %device.device_name, is_host = device.is_host, "device discovered");
                self.emit(NetplayEvent::DeviceDiscovered(device));
                Ok(())
            }
            other => Err(NetplayError::UnexpectedPacket(other)),
        }
    }

    /// Drain pending discovery datagrams. Returns how many were handled.
    pub fn poll_discovery(&self) -> Result<usize, NetplayError> {
        let socket = self
            .inner
            .lock()
            .discovery
            .clone()
            .ok_or(NetplayError::DiscoveryDisabled)?;

        let mut buf = [0u8; MAX_PACKET_SIZE];
        let mut handled = 0;
        for _ in 0..MAX_DATAGRAMS_PER_POLL {
            let (n, from) = match socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                // ICMP port-unreachable from an earlier send; not fatal.
                Err(e) if e.kind() == ErrorKind::ConnectionReset => continue,
                Err(e) => return Err(e.into()),
            };

            match self.handle_discovery_packet(&buf[..n], from) {
                Ok(()) => handled += 1,
                Err(e) => debug!(%from, error = %e, "ignoring discovery datagram"),
            }
        }
        Ok(handled)
    }

    fn advertisement(&self, inner: &SessionInner, player_count: u8) -> DiscoveryInfo {
        DiscoveryInfo {
            device_name: self.config.device_name.clone(),
            role: inner.role,
            player_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use nextui_netproto::encode_packet;

    use super::*;
    use crate::config::NetplayConfig;

    fn loopback_config() -> NetplayConfig {
        NetplayConfig {
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            discovery_port: 0,
            ..NetplayConfig::new("disco-unit")
        }
    }

    #[test]
    fn broadcast_requires_running_discovery() {
        let (session, _rx) = NetplaySession::new(loopback_config());
        assert!(matches!(
            session.broadcast_discovery(),
            Err(NetplayError::DiscoveryDisabled)
        ));

        session.start_discovery().unwrap();
        assert!(session.discovery_enabled());
        session.stop_discovery();
        assert!(!session.discovery_enabled());
        assert!(session.discovery_addr().is_none());
    }

    #[test]
    fn response_becomes_device_event() {
        let (session, rx) = NetplaySession::new(loopback_config());
        let info = DiscoveryInfo {
            device_name: "brick".to_string(),
            role: Role::Host,
            player_count: 2,
        };
        let packet = encode_message(PacketType::DiscoveryResponse, 7, &info).unwrap();
        let from: SocketAddr = "192.168.1.20:55436".parse().unwrap();

        session.handle_discovery_packet(&packet, from).unwrap();

        match rx.try_recv().unwrap() {
            NetplayEvent::DeviceDiscovered(device) => {
                assert_eq!(device.device_name, "brick");
                assert_eq!(device.ip, from.ip());
                assert_eq!(device.port, session.config().tcp_port);
                assert!(device.is_host);
                assert_eq!(device.player_count, 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn non_discovery_packets_are_rejected() {
        let (session, _rx) = NetplaySession::new(loopback_config());
        let from: SocketAddr = "127.0.0.1:1".parse().unwrap();

        let ping = encode_packet(PacketType::Ping, 0, &[]).unwrap();
        assert!(matches!(
            session.handle_discovery_packet(&ping, from),
            Err(NetplayError::UnexpectedPacket(PacketType::Ping))
        ));
        assert!(matches!(
            session.handle_discovery_packet(&[0u8; 4], from),
            Err(NetplayError::Protocol(_))
        ));
    }
}
