//! Client side: bounded connect/handshake, per-tick receive and disconnect.

use std::io::{ErrorKind, Read};
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::sync::Arc;

use nextui_netproto::{Header, PacketType, constants::HEADER_LEN, messages::input::InputState};
use tracing::{debug, info, warn};

use crate::{
    error::NetplayError,
    event::NetplayEvent,
    framing::PacketOwned,
    peer::{PeerLink, RecvOutcome},
    session::{NetplaySession, send_packet},
    state::{Role, SessionState},
};

impl NetplaySession {
    /// Connect to a host by IP address on the configured TCP port.
    pub fn connect_to_host(&self, host_ip: &str) -> Result<(), NetplayError> {
        let ip: IpAddr = host_ip
            .parse()
            .map_err(|e| NetplayError::InvalidAddress(format!("{host_ip}: {e}")))?;
        self.connect_to_addr(SocketAddr::new(ip, self.config.tcp_port))
    }

    /// Connect to a host and wait for its `ConnectResponse`.
    ///
    /// Blocks the caller for at most `connect_timeout + handshake_timeout`.
    /// On failure the session moves to `Error` and stays there until
    /// [`disconnect`](Self::disconnect) or [`stop_hosting`](Self::stop_hosting).
    pub fn connect_to_addr(&self, addr: SocketAddr) -> Result<(), NetplayError> {
        {
            let mut inner = self.inner.lock();
            match inner.state {
                SessionState::Idle => {}
                SessionState::Error => return Err(NetplayError::InvalidState(inner.state)),
                _ => return Err(NetplayError::AlreadyActive),
            }
            inner.state = SessionState::Connecting;
        }
        self.emit(NetplayEvent::ConnectionStateChanged(
            SessionState::Connecting,
        ));
        info!(%addr, "connecting to host");

        let link = match self.handshake(addr) {
            Ok(stream) => match PeerLink::new(stream, addr) {
                Ok(link) => Arc::new(link),
                Err(e) => return Err(self.fail_connect(addr, e.into())),
            },
            Err(e) => return Err(self.fail_connect(addr, e)),
        };

        {
            let mut inner = self.inner.lock();
            if inner.state != SessionState::Connecting {
                drop(inner);
                link.close();
                return Err(NetplayError::HandshakeFailed(
                    "connection attempt cancelled".to_string(),
                ));
            }
            inner.server = Some(link);
            inner.role = Role::Client;
            inner.state = SessionState::Connected;
            inner.frame_count = 0;
        }

        info!(%addr, "connected to host");
        self.emit(NetplayEvent::ConnectionStateChanged(SessionState::Connected));
        Ok(())
    }

    /// Leave the host: best-effort `Disconnect` notice, close, back to idle.
    ///
    /// Also clears the `Error` state. Does nothing while hosting; use
    /// [`stop_hosting`](Self::stop_hosting) for that.
    pub fn disconnect(&self) {
        let (server, changed) = {
            let mut inner = self.inner.lock();
            if inner.role == Role::Host {
                debug!("disconnect ignored: session is hosting");
                return;
            }
            let server = inner.server.take();
            let changed = inner.state != SessionState::Idle;
            inner.role = Role::None;
            inner.state = SessionState::Idle;
            (server, changed)
        };

        if let Some(link) = server {
            if let Err(e) = send_packet(&link, PacketType::Disconnect, 0, &[]) {
                warn!(peer = %link.addr(), error = %e, "failed to send disconnect notice");
            }
            link.close();
            info!(peer = %link.addr(), "disconnected");
        }

        if changed {
            self.emit(NetplayEvent::ConnectionStateChanged(SessionState::Idle));
        }
    }

    /// Drive the client for one tick.
    ///
    /// Performs one read from the host. Returns the number of bytes read,
    /// `0` when nothing was waiting. A closed connection or a stream that
    /// fails validation is reported as an error without tearing the
    /// session down; the caller decides whether to `disconnect`.
    pub fn poll_client(&self) -> Result<usize, NetplayError> {
        let link = {
            let inner = self.inner.lock();
            match (&inner.server, inner.state) {
                (Some(link), SessionState::Connected) => Arc::clone(link),
                _ => return Err(NetplayError::NotConnected),
            }
        };

        match link.recv() {
            RecvOutcome::Idle => Ok(0),
            RecvOutcome::Closed => Err(NetplayError::ConnectionClosed),
            RecvOutcome::Failed(e) => Err(e.into()),
            RecvOutcome::Invalid { bytes, error } => {
                warn!(peer = %link.addr(), bytes, %error, "dropping invalid packet data");
                Err(error.into())
            }
            RecvOutcome::Data { bytes, packets } => {
                for packet in packets {
                    if !self.dispatch_client_packet(&link, packet) {
                        break;
                    }
                }
                Ok(bytes)
            }
        }
    }

    fn handshake(&self, addr: SocketAddr) -> Result<TcpStream, NetplayError> {
        let stream = TcpStream::connect_timeout(&addr, self.config.connect_timeout)
            .map_err(|e| NetplayError::ConnectionFailed(format!("{addr}: {e}")))?;

        stream.set_read_timeout(Some(self.config.handshake_timeout))?;

        let mut hbuf = [0u8; HEADER_LEN];
        read_handshake(&stream, &mut hbuf)?;
        let header = Header::decode(&hbuf)?;

        // Drain the payload so the stream stays aligned on packet boundaries.
        let mut payload = vec![0u8; usize::from(header.length)];
        read_handshake(&stream, &mut payload)?;

        if header.packet_type != PacketType::ConnectResponse as u8 {
            return Err(NetplayError::HandshakeFailed(format!(
                "expected ConnectResponse, got packet type {}",
                header.packet_type
            )));
        }

        stream.set_read_timeout(None)?;
        Ok(stream)
    }

    fn fail_connect(&self, addr: SocketAddr, err: NetplayError) -> NetplayError {
        let changed = {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Connecting {
                inner.state = SessionState::Error;
                inner.role = Role::None;
                true
            } else {
                false
            }
        };

        warn!(%addr, error = %err, "connect failed");
        if changed {
            self.emit(NetplayEvent::ConnectionStateChanged(SessionState::Error));
        }
        err
    }

    /// Returns `false` once the link has been torn down.
    fn dispatch_client_packet(&self, link: &Arc<PeerLink>, packet: PacketOwned) -> bool {
        match packet.packet_type {
            PacketType::InputState => match InputState::decode(&packet.payload) {
                Ok(input) => {
                    self.inner.lock().remote_inputs[0] = input;
                    self.emit(NetplayEvent::InputReceived {
                        slot: 0,
                        frame: packet.sequence(),
                        input,
                    });
                }
                Err(e) => warn!(error = %e, "dropping malformed input"),
            },
            PacketType::StateSync => self.emit(NetplayEvent::StateReceived {
                frame: packet.sequence(),
                data: packet.payload,
            }),
            PacketType::Ping => self.answer_ping(link, &packet),
            PacketType::Pong => self.record_pong(link, &packet.payload),
            PacketType::Disconnect => {
                self.host_left(link);
                return false;
            }
            other => debug!(packet_type = ?other, "ignoring packet"),
        }
        true
    }

    fn host_left(&self, link: &Arc<PeerLink>) {
        {
            let mut inner = self.inner.lock();
            let current = inner
                .server
                .as_ref()
                .is_some_and(|l| Arc::ptr_eq(l, link));
            if !current {
                return;
            }
            inner.server = None;
            inner.role = Role::None;
            inner.state = SessionState::Idle;
        }

        link.close();
        info!(peer = %link.addr(), "host closed the session");
        self.emit(NetplayEvent::ConnectionStateChanged(SessionState::Idle));
    }
}

fn read_handshake(mut stream: &TcpStream, buf: &mut [u8]) -> Result<(), NetplayError> {
    stream.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => {
            NetplayError::HandshakeFailed("timed out waiting for connect response".to_string())
        }
        ErrorKind::UnexpectedEof => {
            NetplayError::HandshakeFailed("host closed the connection".to_string())
        }
        _ => NetplayError::Io(e),
    })
}
