//! Host side: accept loop, client slots and per-client packet dispatch.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;

use nextui_netproto::{PacketType, messages::input::InputState};
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
    /// Start listening for clients on the configured TCP port.
    pub fn start_hosting(&self) -> Result<(), NetplayError> {
        {
            let inner = self.inner.lock();
            if inner.role != Role::None {
                return Err(NetplayError::AlreadyActive);
            }
            if inner.state != SessionState::Idle {
                return Err(NetplayError::InvalidState(inner.state));
            }
        }

        let bind = SocketAddr::new(self.config.bind_ip, self.config.tcp_port);
        let listener = TcpListener::bind(bind)?;
        listener.set_nonblocking(true)?;
        let local = listener.local_addr()?;

        {
            let mut inner = self.inner.lock();
            if inner.role != Role::None || inner.state != SessionState::Idle {
                return Err(NetplayError::AlreadyActive);
            }
            inner.listener = Some(Arc::new(listener));
            inner.clients = Default::default();
            inner.role = Role::Host;
            inner.state = SessionState::Hosting;
            inner.frame_count = 0;
        }

        info!(%local, "started hosting");
        self.emit(NetplayEvent::ConnectionStateChanged(SessionState::Hosting));
        Ok(())
    }

    /// Close the listener and every client connection and return to idle.
    ///
    /// Connected clients get a best-effort `Disconnect` first. Also clears
    /// the `Error` state left by a failed connect. Does nothing while the
    /// session is a client.
    pub fn stop_hosting(&self) {
        let (listener, clients, changed) = {
            let mut inner = self.inner.lock();
            if inner.role == Role::Client {
                debug!("stop_hosting ignored: session is a client");
                return;
            }
            let listener = inner.listener.take();
            let clients: Vec<_> = inner.clients.iter_mut().filter_map(Option::take).collect();
            let changed = inner.state != SessionState::Idle;
            inner.role = Role::None;
            inner.state = SessionState::Idle;
            (listener, clients, changed)
        };

        for link in &clients {
            if let Err(e) = send_packet(link, PacketType::Disconnect, 0, &[]) {
                debug!(peer = %link.addr(), error = %e, "failed to send disconnect notice");
            }
            link.close();
        }

        if listener.is_some() {
            info!(clients = clients.len(), "stopped hosting");
        }
        if changed {
            self.emit(NetplayEvent::ConnectionStateChanged(SessionState::Idle));
        }
    }

    /// Drive the host for one tick.
    ///
    /// Accepts at most one new client, then performs one read per connected
    /// client and dispatches whatever packets completed. Returns the number
    /// of connected clients, or `NotHosting` if there is no active listener.
    pub fn poll_host(&self) -> Result<usize, NetplayError> {
        let listener = {
            let inner = self.inner.lock();
            match (&inner.listener, inner.state) {
                (Some(listener), SessionState::Hosting) => Arc::clone(listener),
                _ => return Err(NetplayError::NotHosting),
            }
        };

        self.accept_one(&listener);

        let links: Vec<(usize, Arc<PeerLink>)> = {
            let inner = self.inner.lock();
            inner
                .clients
                .iter()
                .enumerate()
                .filter_map(|(slot, link)| link.as_ref().map(|l| (slot, Arc::clone(l))))
                .collect()
        };

        for (slot, link) in links {
            match link.recv() {
                RecvOutcome::Idle => {}
                RecvOutcome::Closed => self.drop_client(slot, &link, "closed by peer"),
                RecvOutcome::Failed(e) => {
                    debug!(slot, peer = %link.addr(), error = %e, "client read failed");
                    self.drop_client(slot, &link, "read error");
                }
                RecvOutcome::Invalid { bytes, error } => {
                    warn!(slot, peer = %link.addr(), bytes, %error, "dropping invalid packet data");
                }
                RecvOutcome::Data { packets, .. } => {
                    for packet in packets {
                        if !self.dispatch_host_packet(slot, &link, packet) {
                            break;
                        }
                    }
                }
            }
        }

        Ok(self.inner.lock().client_count())
    }

    /// Address the listener is bound to, when hosting.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        let inner = self.inner.lock();
        inner.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Remote addresses of the occupied client slots, by slot.
    pub fn client_addrs(&self) -> Vec<(usize, SocketAddr)> {
        let inner = self.inner.lock();
        inner
            .clients
            .iter()
            .enumerate()
            .filter_map(|(slot, link)| link.as_ref().map(|l| (slot, l.addr())))
            .collect()
    }

    fn accept_one(&self, listener: &TcpListener) {
        let (stream, addr) = match listener.accept() {
            Ok(conn) => conn,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return,
            Err(e) => {
                warn!(error = %e, "accept failed");
                return;
            }
        };

        let link = match PeerLink::new(stream, addr) {
            Ok(link) => Arc::new(link),
            Err(e) => {
                warn!(%addr, error = %e, "failed to configure client socket");
                return;
            }
        };

        let (slot, state) = {
            let mut inner = self.inner.lock();
            let free = inner.clients.iter().position(Option::is_none);
            match free {
                Some(slot) if inner.state == SessionState::Hosting => {
                    inner.clients[slot] = Some(Arc::clone(&link));
                    (slot, inner.state)
                }
                _ => {
                    drop(inner);
                    info!(%addr, "connection rejected (max peers reached)");
                    link.close();
                    return;
                }
            }
        };

        info!(slot, %addr, "client connected");
        if let Err(e) = send_packet(&link, PacketType::ConnectResponse, 0, &[]) {
            warn!(slot, %addr, error = %e, "failed to send connect response");
        }
        self.emit(NetplayEvent::ConnectionStateChanged(state));
    }

    /// Handle one packet from the client in `slot`. Returns `false` once the
    /// slot has been released and the remaining packets should be skipped.
    fn dispatch_host_packet(&self, slot: usize, link: &Arc<PeerLink>, packet: PacketOwned) -> bool {
        match packet.packet_type {
            PacketType::InputState => match InputState::decode(&packet.payload) {
                Ok(input) => {
                    {
                        let mut inner = self.inner.lock();
                        if !inner.owns_slot(slot, link) {
                            return false;
                        }
                        inner.remote_inputs[slot] = input;
                    }
                    self.emit(NetplayEvent::InputReceived {
                        slot,
                        frame: packet.sequence(),
                        input,
                    });
                }
                Err(e) => warn!(slot, error = %e, "dropping malformed input"),
            },
            PacketType::StateSync => self.emit(NetplayEvent::StateReceived {
                frame: packet.sequence(),
                data: packet.payload,
            }),
            PacketType::Ping => self.answer_ping(link, &packet),
            PacketType::Pong => self.record_pong(link, &packet.payload),
            PacketType::Disconnect => {
                self.drop_client(slot, link, "disconnect notice");
                return false;
            }
            other => debug!(slot, packet_type = ?other, "ignoring packet"),
        }
        true
    }

    /// Release `slot` if `link` still owns it.
    fn drop_client(&self, slot: usize, link: &Arc<PeerLink>, reason: &str) {
        let now_empty = {
            let mut inner = self.inner.lock();
            if !inner.owns_slot(slot, link) {
                return;
            }
            inner.clients[slot] = None;
            if inner.client_count() == 0 && inner.role == Role::Host {
                inner.state = SessionState::Hosting;
                Some(inner.state)
            } else {
                None
            }
        };

        link.close();
        info!(slot, peer = %link.addr(), reason, "client disconnected");

        if let Some(state) = now_empty {
            self.emit(NetplayEvent::ConnectionStateChanged(state));
        }
    }
}
