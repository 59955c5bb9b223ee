use std::net::{TcpListener, UdpSocket};
use std::sync::Arc;

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender};
use nextui_netproto::{
    PacketType,
    constants::{MAX_PAYLOAD, MAX_PEERS},
    encode_message, encode_packet,
    messages::{discovery::truncate_device_name, input::InputState},
};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::{
    config::NetplayConfig,
    error::NetplayError,
    event::NetplayEvent,
    framing::PacketOwned,
    latency::LatencyTracker,
    peer::PeerLink,
    state::{Role, SessionState},
};

/// Mutable session fields, all guarded by one lock.
///
/// Socket handles are reference counted so callers can clone them out and
/// do I/O after releasing the lock.
#[derive(Debug)]
pub(crate) struct SessionInner {
    pub(crate) state: SessionState,
    pub(crate) role: Role,

    /// Host only.
    pub(crate) listener: Option<Arc<TcpListener>>,
    /// Host only. Slot index doubles as the remote input index.
    pub(crate) clients: [Option<Arc<PeerLink>>; MAX_PEERS],
    /// Client only.
    pub(crate) server: Option<Arc<PeerLink>>,

    pub(crate) discovery: Option<Arc<UdpSocket>>,
    /// Sequence number stamped on our own discovery broadcasts, so the
    /// socket can recognize them when they loop back.
    pub(crate) discovery_nonce: u32,

    pub(crate) local_input: InputState,
    pub(crate) remote_inputs: [InputState; MAX_PEERS],
    pub(crate) frame_count: u32,
    pub(crate) latency: LatencyTracker,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            state: SessionState::Idle,
            role: Role::None,
            listener: None,
            clients: Default::default(),
            server: None,
            discovery: None,
            discovery_nonce: rand::random(),
            local_input: InputState::default(),
            remote_inputs: [InputState::default(); MAX_PEERS],
            frame_count: 0,
            latency: LatencyTracker::new(),
        }
    }

    pub(crate) fn client_count(&self) -> usize {
        self.clients.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether `link` still occupies `slot`.
    pub(crate) fn owns_slot(&self, slot: usize, link: &Arc<PeerLink>) -> bool {
        self.clients
            .get(slot)
            .and_then(Option::as_ref)
            .is_some_and(|l| Arc::ptr_eq(l, link))
    }

    /// Everyone outbound traffic should go to in the current role.
    pub(crate) fn peers(&self) -> Vec<Arc<PeerLink>> {
        match self.role {
            Role::Host => self.clients.iter().flatten().cloned().collect(),
            Role::Client if self.state == SessionState::Connected => {
                self.server.iter().cloned().collect()
            }
            _ => Vec::new(),
        }
    }
}

/// A LAN netplay session.
///
/// The session is driven entirely by its caller: call [`poll_host`] or
/// [`poll_client`] (and [`poll_discovery`] while discovery runs) once per
/// frame, and read [`NetplayEvent`]s from the receiver returned by
/// [`NetplaySession::new`]. Every method takes `&self`, so the session can be
/// shared between threads; socket I/O never happens while the internal lock
/// is held.
///
/// [`poll_host`]: NetplaySession::poll_host
/// [`poll_client`]: NetplaySession::poll_client
/// [`poll_discovery`]: NetplaySession::poll_discovery
#[derive(Debug)]
pub struct NetplaySession {
    pub(crate) config: NetplayConfig,
    pub(crate) inner: Mutex<SessionInner>,
    events: Sender<NetplayEvent>,
}

impl NetplaySession {
    /// Create an idle session and the channel its events are delivered on.
    pub fn new(mut config: NetplayConfig) -> (Self, Receiver<NetplayEvent>) {
        config.device_name = truncate_device_name(&config.device_name).to_string();
        let (events, rx) = crossbeam_channel::unbounded();

        info!(device = %config.device_name, "initialized netplay session");

        (
            Self {
                config,
                inner: Mutex::new(SessionInner::new()),
                events,
            },
            rx,
        )
    }

    /// Tear everything down: hosting, client connection and discovery.
    pub fn quit(&self) {
        self.stop_hosting();
        self.disconnect();
        self.stop_discovery();
        info!("netplay shut down");
    }

    pub fn config(&self) -> &NetplayConfig {
        &self.config
    }

    pub fn device_name(&self) -> &str {
        &self.config.device_name
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn role(&self) -> Role {
        self.inner.lock().role
    }

    pub fn client_count(&self) -> usize {
        self.inner.lock().client_count()
    }

    pub fn frame_count(&self) -> u32 {
        self.inner.lock().frame_count
    }

    /// Last measured one-way latency in milliseconds (0 until a pong arrives).
    pub fn latency_ms(&self) -> u32 {
        self.inner.lock().latency.latency_ms()
    }

    /// Session-clock time of the last valid pong, `None` before the first.
    pub fn last_pong_ms(&self) -> Option<u32> {
        self.inner.lock().latency.last_pong_ms()
    }

    pub fn set_local_input(&self, input: InputState) {
        self.inner.lock().local_input = input;
    }

    pub fn local_input(&self) -> InputState {
        self.inner.lock().local_input
    }

    /// Latest input received for `index`; `None` if `index >= MAX_PEERS`.
    pub fn remote_input(&self, index: usize) -> Option<InputState> {
        self.inner.lock().remote_inputs.get(index).copied()
    }

    /// Send the local input to every peer and advance the frame counter.
    ///
    /// The packet sequence is the frame count before the increment. The
    /// counter advances on every call, even with nobody to send to.
    pub fn send_input(&self) {
        let (frame, input, peers) = {
            let mut inner = self.inner.lock();
            let frame = inner.frame_count;
            inner.frame_count = frame.wrapping_add(1);
            (frame, inner.local_input, inner.peers())
        };

        if peers.is_empty() {
            return;
        }

        match encode_message(PacketType::InputState, frame, &input) {
            Ok(packet) => self.send_to_all(&peers, &packet, "input"),
            Err(e) => warn!(error = %e, "failed to encode input"),
        }
    }

    /// Send an opaque state blob to every peer, tagged with the current frame.
    pub fn send_state(&self, data: &[u8]) -> Result<(), NetplayError> {
        if data.len() > MAX_PAYLOAD {
            return Err(nextui_netproto::ProtoError::PayloadTooLarge(data.len()).into());
        }

        let (frame, peers) = {
            let inner = self.inner.lock();
            if inner.role == Role::None {
                return Err(NetplayError::NotConnected);
            }
            (inner.frame_count, inner.peers())
        };

        let packet = encode_packet(PacketType::StateSync, frame, data)?;
        self.send_to_all(&peers, &packet, "state");
        Ok(())
    }

    /// Polling counterpart of the `StateReceived` event. It never yields
    /// data; state only arrives through events.
    pub fn receive_state(&self, _out: &mut [u8]) -> Result<usize, NetplayError> {
        if self.state() == SessionState::Connected {
            Err(NetplayError::StatePollUnsupported)
        } else {
            Err(NetplayError::NotConnected)
        }
    }

    /// Send a timestamped ping to the host, or to every client when hosting.
    pub fn send_ping(&self) {
        let (frame, ping, peers) = {
            let mut inner = self.inner.lock();
            let peers = inner.peers();
            if peers.is_empty() {
                debug!("no peers to ping");
                return;
            }
            (inner.frame_count, inner.latency.stamp_ping(), peers)
        };

        match encode_message(PacketType::Ping, frame, &ping) {
            Ok(packet) => self.send_to_all(&peers, &packet, "ping"),
            Err(e) => warn!(error = %e, "failed to encode ping"),
        }
    }

    pub(crate) fn emit(&self, event: NetplayEvent) {
        // Nobody listening is fine; events are advisory.
        let _ = self.events.send(event);
    }

    /// Echo a ping back with the same payload and sequence.
    pub(crate) fn answer_ping(&self, link: &PeerLink, packet: &PacketOwned) {
        if let Err(e) = send_packet(link, PacketType::Pong, packet.sequence(), &packet.payload) {
            warn!(peer = %link.addr(), error = %e, "failed to send pong");
        }
    }

    pub(crate) fn record_pong(&self, link: &PeerLink, payload: &Bytes) {
        let mut inner = self.inner.lock();
        let now = inner.latency.now_ms();
        match inner.latency.record_pong(payload, now) {
            Some(latency_ms) => trace!(peer = %link.addr(), latency_ms, "pong"),
            None => debug!(peer = %link.addr(), len = payload.len(), "pong without timestamp"),
        }
    }

    fn send_to_all(&self, peers: &[Arc<PeerLink>], packet: &[u8], what: &str) {
        for link in peers {
            if let Err(e) = link.send(packet) {
                warn!(peer = %link.addr(), error = %e, "failed to send {what}");
            }
        }
    }
}

impl Drop for NetplaySession {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        for link in inner.clients.iter().flatten().chain(inner.server.iter()) {
            link.close();
        }
    }
}

/// Encode and write one packet.
pub(crate) fn send_packet(
    link: &PeerLink,
    packet_type: PacketType,
    sequence: u32,
    payload: &[u8],
) -> Result<(), NetplayError> {
    let packet = encode_packet(packet_type, sequence, payload)?;
    link.send(&packet)?;
    Ok(())
}
