//! Tick driver for `nextui-netctl`, kept out of `main` so tests can drive it.
//!
//! A [`Driver`] owns one [`NetplaySession`] and advances it one frame per
//! [`Driver::tick`], the same way a frontend would from its emulation loop.

use std::time::Duration;

use anyhow::Context;
use crossbeam_channel::Receiver;
use nextui_netplay::{
    DeviceDescriptor, InputState, NetplayError, NetplayEvent, NetplaySession, SessionState,
};
use tracing::{debug, info, warn};

/// What the driver does with its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Listen for clients; optionally answer discovery.
    Host { discoverable: bool },
    /// Connect to the host at this IP.
    Join { host_ip: String },
    /// Only broadcast discovery and list who answers.
    Discover,
}

#[derive(Debug, Clone)]
pub struct TickOptions {
    pub tick: Duration,
    /// Stop after this many ticks. `None` runs until the session ends.
    pub max_ticks: Option<u64>,
    /// Send a ping every this many ticks. `0` disables pinging.
    pub ping_every: u64,
    /// Broadcast a discovery announcement every this many ticks.
    pub announce_every: u64,
}

impl Default for TickOptions {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(16),
            max_ticks: None,
            ping_every: 60,
            announce_every: 60,
        }
    }
}

/// Totals gathered over a run.
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub ticks: u64,
    pub inputs_received: u64,
    pub states_received: u64,
    pub devices: Vec<DeviceDescriptor>,
    pub last_state: Option<SessionState>,
}

pub struct Driver {
    session: NetplaySession,
    events: Receiver<NetplayEvent>,
    mode: Mode,
    opts: TickOptions,
    summary: RunSummary,
}

impl Driver {
    pub fn new(
        session: NetplaySession,
        events: Receiver<NetplayEvent>,
        mode: Mode,
        opts: TickOptions,
    ) -> Self {
        Self {
            session,
            events,
            mode,
            opts,
            summary: RunSummary::default(),
        }
    }

    pub fn session(&self) -> &NetplaySession {
        &self.session
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Bring the session up for the selected mode.
    pub fn start(&mut self) -> anyhow::Result<()> {
        match &self.mode {
            Mode::Host { discoverable } => {
                self.session
                    .start_hosting()
                    .context("failed to start hosting")?;
                if *discoverable {
                    self.session
                        .start_discovery()
                        .context("failed to start discovery")?;
                }
                if let Some(addr) = self.session.local_addr() {
                    info!(%addr, "hosting");
                }
            }
            Mode::Join { host_ip } => {
                self.session
                    .connect_to_host(host_ip)
                    .with_context(|| format!("failed to join {host_ip}"))?;
            }
            Mode::Discover => {
                self.session
                    .start_discovery()
                    .context("failed to start discovery")?;
            }
        }
        self.drain_events();
        Ok(())
    }

    /// Advance one frame. Returns `false` once the session has ended.
    pub fn tick(&mut self) -> anyhow::Result<bool> {
        let tick = self.summary.ticks;
        self.summary.ticks += 1;

        if self.session.discovery_enabled() {
            if tick % self.opts.announce_every.max(1) == 0 {
                if let Err(e) = self.session.broadcast_discovery() {
                    warn!(error = %e, "discovery broadcast failed");
                }
            }
            self.session.poll_discovery()?;
        }

        let running = match &self.mode {
            Mode::Host { .. } => {
                self.session.poll_host()?;
                self.exchange(tick);
                true
            }
            Mode::Join { .. } => match self.session.poll_client() {
                Ok(_) if self.session.state() == SessionState::Connected => {
                    self.exchange(tick);
                    true
                }
                Ok(_) => false,
                Err(NetplayError::ConnectionClosed) => {
                    info!("host closed the connection");
                    false
                }
                Err(NetplayError::NotConnected) => false,
                Err(NetplayError::Protocol(e)) => {
                    debug!(error = %e, "skipping invalid data from host");
                    true
                }
                Err(e) => return Err(e.into()),
            },
            Mode::Discover => true,
        };

        self.drain_events();
        Ok(running)
    }

    /// Run until the tick budget is spent or the session ends, then shut
    /// the session down.
    pub fn run(mut self) -> anyhow::Result<RunSummary> {
        self.start()?;
        let result = self.run_ticks();
        self.session.quit();
        self.drain_events();
        result.map(|()| self.summary)
    }

    fn run_ticks(&mut self) -> anyhow::Result<()> {
        loop {
            if self
                .opts
                .max_ticks
                .is_some_and(|max| self.summary.ticks >= max)
            {
                return Ok(());
            }
            if !self.tick()? {
                return Ok(());
            }
            std::thread::sleep(self.opts.tick);
        }
    }

    fn exchange(&self, tick: u64) {
        self.session.set_local_input(demo_input(tick));
        self.session.send_input();

        if self.opts.ping_every > 0 && tick % self.opts.ping_every == 0 {
            self.session.send_ping();
            debug!(latency_ms = self.session.latency_ms(), "ping");
        }
    }

    fn drain_events(&mut self) {
        for event in self.events.try_iter() {
            match event {
                NetplayEvent::ConnectionStateChanged(state) => {
                    info!(?state, clients = self.session.client_count(), "state changed");
                    self.summary.last_state = Some(state);
                }
                NetplayEvent::DeviceDiscovered(device) => {
                    let known = self
                        .summary
                        .devices
                        .iter()
                        .any(|d| d.ip == device.ip && d.device_name == device.device_name);
                    if !known {
                        info!(
                            name = %device.device_name,
                            ip = %device.ip,
                            port = device.port,
                            is_host = device.is_host,
                            players = device.player_count,
                            "found device"
                        );
                        self.summary.devices.push(device);
                    }
                }
                NetplayEvent::InputReceived { slot, frame, input } => {
                    debug!(slot, frame, buttons = input.buttons, "input");
                    self.summary.inputs_received += 1;
                }
                NetplayEvent::StateReceived { frame, data } => {
                    info!(frame, bytes = data.len(), "state received");
                    self.summary.states_received += 1;
                }
            }
        }
    }
}

/// Deterministic input pattern so both ends can see traffic change.
fn demo_input(tick: u64) -> InputState {
    InputState {
        buttons: 1 << (tick % 12),
        ..InputState::default()
    }
}
