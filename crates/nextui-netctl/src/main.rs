use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use nextui_netctl::{Driver, Mode, TickOptions};
use nextui_netplay::{DISCOVERY_PORT, NETPLAY_PORT, NetplayConfig, NetplaySession};

/// NextUI LAN netplay tool
#[derive(Parser, Debug)]
#[command(name = "nextui-netctl")]
#[command(about = "Host, join or discover NextUI netplay sessions", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Device name advertised to other devices
    #[arg(short, long, default_value = "netctl")]
    name: String,

    /// Local bind address for the listener and discovery socket
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// TCP control port
    #[arg(short, long, default_value_t = NETPLAY_PORT)]
    port: u16,

    /// UDP discovery port
    #[arg(long, default_value_t = DISCOVERY_PORT)]
    discovery_port: u16,

    /// Destination for discovery broadcasts (defaults to 255.255.255.255 on the discovery port)
    #[arg(long)]
    broadcast: Option<SocketAddr>,

    /// Connect and handshake timeout in seconds
    #[arg(long, default_value = "10")]
    timeout_secs: u64,

    /// Frame interval in milliseconds
    #[arg(long, default_value = "16")]
    tick_ms: u64,

    /// Stop after this many frames
    #[arg(long)]
    ticks: Option<u64>,

    /// Ping every N frames (0 disables)
    #[arg(long, default_value = "60")]
    ping_every: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Host a session
    Host {
        /// Also answer discovery broadcasts
        #[arg(long)]
        discoverable: bool,
    },
    /// Join the host at the given IP
    Join { ip: String },
    /// Broadcast discovery and list devices that answer
    Discover,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let timeout = Duration::from_secs(args.timeout_secs);
    let config = NetplayConfig {
        bind_ip: args.bind,
        tcp_port: args.port,
        discovery_port: args.discovery_port,
        broadcast_addr: args
            .broadcast
            .unwrap_or_else(|| NetplayConfig::default().broadcast_addr),
        connect_timeout: timeout,
        handshake_timeout: timeout,
        ..NetplayConfig::new(args.name)
    };

    let mode = match args.command {
        Command::Host { discoverable } => Mode::Host { discoverable },
        Command::Join { ip } => Mode::Join { host_ip: ip },
        Command::Discover => Mode::Discover,
    };

    let opts = TickOptions {
        tick: Duration::from_millis(args.tick_ms),
        max_ticks: args.ticks,
        ping_every: args.ping_every,
        ..TickOptions::default()
    };

    let (session, events) = NetplaySession::new(config);
    let summary = Driver::new(session, events, mode, opts).run()?;

    info!(
        ticks = summary.ticks,
        inputs = summary.inputs_received,
        states = summary.states_received,
        devices = summary.devices.len(),
        "done"
    );
    for device in &summary.devices {
        println!(
            "{}\t{}:{}\t{}\t{} player(s)",
            device.device_name,
            device.ip,
            device.port,
            if device.is_host { "host" } else { "idle" },
            device.player_count
        );
    }
    Ok(())
}
