use std::io::{Read, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use nextui_netplay::{
    InputState, MAX_PEERS, NetplayConfig, NetplayError, NetplayEvent, NetplaySession, Role,
    SessionState, Stick,
};
use nextui_netproto::{PacketType, constants::HEADER_LEN, decode_packet, encode_message};

const DEADLINE: Duration = Duration::from_secs(5);

fn loopback(name: &str) -> NetplayConfig {
    NetplayConfig {
        bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        tcp_port: 0,
        discovery_port: 0,
        connect_timeout: Duration::from_secs(2),
        handshake_timeout: Duration::from_secs(2),
        ..NetplayConfig::new(name)
    }
}

fn spawn_host() -> (NetplaySession, Receiver<NetplayEvent>, SocketAddr) {
    let (host, rx) = NetplaySession::new(loopback("host"));
    host.start_hosting().unwrap();
    let addr = host.local_addr().unwrap();
    (host, rx, addr)
}

/// Connect a client on a helper thread while the host keeps polling, since
/// the handshake only completes once the host accepts.
fn connect_client(
    host: &NetplaySession,
    addr: SocketAddr,
    name: &str,
) -> (Arc<NetplaySession>, Receiver<NetplayEvent>) {
    let (client, rx) = NetplaySession::new(loopback(name));
    let client = Arc::new(client);

    let connecting = Arc::clone(&client);
    let handle = thread::spawn(move || connecting.connect_to_addr(addr));

    let start = Instant::now();
    while !handle.is_finished() {
        host.poll_host().unwrap();
        assert!(start.elapsed() < DEADLINE, "timed out waiting for handshake");
        thread::sleep(Duration::from_millis(5));
    }
    handle.join().unwrap().unwrap();

    (client, rx)
}

fn poll_until(what: &str, mut done: impl FnMut() -> bool) {
    let start = Instant::now();
    while !done() {
        assert!(start.elapsed() < DEADLINE, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}

fn states(rx: &Receiver<NetplayEvent>) -> Vec<SessionState> {
    rx.try_iter()
        .filter_map(|ev| match ev {
            NetplayEvent::ConnectionStateChanged(s) => Some(s),
            _ => None,
        })
        .collect()
}

#[test]
fn client_connects_and_both_sides_report_state() {
    let (host, host_rx, addr) = spawn_host();
    let (client, client_rx) = connect_client(&host, addr, "client");

    assert_eq!(client.state(), SessionState::Connected);
    assert_eq!(client.role(), Role::Client);
    assert_eq!(client.frame_count(), 0);
    assert_eq!(host.client_count(), 1);
    assert_eq!(host.client_addrs().len(), 1);

    assert_eq!(
        states(&client_rx),
        vec![SessionState::Connecting, SessionState::Connected]
    );
    assert_eq!(
        states(&host_rx),
        vec![SessionState::Hosting, SessionState::Hosting]
    );

    // Already connected.
    assert!(matches!(
        client.connect_to_addr(addr),
        Err(NetplayError::AlreadyActive)
    ));
}

#[test]
fn input_flows_both_ways() {
    let (host, host_rx, addr) = spawn_host();
    let (client, client_rx) = connect_client(&host, addr, "client");
    let _ = host_rx.try_iter().count();

    let from_client = InputState {
        port: 1,
        buttons: 0x0021,
        left: Stick { x: -120, y: 64 },
        ..InputState::default()
    };
    client.set_local_input(from_client);
    client.send_input();
    assert_eq!(client.frame_count(), 1);

    let mut received = None;
    poll_until("input on host", || {
        host.poll_host().unwrap();
        received = host_rx.try_iter().find_map(|ev| match ev {
            NetplayEvent::InputReceived { slot, frame, input } => Some((slot, frame, input)),
            _ => None,
        });
        received.is_some()
    });
    assert_eq!(received, Some((0, 0, from_client)));
    assert_eq!(host.remote_input(0), Some(from_client));

    let from_host = InputState {
        port: 0,
        buttons: 0x8000,
        right: Stick { x: 1, y: -1 },
        ..InputState::default()
    };
    host.set_local_input(from_host);
    host.send_input();
    host.send_input();
    assert_eq!(host.frame_count(), 2);

    let mut frames = Vec::new();
    poll_until("input on client", || {
        client.poll_client().unwrap();
        for ev in client_rx.try_iter() {
            if let NetplayEvent::InputReceived { slot, frame, input } = ev {
                assert_eq!(slot, 0);
                assert_eq!(input, from_host);
                frames.push(frame);
            }
        }
        frames.len() == 2
    });
    assert_eq!(frames, vec![0, 1]);
    assert_eq!(client.remote_input(0), Some(from_host));
}

#[test]
fn state_sync_reaches_client_with_frame() {
    let (host, _host_rx, addr) = spawn_host();
    let (client, client_rx) = connect_client(&host, addr, "client");

    host.send_input();
    host.send_input();
    let blob: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
    host.send_state(&blob).unwrap();

    let mut got = None;
    poll_until("state on client", || {
        client.poll_client().unwrap();
        got = client_rx.try_iter().find_map(|ev| match ev {
            NetplayEvent::StateReceived { frame, data } => Some((frame, data)),
            _ => None,
        });
        got.is_some()
    });
    let (frame, data) = got.unwrap();
    assert_eq!(frame, 2);
    assert_eq!(&data[..], &blob[..]);

    let mut buf = [0u8; 64];
    assert!(matches!(
        client.receive_state(&mut buf),
        Err(NetplayError::StatePollUnsupported)
    ));
}

#[test]
fn ping_pong_measures_latency() {
    let (host, _host_rx, addr) = spawn_host();
    let (client, _client_rx) = connect_client(&host, addr, "client");

    client.send_ping();

    // The only thing the host sends back is the pong.
    poll_until("pong on client", || {
        host.poll_host().unwrap();
        client.poll_client().unwrap() > 0
    });
    assert!(client.latency_ms() < 1000);
}

#[test]
fn fifth_client_is_rejected() {
    let (host, _host_rx, addr) = spawn_host();
    let clients: Vec<_> = (0..MAX_PEERS)
        .map(|i| connect_client(&host, addr, &format!("client-{i}")))
        .collect();
    assert_eq!(host.client_count(), MAX_PEERS);

    let mut extra = TcpStream::connect(addr).unwrap();
    for _ in 0..20 {
        assert_eq!(host.poll_host().unwrap(), MAX_PEERS);
        thread::sleep(Duration::from_millis(5));
    }

    extra
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let mut buf = [0u8; HEADER_LEN];
    match extra.read(&mut buf) {
        Ok(0) => {}
        Ok(n) => panic!("rejected client received {n} bytes"),
        Err(e) => assert_ne!(e.kind(), std::io::ErrorKind::WouldBlock, "socket left open"),
    }

    assert_eq!(host.client_count(), MAX_PEERS);
    for (client, _) in &clients {
        assert_eq!(client.state(), SessionState::Connected);
    }
}

#[test]
fn client_disconnect_frees_slot() {
    let (host, host_rx, addr) = spawn_host();
    let (client, client_rx) = connect_client(&host, addr, "client");
    let _ = host_rx.try_iter().count();
    let _ = client_rx.try_iter().count();

    client.disconnect();
    assert_eq!(client.state(), SessionState::Idle);
    assert_eq!(client.role(), Role::None);
    assert_eq!(states(&client_rx), vec![SessionState::Idle]);

    poll_until("slot release", || host.poll_host().unwrap() == 0);
    assert_eq!(host.state(), SessionState::Hosting);
    assert_eq!(states(&host_rx), vec![SessionState::Hosting]);
}

#[test]
fn stop_hosting_ends_client_session() {
    let (host, _host_rx, addr) = spawn_host();
    let (client, client_rx) = connect_client(&host, addr, "client");
    let _ = client_rx.try_iter().count();

    host.stop_hosting();
    assert_eq!(host.state(), SessionState::Idle);
    assert_eq!(host.role(), Role::None);
    assert_eq!(host.client_count(), 0);

    poll_until("client teardown", || {
        let _ = client.poll_client();
        client.state() == SessionState::Idle
    });
    assert_eq!(client.role(), Role::None);
    assert_eq!(states(&client_rx), vec![SessionState::Idle]);
}

#[test]
fn unreachable_host_fails_into_error() {
    let port = {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        listener.local_addr().unwrap().port()
    };

    let (client, rx) = NetplaySession::new(loopback("client"));
    let start = Instant::now();
    let result = client.connect_to_addr(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port));

    assert!(result.is_err());
    assert!(start.elapsed() < Duration::from_secs(10));
    assert_eq!(client.state(), SessionState::Error);
    assert_eq!(client.role(), Role::None);
    assert_eq!(
        states(&rx),
        vec![SessionState::Connecting, SessionState::Error]
    );

    client.stop_hosting();
    assert_eq!(client.state(), SessionState::Idle);
}

#[test]
fn invalid_data_does_not_tear_down_slot() {
    let (host, host_rx, addr) = spawn_host();

    let mut raw = TcpStream::connect(addr).unwrap();
    poll_until("raw accept", || host.poll_host().unwrap() == 1);

    raw.set_read_timeout(Some(DEADLINE)).unwrap();
    let mut hbuf = [0u8; HEADER_LEN];
    raw.read_exact(&mut hbuf).unwrap();
    let response = decode_packet(&hbuf).unwrap();
    assert_eq!(response.packet_type, PacketType::ConnectResponse);
    assert!(response.payload.is_empty());

    raw.write_all(&[0xEE; 32]).unwrap();
    for _ in 0..10 {
        assert_eq!(host.poll_host().unwrap(), 1);
        thread::sleep(Duration::from_millis(5));
    }

    let input = InputState {
        buttons: 0x0101,
        ..InputState::default()
    };
    raw.write_all(&encode_message(PacketType::InputState, 77, &input).unwrap())
        .unwrap();

    let mut got = None;
    poll_until("input after garbage", || {
        assert_eq!(host.poll_host().unwrap(), 1);
        got = host_rx.try_iter().find_map(|ev| match ev {
            NetplayEvent::InputReceived { frame, input, .. } => Some((frame, input)),
            _ => None,
        });
        got.is_some()
    });
    assert_eq!(got, Some((77, input)));
}

#[test]
fn host_answers_ping_with_same_timestamp() {
    let (host, _host_rx, addr) = spawn_host();

    let mut raw = TcpStream::connect(addr).unwrap();
    poll_until("raw accept", || host.poll_host().unwrap() == 1);
    raw.set_read_timeout(Some(DEADLINE)).unwrap();
    let mut hbuf = [0u8; HEADER_LEN];
    raw.read_exact(&mut hbuf).unwrap();

    let ping = encode_message(
        PacketType::Ping,
        5,
        &nextui_netproto::messages::sync::Ping { t_ms: 1000 },
    )
    .unwrap();
    raw.write_all(&ping).unwrap();

    for _ in 0..10 {
        host.poll_host().unwrap();
        thread::sleep(Duration::from_millis(5));
    }

    let mut pong = vec![0u8; HEADER_LEN + 4];
    raw.read_exact(&mut pong).unwrap();
    let view = decode_packet(&pong).unwrap();
    assert_eq!(view.packet_type, PacketType::Pong);
    assert_eq!(view.sequence(), 5);
    assert_eq!(view.payload, &1000u32.to_ne_bytes());
}

#[test]
fn client_answers_host_ping() {
    let (host, _host_rx, addr) = spawn_host();
    let (client, _client_rx) = connect_client(&host, addr, "client");
    assert_eq!(host.last_pong_ms(), None);

    host.send_ping();

    poll_until("pong on host", || {
        client.poll_client().unwrap();
        host.poll_host().unwrap();
        host.last_pong_ms().is_some()
    });
    assert!(host.latency_ms() < 1000);
    // The client only echoed; it measured nothing itself.
    assert_eq!(client.last_pong_ms(), None);
}

#[test]
fn client_state_reaches_host() {
    let (host, host_rx, addr) = spawn_host();
    let (client, _client_rx) = connect_client(&host, addr, "client");

    client.send_input();
    client.send_state(&[1, 2, 3]).unwrap();

    let mut got = None;
    poll_until("state on host", || {
        host.poll_host().unwrap();
        got = host_rx.try_iter().find_map(|ev| match ev {
            NetplayEvent::StateReceived { frame, data } => Some((frame, data)),
            _ => None,
        });
        got.is_some()
    });
    let (frame, data) = got.unwrap();
    assert_eq!(frame, 1);
    assert_eq!(&data[..], &[1, 2, 3]);
    assert_eq!(host.client_count(), 1);
}

#[test]
fn quit_tears_down_hosting_session() {
    let (host, host_rx, addr) = spawn_host();
    let (client, client_rx) = connect_client(&host, addr, "client");
    host.start_discovery().unwrap();
    let _ = host_rx.try_iter().count();
    let _ = client_rx.try_iter().count();

    host.quit();
    assert_eq!(host.state(), SessionState::Idle);
    assert_eq!(host.role(), Role::None);
    assert_eq!(host.client_count(), 0);
    assert!(host.local_addr().is_none());
    assert!(!host.discovery_enabled());
    assert_eq!(states(&host_rx), vec![SessionState::Idle]);
    assert!(matches!(host.poll_host(), Err(NetplayError::NotHosting)));

    poll_until("client teardown", || {
        let _ = client.poll_client();
        client.state() == SessionState::Idle
    });
    assert_eq!(states(&client_rx), vec![SessionState::Idle]);
}
