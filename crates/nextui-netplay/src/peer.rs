//! One established TCP connection (host-side client slot or client-side
//! link to the host).

use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

use nextui_netproto::{ProtoError, constants::MAX_PACKET_SIZE};
use parking_lot::Mutex;
use tracing::trace;

use crate::framing::{PacketFramer, PacketOwned};

/// Result of one non-blocking read.
#[derive(Debug)]
pub(crate) enum RecvOutcome {
    /// Nothing to read this tick.
    Idle,
    /// The peer closed the connection (read returned 0).
    Closed,
    /// The read failed with a hard error.
    Failed(io::Error),
    /// `bytes` were read; `packets` are the ones now complete.
    Data {
        bytes: usize,
        packets: Vec<PacketOwned>,
    },
    /// `bytes` were read but the buffered stream failed validation and was dropped.
    Invalid { bytes: usize, error: ProtoError },
}

/// Shared between the session table and whoever is doing I/O on it.
///
/// Sessions hand out `Arc<PeerLink>` clones and perform I/O without holding
/// the session lock, so the link may be closed by another caller at any
/// time. Closing shuts the socket down, which makes in-flight reads and
/// writes fail instead of touching a reused descriptor.
#[derive(Debug)]
pub(crate) struct PeerLink {
    stream: TcpStream,
    addr: SocketAddr,
    framer: Mutex<PacketFramer>,
}

impl PeerLink {
    /// Wrap a connected stream and switch it to non-blocking mode.
    pub(crate) fn new(stream: TcpStream, addr: SocketAddr) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        let _ = stream.set_nodelay(true);
        Ok(Self {
            stream,
            addr,
            framer: Mutex::new(PacketFramer::new(MAX_PACKET_SIZE)),
        })
    }

    pub(crate) fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Write a whole packet. A short write counts as failure.
    ///
    /// The socket is non-blocking, so `write_all` can stop with `WouldBlock`
    /// after part of the packet went out. The peer then sees a truncated
    /// packet followed by whatever is sent next, which desyncs its framer
    /// until a bad header makes it drop the buffered bytes.
    pub(crate) fn send(&self, packet: &[u8]) -> io::Result<()> {
        (&self.stream).write_all(packet)
    }

    /// Perform at most one non-blocking read and decode what is complete.
    ///
    /// The framer lock is held across the read so concurrent pollers append
    /// their chunks in stream order.
    pub(crate) fn recv(&self) -> RecvOutcome {
        let mut framer = self.framer.lock();
        let mut buf = [0u8; MAX_PACKET_SIZE];
        let n = match (&self.stream).read(&mut buf) {
            Ok(0) => return RecvOutcome::Closed,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return RecvOutcome::Idle,
            Err(e) if e.kind() == ErrorKind::Interrupted => return RecvOutcome::Idle,
            Err(e) => return RecvOutcome::Failed(e),
        };

        trace!(peer = %self.addr, bytes = n, "recv");

        framer.extend(&buf[..n]);
        match framer.drain_packets() {
            Ok(packets) => RecvOutcome::Data { bytes: n, packets },
            Err(error) => RecvOutcome::Invalid { bytes: n, error },
        }
    }

    pub(crate) fn close(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
