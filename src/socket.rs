//! Blocking UDP socket wrapper shared across threads via `Arc`.
use std::io::{Error as IoError, ErrorKind};
use std::net::{SocketAddr, UdpSocket as StdUdpSocket};
use std::time::{Duration, Instant};

use crate::stats::SocketStats;

/// Maximum size of a single UDP datagram we will ever read.
const MAX_UDP_PACKET_SIZE: usize = 65536;

/// Errors that can occur during socket operations. Per the redesign note on
/// platform I/O errors, everything platform-specific collapses into one
/// `Io` variant — callers distinguish a timeout (`ErrorKind::WouldBlock` /
/// `ErrorKind::TimedOut`) from a genuine failure by inspecting the kind.
#[derive(Debug)]
pub enum SocketError {
    Io(IoError),
}

impl SocketError {
    /// True for a read that simply hit its configured timeout — the
    /// dispatcher treats this as "nothing to do this tick", not a failure.
    pub fn is_timeout(&self) -> bool {
        match self {
            SocketError::Io(e) => {
                matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
            }
        }
    }
}

impl std::fmt::Display for SocketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SocketError::Io(e) => write!(f, "socket io error: {e}"),
        }
    }
}

impl std::error::Error for SocketError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SocketError::Io(e) => Some(e),
        }
    }
}

impl From<IoError> for SocketError {
    fn from(err: IoError) -> Self {
        SocketError::Io(err)
    }
}

/// Blocking UDP socket with a settable read timeout and per-socket
/// statistics. Wraps `std::net::UdpSocket`, which is already safe to share
/// behind an `Arc` for concurrent `send_to`/`recv_from` from separate
/// threads (the dispatcher reads, senders write).
pub struct UdpSocket {
    socket: StdUdpSocket,
    stats: std::sync::Mutex<SocketStats>,
}

impl UdpSocket {
    /// Binds a new socket at `addr` with blocking reads and no timeout set.
    pub fn bind(addr: SocketAddr) -> Result<Self, SocketError> {
        let socket = StdUdpSocket::bind(addr)?;
        Ok(Self {
            socket,
            stats: std::sync::Mutex::new(SocketStats::default()),
        })
    }

    /// Returns the local address this socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        Ok(self.socket.local_addr()?)
    }

    /// Sends `data` to `addr`.
    pub fn send_to(&self, data: &[u8], addr: SocketAddr) -> Result<usize, SocketError> {
        let sent = self.socket.send_to(data, addr)?;
        let mut stats = self.stats.lock().unwrap();
        stats.bytes_sent += sent as u64;
        stats.packets_sent += 1;
        stats.last_send_time = Some(Instant::now());
        Ok(sent)
    }

    /// Blocks (up to the configured read timeout) for a single datagram,
    /// returning its bytes and sender address.
    pub fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr), SocketError> {
        let mut buf = vec![0u8; MAX_UDP_PACKET_SIZE];
        let (len, addr) = self.socket.recv_from(&mut buf)?;
        buf.truncate(len);
        let mut stats = self.stats.lock().unwrap();
        stats.bytes_received += len as u64;
        stats.packets_received += 1;
        stats.last_receive_time = Some(Instant::now());
        Ok((buf, addr))
    }

    /// Sets the read timeout used by `recv_from`. The dispatcher sets this
    /// once at startup so its receive loop can periodically check a
    /// shutdown flag instead of blocking forever.
    pub fn set_read_timeout(&self, dur: Option<Duration>) -> Result<(), SocketError> {
        self.socket.set_read_timeout(dur)?;
        Ok(())
    }

    /// Returns a snapshot of socket statistics.
    pub fn stats(&self) -> SocketStats {
        self.stats.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> UdpSocket {
        UdpSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap()
    }

    #[test]
    fn send_and_recv_round_trip() {
        let a = loopback();
        let b = loopback();
        let b_addr = b.local_addr().unwrap();

        a.send_to(b"ping", b_addr).unwrap();
        let (data, _) = b.recv_from().unwrap();
        assert_eq!(data, b"ping");
        assert_eq!(b.stats().packets_received, 1);
    }

    #[test]
    fn read_timeout_surfaces_as_timeout_error() {
        let a = loopback();
        a.set_read_timeout(Some(Duration::from_millis(20))).unwrap();
        let err = a.recv_from().unwrap_err();
        assert!(err.is_timeout());
    }
}
