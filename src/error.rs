// error.rs - Unified error taxonomy for the public API and wire codec.
use std::fmt;
use std::io;

/// Errors surfaced at the public API boundary (§7 of the design).
#[derive(Debug)]
pub enum HudpError {
    /// An operation was invoked against an endpoint built for the other role.
    WrongRole,
    /// `send` was called with a payload larger than `MAX_PAYLOAD_SIZE`.
    PayloadTooLarge { len: usize, max: usize },
    /// Reliable `send` was called while the sender's window was full.
    WindowFull,
    /// A received datagram could not be decoded.
    Malformed(&'static str),
    /// A transient I/O failure on the underlying socket.
    SocketIo(io::Error),
}

impl fmt::Display for HudpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HudpError::WrongRole => write!(f, "operation not valid for this endpoint's role"),
            HudpError::PayloadTooLarge { len, max } => {
                write!(f, "payload too large: {len} > {max}")
            }
            HudpError::WindowFull => write!(f, "reliable send window is full"),
            HudpError::Malformed(reason) => write!(f, "malformed packet: {reason}"),
            HudpError::SocketIo(e) => write!(f, "socket error: {e}"),
        }
    }
}

impl std::error::Error for HudpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HudpError::SocketIo(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for HudpError {
    fn from(err: io::Error) -> Self {
        HudpError::SocketIo(err)
    }
}

impl From<crate::socket::SocketError> for HudpError {
    fn from(err: crate::socket::SocketError) -> Self {
        match err {
            crate::socket::SocketError::Io(e) => HudpError::SocketIo(e),
        }
    }
}

/// Errors from validating a [`crate::config::NetworkConfig`].
#[derive(Debug)]
pub enum ConfigError {
    MissingRemoteAddr,
    NonPositiveTimeout(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRemoteAddr => {
                write!(f, "sender role requires a remote_addr")
            }
            ConfigError::NonPositiveTimeout(which) => {
                write!(f, "{which} must be a positive duration")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
