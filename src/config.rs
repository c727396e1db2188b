// config.rs - construction-time configuration and validation.
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::ConfigError;

/// Which side of the pair this endpoint plays. H-UDP has no client/server
/// asymmetry beyond this: both roles run the same state machines, a
/// `Sender` just additionally knows who to send to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

/// Validated construction parameters for an endpoint.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub role: Role,
    /// UDP port to bind. Always bound on `0.0.0.0` (all interfaces) per the
    /// wire contract — this crate never binds a narrower interface.
    pub local_port: u16,
    /// Required when `role == Role::Sender`.
    pub remote_addr: Option<SocketAddr>,
    pub window_size: u16,
    pub max_retries: u32,
    pub sender_timeout: Duration,
    pub receiver_timeout: Duration,
    /// Tick interval of the receiver's background skip-check thread.
    pub skip_check_interval: Duration,
    /// Whether to feed the optional in-memory delivery-tracking observer
    /// (`tracking::DeliveryTracker`). Defaults to on; set `false` to keep
    /// the send/deliver path free of that bookkeeping entirely.
    pub track_delivery: bool,
}

impl NetworkConfig {
    /// Window size used throughout the scenario tests and the reference
    /// behavior this protocol was specified against.
    pub const DEFAULT_WINDOW_SIZE: u16 = 32;
    pub const DEFAULT_MAX_RETRIES: u32 = 1;
    pub const DEFAULT_SENDER_TIMEOUT: Duration = Duration::from_millis(200);
    pub const DEFAULT_RECEIVER_TIMEOUT: Duration = Duration::from_millis(200);
    pub const DEFAULT_SKIP_CHECK_INTERVAL: Duration = Duration::from_millis(20);

    pub fn new(role: Role, local_port: u16) -> Self {
        Self {
            role,
            local_port,
            remote_addr: None,
            window_size: Self::DEFAULT_WINDOW_SIZE,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            sender_timeout: Self::DEFAULT_SENDER_TIMEOUT,
            receiver_timeout: Self::DEFAULT_RECEIVER_TIMEOUT,
            skip_check_interval: Self::DEFAULT_SKIP_CHECK_INTERVAL,
            track_delivery: true,
        }
    }

    /// The address this config's socket is bound to: `0.0.0.0:local_port`,
    /// per spec's "bound to all interfaces on the configured local port".
    pub fn local_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.local_port)
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn with_tracking(mut self, enabled: bool) -> Self {
        self.track_delivery = enabled;
        self
    }

    pub fn with_window_size(mut self, window_size: u16) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_sender_timeout(mut self, timeout: Duration) -> Self {
        self.sender_timeout = timeout;
        self
    }

    pub fn with_receiver_timeout(mut self, timeout: Duration) -> Self {
        self.receiver_timeout = timeout;
        self
    }

    /// Checks the invariants a `NetworkConfig` must hold before an endpoint
    /// is built from it: a `Sender` needs somewhere to send, and both
    /// timers must be positive durations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.role == Role::Sender && self.remote_addr.is_none() {
            return Err(ConfigError::MissingRemoteAddr);
        }
        if self.sender_timeout.is_zero() {
            return Err(ConfigError::NonPositiveTimeout("sender_timeout"));
        }
        if self.receiver_timeout.is_zero() {
            return Err(ConfigError::NonPositiveTimeout("receiver_timeout"));
        }
        Ok(())
    }
}
