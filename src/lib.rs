//! # hudp
//!
//! A dual-channel datagram transport: a bounded Selective-Repeat ARQ
//! reliable channel plus a fire-and-forget unreliable channel, multiplexed
//! over one UDP socket between exactly one sender and one receiver peer.
//!
//! ## Quick start
//!
//! ```no_run
//! use hudp::prelude::*;
//!
//! let local_port: u16 = 9000;
//! let remote: std::net::SocketAddr = "127.0.0.1:9001".parse().unwrap();
//!
//! let config = NetworkConfig::new(Role::Sender, local_port).with_remote_addr(remote);
//! let endpoint = HudpEndpoint::new(config).unwrap();
//! endpoint.send(b"hello", true).unwrap();
//! ```

pub mod api;
pub mod config;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod packet;
pub mod reliable;
pub mod sequence;
pub mod socket;
pub mod stats;
pub mod tracking;
pub mod unreliable;

pub use api::HudpEndpoint;
pub use config::{NetworkConfig, Role};
pub use delivery::{Channel, DeliveryRecord, DeliverySink};
pub use error::{ConfigError, HudpError};
pub use packet::MAX_PAYLOAD_SIZE;
pub use tracking::{DeliveryStats, DeliveryTracker};

/// Common imports for constructing and driving an endpoint.
pub mod prelude {
    pub use crate::api::HudpEndpoint;
    pub use crate::config::{NetworkConfig, Role};
    pub use crate::delivery::{Channel, DeliveryRecord, DeliverySink};
    pub use crate::error::{ConfigError, HudpError};
    pub use crate::packet::MAX_PAYLOAD_SIZE;
    pub use crate::tracking::{DeliveryStats, DeliveryTracker};
}
