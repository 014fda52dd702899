//! # apdhcp
//!
//! A minimal DHCP server for access-point style single-subnet networks:
//! a small fixed pool of addresses, leases keyed by client hardware
//! address, and just enough protocol surface (DISCOVER/OFFER and
//! REQUEST/ACK) to get clients onto the network. Everything else —
//! RELEASE, DECLINE, INFORM, relay forwarding — is silently ignored.
//!
//! ## Quick Start
//!
//! ```no_run
//! use apdhcp::{Config, DhcpServer};
//!
//! #[tokio::main]
//! async fn main() -> apdhcp::Result<()> {
//!     let config = Config::load_or_create("apdhcp.json")?;
//!     let mut server = DhcpServer::new(config)?;
//!     server.run().await
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`Config`] - immutable server configuration (subnet, pool, lease time)
//! - [`Engine`] - per-datagram protocol state machine, no I/O
//! - [`LeaseTable`] - fixed-capacity MAC-to-offset lease store
//! - [`DhcpPacket`] - RFC 2131 packet parsing and encoding
//! - [`DhcpServer`] - UDP socket ownership and the event loop

pub mod config;
pub mod engine;
pub mod error;
pub mod lease;
pub mod options;
pub mod packet;
pub mod server;

pub use config::Config;
pub use engine::{Engine, Reply};
pub use error::{Error, Result};
pub use lease::{LeaseTable, MacAddr};
pub use options::MessageType;
pub use packet::DhcpPacket;
pub use server::DhcpServer;
