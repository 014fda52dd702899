//! UDP transport and event loop.
//!
//! Owns the server socket and the monotonic clock anchor; the protocol
//! engine itself performs no I/O. Each datagram is processed to
//! completion inline — one logical thread of execution reaches the
//! engine, so the lease table needs no locking.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Instant;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{Error, Result};

/// Port DHCP servers listen on.
pub const DHCP_SERVER_PORT: u16 = 67;

/// Large enough for any DHCP datagram on a standard-MTU link.
const RECV_BUFFER_SIZE: usize = 1500;

/// DHCP server: engine plus socket plus clock.
pub struct DhcpServer {
    engine: Engine,
    socket: UdpSocket,
    started: Instant,
}

impl DhcpServer {
    /// Validates the configuration, binds the server socket, and
    /// prepares an empty lease table.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let socket = Self::create_socket()?;

        info!(
            "DHCP server starting on {}:{}",
            config.server_ip, DHCP_SERVER_PORT
        );
        info!(
            "address pool: {} - {} ({} slots), lease {}s",
            config.address_for(0),
            config.address_for(config.pool_size as usize - 1),
            config.pool_size,
            config.lease_seconds
        );

        Ok(Self {
            engine: Engine::new(config),
            socket,
            started: Instant::now(),
        })
    }

    fn create_socket() -> Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|error| Error::Socket(format!("Failed to create socket: {}", error)))?;

        socket
            .set_reuse_address(true)
            .map_err(|error| Error::Socket(format!("Failed to set SO_REUSEADDR: {}", error)))?;

        // Replies go to 255.255.255.255; the client has no address yet.
        socket
            .set_broadcast(true)
            .map_err(|error| Error::Socket(format!("Failed to set SO_BROADCAST: {}", error)))?;

        socket
            .set_nonblocking(true)
            .map_err(|error| Error::Socket(format!("Failed to set non-blocking: {}", error)))?;

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DHCP_SERVER_PORT);
        socket
            .bind(&bind_addr.into())
            .map_err(|error| Error::Socket(format!("Failed to bind to {}: {}", bind_addr, error)))?;

        let std_socket: std::net::UdpSocket = socket.into();
        let tokio_socket = UdpSocket::from_std(std_socket).map_err(|error| {
            Error::Socket(format!("Failed to convert to tokio socket: {}", error))
        })?;

        Ok(tokio_socket)
    }

    /// Milliseconds since the server started, wrapping at u32. The lease
    /// table compares deadlines with wraparound-safe arithmetic.
    fn now_ms(&self) -> u32 {
        self.started.elapsed().as_millis() as u32
    }

    /// Receives and serves datagrams until the task is cancelled.
    pub async fn run(&mut self) -> Result<()> {
        let mut buffer = [0u8; RECV_BUFFER_SIZE];

        info!("DHCP server ready and listening");

        loop {
            match self.socket.recv_from(&mut buffer).await {
                Ok((size, source)) => {
                    let now_ms = self.now_ms();
                    if let Some(reply) = self.engine.handle(&buffer[..size], now_ms) {
                        // The lease commit, if any, already happened and
                        // stands even when the send fails; the client
                        // will re-REQUEST and land on the renewal path.
                        if let Err(error) = self
                            .socket
                            .send_to(&reply.payload, SocketAddr::V4(reply.destination))
                            .await
                        {
                            warn!("failed to send reply for {}: {}", source, error);
                        }
                    }
                }
                Err(error) => {
                    error!("error receiving datagram: {}", error);
                }
            }
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn config(&self) -> &Config {
        self.engine.config()
    }
}
