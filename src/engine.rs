//! Per-datagram protocol engine.
//!
//! The engine is invoked once per inbound datagram by the server's event
//! loop: parse, classify by message type, consult or update the lease
//! table, and build at most one broadcast reply. It performs no I/O and
//! never blocks; the clock is passed in as a monotonic millisecond value.
//!
//! Every failure path — malformed input, exhausted pool, policy
//! rejection — resolves to a silent discard. The classification step
//! makes that explicit by returning `Result<Reply, Discard>`: DHCP says
//! nothing back, so `Discard` carries no payload. No datagram, however
//! hostile, can corrupt the lease table or affect later datagrams.

use std::net::{Ipv4Addr, SocketAddrV4};

use tracing::{debug, info};

use crate::config::Config;
use crate::lease::{LeaseTable, MacAddr};
use crate::options::{MessageType, OptionCode, OptionWriter};
use crate::packet::{DhcpPacket, BOOTREQUEST};

/// Port DHCP clients listen on for server replies.
pub const DHCP_CLIENT_PORT: u16 = 68;

/// The outcome of dropping a datagram. Deliberately empty: the protocol
/// answer to every rejected or malformed message is silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discard;

/// An outbound reply ready for the transport.
///
/// Replies always go to the limited broadcast address on the client
/// port: the client has no usable unicast address yet.
#[derive(Debug, Clone)]
pub struct Reply {
    pub payload: Vec<u8>,
    pub destination: SocketAddrV4,
}

/// The DHCP state machine plus its lease table.
///
/// Stateless per datagram aside from the table. Not internally
/// synchronized: callers driving it from more than one thread must wrap
/// the whole scan-and-commit of a datagram in one critical section, or
/// two clients can be offered the same slot.
#[derive(Debug)]
pub struct Engine {
    config: Config,
    leases: LeaseTable,
}

impl Engine {
    /// Creates an engine with an empty lease table sized to the
    /// configured pool.
    pub fn new(config: Config) -> Self {
        let leases = LeaseTable::new(config.pool_size as usize);
        Self { config, leases }
    }

    /// Processes one inbound datagram, returning at most one reply.
    pub fn handle(&mut self, datagram: &[u8], now_ms: u32) -> Option<Reply> {
        match self.classify(datagram, now_ms) {
            Ok(reply) => Some(reply),
            Err(Discard) => None,
        }
    }

    fn classify(&mut self, datagram: &[u8], now_ms: u32) -> Result<Reply, Discard> {
        let packet = DhcpPacket::parse(datagram).map_err(|error| {
            debug!("dropping datagram: {}", error);
            Discard
        })?;

        if packet.op != BOOTREQUEST {
            return Err(Discard);
        }

        let Some(message_type) = packet.message_type() else {
            debug!("dropping datagram without message type");
            return Err(Discard);
        };

        let mac = packet.client_mac();

        match message_type {
            MessageType::Discover => self.handle_discover(&packet, mac, now_ms),
            MessageType::Request => self.handle_request(&packet, mac, now_ms),
            other => {
                debug!("ignoring {} from {}", other, mac);
                Err(Discard)
            }
        }
    }

    /// DISCOVER: pick a slot and offer its address. The slot is not
    /// committed; an untouched table yields the same slot to the same
    /// client again, which is all the reservation DISCOVER needs.
    fn handle_discover(
        &mut self,
        packet: &DhcpPacket,
        mac: MacAddr,
        now_ms: u32,
    ) -> Result<Reply, Discard> {
        let offset = self.leases.find_or_allocate(mac, now_ms).map_err(|_| {
            debug!("pool exhausted, no offer for {}", mac);
            Discard
        })?;

        let yiaddr = self.config.address_for(offset);
        debug!("OFFER {} to {}", yiaddr, mac);
        Ok(self.build_reply(packet, MessageType::Offer, yiaddr))
    }

    /// REQUEST: the client must name an address in our pool; grant it
    /// when the slot is free, expired, or already the client's own.
    fn handle_request(
        &mut self,
        packet: &DhcpPacket,
        mac: MacAddr,
        now_ms: u32,
    ) -> Result<Reply, Discard> {
        let Some(requested) = packet.requested_ip() else {
            debug!("REQUEST from {} without requested address", mac);
            return Err(Discard);
        };

        // Covers both the foreign-subnet and out-of-pool rejections.
        let Some(offset) = self.config.offset_for(requested) else {
            debug!("REQUEST from {} for {} outside pool", mac, requested);
            return Err(Discard);
        };

        if !self.leases.can_claim(offset, mac, now_ms) {
            debug!("REQUEST from {} for {} already leased", mac, requested);
            return Err(Discard);
        }

        self.leases
            .commit(offset, mac, self.config.lease_seconds, now_ms);
        info!("lease committed: mac={} ip={}", mac, requested);

        Ok(self.build_reply(packet, MessageType::Ack, requested))
    }

    fn build_reply(
        &self,
        request: &DhcpPacket,
        message_type: MessageType,
        yiaddr: Ipv4Addr,
    ) -> Reply {
        let server = self.config.server_ip;

        // Fixed option order; the server doubles as router and DNS on an
        // access point.
        let mut writer = OptionWriter::new();
        writer.write_u8(OptionCode::MessageType, message_type as u8);
        writer.write_bytes(OptionCode::ServerIdentifier, &server.octets());
        writer.write_bytes(OptionCode::SubnetMask, &self.config.subnet_mask.octets());
        writer.write_bytes(OptionCode::Router, &server.octets());
        writer.write_bytes(OptionCode::DnsServer, &server.octets());
        writer.write_u32(OptionCode::LeaseTime, self.config.lease_seconds);

        let reply = DhcpPacket::reply_to(request, yiaddr, server, writer.finish());

        Reply {
            payload: reply.encode(),
            destination: SocketAddrV4::new(Ipv4Addr::BROADCAST, DHCP_CLIENT_PORT),
        }
    }

    /// Read access to the lease table, for inspection and tests.
    pub fn leases(&self) -> &LeaseTable {
        &self.leases
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
