//! DHCP options as defined in RFC 2132.
//!
//! The options area of a DHCP message is a sequence of `(tag, length,
//! value)` triples terminated by an end tag. This module provides the
//! option and message-type codes the server uses, a bounds-checked scanner
//! for reading options out of untrusted datagrams, and an append cursor
//! for building the fixed option set of a reply.
//!
//! # References
//!
//! - RFC 2132: DHCP Options and BOOTP Vendor Extensions

/// Maximum size of the options area this server will scan.
///
/// Matches the 312-byte options field of a minimum-MTU DHCP message
/// (RFC 2131 §2). The scan bound is the smaller of this and the bytes
/// actually received, so a crafted non-terminated options area can never
/// cause a read past either limit.
pub const MAX_OPTIONS_LEN: usize = 312;

/// DHCP option codes used by this server.
///
/// Only the minimal set needed for the DISCOVER/OFFER/REQUEST/ACK
/// handshake is defined; unrecognized tags are skipped over by the
/// scanner without interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OptionCode {
    /// Padding (no operation). Used for alignment.
    Pad = 0,
    /// Subnet mask (RFC 2132 §3.3).
    SubnetMask = 1,
    /// Router/gateway addresses (RFC 2132 §3.5).
    Router = 3,
    /// DNS server addresses (RFC 2132 §3.8).
    DnsServer = 6,
    /// Requested IP address (RFC 2132 §9.1).
    RequestedIpAddress = 50,
    /// IP address lease time in seconds (RFC 2132 §9.2).
    LeaseTime = 51,
    /// DHCP message type (RFC 2132 §9.6).
    MessageType = 53,
    /// Server identifier (RFC 2132 §9.7).
    ServerIdentifier = 54,
    /// End of options marker.
    End = 255,
}

/// DHCP message types (Option 53) as defined in RFC 2132 §9.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Client broadcast to locate servers.
    Discover = 1,
    /// Server response to DISCOVER with IP offer.
    Offer = 2,
    /// Client request for offered parameters.
    Request = 3,
    /// Client indicates address is already in use.
    Decline = 4,
    /// Server acknowledgement with configuration.
    Ack = 5,
    /// Server negative acknowledgement.
    Nak = 6,
    /// Client releases IP address.
    Release = 7,
    /// Client requests config without IP allocation.
    Inform = 8,
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Discover),
            2 => Ok(Self::Offer),
            3 => Ok(Self::Request),
            4 => Ok(Self::Decline),
            5 => Ok(Self::Ack),
            6 => Ok(Self::Nak),
            7 => Ok(Self::Release),
            8 => Ok(Self::Inform),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discover => write!(f, "DISCOVER"),
            Self::Offer => write!(f, "OFFER"),
            Self::Request => write!(f, "REQUEST"),
            Self::Decline => write!(f, "DECLINE"),
            Self::Ack => write!(f, "ACK"),
            Self::Nak => write!(f, "NAK"),
            Self::Release => write!(f, "RELEASE"),
            Self::Inform => write!(f, "INFORM"),
        }
    }
}

/// Scans an options area for the value of a specific option.
///
/// The scan walks `(tag, length, value)` triples, skipping pad bytes and
/// stopping at the end tag or the scan bound, whichever comes first. The
/// embedded length byte is checked against the remaining bound before the
/// value is touched, so a hostile length can never cause an out-of-bounds
/// read. A non-terminated or truncated chain simply yields `None`.
pub fn find_option(options: &[u8], code: OptionCode) -> Option<&[u8]> {
    let bound = options.len().min(MAX_OPTIONS_LEN);
    let mut index = 0;

    while index < bound {
        let tag = options[index];

        if tag == OptionCode::End as u8 {
            return None;
        }

        if tag == OptionCode::Pad as u8 {
            index += 1;
            continue;
        }

        if index + 1 >= bound {
            return None;
        }

        let length = options[index + 1] as usize;
        if index + 2 + length > bound {
            return None;
        }

        if tag == code as u8 {
            return Some(&options[index + 2..index + 2 + length]);
        }

        index += 2 + length;
    }

    None
}

/// Append cursor for building a reply's options area.
///
/// Values longer than the 255-byte option maximum are truncated; the
/// fixed reply set this server emits is far below that.
#[derive(Debug, Default)]
pub struct OptionWriter {
    buffer: Vec<u8>,
}

impl OptionWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a `(tag, length, value)` triple with an arbitrary value.
    pub fn write_bytes(&mut self, code: OptionCode, value: &[u8]) -> &mut Self {
        let length = value.len().min(255);
        self.buffer.push(code as u8);
        self.buffer.push(length as u8);
        self.buffer.extend_from_slice(&value[..length]);
        self
    }

    /// Appends an option with a single-byte value.
    pub fn write_u8(&mut self, code: OptionCode, value: u8) -> &mut Self {
        self.buffer.push(code as u8);
        self.buffer.push(1);
        self.buffer.push(value);
        self
    }

    /// Appends an option with a big-endian 32-bit value.
    pub fn write_u32(&mut self, code: OptionCode, value: u32) -> &mut Self {
        self.buffer.push(code as u8);
        self.buffer.push(4);
        self.buffer.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Terminates the options area with the end tag and returns the bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.buffer.push(OptionCode::End as u8);
        self.buffer
    }
}
