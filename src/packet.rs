//! DHCP packet parsing and encoding per RFC 2131.
//!
//! A DHCP packet is a fixed 236-byte header followed by a 4-byte magic
//! cookie and a variable-length options area. Parsing keeps the options
//! area as raw bytes; typed accessors run the bounded option scan from
//! [`crate::options`] on demand, so a corrupt options chain can never be
//! read past the datagram boundary.
//!
//! # Packet Structure
//!
//! ```text
//! 0                   1                   2                   3
//! 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     op (1)    |   htype (1)   |   hlen (1)    |   hops (1)    |
//! +---------------+---------------+---------------+---------------+
//! |                            xid (4)                            |
//! +-------------------------------+-------------------------------+
//! |           secs (2)            |           flags (2)           |
//! +-------------------------------+-------------------------------+
//! |                          ciaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          yiaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          siaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          giaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          chaddr (16)                          |
//! +---------------------------------------------------------------+
//! |                          sname (64)                           |
//! +---------------------------------------------------------------+
//! |                          file (128)                           |
//! +---------------------------------------------------------------+
//! |                    magic cookie (4) = 99.130.83.99            |
//! +---------------------------------------------------------------+
//! |                          options (variable)                   |
//! +---------------------------------------------------------------+
//! ```

use std::net::Ipv4Addr;

use crate::error::{Error, Result};
use crate::lease::MacAddr;
use crate::options::{self, MessageType, OptionCode};

/// DHCP magic cookie that identifies DHCP packets (vs BOOTP).
pub const DHCP_MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];

const DHCP_SNAME_OFFSET: usize = 44;
const DHCP_SNAME_SIZE: usize = 64;
const DHCP_FILE_OFFSET: usize = 108;
const DHCP_FILE_SIZE: usize = 128;
const DHCP_MAGIC_COOKIE_OFFSET: usize = 236;

/// Size of the fixed header portion including the magic cookie.
const DHCP_FIXED_HEADER_SIZE: usize = DHCP_MAGIC_COOKIE_OFFSET + DHCP_MAGIC_COOKIE.len();

/// Minimum size of an inbound datagram this server will consider.
///
/// Fixed header, magic cookie, and room for the smallest message-type
/// option triple. Anything shorter cannot be a classifiable request.
pub const DHCP_MIN_PACKET_SIZE: usize = DHCP_FIXED_HEADER_SIZE + 3;

/// Minimum encoded reply size per RFC 2131 §2.
///
/// Replies are padded to 300 bytes for compatibility with BOOTP relay
/// agents and old client stacks.
const DHCP_MIN_REPLY_SIZE: usize = 300;

/// BOOTP/DHCP operation code for client requests.
pub const BOOTREQUEST: u8 = 1;

/// BOOTP/DHCP operation code for server replies.
pub const BOOTREPLY: u8 = 2;

/// A parsed DHCP packet.
///
/// Represents both client requests and server replies. Use
/// [`parse`](Self::parse) for incoming datagrams and
/// [`reply_to`](Self::reply_to) to construct a response.
#[derive(Debug, Clone)]
pub struct DhcpPacket {
    /// Operation code: [`BOOTREQUEST`] (1) or [`BOOTREPLY`] (2).
    pub op: u8,

    /// Hardware address type. 1 for Ethernet.
    pub htype: u8,

    /// Hardware address length. 6 for Ethernet.
    pub hlen: u8,

    /// Hop count, incremented by relay agents.
    pub hops: u8,

    /// Transaction ID chosen by the client, echoed in replies.
    pub xid: u32,

    /// Seconds elapsed since the client began address acquisition.
    pub secs: u16,

    /// Flags. Bit 15 (0x8000) = broadcast flag.
    pub flags: u16,

    /// Client IP address (set by clients in RENEWING/REBINDING states).
    pub ciaddr: Ipv4Addr,

    /// "Your" IP address - the address being assigned to the client.
    pub yiaddr: Ipv4Addr,

    /// Next-server IP address.
    pub siaddr: Ipv4Addr,

    /// Relay agent IP address.
    pub giaddr: Ipv4Addr,

    /// Client hardware address (MAC in the first `hlen` bytes).
    pub chaddr: [u8; 16],

    /// Server host name.
    pub sname: [u8; 64],

    /// Boot file name.
    pub file: [u8; 128],

    /// Raw options area, everything after the magic cookie.
    pub options: Vec<u8>,
}

impl DhcpPacket {
    /// Parses a DHCP packet from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPacket`] if the datagram is shorter than
    /// [`DHCP_MIN_PACKET_SIZE`] or the magic cookie is wrong. The options
    /// area is not validated here; accessors scan it with bounds checks.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < DHCP_MIN_PACKET_SIZE {
            return Err(Error::InvalidPacket(format!(
                "Packet too short: {} bytes (minimum {})",
                data.len(),
                DHCP_MIN_PACKET_SIZE
            )));
        }

        let magic_cookie_end = DHCP_MAGIC_COOKIE_OFFSET + DHCP_MAGIC_COOKIE.len();
        let magic_cookie = &data[DHCP_MAGIC_COOKIE_OFFSET..magic_cookie_end];
        if magic_cookie != DHCP_MAGIC_COOKIE {
            return Err(Error::InvalidPacket("Invalid magic cookie".to_string()));
        }

        let op = data[0];
        let htype = data[1];
        let hlen = data[2];
        let hops = data[3];

        let xid = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let secs = u16::from_be_bytes([data[8], data[9]]);
        let flags = u16::from_be_bytes([data[10], data[11]]);

        let ciaddr = Ipv4Addr::new(data[12], data[13], data[14], data[15]);
        let yiaddr = Ipv4Addr::new(data[16], data[17], data[18], data[19]);
        let siaddr = Ipv4Addr::new(data[20], data[21], data[22], data[23]);
        let giaddr = Ipv4Addr::new(data[24], data[25], data[26], data[27]);

        let mut chaddr = [0u8; 16];
        chaddr.copy_from_slice(&data[28..44]);

        let mut sname = [0u8; 64];
        sname.copy_from_slice(&data[DHCP_SNAME_OFFSET..DHCP_SNAME_OFFSET + DHCP_SNAME_SIZE]);

        let mut file = [0u8; 128];
        file.copy_from_slice(&data[DHCP_FILE_OFFSET..DHCP_FILE_OFFSET + DHCP_FILE_SIZE]);

        let options = data[DHCP_FIXED_HEADER_SIZE..].to_vec();

        Ok(Self {
            op,
            htype,
            hlen,
            hops,
            xid,
            secs,
            flags,
            ciaddr,
            yiaddr,
            siaddr,
            giaddr,
            chaddr,
            sname,
            file,
            options,
        })
    }

    /// Encodes the packet to bytes for transmission.
    ///
    /// The returned buffer is at least 300 bytes, zero-padded past the
    /// options area.
    pub fn encode(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(DHCP_MIN_REPLY_SIZE);

        packet.push(self.op);
        packet.push(self.htype);
        packet.push(self.hlen);
        packet.push(self.hops);

        packet.extend_from_slice(&self.xid.to_be_bytes());
        packet.extend_from_slice(&self.secs.to_be_bytes());
        packet.extend_from_slice(&self.flags.to_be_bytes());

        packet.extend_from_slice(&self.ciaddr.octets());
        packet.extend_from_slice(&self.yiaddr.octets());
        packet.extend_from_slice(&self.siaddr.octets());
        packet.extend_from_slice(&self.giaddr.octets());

        packet.extend_from_slice(&self.chaddr);
        packet.extend_from_slice(&self.sname);
        packet.extend_from_slice(&self.file);

        packet.extend_from_slice(&DHCP_MAGIC_COOKIE);
        packet.extend_from_slice(&self.options);

        while packet.len() < DHCP_MIN_REPLY_SIZE {
            packet.push(0);
        }

        packet
    }

    /// Returns the DHCP message type (Option 53) if present and known.
    pub fn message_type(&self) -> Option<MessageType> {
        let value = options::find_option(&self.options, OptionCode::MessageType)?;
        if value.len() != 1 {
            return None;
        }
        MessageType::try_from(value[0]).ok()
    }

    /// Returns the requested IP address (Option 50) if present.
    ///
    /// Clients include this in REQUEST to name the address they are
    /// accepting.
    pub fn requested_ip(&self) -> Option<Ipv4Addr> {
        let value = options::find_option(&self.options, OptionCode::RequestedIpAddress)?;
        if value.len() != 4 {
            return None;
        }
        Some(Ipv4Addr::new(value[0], value[1], value[2], value[3]))
    }

    /// Returns the client hardware address from the first six chaddr bytes.
    pub fn client_mac(&self) -> MacAddr {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&self.chaddr[..6]);
        MacAddr(mac)
    }

    /// Creates a reply packet for a request.
    ///
    /// The transaction ID, flags, relay address, hardware address, and
    /// hardware type/length are copied from the request so the client can
    /// match the reply; `options` is a pre-built options area including
    /// its end tag.
    pub fn reply_to(
        request: &DhcpPacket,
        yiaddr: Ipv4Addr,
        server_ip: Ipv4Addr,
        options: Vec<u8>,
    ) -> Self {
        Self {
            op: BOOTREPLY,
            htype: request.htype,
            hlen: request.hlen,
            hops: 0,
            xid: request.xid,
            secs: 0,
            flags: request.flags,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr,
            siaddr: server_ip,
            giaddr: request.giaddr,
            chaddr: request.chaddr,
            sname: [0u8; 64],
            file: [0u8; 128],
            options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_bytes(message_type: MessageType) -> Vec<u8> {
        let mut packet = vec![0u8; 300];

        packet[0] = BOOTREQUEST;
        packet[1] = 1;
        packet[2] = 6;
        packet[4..8].copy_from_slice(&0x12345678u32.to_be_bytes());
        packet[10..12].copy_from_slice(&0x8000u16.to_be_bytes());
        packet[28..34].copy_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]);
        packet[236..240].copy_from_slice(&DHCP_MAGIC_COOKIE);

        packet[240] = OptionCode::MessageType as u8;
        packet[241] = 1;
        packet[242] = message_type as u8;
        packet[243] = OptionCode::End as u8;

        packet
    }

    #[test]
    fn test_parse_request_fields() {
        let packet = DhcpPacket::parse(&request_bytes(MessageType::Discover)).unwrap();

        assert_eq!(packet.op, BOOTREQUEST);
        assert_eq!(packet.xid, 0x12345678);
        assert_eq!(packet.flags, 0x8000);
        assert_eq!(packet.message_type(), Some(MessageType::Discover));
        assert_eq!(packet.client_mac().to_string(), "aa:bb:cc:dd:ee:01");
    }

    #[test]
    fn test_too_short_rejected() {
        assert!(DhcpPacket::parse(&[0u8; 100]).is_err());
        assert!(DhcpPacket::parse(&[0u8; DHCP_MIN_PACKET_SIZE - 1]).is_err());
    }

    #[test]
    fn test_minimum_size_with_cookie_accepted() {
        let mut packet = vec![0u8; DHCP_MIN_PACKET_SIZE];
        packet[0] = BOOTREQUEST;
        packet[236..240].copy_from_slice(&DHCP_MAGIC_COOKIE);
        packet[240] = OptionCode::End as u8;

        let parsed = DhcpPacket::parse(&packet).unwrap();
        assert_eq!(parsed.message_type(), None);
    }

    #[test]
    fn test_bad_magic_cookie_rejected() {
        let mut packet = request_bytes(MessageType::Discover);
        packet[236..240].copy_from_slice(&[0, 0, 0, 0]);
        assert!(DhcpPacket::parse(&packet).is_err());
    }

    #[test]
    fn test_requested_ip_option() {
        let mut packet = request_bytes(MessageType::Request);
        packet[243] = OptionCode::RequestedIpAddress as u8;
        packet[244] = 4;
        packet[245..249].copy_from_slice(&[192, 168, 4, 16]);
        packet[249] = OptionCode::End as u8;

        let parsed = DhcpPacket::parse(&packet).unwrap();
        assert_eq!(parsed.requested_ip(), Some(Ipv4Addr::new(192, 168, 4, 16)));
    }

    #[test]
    fn test_requested_ip_with_wrong_length_ignored() {
        let mut packet = request_bytes(MessageType::Request);
        packet[243] = OptionCode::RequestedIpAddress as u8;
        packet[244] = 2;
        packet[245..247].copy_from_slice(&[192, 168]);
        packet[247] = OptionCode::End as u8;

        let parsed = DhcpPacket::parse(&packet).unwrap();
        assert_eq!(parsed.requested_ip(), None);
    }

    #[test]
    fn test_unknown_message_type_value_is_none() {
        let mut packet = request_bytes(MessageType::Discover);
        packet[242] = 200;

        let parsed = DhcpPacket::parse(&packet).unwrap();
        assert_eq!(parsed.message_type(), None);
    }

    #[test]
    fn test_reply_copies_request_identity() {
        let mut request_data = request_bytes(MessageType::Request);
        let giaddr = Ipv4Addr::new(192, 168, 2, 1);
        request_data[24..28].copy_from_slice(&giaddr.octets());
        let request = DhcpPacket::parse(&request_data).unwrap();

        let reply = DhcpPacket::reply_to(
            &request,
            Ipv4Addr::new(192, 168, 4, 16),
            Ipv4Addr::new(192, 168, 4, 1),
            vec![OptionCode::End as u8],
        );

        assert_eq!(reply.op, BOOTREPLY);
        assert_eq!(reply.xid, request.xid);
        assert_eq!(reply.flags, request.flags);
        assert_eq!(reply.giaddr, giaddr);
        assert_eq!(reply.chaddr, request.chaddr);
        assert_eq!(reply.htype, request.htype);
        assert_eq!(reply.hlen, request.hlen);
        assert_eq!(reply.yiaddr, Ipv4Addr::new(192, 168, 4, 16));
        assert_eq!(reply.siaddr, Ipv4Addr::new(192, 168, 4, 1));
    }

    #[test]
    fn test_encode_pads_to_minimum_reply_size() {
        let request = DhcpPacket::parse(&request_bytes(MessageType::Discover)).unwrap();
        let reply = DhcpPacket::reply_to(
            &request,
            Ipv4Addr::new(192, 168, 4, 16),
            Ipv4Addr::new(192, 168, 4, 1),
            vec![OptionCode::End as u8],
        );

        let encoded = reply.encode();
        assert!(encoded.len() >= 300);
        assert_eq!(&encoded[236..240], &DHCP_MAGIC_COOKIE);
    }

    #[test]
    fn test_encode_produces_correct_offsets() {
        let packet = DhcpPacket {
            op: BOOTREPLY,
            htype: 1,
            hlen: 6,
            hops: 0,
            xid: 0xDEADBEEF,
            secs: 0,
            flags: 0x8000,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::new(192, 168, 4, 17),
            siaddr: Ipv4Addr::new(192, 168, 4, 1),
            giaddr: Ipv4Addr::UNSPECIFIED,
            chaddr: [
                0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            ],
            sname: [0u8; 64],
            file: [0u8; 128],
            options: vec![53, 1, 2, 255],
        };

        let encoded = packet.encode();
        assert_eq!(encoded[0], BOOTREPLY);
        assert_eq!(&encoded[4..8], &0xDEADBEEFu32.to_be_bytes());
        assert_eq!(&encoded[10..12], &0x8000u16.to_be_bytes());
        assert_eq!(&encoded[16..20], &[192, 168, 4, 17]);
        assert_eq!(&encoded[20..24], &[192, 168, 4, 1]);
        assert_eq!(&encoded[28..34], &[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x02]);
        assert_eq!(&encoded[236..240], &DHCP_MAGIC_COOKIE);
        assert_eq!(&encoded[240..244], &[53, 1, 2, 255]);
    }

    #[test]
    fn test_parse_reencode_roundtrip() {
        let parsed = DhcpPacket::parse(&request_bytes(MessageType::Discover)).unwrap();
        let reparsed = DhcpPacket::parse(&parsed.encode()).unwrap();
        assert_eq!(reparsed.xid, parsed.xid);
        assert_eq!(reparsed.chaddr, parsed.chaddr);
        assert_eq!(reparsed.message_type(), parsed.message_type());
    }

    #[test]
    fn test_all_zero_chaddr_is_a_valid_mac() {
        let mut packet = request_bytes(MessageType::Discover);
        packet[28..44].copy_from_slice(&[0u8; 16]);

        let parsed = DhcpPacket::parse(&packet).unwrap();
        assert_eq!(parsed.client_mac().to_string(), "00:00:00:00:00:00");
    }
}
