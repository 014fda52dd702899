use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;

use crate::error::{Error, Result};

/// Server configuration, immutable for the process lifetime.
///
/// The address pool is expressed as an offset range within the server's own
/// /24-style subnet: pool address `i` is the server's first three octets
/// with `pool_base_offset + i` as the last octet. With the defaults the
/// pool is `192.168.4.16` through `192.168.4.23`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The server's own address; also advertised as router and DNS server.
    pub server_ip: Ipv4Addr,
    /// Subnet mask advertised to clients.
    pub subnet_mask: Ipv4Addr,
    /// Last octet of the first pool address.
    pub pool_base_offset: u8,
    /// Number of addresses (and lease slots) in the pool.
    pub pool_size: u8,
    /// Default lease duration handed to clients, in seconds.
    pub lease_seconds: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_ip: Ipv4Addr::new(192, 168, 4, 1),
            subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
            pool_base_offset: 16,
            pool_size: 8,
            lease_seconds: 86400,
        }
    }
}

impl Config {
    /// Loads the configuration from a JSON file, creating the file with
    /// default values if it does not exist.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Writes the configuration to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Checks the configuration for internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::InvalidConfig(
                "pool_size must be greater than 0".to_string(),
            ));
        }

        // The pool lives entirely in the last octet; 255 is the subnet
        // broadcast address and must stay out of it.
        let last = self.pool_base_offset as u16 + self.pool_size as u16 - 1;
        if last >= 255 {
            return Err(Error::InvalidConfig(format!(
                "pool [{}, {}] does not fit in the last address octet",
                self.pool_base_offset, last
            )));
        }

        if self.offset_for(self.server_ip).is_some() {
            return Err(Error::InvalidConfig(
                "server_ip must not be within the pool range".to_string(),
            ));
        }

        if self.lease_seconds == 0 {
            return Err(Error::InvalidConfig(
                "lease_seconds must be greater than 0".to_string(),
            ));
        }

        let mask = u32::from(self.subnet_mask);
        if mask.leading_ones() + mask.trailing_zeros() != 32 {
            return Err(Error::InvalidConfig(format!(
                "{} is not a valid subnet mask",
                self.subnet_mask
            )));
        }

        Ok(())
    }

    /// Returns the pool address for a lease table offset.
    ///
    /// Total and collision-free by construction: distinct offsets map to
    /// distinct last octets within the server's subnet.
    pub fn address_for(&self, offset: usize) -> Ipv4Addr {
        let octets = self.server_ip.octets();
        Ipv4Addr::new(
            octets[0],
            octets[1],
            octets[2],
            self.pool_base_offset + offset as u8,
        )
    }

    /// Returns the lease table offset implied by a pool address.
    ///
    /// `None` when the first three octets differ from the server's own
    /// (foreign subnet) or the last octet falls outside the pool range.
    pub fn offset_for(&self, address: Ipv4Addr) -> Option<usize> {
        let server = self.server_ip.octets();
        let octets = address.octets();
        if octets[..3] != server[..3] {
            return None;
        }

        let offset = octets[3].checked_sub(self.pool_base_offset)?;
        if offset < self.pool_size {
            Some(offset as usize)
        } else {
            None
        }
    }
}
