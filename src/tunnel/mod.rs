//! Client-side tunnel device
//!
//! [`TunnelDevice`] owns a virtual network adapter and moves raw packets
//! between it and two externally owned queues: packets decrypted from the
//! transport are written to the adapter, packets read from the adapter are
//! handed to the transport.

use crate::error::{Result, VpnError};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

mod device;

pub use device::{TunnelDevice, READ_BUFFER_SIZE};

/// TUN interface configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelConfig {
    /// Requested interface name; empty lets the OS pick one
    pub interface_name: String,
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub mtu: u16,
    /// Log every packet read from and written to the adapter
    pub debug: bool,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            interface_name: "next0".to_string(),
            address: Ipv4Addr::new(10, 8, 0, 2),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            mtu: 1500,
            debug: false,
        }
    }
}

impl TunnelConfig {
    /// Build the adapter configuration from what the server handed out
    ///
    /// `gateway_cidr` supplies the network mask and `inet` the address assigned
    /// to this client.
    pub fn from_remote(
        gateway_cidr: &str,
        inet: &str,
        mtu: u16,
        dev_id: &str,
        debug: bool,
    ) -> Result<Self> {
        let gateway = gateway_cidr.trim().parse::<Ipv4Net>().map_err(|e| {
            VpnError::Configuration(format!("invalid gateway '{gateway_cidr}': {e}"))
        })?;
        let address = inet
            .trim()
            .parse::<Ipv4Addr>()
            .map_err(|e| VpnError::Configuration(format!("invalid address '{inet}': {e}")))?;

        let config = Self {
            interface_name: dev_id.to_string(),
            address,
            netmask: gateway.netmask(),
            mtu,
            debug,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.address.is_unspecified() {
            return Err(VpnError::Configuration(
                "Adapter address cannot be 0.0.0.0".to_string(),
            ));
        }

        if self.mtu < 576 || self.mtu > 9000 {
            return Err(VpnError::Configuration(format!(
                "MTU must be between 576 and 9000, got {}",
                self.mtu
            )));
        }

        // Interface names are limited to IFNAMSIZ - 1 bytes
        if self.interface_name.len() >= 16 {
            return Err(VpnError::Configuration(format!(
                "Interface name '{}' is too long",
                self.interface_name
            )));
        }

        Ok(())
    }
}
