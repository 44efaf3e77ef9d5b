//! Configuration module for rnext
//!
//! This module provides TOML-based configuration parsing and validation for
//! the tunnel device and the server-side route table.

use crate::error::{Result, VpnError};
use crate::route::{parse_prefix, Route, RouteTable};
use crate::tunnel::TunnelConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for lease_ttl and reap_interval, ten years
const MAX_INTERVAL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Client tunnel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelSection {
    /// Requested interface name
    #[serde(default = "default_dev_id")]
    pub dev_id: String,
    /// Gateway network in CIDR notation, supplies the mask
    pub gateway: String,
    /// Address assigned to this client
    pub address: String,
    /// MTU value
    #[serde(default = "default_mtu")]
    pub mtu: u16,
    /// Log every packet
    #[serde(default)]
    pub debug: bool,
}

/// Server lease and route settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Gateway address and client network in CIDR notation
    pub gateway: String,
    /// Lease lifetime in seconds
    #[serde(default = "default_lease_ttl")]
    pub lease_ttl: u64,
    /// Longest reaper sleep in seconds
    #[serde(default = "default_reap_interval")]
    pub reap_interval: u64,
    /// Statically configured routes
    #[serde(default)]
    pub routes: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Client tunnel configuration
    pub tunnel: TunnelSection,
    /// Server configuration
    pub server: ServerSection,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| VpnError::Config(format!("Failed to read config file: {e}")))?;

        <Self as FromStr>::from_str(&contents)
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| VpnError::Config(format!("Failed to serialize config: {e}")))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.tunnel_config()?;

        parse_prefix(&self.server.gateway)
            .map_err(|e| VpnError::Config(format!("Invalid server gateway: {e}")))?;

        if self.server.lease_ttl == 0 || self.server.lease_ttl > MAX_INTERVAL_SECS {
            return Err(VpnError::Config(format!(
                "Lease TTL must be between 1 and {MAX_INTERVAL_SECS} seconds, got {}",
                self.server.lease_ttl
            )));
        }

        if self.server.reap_interval == 0 || self.server.reap_interval > MAX_INTERVAL_SECS {
            return Err(VpnError::Config(format!(
                "Reap interval must be between 1 and {MAX_INTERVAL_SECS} seconds, got {}",
                self.server.reap_interval
            )));
        }

        for route in &self.server.routes {
            parse_prefix(route).map_err(|e| VpnError::Config(format!("Invalid route: {e}")))?;
        }

        Ok(())
    }

    /// Adapter parameters for the client tunnel
    pub fn tunnel_config(&self) -> Result<TunnelConfig> {
        TunnelConfig::from_remote(
            &self.tunnel.gateway,
            &self.tunnel.address,
            self.tunnel.mtu,
            &self.tunnel.dev_id,
            self.tunnel.debug,
        )
    }

    /// An empty lease table seeded with the configured routes, sorted
    pub fn route_table<T: Default>(&self) -> Result<RouteTable<T>> {
        let gateway = parse_prefix(&self.server.gateway)?;
        let mut table = RouteTable::new(gateway, self.lease_ttl());
        for cidr in &self.server.routes {
            table.routes_mut().append(Route::new(cidr, T::default())?);
        }
        table.routes_mut().sort();
        Ok(table)
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.server.lease_ttl)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.server.reap_interval)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tunnel: TunnelSection {
                dev_id: default_dev_id(),
                gateway: "10.8.0.1/24".to_string(),
                address: "10.8.0.2".to_string(),
                mtu: default_mtu(),
                debug: false,
            },
            server: ServerSection {
                gateway: "10.8.0.1/24".to_string(),
                lease_ttl: default_lease_ttl(),
                reap_interval: default_reap_interval(),
                routes: vec![],
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl FromStr for Config {
    type Err = VpnError;

    fn from_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

// Default value functions for serde
fn default_dev_id() -> String {
    "next0".to_string()
}

fn default_mtu() -> u16 {
    1500
}

fn default_lease_ttl() -> u64 {
    3600
}

fn default_reap_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::Ipv4Addr;

    const CONFIG_TOML: &str = r#"
[tunnel]
dev_id = "next1"
gateway = "10.9.0.1/16"
address = "10.9.3.4"
mtu = 1400

[server]
gateway = "10.9.0.1/16"
lease_ttl = 600
routes = ["192.168.0.0/24", "10.0.0.0/8"]

[logging]
level = "debug"
"#;

    #[test]
    fn test_config_parsing() {
        let config = CONFIG_TOML.parse::<Config>().expect("Failed to parse config");
        assert_eq!(config.tunnel.dev_id, "next1");
        assert_eq!(config.tunnel.mtu, 1400);
        assert!(!config.tunnel.debug);
        assert_eq!(config.server.lease_ttl, 600);
        assert_eq!(config.server.reap_interval, 60);
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());

        let tunnel = config.tunnel_config().unwrap();
        assert_eq!(tunnel.address, Ipv4Addr::new(10, 9, 3, 4));
        assert_eq!(tunnel.netmask, Ipv4Addr::new(255, 255, 0, 0));
    }

    #[test]
    fn test_route_table_is_sorted() {
        let config = CONFIG_TOML.parse::<Config>().unwrap();
        let table: RouteTable<()> = config.route_table().unwrap();

        let routes: Vec<String> = table.routes().iter().map(|r| r.prefix.to_string()).collect();
        assert_eq!(routes, vec!["10.0.0.0/8", "192.168.0.0/24"]);
        assert_eq!(table.lease_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.server.routes.push("10.0.0.0/99".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.lease_ttl = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tunnel.address = "nowhere".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_intervals_rejected() {
        let mut config = Config::default();
        config.server.lease_ttl = u64::MAX;
        assert!(matches!(config.validate(), Err(VpnError::Config(_))));

        let mut config = Config::default();
        config.server.reap_interval = MAX_INTERVAL_SECS + 1;
        assert!(matches!(config.validate(), Err(VpnError::Config(_))));

        let mut config = Config::default();
        config.server.lease_ttl = MAX_INTERVAL_SECS;
        config.server.reap_interval = MAX_INTERVAL_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_toml() {
        let err = "[tunnel\ngateway = 1".parse::<Config>().unwrap_err();
        assert!(matches!(err, VpnError::Config(_)));
        assert!(err.to_string().contains("TOML parsing error"));

        // missing required sections
        assert!("[logging]\nlevel = \"warn\"".parse::<Config>().is_err());
    }

    #[test]
    fn test_config_file_round_trip() {
        let config = Config::default();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml().unwrap().as_bytes()).unwrap();

        let loaded = Config::from_file(file.path()).unwrap();
        assert_eq!(loaded.server.gateway, config.server.gateway);
        assert_eq!(loaded.tunnel.address, config.tunnel.address);

        assert!(Config::from_file("/nonexistent/rnext.toml").is_err());
    }
}
