//! Error types and handling for the rnext tunnel core

use thiserror::Error;

/// Main error type for tunnel, correlation and route operations
#[derive(Error, Debug)]
pub enum VpnError {
    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid gateway, mask or other device parameters
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Virtual adapter create/open/IO errors
    #[error("Device error: {0}")]
    Device(String),

    /// Lookup miss for operations that require an existing entry
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed prefix or entry
    #[error("Validation error: {0}")]
    Validation(String),

    /// No free host address left in the gateway network
    #[error("Address pool exhausted: {0}")]
    AddressExhausted(String),

    /// Invalid state errors
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for rnext operations
pub type Result<T> = std::result::Result<T, VpnError>;

impl From<toml::de::Error> for VpnError {
    fn from(err: toml::de::Error) -> Self {
        VpnError::Config(format!("TOML parsing error: {err}"))
    }
}

impl From<tun::Error> for VpnError {
    fn from(err: tun::Error) -> Self {
        VpnError::Device(err.to_string())
    }
}
