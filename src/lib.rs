//! rnext - tunnel and lease core of a VPN overlay
//!
//! ## What This Crate Provides
//! - [`tunnel`]: a TUN device that pumps raw packets between the adapter and
//!   the transport queues, with clean cancellation-driven shutdown
//! - [`protocol`]: correlation of asynchronous replies with outstanding
//!   requests by numeric identifier
//! - [`route`]: server-side address leases in expiry order, the active route
//!   collection, and a background lease reaper
//! - [`config`]: TOML configuration for all of the above
//!
//! ## What Your Application Must Implement
//! - The authenticated control endpoint and payload encryption
//! - Credential storage
//! - Forwarding decisions beyond lease bookkeeping

pub mod config;
pub mod error;
pub mod protocol;
pub mod route;
pub mod tunnel;

pub use config::Config;
pub use error::{Result, VpnError};
pub use protocol::{PendingRequest, RequestIds, RequestStage};
pub use route::{EphemeralRoutes, Lease, Route, RouteTable, Routes};
pub use tunnel::{TunnelConfig, TunnelDevice};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
