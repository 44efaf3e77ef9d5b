//! Address and route bookkeeping for the server side of the overlay
//!
//! Two cooperating containers live here:
//! - [`EphemeralRoutes`]: client leases kept in ascending expiry order so the
//!   reaper only ever has to look at the front.
//! - [`Routes`]: the active route collection, ordered by the caller and
//!   optionally sorted by prefix address.
//!
//! [`RouteTable`] combines both with an address allocator. None of these types
//! lock internally: they are single-owner structures and every mutation takes
//! `&mut self`. Share them across tasks through [`SharedRouteTable`].

use crate::error::{Result, VpnError};
use ipnet::Ipv4Net;
use tokio::time::Instant;

mod lease;
pub mod reaper;
mod routes;
mod table;

pub use lease::EphemeralRoutes;
pub use routes::Routes;
pub use table::{Lookup, RouteTable, SharedRouteTable};

/// Parse a CIDR string such as `10.0.0.0/24`
///
/// Malformed input is rejected here so that sorting and matching never see an
/// entry without a numeric address.
pub fn parse_prefix(cidr: &str) -> Result<Ipv4Net> {
    cidr.trim()
        .parse::<Ipv4Net>()
        .map_err(|e| VpnError::Validation(format!("invalid prefix '{cidr}': {e}")))
}

/// A prefix-to-metadata mapping in the active route collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route<T> {
    pub prefix: Ipv4Net,
    pub meta: T,
}

impl<T> Route<T> {
    /// Create a route from a CIDR string
    pub fn new(cidr: &str, meta: T) -> Result<Self> {
        Ok(Self::from_prefix(parse_prefix(cidr)?, meta))
    }

    pub fn from_prefix(prefix: Ipv4Net, meta: T) -> Self {
        Self { prefix, meta }
    }

    /// Containment test: does this route cover `target`?
    pub fn matches(&self, target: &Ipv4Net) -> bool {
        self.prefix.contains(target)
    }
}

/// A time-bounded assignment of a prefix to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease<T> {
    pub prefix: Ipv4Net,
    pub expires: Instant,
    pub meta: T,
}

impl<T> Lease<T> {
    /// Create a lease from a CIDR string
    pub fn new(cidr: &str, expires: Instant, meta: T) -> Result<Self> {
        Ok(Self::from_prefix(parse_prefix(cidr)?, expires, meta))
    }

    pub fn from_prefix(prefix: Ipv4Net, expires: Instant, meta: T) -> Self {
        Self {
            prefix,
            expires,
            meta,
        }
    }

    pub fn matches(&self, target: &Ipv4Net) -> bool {
        self.prefix.contains(target)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires <= now
    }
}
