use super::{EphemeralRoutes, Lease, Route, Routes};
use crate::error::{Result, VpnError};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// A route table shared between the control plane and the reaper
pub type SharedRouteTable<T> = Arc<Mutex<RouteTable<T>>>;

/// Result of [`RouteTable::lookup`]
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup<'a, T> {
    Lease(&'a Lease<T>),
    Route(&'a Route<T>),
}

/// Server-side lease and route bookkeeping for one gateway network
///
/// Client addresses are handed out from `gateway` as /32 leases that live for
/// `lease_ttl` unless renewed.
#[derive(Debug)]
pub struct RouteTable<T> {
    gateway: Ipv4Net,
    lease_ttl: Duration,
    leases: EphemeralRoutes<T>,
    routes: Routes<T>,
}

impl<T> RouteTable<T> {
    pub fn new(gateway: Ipv4Net, lease_ttl: Duration) -> Self {
        Self {
            gateway,
            lease_ttl,
            leases: EphemeralRoutes::new(),
            routes: Routes::new(),
        }
    }

    /// The gateway address and its network mask
    pub fn gateway(&self) -> Ipv4Net {
        self.gateway
    }

    pub fn lease_ttl(&self) -> Duration {
        self.lease_ttl
    }

    pub fn leases(&self) -> &EphemeralRoutes<T> {
        &self.leases
    }

    pub fn leases_mut(&mut self) -> &mut EphemeralRoutes<T> {
        &mut self.leases
    }

    pub fn routes(&self) -> &Routes<T> {
        &self.routes
    }

    pub fn routes_mut(&mut self) -> &mut Routes<T> {
        &mut self.routes
    }

    /// Lease the lowest free host address of the gateway network
    pub fn allocate(&mut self, now: Instant, meta: T) -> Result<&Lease<T>> {
        let expires = self.expiry_from(now)?;
        let gateway_addr = self.gateway.addr();
        let addr = self
            .gateway
            .hosts()
            .filter(|addr| *addr != gateway_addr)
            .find(|addr| !self.is_leased(*addr))
            .ok_or_else(|| {
                VpnError::AddressExhausted(format!("no free address in {}", self.gateway))
            })?;

        let prefix = host_prefix(addr)?;
        log::debug!("Allocated {prefix} for {:?}", self.lease_ttl);
        self.leases.add(Lease::from_prefix(prefix, expires, meta));

        self.leases
            .find(&prefix)
            .ok_or_else(|| VpnError::InvalidState(format!("lease {prefix} vanished")))
    }

    /// Extend a lease to `now + lease_ttl`, keeping expiry order
    pub fn renew(&mut self, prefix: &Ipv4Net, now: Instant) -> Result<Instant> {
        let expires = self.expiry_from(now)?;
        let mut lease = self
            .leases
            .remove(prefix)
            .ok_or_else(|| VpnError::NotFound(format!("no lease for {prefix}")))?;
        lease.expires = expires;
        self.leases.add(lease);
        Ok(expires)
    }

    pub fn release(&mut self, prefix: &Ipv4Net) -> Option<Lease<T>> {
        self.leases.remove(prefix)
    }

    /// Drop every lease that has expired at `now`
    pub fn expire(&mut self, now: Instant) -> Vec<Lease<T>> {
        self.leases.pop_expired(now)
    }

    pub fn next_expiry(&self) -> Option<Instant> {
        self.leases.front().map(|lease| lease.expires)
    }

    /// Find what governs `addr`: a client lease first, then an active route
    pub fn lookup(&self, addr: Ipv4Addr) -> Option<Lookup<'_, T>> {
        let target = host_prefix(addr).ok()?;
        if let Some(lease) = self.leases.matches(&target) {
            return Some(Lookup::Lease(lease));
        }
        self.routes.matches(&target).map(Lookup::Route)
    }

    fn expiry_from(&self, now: Instant) -> Result<Instant> {
        now.checked_add(self.lease_ttl).ok_or_else(|| {
            VpnError::Validation(format!("lease TTL {:?} overflows the clock", self.lease_ttl))
        })
    }

    fn is_leased(&self, addr: Ipv4Addr) -> bool {
        self.leases.iter().any(|lease| lease.prefix.contains(&addr))
    }
}

fn host_prefix(addr: Ipv4Addr) -> Result<Ipv4Net> {
    Ipv4Net::new(addr, 32).map_err(|e| VpnError::Validation(format!("{addr}: {e}")))
}
