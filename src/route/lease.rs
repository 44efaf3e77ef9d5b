use super::Lease;
use ipnet::Ipv4Net;
use std::collections::VecDeque;
use tokio::time::Instant;

/// Client leases ordered by ascending expiry
///
/// Lease counts are small, so insertion is a linear scan for the first entry
/// that expires later than the new one.
#[derive(Debug)]
pub struct EphemeralRoutes<T> {
    items: VecDeque<Lease<T>>,
}

impl<T> EphemeralRoutes<T> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Insert keeping expiry order; ties go after existing entries
    pub fn add(&mut self, lease: Lease<T>) {
        let idx = self
            .items
            .iter()
            .position(|item| lease.expires < item.expires)
            .unwrap_or(self.items.len());
        self.items.insert(idx, lease);
    }

    /// Exact prefix lookup
    pub fn find(&self, prefix: &Ipv4Net) -> Option<&Lease<T>> {
        self.items.iter().find(|item| item.prefix == *prefix)
    }

    pub fn remove(&mut self, prefix: &Ipv4Net) -> Option<Lease<T>> {
        let idx = self.items.iter().position(|item| item.prefix == *prefix)?;
        self.items.remove(idx)
    }

    /// First lease whose prefix contains `target`
    pub fn matches(&self, target: &Ipv4Net) -> Option<&Lease<T>> {
        self.items.iter().find(|item| item.matches(target))
    }

    /// The earliest expiring lease, left in place
    pub fn front(&self) -> Option<&Lease<T>> {
        self.items.front()
    }

    /// Detach every lease that has expired at `now`, earliest first
    pub fn pop_expired(&mut self, now: Instant) -> Vec<Lease<T>> {
        let due = self
            .items
            .iter()
            .take_while(|item| item.is_expired(now))
            .count();
        self.items.drain(..due).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lease<T>> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for EphemeralRoutes<T> {
    fn default() -> Self {
        Self::new()
    }
}
