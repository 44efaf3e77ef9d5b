use super::Route;
use ipnet::Ipv4Net;

/// Active routes in caller-controlled order
///
/// Matching is first-match over the current order. Callers that need
/// deterministic overlap resolution should order entries (most specific first)
/// before relying on [`Routes::matches`].
#[derive(Debug, Clone)]
pub struct Routes<T> {
    items: Vec<Route<T>>,
}

impl<T> Routes<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// First route whose prefix contains `target`
    pub fn matches(&self, target: &Ipv4Net) -> Option<&Route<T>> {
        self.items.iter().find(|route| route.matches(target))
    }

    pub fn append(&mut self, route: Route<T>) {
        self.items.push(route);
    }

    /// Position of the exact-prefix entry
    pub fn find(&self, prefix: &Ipv4Net) -> Option<usize> {
        self.items.iter().position(|route| route.prefix == *prefix)
    }

    /// Remove the exact-prefix entry, keeping the order of the rest
    pub fn remove(&mut self, prefix: &Ipv4Net) -> Option<Route<T>> {
        let idx = self.find(prefix)?;
        Some(self.items.remove(idx))
    }

    /// Stable sort by the numeric value of each prefix address
    pub fn sort(&mut self) {
        self.items.sort_by_key(|route| u32::from(route.prefix.addr()));
    }

    pub fn get(&self, idx: usize) -> Option<&Route<T>> {
        self.items.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route<T>> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for Routes<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<Route<T>> for Routes<T> {
    fn from_iter<I: IntoIterator<Item = Route<T>>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
