//! Registry of requests waiting for replies

use super::PendingRequest;
use bytes::Bytes;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Diagnostic view of a registered request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedRequest {
    pub id: u32,
    pub reply_required: bool,
    pub payload: Bytes,
    pub age: Duration,
}

/// Maps request identifiers to pending requests
///
/// Every operation takes the internal lock for its own duration only, so the
/// stage can be cloned and used from any number of tasks. [`RequestStage::remove`]
/// is the single point deciding which caller gets a request.
#[derive(Debug, Clone, Default)]
pub struct RequestStage {
    requests: Arc<Mutex<HashMap<u32, PendingRequest>>>,
}

impl RequestStage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u32, PendingRequest>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a request under its identifier
    ///
    /// An outstanding request with the same identifier is replaced.
    pub fn add(&self, request: PendingRequest) {
        let id = request.id();
        let replaced = self.lock().insert(id, request);
        if let Some(replaced) = replaced {
            warn!(
                "Request {} replaced an outstanding request (age {:?})",
                id,
                replaced.age()
            );
        }
    }

    /// Detach and return the request registered under `id`
    pub fn remove(&self, id: u32) -> Option<PendingRequest> {
        self.lock().remove(&id)
    }

    /// Snapshot of all registered requests, in no particular order
    pub fn show_stage(&self) -> Vec<StagedRequest> {
        self.lock()
            .values()
            .map(|request| StagedRequest {
                id: request.id(),
                reply_required: request.reply_required(),
                payload: request.payload().clone(),
                age: request.age(),
            })
            .collect()
    }

    /// Route a reply to the caller waiting on `id`
    ///
    /// Returns true if the reply was delivered.
    pub fn reply(&self, id: u32, payload: Bytes) -> bool {
        match self.remove(id) {
            Some(request) => {
                let delivered = request.deliver(payload);
                if !delivered {
                    debug!("Reply for request {id} had no waiting caller");
                }
                delivered
            }
            None => {
                debug!("No pending request for reply {id}");
                false
            }
        }
    }

    /// Detach requests that have waited at least `max_age`
    pub fn reclaim_older_than(&self, max_age: Duration) -> Vec<PendingRequest> {
        let mut requests = self.lock();
        let stale: Vec<u32> = requests
            .values()
            .filter(|request| request.age() >= max_age)
            .map(PendingRequest::id)
            .collect();
        stale
            .into_iter()
            .filter_map(|id| requests.remove(&id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RequestIds;

    #[test]
    fn test_add_remove() {
        let ids = RequestIds::new();
        let stage = RequestStage::new();
        let id = ids.next();
        stage.add(PendingRequest::new(id, Bytes::from_static(b"heartbeat"), true));

        let request = stage.remove(id).unwrap();
        assert_eq!(request.id(), id);
        assert_eq!(request.payload(), &Bytes::from_static(b"heartbeat"));
        assert!(request.reply_required());

        assert!(stage.remove(id).is_none());
        assert_eq!(stage.show_stage().len(), 0);
    }

    #[test]
    fn test_show_stage_counts_outstanding() {
        let stage = RequestStage::new();
        for id in 1..=5 {
            stage.add(PendingRequest::new(id, Bytes::new(), id % 2 == 0));
        }
        stage.remove(2);
        stage.remove(4);
        stage.remove(42);

        let mut staged: Vec<u32> = stage.show_stage().iter().map(|s| s.id).collect();
        staged.sort_unstable();
        assert_eq!(staged, vec![1, 3, 5]);
        assert_eq!(stage.len(), 3);
    }

    #[test]
    fn test_duplicate_id_replaces() {
        let stage = RequestStage::new();
        stage.add(PendingRequest::new(9, Bytes::from_static(b"old"), true));
        stage.add(PendingRequest::new(9, Bytes::from_static(b"new"), true));

        assert_eq!(stage.len(), 1);
        let request = stage.remove(9).unwrap();
        assert_eq!(request.payload(), &Bytes::from_static(b"new"));
    }

    #[tokio::test]
    async fn test_replaced_request_releases_caller() {
        let stage = RequestStage::new();
        let (old, old_rx) = PendingRequest::with_reply(9, Bytes::from_static(b"old"));
        let (new, new_rx) = PendingRequest::with_reply(9, Bytes::from_static(b"new"));
        stage.add(old);
        stage.add(new);

        // the replaced caller is woken instead of waiting forever
        assert!(old_rx.await.is_err());

        // the registry lock was released after the replacement was logged
        let other = stage.clone();
        let replied = std::thread::spawn(move || other.reply(9, Bytes::from_static(b"ok")))
            .join()
            .unwrap();
        assert!(replied);
        assert_eq!(new_rx.await.unwrap(), Bytes::from_static(b"ok"));
    }

    #[tokio::test]
    async fn test_reply_delivers_once() {
        let stage = RequestStage::new();
        let (request, rx) = PendingRequest::with_reply(11, Bytes::from_static(b"alloc"));
        stage.add(request);

        assert!(stage.reply(11, Bytes::from_static(b"10.8.0.2/32")));
        assert!(!stage.reply(11, Bytes::from_static(b"10.8.0.3/32")));
        assert_eq!(rx.await.unwrap(), Bytes::from_static(b"10.8.0.2/32"));
        assert!(stage.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reclaim_older_than() {
        let stage = RequestStage::new();
        stage.add(PendingRequest::new(1, Bytes::new(), true));
        tokio::time::advance(Duration::from_secs(10)).await;
        stage.add(PendingRequest::new(2, Bytes::new(), true));

        let reclaimed = stage.reclaim_older_than(Duration::from_secs(5));
        assert_eq!(reclaimed.len(), 1);
        assert_eq!(reclaimed[0].id(), 1);
        assert_eq!(stage.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_and_remove_race() {
        for _ in 0..200 {
            let stage = RequestStage::new();
            let adder = {
                let stage = stage.clone();
                tokio::spawn(async move {
                    stage.add(PendingRequest::new(5, Bytes::from_static(b"req-a"), true));
                })
            };
            let remover = {
                let stage = stage.clone();
                tokio::spawn(async move { stage.remove(5) })
            };
            adder.await.unwrap();
            let removed = remover.await.unwrap();

            match removed {
                Some(request) => {
                    assert_eq!(request.payload(), &Bytes::from_static(b"req-a"));
                    assert!(stage.is_empty());
                }
                None => {
                    let staged = stage.show_stage();
                    assert_eq!(staged.len(), 1);
                    assert_eq!(staged[0].id, 5);
                }
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_each_delivered_once() {
        let stage = RequestStage::new();
        let ids = Arc::new(RequestIds::new());

        let mut handles = Vec::new();
        for _ in 0..64 {
            let stage = stage.clone();
            let ids = ids.clone();
            handles.push(tokio::spawn(async move {
                let id = ids.next();
                let (request, rx) = PendingRequest::with_reply(id, Bytes::new());
                stage.add(request);
                tokio::task::yield_now().await;
                assert!(stage.reply(id, Bytes::copy_from_slice(&id.to_be_bytes())));
                let reply = rx.await.unwrap();
                assert_eq!(&reply[..], &id.to_be_bytes());
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert!(stage.is_empty());
    }
}
