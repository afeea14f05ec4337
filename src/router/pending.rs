//! Subscribe requests that have not seen their first answer yet.
//!
//! Coinone's `ERROR` frames carry no topic, so a rejection is matched to the
//! oldest outstanding request: the server answers requests in the order it
//! received them. A request stays queued from the moment its frame is sent
//! until the topic's first `DATA` or an `ERROR` consumes it, whether or not
//! anyone is still waiting on it.
//!
//! Callers waiting on a topic register separately. A rejection reaches
//! every waiter of the rejected topic.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::oneshot;

use crate::error::Error;

#[derive(Debug)]
struct Request {
    id: u64,
    topic: String,
}

#[derive(Debug)]
struct Waiter {
    id: u64,
    reject: oneshot::Sender<Error>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Sent requests, oldest first
    requests: VecDeque<Request>,
    waiters: FxHashMap<String, Vec<Waiter>>,
    /// Topics a subscribe frame has been claimed for
    subscribed: FxHashSet<String>,
}

/// FIFO of outstanding subscribe requests plus the callers waiting on them
#[derive(Debug, Default)]
pub struct PendingRequests {
    next_id: AtomicU64,
    inner: Mutex<Inner>,
}

impl PendingRequests {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Claim the subscribe frame for `topic`
    ///
    /// Returns `None` if the topic is already subscribed or being
    /// subscribed. Otherwise the request is queued right away, so an
    /// immediate `ERROR` finds it. Call [`RequestGuard::sent`] once the
    /// frame is out; dropping the guard before that withdraws the request
    /// and releases the topic.
    pub fn claim(self: &Arc<Self>, topic: &str) -> Option<RequestGuard> {
        let id = self.next_id();
        let mut inner = self.inner.lock();
        if !inner.subscribed.insert(topic.to_string()) {
            return None;
        }
        inner.requests.push_back(Request {
            id,
            topic: topic.to_string(),
        });
        Some(RequestGuard {
            id,
            topic: topic.to_string(),
            pending: Arc::clone(self),
            sent: false,
        })
    }

    /// Wait on `topic`
    ///
    /// The returned guard yields the error if the topic's request is
    /// rejected, and unregisters when dropped.
    pub fn wait(self: &Arc<Self>, topic: &str) -> WaitGuard {
        let id = self.next_id();
        let (reject, rejection) = oneshot::channel();
        self.inner
            .lock()
            .waiters
            .entry(topic.to_string())
            .or_default()
            .push(Waiter { id, reject });
        WaitGuard {
            id,
            topic: topic.to_string(),
            pending: Arc::clone(self),
            rejection,
        }
    }

    /// Queue the requests replayed on a fresh socket
    ///
    /// Replayed topics go first, in replay order, replacing whatever was
    /// queued for them on the previous socket. Requests for other topics
    /// have not reached a socket yet and keep their place behind them.
    pub fn replay<'a, I>(&self, topics: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut inner = self.inner.lock();
        let mut queued = std::mem::take(&mut inner.requests);
        for topic in topics {
            let request = match queued.iter().position(|r| r.topic == topic) {
                Some(index) => queued.remove(index),
                None => None,
            };
            let request = request.unwrap_or_else(|| Request {
                id: self.next_id(),
                topic: topic.to_string(),
            });
            inner.subscribed.insert(request.topic.clone());
            inner.requests.push_back(request);
        }
        inner.requests.extend(queued);
    }

    /// Settle the request for `topic` after its first value arrived
    ///
    /// Waiters stop listening for a rejection. Returns how many requests
    /// were settled.
    pub fn resolve(&self, topic: &str) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.requests.len();
        inner.requests.retain(|request| request.topic != topic);
        inner.waiters.remove(topic);
        before - inner.requests.len()
    }

    /// Reject the oldest request
    ///
    /// The topic is released so a later call may subscribe again, and every
    /// waiter on it receives the error. Returns the rejected topic, or
    /// `None` if nothing was pending.
    pub fn reject_oldest(&self, code: i64, message: &str) -> Option<String> {
        let mut inner = self.inner.lock();
        let request = inner.requests.pop_front()?;
        inner.subscribed.remove(&request.topic);
        for waiter in inner.waiters.remove(&request.topic).unwrap_or_default() {
            // A waiter dropped after the lookup has nobody to tell
            let _ = waiter.reject.send(Error::from_exchange(code, message));
        }
        Some(request.topic)
    }

    /// Check if a subscribe frame was claimed for `topic`
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.inner.lock().subscribed.contains(topic)
    }

    /// Number of callers waiting on `topic`
    pub fn waiting(&self, topic: &str) -> usize {
        self.inner.lock().waiters.get(topic).map_or(0, Vec::len)
    }

    /// Number of outstanding requests
    pub fn len(&self) -> usize {
        self.inner.lock().requests.len()
    }

    /// Check if no request is outstanding
    pub fn is_empty(&self) -> bool {
        self.inner.lock().requests.is_empty()
    }

    fn withdraw(&self, id: u64, topic: &str) {
        let mut inner = self.inner.lock();
        let before = inner.requests.len();
        inner.requests.retain(|request| request.id != id);
        // Only release the topic if it was still ours
        if inner.requests.len() < before {
            inner.subscribed.remove(topic);
        }
    }

    fn unwait(&self, id: u64, topic: &str) {
        let mut inner = self.inner.lock();
        if let Some(waiters) = inner.waiters.get_mut(topic) {
            waiters.retain(|waiter| waiter.id != id);
            if waiters.is_empty() {
                inner.waiters.remove(topic);
            }
        }
    }
}

/// A claimed subscribe request whose frame may not be out yet
#[derive(Debug)]
pub struct RequestGuard {
    id: u64,
    topic: String,
    pending: Arc<PendingRequests>,
    sent: bool,
}

impl RequestGuard {
    /// Mark the frame as sent
    ///
    /// The request then stays queued until the exchange answers it.
    pub fn sent(mut self) {
        self.sent = true;
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        if !self.sent {
            self.pending.withdraw(self.id, &self.topic);
        }
    }
}

/// One caller waiting on a topic
#[derive(Debug)]
pub struct WaitGuard {
    id: u64,
    topic: String,
    pending: Arc<PendingRequests>,
    rejection: oneshot::Receiver<Error>,
}

impl WaitGuard {
    /// Wait until the topic's request is rejected
    ///
    /// Returns `None` once the request has been settled without error.
    /// Must not be polled again after it returned.
    pub async fn rejected(&mut self) -> Option<Error> {
        (&mut self.rejection).await.ok()
    }
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        self.pending.unwait(self.id, &self.topic);
    }
}
