//! Submission queue in front of the slow-tier backend.

use crate::backend::{BackendRequest, SlowTierBackend};
use std::collections::VecDeque;

/// Queue depth at which the slow tier counts as backlogged.
pub const SLOW_BACKLOG_LIMIT: usize = 4;

/// Owns the slow backend and holds requests it has not accepted yet.
///
/// Requests are passed straight through while the queue is empty and the
/// backend accepts them. Once the backend refuses one, it and every later
/// request wait here in order until [`SlowQueue::clock`] drains them.
pub struct SlowQueue<B> {
    backend: B,
    queue: VecDeque<BackendRequest>,
}

impl<B: SlowTierBackend> SlowQueue<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            queue: VecDeque::new(),
        }
    }

    /// Submits a request, preserving submission order.
    pub fn submit(&mut self, req: BackendRequest) {
        if self.queue.is_empty() && self.backend.issue_request(&req) {
            return;
        }
        self.queue.push_back(req);
    }

    /// Advances the backend, then issues queued requests while it accepts them.
    pub fn clock(&mut self) {
        self.backend.clock();
        self.drain();
    }

    fn drain(&mut self) {
        while let Some(front) = self.queue.front() {
            if !self.backend.issue_request(front) {
                break;
            }
            self.queue.pop_front();
        }
    }

    /// Returns the number of requests waiting for the backend.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_backlogged(&self) -> bool {
        self.queue.len() >= SLOW_BACKLOG_LIMIT
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
