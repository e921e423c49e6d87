//! Simulated host for driving the engine in integration tests.
//!
//! Time advances in fixed clock steps. On each step the slow backend is
//! clocked, its completions are handed back to the engine, and every self
//! event due by the current time is delivered.

#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use tiermem_common::{MemRequest, Result, SimDuration, SimTime, TierConfig};
use tiermem_engine::{BackendRequest, Scheduler, SelfEvent, SlowTierBackend, TieredMemory};

pub const CLOCK_NS: SimTime = 10;
const MAX_STEPS: usize = 1_000_000;

/// Slow tier with a fixed latency in clocks and a bounded number of
/// requests in flight.
#[derive(Debug)]
pub struct MockSlow {
    pub latency_clocks: u32,
    pub max_in_flight: usize,
    in_flight: VecDeque<(u32, BackendRequest)>,
    completed: Vec<BackendRequest>,
    /// Every request accepted, in acceptance order.
    pub issued: Vec<BackendRequest>,
    pub finished: bool,
}

impl MockSlow {
    pub fn new(latency_clocks: u32, max_in_flight: usize) -> Self {
        Self {
            latency_clocks,
            max_in_flight,
            in_flight: VecDeque::new(),
            completed: Vec::new(),
            issued: Vec::new(),
            finished: false,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty() && self.completed.is_empty()
    }

    fn take_completed(&mut self) -> Vec<BackendRequest> {
        std::mem::take(&mut self.completed)
    }
}

impl Default for MockSlow {
    fn default() -> Self {
        Self::new(3, 8)
    }
}

impl SlowTierBackend for MockSlow {
    fn issue_request(&mut self, req: &BackendRequest) -> bool {
        if self.in_flight.len() >= self.max_in_flight {
            return false;
        }
        self.in_flight.push_back((self.latency_clocks, req.clone()));
        self.issued.push(req.clone());
        true
    }

    fn clock(&mut self) {
        for (remaining, _) in self.in_flight.iter_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        while self.in_flight.front().is_some_and(|(remaining, _)| *remaining == 0) {
            if let Some((_, req)) = self.in_flight.pop_front() {
                self.completed.push(req);
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

#[derive(Debug)]
struct Pending {
    at: SimTime,
    seq: u64,
    event: SelfEvent,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        (self.at, self.seq) == (other.at, other.seq)
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    // Min-heap on (at, seq)
    fn cmp(&self, other: &Self) -> Ordering {
        (other.at, other.seq).cmp(&(self.at, self.seq))
    }
}

/// Discrete-event scheduler over a binary heap.
#[derive(Debug, Default)]
pub struct SimScheduler {
    now: SimTime,
    seq: u64,
    heap: BinaryHeap<Pending>,
}

impl SimScheduler {
    fn pop_due(&mut self) -> Option<SelfEvent> {
        if self.heap.peek().is_some_and(|p| p.at <= self.now) {
            self.heap.pop().map(|p| p.event)
        } else {
            None
        }
    }

    /// Returns true if anything other than the aging quantum is scheduled.
    fn has_work(&self) -> bool {
        self.heap.iter().any(|p| p.event != SelfEvent::Quantum)
    }
}

impl Scheduler for SimScheduler {
    fn now(&self) -> SimTime {
        self.now
    }

    fn send_after(&mut self, delay: SimDuration, event: SelfEvent) {
        self.seq += 1;
        self.heap.push(Pending {
            at: self.now + delay.as_nanos(),
            seq: self.seq,
            event,
        });
    }
}

pub type Engine = TieredMemory<MockSlow, SimScheduler>;

/// Host loop around an engine.
pub struct Sim {
    pub mem: Engine,
    /// Host requests completed, in completion order.
    pub completed: Vec<MemRequest>,
    /// Chunk completions delivered from each tier.
    pub slow_chunk_done: usize,
    pub fast_chunk_done: usize,
    pub quanta: usize,
}

impl Sim {
    pub fn new(config: TierConfig) -> Result<Self> {
        Self::with_backend(config, MockSlow::default())
    }

    pub fn with_backend(config: TierConfig, backend: MockSlow) -> Result<Self> {
        Ok(Self {
            mem: TieredMemory::new(config, backend, SimScheduler::default())?,
            completed: Vec::new(),
            slow_chunk_done: 0,
            fast_chunk_done: 0,
            quanta: 0,
        })
    }

    pub fn now(&self) -> SimTime {
        self.mem.scheduler().now
    }

    pub fn issue(&mut self, req: MemRequest) {
        self.mem.issue(req).unwrap();
    }

    /// Runs one clock step.
    pub fn step(&mut self) {
        self.mem.clock();
        for req in self.mem.backend_mut().take_completed() {
            if req.is_chunk() {
                self.slow_chunk_done += 1;
            }
            if let Some(done) = self.mem.on_slow_complete(req).unwrap() {
                self.completed.push(done);
            }
        }
        while let Some(event) = self.mem.scheduler_mut().pop_due() {
            match &event {
                SelfEvent::ChunkRead(_) | SelfEvent::ChunkWrite(_) => self.fast_chunk_done += 1,
                SelfEvent::Quantum => self.quanta += 1,
                SelfEvent::FastAccess(_) => {}
            }
            if let Some(done) = self.mem.on_self_event(event).unwrap() {
                self.completed.push(done);
            }
        }
        self.mem.scheduler_mut().now += CLOCK_NS;
    }

    /// Returns true while any request or migration is outstanding.
    pub fn busy(&self) -> bool {
        let stats = self.mem.stats();
        !self.mem.backend().is_idle()
            || self.mem.scheduler().has_work()
            || stats.slow_queue_depth > 0
            || stats.pending_chunks > 0
            || stats.waiting_requests > 0
    }

    /// Steps until nothing is outstanding.
    pub fn settle(&mut self) {
        for _ in 0..MAX_STEPS {
            if !self.busy() {
                return;
            }
            self.step();
        }
        panic!("simulation did not settle");
    }

    /// Steps until simulated time reaches `t`.
    pub fn run_until(&mut self, t: SimTime) {
        while self.now() < t {
            self.step();
        }
    }
}
