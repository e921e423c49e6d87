//! Collaborator interfaces: the slow-tier backend and the host scheduler.
//!
//! The engine never computes slow-tier timing itself and never owns the
//! simulation clock. It composes a [`SlowTierBackend`] for slow-tier traffic
//! and a [`Scheduler`] for everything modeled as a fixed delay (fast-tier
//! accesses, chunk legs that touch the fast tier, the aging quantum).

use tiermem_common::{AccessOp, MemRequest, SimDuration, SimTime};

/// Correlates one chunk of an in-flight page migration with its page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkToken(pub u64);

impl std::fmt::Display for ChunkToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chunk:{}", self.0)
    }
}

/// One chunk-sized transfer issued by the swap coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    pub token: ChunkToken,
    /// Byte address of the chunk.
    pub addr: u64,
    pub op: AccessOp,
    /// Chunk size in bytes.
    pub size: u32,
}

/// A request handed to the slow-tier backend.
///
/// Backends treat both variants alike for timing purposes and hand the same
/// value back through [`crate::TieredMemory::on_slow_complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendRequest {
    /// A host request forwarded unchanged.
    Host(MemRequest),
    /// Migration traffic.
    Chunk(ChunkRequest),
}

impl BackendRequest {
    /// Returns the byte address of the access.
    pub fn addr(&self) -> u64 {
        match self {
            BackendRequest::Host(req) => req.addr,
            BackendRequest::Chunk(chunk) => chunk.addr,
        }
    }

    pub fn op(&self) -> AccessOp {
        match self {
            BackendRequest::Host(req) => req.op,
            BackendRequest::Chunk(chunk) => chunk.op,
        }
    }

    pub fn size(&self) -> u32 {
        match self {
            BackendRequest::Host(req) => req.size,
            BackendRequest::Chunk(chunk) => chunk.size,
        }
    }

    pub fn is_chunk(&self) -> bool {
        matches!(self, BackendRequest::Chunk(_))
    }
}

/// Events the engine schedules for itself through the host scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelfEvent {
    /// A host request served by the fast tier.
    FastAccess(MemRequest),
    /// A fast-tier chunk read of a page moving to the slow tier.
    ChunkRead(ChunkRequest),
    /// A fast-tier chunk write of a page moving to the fast tier.
    ChunkWrite(ChunkRequest),
    /// The aging quantum elapsed.
    Quantum,
}

/// The slow tier's timing model.
pub trait SlowTierBackend {
    /// Offers a request to the backend. Returns false if it cannot accept it
    /// now; the engine keeps the request queued and retries on [`clock`].
    ///
    /// [`clock`]: SlowTierBackend::clock
    fn issue_request(&mut self, req: &BackendRequest) -> bool;

    /// Advances the backend by one of its own clock cycles.
    fn clock(&mut self);

    /// Called once at the end of the simulation.
    fn finish(&mut self);
}

/// The host's discrete-event scheduler.
pub trait Scheduler {
    /// Current simulated time.
    fn now(&self) -> SimTime;

    /// Delivers `event` back to the engine's `on_self_event` after `delay`.
    fn send_after(&mut self, delay: SimDuration, event: SelfEvent);
}
