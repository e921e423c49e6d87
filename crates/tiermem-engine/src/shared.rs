//! Thread-safe handle to a tiered memory engine.

use crate::backend::{BackendRequest, Scheduler, SelfEvent, SlowTierBackend};
use crate::router::TieredMemory;
use crate::stats::TierStats;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tiermem_common::{MemRequest, PageAddr, Result, TierConfig};

/// Cloneable handle that serializes every entry point behind one lock.
pub struct SharedTieredMemory<B, S> {
    inner: Arc<Mutex<TieredMemory<B, S>>>,
}

impl<B, S> Clone for SharedTieredMemory<B, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: SlowTierBackend, S: Scheduler> SharedTieredMemory<B, S> {
    pub fn new(config: TierConfig, backend: B, scheduler: S) -> Result<Self> {
        Ok(Self::from_engine(TieredMemory::new(config, backend, scheduler)?))
    }

    pub fn from_engine(engine: TieredMemory<B, S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Locks the engine for a sequence of calls.
    pub fn lock(&self) -> MutexGuard<'_, TieredMemory<B, S>> {
        self.inner.lock()
    }

    pub fn issue(&self, req: MemRequest) -> Result<()> {
        self.inner.lock().issue(req)
    }

    pub fn on_self_event(&self, event: SelfEvent) -> Result<Option<MemRequest>> {
        self.inner.lock().on_self_event(event)
    }

    pub fn on_slow_complete(&self, req: BackendRequest) -> Result<Option<MemRequest>> {
        self.inner.lock().on_slow_complete(req)
    }

    pub fn clock(&self) {
        self.inner.lock().clock();
    }

    pub fn finish(&self) -> Result<()> {
        self.inner.lock().finish()
    }

    pub fn set_scan_length(&self, addr: PageAddr, len: u32) {
        self.inner.lock().set_scan_length(addr, len);
    }

    pub fn stats(&self) -> TierStats {
        self.inner.lock().stats()
    }
}
