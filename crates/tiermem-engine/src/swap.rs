//! Chunked page migration between tiers.
//!
//! A migration moves a page as `num_chunks` independent chunk transfers. Each
//! chunk takes two legs: a read from the source tier, then a write into the
//! destination tier. Fast-tier legs are modeled as self events after the
//! fast-tier latency; slow-tier legs go through the slow backend.
//!
//! ```text
//!   to fast:  slow read  --(ToFastRead)-->  fast write --(ToFastWrite)--> done
//!   to slow:  fast read  --(ToSlowRead)-->  slow write --(ToSlowWrite)--> done
//! ```
//!
//! While a page is migrating, host requests for it are parked here and
//! released in arrival order once the last chunk lands.

use crate::backend::{
    BackendRequest, ChunkRequest, ChunkToken, Scheduler, SelfEvent, SlowTierBackend,
};
use crate::page_table::{PageIdx, PageTable, SwapDir};
use crate::slow::SlowQueue;
use std::collections::{HashMap, VecDeque};
use tiermem_common::{
    AccessOp, MemRequest, PageAddr, Result, SimDuration, TierConfig, TierError,
};
use tracing::debug;

/// The four legs a chunk can be waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    ToFastRead = 0,
    ToFastWrite = 1,
    ToSlowRead = 2,
    ToSlowWrite = 3,
}

impl Leg {
    pub fn name(&self) -> &'static str {
        match self {
            Leg::ToFastRead => "to-fast read",
            Leg::ToFastWrite => "to-fast write",
            Leg::ToSlowRead => "to-slow read",
            Leg::ToSlowWrite => "to-slow write",
        }
    }
}

/// Where the coordinator sends traffic.
pub struct Tiers<'a, B, S> {
    pub slow: &'a mut SlowQueue<B>,
    pub scheduler: &'a mut S,
    pub access_time: SimDuration,
}

impl<'a, B: SlowTierBackend, S: Scheduler> Tiers<'a, B, S> {
    pub fn new(
        slow: &'a mut SlowQueue<B>,
        scheduler: &'a mut S,
        access_time: SimDuration,
    ) -> Self {
        Self {
            slow,
            scheduler,
            access_time,
        }
    }

    /// Schedules a fast-tier access.
    pub fn to_fast(&mut self, event: SelfEvent) {
        self.scheduler.send_after(self.access_time, event);
    }

    /// Submits a slow-tier access.
    pub fn to_slow(&mut self, req: BackendRequest) {
        self.slow.submit(req);
    }
}

/// Drives page migrations and holds requests that arrive during one.
#[derive(Debug)]
pub struct SwapCoordinator {
    page_shift: u32,
    chunk_shift: u32,
    num_chunks: u32,
    next_token: u64,
    /// Chunk token to page, one index per leg.
    pending: [HashMap<ChunkToken, PageIdx>; 4],
    waiting: HashMap<PageAddr, VecDeque<MemRequest>>,
}

impl SwapCoordinator {
    /// Builds a coordinator for the configured page geometry.
    ///
    /// Without `model_swaps` no migration is ever started and the chunk count
    /// is left at zero.
    pub fn new(config: &TierConfig) -> Result<Self> {
        let num_chunks = if config.model_swaps {
            config.num_chunks().ok_or_else(|| {
                TierError::ConfigError(format!(
                    "2^{} chunks per page is too many",
                    config.page_shift.saturating_sub(config.chunk_shift)
                ))
            })?
        } else {
            0
        };
        Ok(Self {
            page_shift: config.page_shift,
            chunk_shift: config.chunk_shift,
            num_chunks,
            next_token: 0,
            pending: Default::default(),
            waiting: HashMap::new(),
        })
    }

    pub fn num_chunks(&self) -> u32 {
        self.num_chunks
    }

    /// Returns the number of chunks awaited on `leg`.
    pub fn pending_on(&self, leg: Leg) -> usize {
        self.pending[leg as usize].len()
    }

    /// Returns the number of chunks awaited on any leg.
    pub fn pending_chunks(&self) -> usize {
        self.pending.iter().map(HashMap::len).sum()
    }

    /// Returns the number of requests parked for `addr`.
    pub fn waiting_for(&self, addr: PageAddr) -> usize {
        self.waiting.get(&addr).map_or(0, VecDeque::len)
    }

    /// Returns the number of requests parked for all pages.
    pub fn waiting_requests(&self) -> usize {
        self.waiting.values().map(VecDeque::len).sum()
    }

    /// Parks a request until the migration of its page completes.
    pub fn park(&mut self, addr: PageAddr, req: MemRequest) {
        self.waiting.entry(addr).or_default().push_back(req);
    }

    fn next_token(&mut self) -> ChunkToken {
        let token = ChunkToken(self.next_token);
        self.next_token += 1;
        token
    }

    fn take(&mut self, leg: Leg, token: ChunkToken) -> Result<PageIdx> {
        self.pending[leg as usize]
            .remove(&token)
            .ok_or(TierError::UnknownChunk {
                token: token.0,
                leg: leg.name(),
            })
    }

    fn start(&mut self, pages: &mut PageTable, idx: PageIdx, dir: SwapDir) -> Result<u64> {
        let rec = &mut pages[idx];
        if rec.is_swapping() {
            return Err(TierError::InvariantViolation(format!(
                "{} already migrating ({:?}) when starting {:?}",
                rec.addr, rec.swap_dir, dir
            )));
        }
        rec.swap_dir = dir;
        rec.swaps_out = self.num_chunks;
        debug!(page = %rec.addr, ?dir, chunks = self.num_chunks, "Starting migration");
        Ok(rec.addr.base_addr(self.page_shift))
    }

    fn chunks(&mut self, base: u64, op: AccessOp) -> Vec<ChunkRequest> {
        let size = 1u32 << self.chunk_shift;
        (0..u64::from(self.num_chunks))
            .map(|i| ChunkRequest {
                token: self.next_token(),
                addr: base + (i << self.chunk_shift),
                op,
                size,
            })
            .collect()
    }

    /// Starts moving a page into the fast tier: chunk reads from the slow tier.
    pub fn begin_migrate_in<B: SlowTierBackend, S: Scheduler>(
        &mut self,
        pages: &mut PageTable,
        idx: PageIdx,
        tiers: &mut Tiers<'_, B, S>,
    ) -> Result<()> {
        let base = self.start(pages, idx, SwapDir::SlowToFast)?;
        for chunk in self.chunks(base, AccessOp::Read) {
            self.pending[Leg::ToFastRead as usize].insert(chunk.token, idx);
            tiers.to_slow(BackendRequest::Chunk(chunk));
        }
        Ok(())
    }

    /// Starts moving a page out to the slow tier: chunk reads from the fast tier.
    pub fn begin_migrate_out<B: SlowTierBackend, S: Scheduler>(
        &mut self,
        pages: &mut PageTable,
        idx: PageIdx,
        tiers: &mut Tiers<'_, B, S>,
    ) -> Result<()> {
        let base = self.start(pages, idx, SwapDir::FastToSlow)?;
        for chunk in self.chunks(base, AccessOp::Read) {
            self.pending[Leg::ToSlowRead as usize].insert(chunk.token, idx);
            tiers.to_fast(SelfEvent::ChunkRead(chunk));
        }
        Ok(())
    }

    /// Handles a chunk completion from the slow backend.
    pub fn on_slow_chunk<B: SlowTierBackend, S: Scheduler>(
        &mut self,
        pages: &mut PageTable,
        mut chunk: ChunkRequest,
        tiers: &mut Tiers<'_, B, S>,
    ) -> Result<()> {
        match chunk.op {
            // Page moving in: write it into the fast tier
            AccessOp::Read => {
                let idx = self.take(Leg::ToFastRead, chunk.token)?;
                chunk.op = AccessOp::Write;
                self.pending[Leg::ToFastWrite as usize].insert(chunk.token, idx);
                tiers.to_fast(SelfEvent::ChunkWrite(chunk));
                Ok(())
            }
            // Page moving out: this chunk has landed
            AccessOp::Write => {
                let idx = self.take(Leg::ToSlowWrite, chunk.token)?;
                self.chunk_done(pages, idx, tiers)
            }
        }
    }

    /// Handles a fast-tier chunk read of a page moving out.
    pub fn on_fast_read<B: SlowTierBackend, S: Scheduler>(
        &mut self,
        mut chunk: ChunkRequest,
        tiers: &mut Tiers<'_, B, S>,
    ) -> Result<()> {
        let idx = self.take(Leg::ToSlowRead, chunk.token)?;
        chunk.op = AccessOp::Write;
        self.pending[Leg::ToSlowWrite as usize].insert(chunk.token, idx);
        tiers.to_slow(BackendRequest::Chunk(chunk));
        Ok(())
    }

    /// Handles a fast-tier chunk write of a page moving in.
    pub fn on_fast_write<B: SlowTierBackend, S: Scheduler>(
        &mut self,
        pages: &mut PageTable,
        chunk: ChunkRequest,
        tiers: &mut Tiers<'_, B, S>,
    ) -> Result<()> {
        let idx = self.take(Leg::ToFastWrite, chunk.token)?;
        self.chunk_done(pages, idx, tiers)
    }

    fn chunk_done<B: SlowTierBackend, S: Scheduler>(
        &mut self,
        pages: &mut PageTable,
        idx: PageIdx,
        tiers: &mut Tiers<'_, B, S>,
    ) -> Result<()> {
        let rec = &mut pages[idx];
        if rec.swaps_out == 0 || !rec.is_swapping() {
            return Err(TierError::InvariantViolation(format!(
                "chunk completion for {} with swaps_out={} dir={:?}",
                rec.addr, rec.swaps_out, rec.swap_dir
            )));
        }
        rec.swaps_out -= 1;
        if rec.swaps_out == 0 {
            self.complete_migration(pages, idx, tiers)?;
        }
        Ok(())
    }

    /// Finishes a migration and releases the requests parked behind it.
    ///
    /// Returns the number of requests released.
    pub fn complete_migration<B: SlowTierBackend, S: Scheduler>(
        &mut self,
        pages: &mut PageTable,
        idx: PageIdx,
        tiers: &mut Tiers<'_, B, S>,
    ) -> Result<usize> {
        let rec = &mut pages[idx];
        if rec.swaps_out != 0 || !rec.is_swapping() {
            return Err(TierError::InvariantViolation(format!(
                "completing migration of {} with swaps_out={} dir={:?}",
                rec.addr, rec.swaps_out, rec.swap_dir
            )));
        }

        let addr = rec.addr;
        let dir = rec.swap_dir;
        let waiting = self.waiting.remove(&addr).unwrap_or_default();
        let released = waiting.len();
        for req in waiting {
            if req.page(self.page_shift) != addr {
                return Err(TierError::InvariantViolation(format!(
                    "{} parked behind migration of {}",
                    req.id, addr
                )));
            }
            match dir {
                SwapDir::FastToSlow => tiers.to_slow(BackendRequest::Host(req)),
                _ => tiers.to_fast(SelfEvent::FastAccess(req)),
            }
        }
        rec.swap_dir = SwapDir::Stable;

        debug!(page = %addr, ?dir, released, "Migration complete");
        Ok(released)
    }
}
