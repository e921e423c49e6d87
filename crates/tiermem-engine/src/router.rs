//! The tiered memory engine: routes host requests between tiers.

use crate::backend::{BackendRequest, Scheduler, SelfEvent, SlowTierBackend};
use crate::page_table::{PageIdx, PageRecord, PageTable};
use crate::replacer::{AccessContext, AccessOutcome, Replacer, build_replacer};
use crate::slow::SlowQueue;
use crate::stats::{AccessStatsWriter, EngineCounters, TierStats};
use crate::swap::{SwapCoordinator, Tiers};
use tiermem_common::{MemRequest, PageAddr, Result, SimDuration, SimTime, TierConfig};
use tracing::{debug, info};

/// A two-tier memory controller.
///
/// Every host request goes through [`issue`](TieredMemory::issue), which
/// decides from per-page access history whether the page lives in the fast
/// tier, starts migrations when placement changes, and dispatches the request
/// to the right tier. Completions come back through
/// [`on_self_event`](TieredMemory::on_self_event) for anything the engine
/// scheduled itself and [`on_slow_complete`](TieredMemory::on_slow_complete)
/// for the slow backend; both return the host request that completed, if any.
pub struct TieredMemory<B, S> {
    config: TierConfig,
    pages: PageTable,
    replacer: Box<dyn Replacer>,
    swaps: SwapCoordinator,
    slow: SlowQueue<B>,
    scheduler: S,
    counters: EngineCounters,
    access_stats: Option<AccessStatsWriter>,
}

impl<B: SlowTierBackend, S: Scheduler> TieredMemory<B, S> {
    /// Creates an engine and arms the first aging quantum.
    ///
    /// Fails if the configuration is inconsistent; no request is accepted
    /// from an engine that failed to build.
    pub fn new(config: TierConfig, backend: B, mut scheduler: S) -> Result<Self> {
        config.validate()?;
        let replacer = build_replacer(&config)?;
        let swaps = SwapCoordinator::new(&config)?;
        let access_stats = config
            .collect_stats
            .then(|| AccessStatsWriter::new(config.acc_stats_prefix.clone()));

        info!(
            max_fast_pages = config.max_fast_pages,
            page_size = config.page_size(),
            replace = %config.page_replace_strategy,
            add = %config.page_add_strategy,
            threshold = config.threshold,
            model_swaps = config.model_swaps,
            "Tiered memory initialized"
        );

        scheduler.send_after(config.quantum, SelfEvent::Quantum);
        Ok(Self {
            swaps,
            config,
            pages: PageTable::new(),
            replacer,
            slow: SlowQueue::new(backend),
            scheduler,
            counters: EngineCounters::default(),
            access_stats,
        })
    }

    fn tiers(&mut self) -> (&mut SwapCoordinator, &mut PageTable, Tiers<'_, B, S>) {
        (
            &mut self.swaps,
            &mut self.pages,
            Tiers::new(&mut self.slow, &mut self.scheduler, self.config.access_time),
        )
    }

    /// Accepts a host request.
    pub fn issue(&mut self, req: MemRequest) -> Result<()> {
        let now = self.scheduler.now();
        let addr = req.page(self.config.page_shift);
        let idx = self.pages.get_or_insert(addr);

        let rec = &mut self.pages[idx];
        rec.touched += 1;
        if self.config.collect_stats {
            rec.access.record(req.op);
        }
        self.counters.fast_acc += 1;

        let mut just_swapped = false;
        let in_fast = if self.config.max_fast_pages == 0 {
            false
        } else if self.config.model_swaps && self.pages[idx].is_swapping() {
            // A page in motion is neither re-admitted nor evicted
            self.pages[idx].in_fast
        } else {
            let ctx = AccessContext {
                now,
                slow_backlogged: self.config.slow_backpressure && self.slow.is_backlogged(),
            };
            let outcome = self.replacer.on_access(&mut self.pages, idx, ctx);
            self.apply_outcome(idx, &outcome)?;
            just_swapped = outcome.just_swapped;
            outcome.in_fast
        };

        if self.config.model_swaps && self.pages[idx].is_swapping() {
            self.swaps.park(addr, req);
            self.counters.swap_delays += 1;
            return Ok(());
        }

        if in_fast {
            self.counters.fast_hits += 1;
            let delay = self.fast_delay(idx, now, just_swapped);
            self.scheduler.send_after(delay, SelfEvent::FastAccess(req));
        } else {
            self.slow.submit(BackendRequest::Host(req));
        }
        Ok(())
    }

    fn apply_outcome(&mut self, idx: PageIdx, outcome: &AccessOutcome) -> Result<()> {
        if outcome.blocked {
            self.counters.cant_swap += 1;
            debug!(
                page = %self.pages[idx].addr,
                resident = self.replacer.pages_in_fast(),
                "No evictable page in the fast tier"
            );
            return Ok(());
        }

        if let Some(victim) = outcome.evicted {
            self.counters.fast_swaps += 1;
            debug!(
                evicted = %self.pages[victim].addr,
                admitted = %self.pages[idx].addr,
                "Evicting page from the fast tier"
            );
            if self.config.model_swaps {
                let (swaps, pages, mut tiers) = self.tiers();
                swaps.begin_migrate_out(pages, victim, &mut tiers)?;
            }
        }

        if outcome.just_swapped && self.config.model_swaps {
            let (swaps, pages, mut tiers) = self.tiers();
            swaps.begin_migrate_in(pages, idx, &mut tiers)?;
        }
        Ok(())
    }

    /// Fast-tier latency for a request, including the flat transfer penalty
    /// applied when migrations are not modeled chunk by chunk.
    fn fast_delay(&mut self, idx: PageIdx, now: SimTime, just_swapped: bool) -> SimDuration {
        let access_time = self.config.access_time;
        if self.config.model_swaps || self.config.transfer_delay == 0 {
            return access_time;
        }
        let rec = &mut self.pages[idx];
        if just_swapped {
            rec.page_delay = now + self.config.transfer_delay;
        }
        if rec.page_delay > now {
            SimDuration::from_nanos(rec.page_delay - now).max(access_time)
        } else {
            access_time
        }
    }

    /// Handles an event previously scheduled through the host scheduler.
    ///
    /// Returns the host request that completed, if the event was one.
    pub fn on_self_event(&mut self, event: SelfEvent) -> Result<Option<MemRequest>> {
        match event {
            SelfEvent::FastAccess(req) => Ok(Some(req)),
            SelfEvent::ChunkRead(chunk) => {
                let (swaps, _, mut tiers) = self.tiers();
                swaps.on_fast_read(chunk, &mut tiers)?;
                Ok(None)
            }
            SelfEvent::ChunkWrite(chunk) => {
                let (swaps, pages, mut tiers) = self.tiers();
                swaps.on_fast_write(pages, chunk, &mut tiers)?;
                Ok(None)
            }
            SelfEvent::Quantum => {
                self.age()?;
                self.scheduler.send_after(self.config.quantum, SelfEvent::Quantum);
                Ok(None)
            }
        }
    }

    /// Handles a completion from the slow backend.
    ///
    /// Returns the host request that completed; migration traffic returns
    /// `None`.
    pub fn on_slow_complete(&mut self, req: BackendRequest) -> Result<Option<MemRequest>> {
        match req {
            BackendRequest::Host(req) => Ok(Some(req)),
            BackendRequest::Chunk(chunk) => {
                let (swaps, pages, mut tiers) = self.tiers();
                swaps.on_slow_chunk(pages, chunk, &mut tiers)?;
                Ok(None)
            }
        }
    }

    fn age(&mut self) -> Result<()> {
        if let Some(writer) = self.access_stats.as_mut() {
            writer.dump(&mut self.pages)?;
        }
        self.replacer.on_aging();
        self.pages.age_all();
        debug!(pages = self.pages.len(), "Aging tick");
        Ok(())
    }

    /// Advances the slow backend and drains queued slow-tier requests.
    pub fn clock(&mut self) {
        let before = self.slow.len();
        self.slow.clock();
        if before != self.slow.len() {
            debug!(
                drained = before - self.slow.len(),
                queued = self.slow.len(),
                "Drained slow queue"
            );
        }
    }

    /// Records final statistics and shuts the backend down.
    pub fn finish(&mut self) -> Result<()> {
        self.counters.t_pages = self.pages.len() as u64;
        info!(
            t_pages = self.counters.t_pages,
            fast_acc = self.counters.fast_acc,
            fast_hits = self.counters.fast_hits,
            fast_swaps = self.counters.fast_swaps,
            cant_swap = self.counters.cant_swap,
            swap_delays = self.counters.swap_delays,
            "Tiered memory finished"
        );
        if let Some(writer) = self.access_stats.as_mut() {
            writer.dump(&mut self.pages)?;
        }
        self.slow.backend_mut().finish();
        Ok(())
    }

    /// Sets the scan-length estimate of a page, creating its record if needed.
    pub fn set_scan_length(&mut self, addr: PageAddr, len: u32) {
        let idx = self.pages.get_or_insert(addr);
        self.pages[idx].scan_leng = len;
    }

    pub fn stats(&self) -> TierStats {
        TierStats {
            counters: self.counters,
            max_fast_pages: self.config.max_fast_pages,
            pages_in_fast: self.replacer.pages_in_fast(),
            tracked_pages: self.pages.len(),
            pending_chunks: self.swaps.pending_chunks(),
            waiting_requests: self.swaps.waiting_requests(),
            slow_queue_depth: self.slow.len(),
        }
    }

    pub fn config(&self) -> &TierConfig {
        &self.config
    }

    /// Returns the record of a page, if it has been touched.
    pub fn page(&self, addr: PageAddr) -> Option<&PageRecord> {
        self.pages.get_by_addr(addr)
    }

    /// Returns resident pages front to back for list-ordered policies.
    pub fn resident_order(&self) -> Option<Vec<PageAddr>> {
        self.replacer
            .resident_order()
            .map(|order| order.into_iter().map(|idx| self.pages[idx].addr).collect())
    }

    pub fn backend(&self) -> &B {
        self.slow.backend()
    }

    pub fn backend_mut(&mut self) -> &mut B {
        self.slow.backend_mut()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}
