//! Page replacement policies for the fast tier.

use crate::admission::{AdmissionParams, ListAdmission, one_in};
use crate::page_table::{PageIdx, PageTable};
use crate::recency::RecencyList;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tiermem_common::{ReplacementPolicy, Result, SimTime, TierConfig};

/// Roughly 1 in 128: BiLRU inserts a new page at the eviction end.
const BILRU_BACK_MASK: u32 = 0x7f;

/// Per-access inputs a replacer needs from the router.
#[derive(Debug, Clone, Copy)]
pub struct AccessContext {
    pub now: SimTime,
    /// The slow tier has a submission backlog; list admission is refused.
    pub slow_backlogged: bool,
}

/// Result of one replacement decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessOutcome {
    /// Target residency of the accessed page after the decision.
    pub in_fast: bool,
    /// The accessed page was just promoted.
    pub just_swapped: bool,
    /// Page demoted to make room.
    pub evicted: Option<PageIdx>,
    /// The page qualified for promotion but no victim could be evicted.
    pub blocked: bool,
}

impl AccessOutcome {
    fn unchanged(in_fast: bool) -> Self {
        Self {
            in_fast,
            ..Default::default()
        }
    }

    fn admitted(evicted: Option<PageIdx>) -> Self {
        Self {
            in_fast: true,
            just_swapped: true,
            evicted,
            blocked: false,
        }
    }

    fn blocked() -> Self {
        Self {
            blocked: true,
            ..Default::default()
        }
    }
}

/// Trait for fast-tier replacement algorithms.
pub trait Replacer: Send {
    /// Updates placement state for an access to `idx`.
    ///
    /// Marks admitted and evicted pages in the page table; starting any
    /// migration is left to the caller.
    fn on_access(
        &mut self,
        pages: &mut PageTable,
        idx: PageIdx,
        ctx: AccessContext,
    ) -> AccessOutcome;

    /// Called on every aging tick, after access stats are exported and before
    /// frequencies are halved.
    fn on_aging(&mut self) {}

    /// Returns the number of pages whose target residency is the fast tier.
    fn pages_in_fast(&self) -> usize;

    /// Returns the fast-tier capacity in pages.
    fn capacity(&self) -> usize;

    fn policy(&self) -> ReplacementPolicy;

    /// Returns resident pages front to back, for list-ordered policies.
    fn resident_order(&self) -> Option<Vec<PageIdx>> {
        None
    }
}

/// Builds the replacer selected by the configuration.
///
/// Expects a validated configuration; an MFU admission policy paired with a
/// list-ordered policy is still refused.
pub fn build_replacer(config: &TierConfig) -> Result<Box<dyn Replacer>> {
    let replacer: Box<dyn Replacer> = match config.page_replace_strategy {
        ReplacementPolicy::Lfu => Box::new(LfuReplacer::new(
            config.max_fast_pages,
            config.threshold,
        )),
        policy => {
            let rng = config
                .needs_rng()
                .then(|| StdRng::seed_from_u64(u64::from(config.seed)));
            Box::new(ListReplacer::new(
                policy,
                ListAdmission::try_from(config.page_add_strategy)?,
                AdmissionParams {
                    threshold: config.threshold,
                    scan_threshold: config.scan_threshold,
                },
                config.max_fast_pages,
                rng,
            ))
        }
    };
    Ok(replacer)
}

/// FIFO, LRU, BiLRU and SCLRU replacement over a recency list.
///
/// New pages enter at the front (with BiLRU and SCLRU exceptions when the
/// tier is full), victims leave from the back. Every policy but FIFO moves a
/// resident page to the front when it is touched.
pub struct ListReplacer {
    policy: ReplacementPolicy,
    admission: ListAdmission,
    params: AdmissionParams,
    capacity: usize,
    pages_in_fast: usize,
    list: RecencyList,
    rng: Option<StdRng>,
}

impl ListReplacer {
    pub fn new(
        policy: ReplacementPolicy,
        admission: ListAdmission,
        params: AdmissionParams,
        capacity: usize,
        rng: Option<StdRng>,
    ) -> Self {
        debug_assert!(policy.is_list_ordered());
        Self {
            policy,
            admission,
            params,
            capacity,
            pages_in_fast: 0,
            list: RecencyList::new(),
            rng,
        }
    }

    /// Returns the back-most resident page that is not migrating.
    fn find_victim(&self, pages: &PageTable) -> Option<PageIdx> {
        self.list.iter_rev().find(|&idx| !pages[idx].is_swapping())
    }

    /// Returns true if a page promoted into a full tier goes to the back.
    fn insert_at_back(&mut self, pages: &PageTable, idx: PageIdx) -> bool {
        match self.policy {
            ReplacementPolicy::BiLru => one_in(&mut self.rng, BILRU_BACK_MASK),
            ReplacementPolicy::ScLru => pages[idx].scan_leng > self.params.scan_threshold,
            _ => false,
        }
    }

    fn admit(&mut self, pages: &mut PageTable, idx: PageIdx, ctx: AccessContext) -> AccessOutcome {
        if ctx.slow_backlogged {
            return AccessOutcome::unchanged(false);
        }
        let victim = self.list.back().map(|v| &pages[v]);
        let has_room = self.pages_in_fast < self.capacity;
        if !self
            .admission
            .should_admit(&pages[idx], victim, has_room, &self.params, &mut self.rng)
        {
            return AccessOutcome::unchanged(false);
        }

        if has_room {
            pages[idx].in_fast = true;
            self.pages_in_fast += 1;
            self.list.push_front(idx);
            return AccessOutcome::admitted(None);
        }

        let Some(victim) = self.find_victim(pages) else {
            return AccessOutcome::blocked();
        };
        pages[victim].in_fast = false;
        self.list.remove(victim);

        pages[idx].in_fast = true;
        if self.insert_at_back(pages, idx) {
            self.list.push_back(idx);
        } else {
            self.list.push_front(idx);
        }
        AccessOutcome::admitted(Some(victim))
    }
}

impl Replacer for ListReplacer {
    fn on_access(
        &mut self,
        pages: &mut PageTable,
        idx: PageIdx,
        ctx: AccessContext,
    ) -> AccessOutcome {
        let outcome = if pages[idx].in_fast {
            if self.policy.bumps_on_hit() {
                self.list.move_to_front(idx);
            }
            AccessOutcome::unchanged(true)
        } else {
            self.admit(pages, idx, ctx)
        };
        pages[idx].last_touch = ctx.now;
        outcome
    }

    fn pages_in_fast(&self) -> usize {
        self.pages_in_fast
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn policy(&self) -> ReplacementPolicy {
        self.policy
    }

    fn resident_order(&self) -> Option<Vec<PageIdx>> {
        Some(self.list.iter().collect())
    }
}

/// LFU replacement by scanning the whole page table.
///
/// `last_min` caches the lowest frequency seen among resident pages by the
/// last scan. A page that does not beat it cannot displace anyone, so the
/// scan is skipped. The bound is reset on every aging tick.
pub struct LfuReplacer {
    threshold: u64,
    capacity: usize,
    pages_in_fast: usize,
    last_min: u64,
}

impl LfuReplacer {
    pub fn new(capacity: usize, threshold: u64) -> Self {
        Self {
            threshold,
            capacity,
            pages_in_fast: 0,
            last_min: 0,
        }
    }

    /// Returns the cached minimum-frequency bound.
    pub fn last_min(&self) -> u64 {
        self.last_min
    }

    /// Scans for the least frequently used resident page other than `idx`.
    ///
    /// Updates `last_min` with the minimum over every resident page, and
    /// returns the minimum among those not already migrating.
    fn scan_min(&mut self, pages: &PageTable, idx: PageIdx) -> Option<(PageIdx, u64)> {
        let mut min = u64::MAX;
        let mut candidate: Option<(PageIdx, u64)> = None;
        for (i, rec) in pages.iter() {
            if !rec.in_fast || i == idx {
                continue;
            }
            min = min.min(rec.touched);
            if rec.is_swapping() {
                continue;
            }
            if candidate.is_none_or(|(_, t)| rec.touched < t) {
                candidate = Some((i, rec.touched));
            }
        }
        self.last_min = min;
        candidate
    }
}

impl Replacer for LfuReplacer {
    fn on_access(
        &mut self,
        pages: &mut PageTable,
        idx: PageIdx,
        _ctx: AccessContext,
    ) -> AccessOutcome {
        let touched = pages[idx].touched;
        if pages[idx].in_fast || touched <= self.threshold {
            return AccessOutcome::unchanged(pages[idx].in_fast);
        }

        if self.pages_in_fast < self.capacity {
            pages[idx].in_fast = true;
            self.pages_in_fast += 1;
            return AccessOutcome::admitted(None);
        }

        if self.capacity == 0 || touched <= self.last_min {
            return AccessOutcome::unchanged(false);
        }

        match self.scan_min(pages, idx) {
            Some((victim, victim_touched)) if victim_touched < touched => {
                pages[victim].in_fast = false;
                pages[idx].in_fast = true;
                AccessOutcome::admitted(Some(victim))
            }
            _ => AccessOutcome::blocked(),
        }
    }

    fn on_aging(&mut self) {
        self.last_min = 0;
    }

    fn pages_in_fast(&self) -> usize {
        self.pages_in_fast
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn policy(&self) -> ReplacementPolicy {
        ReplacementPolicy::Lfu
    }
}
