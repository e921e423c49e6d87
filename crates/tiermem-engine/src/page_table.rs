//! Page table mapping page addresses to per-page placement records.

use std::collections::HashMap;
use std::ops::{Index, IndexMut};
use tiermem_common::{AccessOp, PageAddr, SimTime};

/// Stable index of a record in the page table arena.
///
/// Records are never removed, so an index stays valid for the table's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIdx(pub u32);

impl PageIdx {
    #[inline(always)]
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for PageIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "idx:{}", self.0)
    }
}

/// Direction of a page's in-flight migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwapDir {
    /// No migration in flight.
    #[default]
    Stable,
    /// Moving from the slow tier into the fast tier.
    SlowToFast,
    /// Moving from the fast tier back to the slow tier.
    FastToSlow,
}

/// Per-interval access counters exported with the access stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessRecord {
    pub reads: u64,
    pub writes: u64,
}

impl AccessRecord {
    pub fn record(&mut self, op: AccessOp) {
        match op {
            AccessOp::Read => self.reads += 1,
            AccessOp::Write => self.writes += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.reads + self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Placement state of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    /// Page address.
    pub addr: PageAddr,
    /// Access frequency, halved every aging quantum.
    pub touched: u64,
    /// Time of the most recent access.
    pub last_touch: SimTime,
    /// Scan-likeness estimate, maintained outside the engine.
    pub scan_leng: u32,
    /// Target residency. Leads physical placement while a migration is in flight.
    pub in_fast: bool,
    pub swap_dir: SwapDir,
    /// Chunk completions still awaited for the current migration.
    pub swaps_out: u32,
    /// Latency-only mode: accesses before this time pay the transfer penalty.
    pub page_delay: SimTime,
    /// Accesses since the last stats export.
    pub access: AccessRecord,
}

impl PageRecord {
    pub fn new(addr: PageAddr) -> Self {
        Self {
            addr,
            touched: 0,
            last_touch: 0,
            scan_leng: 0,
            in_fast: false,
            swap_dir: SwapDir::Stable,
            swaps_out: 0,
            page_delay: 0,
            access: AccessRecord::default(),
        }
    }

    /// Returns true while a migration of this page is in flight.
    #[inline]
    pub fn is_swapping(&self) -> bool {
        self.swap_dir != SwapDir::Stable
    }
}

/// Unbounded page table.
///
/// Records live in an arena in first-touch order and are addressed by
/// [`PageIdx`]; a hash index maps page addresses to arena slots. Entries are
/// never removed.
#[derive(Debug, Default)]
pub struct PageTable {
    records: Vec<PageRecord>,
    index: HashMap<PageAddr, PageIdx>,
}

impl PageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a page address.
    #[inline]
    pub fn lookup(&self, addr: PageAddr) -> Option<PageIdx> {
        self.index.get(&addr).copied()
    }

    /// Returns the record for `addr`, creating it on first touch.
    pub fn get_or_insert(&mut self, addr: PageAddr) -> PageIdx {
        if let Some(idx) = self.lookup(addr) {
            return idx;
        }
        let idx = PageIdx(self.records.len() as u32);
        self.records.push(PageRecord::new(addr));
        self.index.insert(addr, idx);
        idx
    }

    /// Returns the record for a page address if it has been touched.
    pub fn get_by_addr(&self, addr: PageAddr) -> Option<&PageRecord> {
        self.lookup(addr).map(|idx| &self.records[idx.as_usize()])
    }

    pub fn get(&self, idx: PageIdx) -> Option<&PageRecord> {
        self.records.get(idx.as_usize())
    }

    pub fn get_mut(&mut self, idx: PageIdx) -> Option<&mut PageRecord> {
        self.records.get_mut(idx.as_usize())
    }

    /// Returns the number of pages ever touched.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over all records in first-touch order.
    pub fn iter(&self) -> impl Iterator<Item = (PageIdx, &PageRecord)> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, rec)| (PageIdx(i as u32), rec))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PageRecord> {
        self.records.iter_mut()
    }

    /// Halves every page's access frequency.
    pub fn age_all(&mut self) {
        for rec in &mut self.records {
            rec.touched >>= 1;
        }
    }

    /// Returns the number of pages whose target residency is the fast tier.
    pub fn resident_count(&self) -> usize {
        self.records.iter().filter(|rec| rec.in_fast).count()
    }
}

impl Index<PageIdx> for PageTable {
    type Output = PageRecord;

    #[inline(always)]
    fn index(&self, idx: PageIdx) -> &PageRecord {
        &self.records[idx.as_usize()]
    }
}

impl IndexMut<PageIdx> for PageTable {
    #[inline(always)]
    fn index_mut(&mut self, idx: PageIdx) -> &mut PageRecord {
        &mut self.records[idx.as_usize()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_insert_creates_once() {
        let mut table = PageTable::new();
        let a = table.get_or_insert(PageAddr(42));
        let b = table.get_or_insert(PageAddr(7));
        let a_again = table.get_or_insert(PageAddr(42));

        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
        assert_eq!(table[a].addr, PageAddr(42));
    }

    #[test]
    fn test_new_record_defaults() {
        let rec = PageRecord::new(PageAddr(1));
        assert_eq!(rec.touched, 0);
        assert!(!rec.in_fast);
        assert_eq!(rec.swap_dir, SwapDir::Stable);
        assert_eq!(rec.swaps_out, 0);
        assert!(!rec.is_swapping());
        assert!(rec.access.is_empty());
    }

    #[test]
    fn test_lookup_missing() {
        let table = PageTable::new();
        assert!(table.lookup(PageAddr(1)).is_none());
        assert!(table.get_by_addr(PageAddr(1)).is_none());
        assert!(table.get(PageIdx(0)).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_iter_first_touch_order() {
        let mut table = PageTable::new();
        for addr in [9, 3, 5] {
            table.get_or_insert(PageAddr(addr));
        }
        let addrs: Vec<_> = table.iter().map(|(_, rec)| rec.addr.0).collect();
        assert_eq!(addrs, vec![9, 3, 5]);
    }

    #[test]
    fn test_age_all_halves() {
        let mut table = PageTable::new();
        let a = table.get_or_insert(PageAddr(1));
        let b = table.get_or_insert(PageAddr(2));
        let c = table.get_or_insert(PageAddr(3));
        table[a].touched = 7;
        table[b].touched = 1;
        table[c].touched = 100;

        table.age_all();

        assert_eq!(table[a].touched, 3);
        assert_eq!(table[b].touched, 0);
        assert_eq!(table[c].touched, 50);
    }

    #[test]
    fn test_access_record() {
        let mut rec = AccessRecord::default();
        rec.record(AccessOp::Read);
        rec.record(AccessOp::Read);
        rec.record(AccessOp::Write);
        assert_eq!(rec.reads, 2);
        assert_eq!(rec.writes, 1);
        assert_eq!(rec.total(), 3);

        rec.clear();
        assert!(rec.is_empty());
    }

    #[test]
    fn test_resident_count() {
        let mut table = PageTable::new();
        let a = table.get_or_insert(PageAddr(1));
        table.get_or_insert(PageAddr(2));
        assert_eq!(table.resident_count(), 0);
        table[a].in_fast = true;
        assert_eq!(table.resident_count(), 1);
    }
}
