//! Engine counters and per-page access stats export.

use crate::page_table::PageTable;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tiermem_common::{Result, TierError};
use tracing::debug;

/// Running counters kept by the router.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineCounters {
    /// Requests served by the fast tier.
    pub fast_hits: u64,
    /// Promotions that evicted another page.
    pub fast_swaps: u64,
    /// Requests seen.
    pub fast_acc: u64,
    /// Distinct pages touched, recorded at finish.
    pub t_pages: u64,
    /// Promotions abandoned for lack of a victim: every resident page was
    /// migrating, or under LFU no resident page had a lower count.
    pub cant_swap: u64,
    /// Requests parked behind an in-flight migration.
    pub swap_delays: u64,
}

/// Snapshot of the engine's counters and occupancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierStats {
    pub counters: EngineCounters,
    /// Fast-tier capacity in pages.
    pub max_fast_pages: usize,
    /// Pages whose target residency is the fast tier.
    pub pages_in_fast: usize,
    /// Distinct pages touched so far.
    pub tracked_pages: usize,
    /// Chunk transfers awaiting completion.
    pub pending_chunks: usize,
    /// Requests parked behind migrations.
    pub waiting_requests: usize,
    /// Requests queued for the slow backend.
    pub slow_queue_depth: usize,
}

impl TierStats {
    /// Returns the fraction of requests served by the fast tier.
    pub fn hit_rate(&self) -> f64 {
        if self.counters.fast_acc == 0 {
            0.0
        } else {
            self.counters.fast_hits as f64 / self.counters.fast_acc as f64
        }
    }
}

/// Writes per-page access logs to numbered files.
///
/// Each dump creates `<prefix>-<N>.out`, with N counting up from 0, holding
/// one CSV row per page accessed since the previous dump, then clears the
/// logs.
#[derive(Debug)]
pub struct AccessStatsWriter {
    prefix: String,
    dump_num: u32,
}

impl AccessStatsWriter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            dump_num: 0,
        }
    }

    /// Returns the number of dumps written so far.
    pub fn dumps(&self) -> u32 {
        self.dump_num
    }

    /// Returns the path the next dump will be written to.
    pub fn next_path(&self) -> PathBuf {
        PathBuf::from(format!("{}-{}.out", self.prefix, self.dump_num))
    }

    /// Exports and clears every page's access log.
    pub fn dump(&mut self, pages: &mut PageTable) -> Result<PathBuf> {
        let path = self.next_path();
        self.dump_num += 1;

        let file = File::create(&path).map_err(|source| TierError::StatsOutput {
            path: path.clone(),
            source,
        })?;
        let mut out = BufWriter::new(file);
        writeln!(out, "page,reads,writes,touched,in_fast")?;

        let mut rows = 0usize;
        for rec in pages.iter_mut() {
            if rec.access.is_empty() {
                continue;
            }
            writeln!(
                out,
                "{},{},{},{},{}",
                rec.addr.0,
                rec.access.reads,
                rec.access.writes,
                rec.touched,
                u8::from(rec.in_fast)
            )?;
            rec.access.clear();
            rows += 1;
        }
        out.flush()?;

        debug!(path = %path.display(), rows, "Exported access stats");
        Ok(path)
    }
}
