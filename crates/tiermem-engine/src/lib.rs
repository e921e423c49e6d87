//! Two-tier memory engine.
//!
//! This crate decides, per page, whether data lives in a small fast tier or a
//! large slow tier:
//! - Per-page access tracking with periodic aging
//! - FIFO, LRU, BiLRU, SCLRU and LFU replacement
//! - Threshold, recency, frequency, scan-resistant and random admission
//! - Optional chunk-by-chunk migration modeling with per-page request ordering
//!
//! The engine is driven by a host through [`TieredMemory`] and talks to the
//! outside world only through the [`SlowTierBackend`] and [`Scheduler`]
//! traits.

mod admission;
mod backend;
mod page_table;
mod recency;
mod replacer;
mod router;
mod shared;
mod slow;
mod stats;
mod swap;

pub use admission::{AdmissionParams, ListAdmission};
pub use backend::{
    BackendRequest, ChunkRequest, ChunkToken, Scheduler, SelfEvent, SlowTierBackend,
};
pub use page_table::{AccessRecord, PageIdx, PageRecord, PageTable, SwapDir};
pub use recency::RecencyList;
pub use replacer::{
    AccessContext, AccessOutcome, LfuReplacer, ListReplacer, Replacer, build_replacer,
};
pub use router::TieredMemory;
pub use shared::SharedTieredMemory;
pub use slow::{SLOW_BACKLOG_LIMIT, SlowQueue};
pub use stats::{AccessStatsWriter, EngineCounters, TierStats};
pub use swap::{Leg, SwapCoordinator, Tiers};
