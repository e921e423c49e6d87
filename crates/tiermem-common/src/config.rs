//! Configuration structures for the tiered memory engine.

use crate::error::{Result, TierError};
use crate::page::{DEFAULT_CHUNK_SHIFT, DEFAULT_PAGE_SHIFT};
use crate::time::SimDuration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Eviction policy for the fast tier (`page_replace_strategy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReplacementPolicy {
    /// First in, first out. Resident pages are never reordered.
    #[default]
    #[serde(rename = "FIFO")]
    Fifo,
    /// Least frequently used, found by scanning every page.
    #[serde(rename = "LFU")]
    Lfu,
    /// Least recently used.
    #[serde(rename = "LRU")]
    Lru,
    /// LRU that occasionally inserts new pages at the eviction end.
    #[serde(rename = "BiLRU")]
    BiLru,
    /// LRU that inserts scan-like pages at the eviction end.
    #[serde(rename = "SCLRU")]
    ScLru,
}

impl ReplacementPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplacementPolicy::Fifo => "FIFO",
            ReplacementPolicy::Lfu => "LFU",
            ReplacementPolicy::Lru => "LRU",
            ReplacementPolicy::BiLru => "BiLRU",
            ReplacementPolicy::ScLru => "SCLRU",
        }
    }

    /// Returns true for the policies kept in recency order.
    pub fn is_list_ordered(&self) -> bool {
        !matches!(self, ReplacementPolicy::Lfu)
    }

    /// Returns true if resident pages move to the front when touched.
    pub fn bumps_on_hit(&self) -> bool {
        matches!(
            self,
            ReplacementPolicy::Lru | ReplacementPolicy::BiLru | ReplacementPolicy::ScLru
        )
    }
}

impl FromStr for ReplacementPolicy {
    type Err = TierError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "FIFO" => Ok(ReplacementPolicy::Fifo),
            "LFU" => Ok(ReplacementPolicy::Lfu),
            "LRU" => Ok(ReplacementPolicy::Lru),
            "BiLRU" => Ok(ReplacementPolicy::BiLru),
            "SCLRU" => Ok(ReplacementPolicy::ScLru),
            _ => Err(TierError::UnknownStrategy {
                option: "page_replace_strategy",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Admission policy for promoting a page into the fast tier (`page_add_strategy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AdmissionPolicy {
    /// Most frequently used. Only valid with LFU replacement, whose frequency
    /// comparison is the admission rule.
    #[serde(rename = "MFU")]
    Mfu,
    /// Admit once the access count passes the threshold.
    #[default]
    #[serde(rename = "T")]
    Threshold,
    /// Threshold, and more recently used than the eviction candidate.
    #[serde(rename = "MRPU")]
    Mrpu,
    /// Threshold, more recent and more frequent than the eviction candidate.
    #[serde(rename = "MFRPU")]
    Mfrpu,
    /// Threshold, rarely admitting scan-like pages.
    #[serde(rename = "SC")]
    ScanResistant,
    /// Scan-resistant, and more frequent than the eviction candidate.
    #[serde(rename = "SCF")]
    ScanResistantFrequent,
    /// Threshold plus a random coin flip.
    #[serde(rename = "RAND")]
    Random,
}

impl AdmissionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionPolicy::Mfu => "MFU",
            AdmissionPolicy::Threshold => "T",
            AdmissionPolicy::Mrpu => "MRPU",
            AdmissionPolicy::Mfrpu => "MFRPU",
            AdmissionPolicy::ScanResistant => "SC",
            AdmissionPolicy::ScanResistantFrequent => "SCF",
            AdmissionPolicy::Random => "RAND",
        }
    }
}

impl FromStr for AdmissionPolicy {
    type Err = TierError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MFU" => Ok(AdmissionPolicy::Mfu),
            "T" => Ok(AdmissionPolicy::Threshold),
            "MRPU" => Ok(AdmissionPolicy::Mrpu),
            "MFRPU" => Ok(AdmissionPolicy::Mfrpu),
            "SC" => Ok(AdmissionPolicy::ScanResistant),
            "SCF" => Ok(AdmissionPolicy::ScanResistantFrequent),
            "RAND" => Ok(AdmissionPolicy::Random),
            _ => Err(TierError::UnknownStrategy {
                option: "page_add_strategy",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for AdmissionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a tiered memory engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    /// Fast-tier capacity in pages. Zero disables the fast tier.
    pub max_fast_pages: usize,
    /// Page size is `2^page_shift` bytes.
    pub page_shift: u32,
    /// Migration chunk size is `2^chunk_shift` bytes.
    pub chunk_shift: u32,
    /// Fixed fast-tier latency.
    pub access_time: SimDuration,
    /// Aging period.
    pub quantum: SimDuration,
    /// Eviction policy.
    pub page_replace_strategy: ReplacementPolicy,
    /// Admission policy.
    pub page_add_strategy: AdmissionPolicy,
    /// Access count a page must exceed before it can be promoted.
    pub threshold: u64,
    /// Scan length above which a page is treated as scan-like.
    pub scan_threshold: u32,
    /// Latency-only mode: nanoseconds a freshly swapped page stays slow.
    pub transfer_delay: u64,
    /// RNG seed for BiLRU, RAND, SC and SCF.
    pub seed: u32,
    /// Record per-page accesses and export them every quantum.
    pub collect_stats: bool,
    /// Prefix of the exported `<prefix>-<N>.out` files.
    pub acc_stats_prefix: String,
    /// Model migrations chunk by chunk instead of as a flat latency penalty.
    pub model_swaps: bool,
    /// Refuse promotions while the slow tier has a submission backlog.
    pub slow_backpressure: bool,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            max_fast_pages: 256,
            page_shift: DEFAULT_PAGE_SHIFT,
            chunk_shift: DEFAULT_CHUNK_SHIFT,
            access_time: SimDuration::from_nanos(35),
            quantum: SimDuration::from_millis(5),
            page_replace_strategy: ReplacementPolicy::Fifo,
            page_add_strategy: AdmissionPolicy::Threshold,
            threshold: 4,
            scan_threshold: 4,
            transfer_delay: 250,
            seed: 1447,
            collect_stats: false,
            acc_stats_prefix: String::new(),
            model_swaps: false,
            slow_backpressure: true,
        }
    }
}

impl TierConfig {
    /// Builds a configuration from string parameters, starting from defaults.
    ///
    /// Unrecognized keys are ignored so hosts can pass their full parameter set.
    pub fn from_params<'a, I>(params: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut config = Self::default();
        for (name, value) in params {
            config.set_param(name, value)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn set_param(&mut self, name: &str, value: &str) -> Result<()> {
        let invalid = || TierError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
        };

        match name {
            "max_fast_pages" => self.max_fast_pages = value.parse().map_err(|_| invalid())?,
            "page_shift" => self.page_shift = value.parse().map_err(|_| invalid())?,
            "chunk_shift" => self.chunk_shift = value.parse().map_err(|_| invalid())?,
            "access_time" => self.access_time = value.parse().map_err(|_| invalid())?,
            "quantum" => self.quantum = value.parse().map_err(|_| invalid())?,
            "page_replace_strategy" => self.page_replace_strategy = value.parse()?,
            "page_add_strategy" => self.page_add_strategy = value.parse()?,
            "threshold" => self.threshold = value.parse().map_err(|_| invalid())?,
            "scan_threshold" => self.scan_threshold = value.parse().map_err(|_| invalid())?,
            "transfer_delay" => self.transfer_delay = value.parse().map_err(|_| invalid())?,
            "seed" => self.seed = value.parse().map_err(|_| invalid())?,
            "collect_stats" => self.collect_stats = parse_flag(value).ok_or_else(invalid)?,
            "acc_stats_prefix" | "accStatsPrefix" => self.acc_stats_prefix = value.to_string(),
            "model_swaps" | "modelSwaps" => {
                self.model_swaps = parse_flag(value).ok_or_else(invalid)?
            }
            "slow_backpressure" | "dramBackpressure" => {
                self.slow_backpressure = parse_flag(value).ok_or_else(invalid)?
            }
            _ => {}
        }
        Ok(())
    }

    /// Checks strategy compatibility and page geometry.
    pub fn validate(&self) -> Result<()> {
        if self.page_add_strategy == AdmissionPolicy::Mfu
            && self.page_replace_strategy != ReplacementPolicy::Lfu
        {
            return Err(TierError::IncompatibleStrategies {
                admission: self.page_add_strategy.to_string(),
                replacement: self.page_replace_strategy.to_string(),
            });
        }
        if self.page_shift >= 64 {
            return Err(TierError::ConfigError(format!(
                "page_shift {} does not fit a 64-bit address",
                self.page_shift
            )));
        }
        if self.model_swaps {
            if self.chunk_shift > self.page_shift {
                return Err(TierError::ConfigError(format!(
                    "chunk_shift {} exceeds page_shift {}",
                    self.chunk_shift, self.page_shift
                )));
            }
            if self.chunk_shift > 31 {
                return Err(TierError::ConfigError(format!(
                    "chunk_shift {} is too large for a chunk request",
                    self.chunk_shift
                )));
            }
            if self.page_shift - self.chunk_shift > 31 {
                return Err(TierError::ConfigError(format!(
                    "2^{} chunks per page is too many",
                    self.page_shift - self.chunk_shift
                )));
            }
        }
        if self.quantum.is_zero() {
            return Err(TierError::ConfigError("quantum must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Returns the page size in bytes.
    pub fn page_size(&self) -> u64 {
        1 << self.page_shift
    }

    /// Returns the migration chunk size in bytes.
    pub fn chunk_size(&self) -> u64 {
        1 << self.chunk_shift
    }

    /// Returns the number of chunks moved per page migration, or `None` if
    /// the page holds more than `2^31` chunks.
    pub fn num_chunks(&self) -> Option<u32> {
        1u32.checked_shl(self.page_shift.saturating_sub(self.chunk_shift))
    }

    /// Returns true if the configured policies flip coins.
    pub fn needs_rng(&self) -> bool {
        matches!(self.page_replace_strategy, ReplacementPolicy::BiLru)
            || matches!(
                self.page_add_strategy,
                AdmissionPolicy::Random
                    | AdmissionPolicy::ScanResistant
                    | AdmissionPolicy::ScanResistantFrequent
            )
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "True" | "TRUE" | "yes" => Some(true),
        "0" | "false" | "False" | "FALSE" | "no" => Some(false),
        _ => None,
    }
}
