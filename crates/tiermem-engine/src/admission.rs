//! Admission policies for list-ordered replacement.

use crate::page_table::PageRecord;
use rand::RngCore;
use rand::rngs::StdRng;
use tiermem_common::{AdmissionPolicy, Result, TierError};

/// Roughly 1 in 1024: scan-like page admitted by SC/SCF.
const SCAN_ADMIT_MASK: u32 = 0x3ff;
/// Roughly 1 in 512: RAND admission while the fast tier has room.
const RAND_ROOM_MASK: u32 = 0x1ff;
/// Roughly 1 in 8192: RAND admission once the fast tier is full.
const RAND_FULL_MASK: u32 = 0x1fff;

/// Returns true with probability `1 / (mask + 1)`.
///
/// Without an rng the coin always comes up false.
pub(crate) fn one_in(rng: &mut Option<StdRng>, mask: u32) -> bool {
    rng.as_mut().is_some_and(|r| r.next_u32() & mask == 0)
}

/// Thresholds shared by the admission checks.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionParams {
    pub threshold: u64,
    pub scan_threshold: u32,
}

/// Admission policies usable with a list-ordered replacer.
///
/// `MFU` has no list-ordered form: it is the frequency comparison built into
/// LFU, so it cannot be converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListAdmission {
    Threshold,
    Mrpu,
    Mfrpu,
    ScanResistant,
    ScanResistantFrequent,
    Random,
}

impl TryFrom<AdmissionPolicy> for ListAdmission {
    type Error = TierError;

    fn try_from(policy: AdmissionPolicy) -> Result<Self> {
        match policy {
            AdmissionPolicy::Threshold => Ok(ListAdmission::Threshold),
            AdmissionPolicy::Mrpu => Ok(ListAdmission::Mrpu),
            AdmissionPolicy::Mfrpu => Ok(ListAdmission::Mfrpu),
            AdmissionPolicy::ScanResistant => Ok(ListAdmission::ScanResistant),
            AdmissionPolicy::ScanResistantFrequent => Ok(ListAdmission::ScanResistantFrequent),
            AdmissionPolicy::Random => Ok(ListAdmission::Random),
            AdmissionPolicy::Mfu => Err(TierError::ConfigError(
                "MFU admission is only defined for LFU replacement".to_string(),
            )),
        }
    }
}

impl ListAdmission {
    /// Decides whether a non-resident page should be promoted now.
    ///
    /// `victim` is the page at the back of the recency list, if any, and
    /// `has_room` reports whether the fast tier has a free slot.
    pub fn should_admit(
        &self,
        page: &PageRecord,
        victim: Option<&PageRecord>,
        has_room: bool,
        params: &AdmissionParams,
        rng: &mut Option<StdRng>,
    ) -> bool {
        let hot = page.touched > params.threshold;
        let scan_like = page.scan_leng > params.scan_threshold;

        match self {
            ListAdmission::Threshold => hot,
            ListAdmission::Mrpu | ListAdmission::Mfrpu => {
                // Startup: nothing to compare against
                let Some(victim) = victim else {
                    return hot;
                };
                if page.last_touch <= victim.last_touch {
                    return false;
                }
                match self {
                    ListAdmission::Mfrpu => hot && page.touched > victim.touched,
                    _ => hot,
                }
            }
            ListAdmission::ScanResistant => {
                if !hot {
                    false
                } else if scan_like {
                    one_in(rng, SCAN_ADMIT_MASK)
                } else {
                    true
                }
            }
            ListAdmission::ScanResistantFrequent => {
                let Some(victim) = victim else {
                    return hot;
                };
                if !hot || page.touched <= victim.touched {
                    false
                } else if scan_like {
                    one_in(rng, SCAN_ADMIT_MASK)
                } else {
                    true
                }
            }
            ListAdmission::Random => {
                if !hot {
                    false
                } else if has_room {
                    one_in(rng, RAND_ROOM_MASK)
                } else {
                    one_in(rng, RAND_FULL_MASK)
                }
            }
        }
    }
}
