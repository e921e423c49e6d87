//! tiermem common types, errors, and configuration.
//!
//! This crate provides shared definitions used by the tiered memory engine and
//! by hosts that drive it.

pub mod config;
pub mod error;
pub mod page;
pub mod time;

pub use config::{AdmissionPolicy, ReplacementPolicy, TierConfig};
pub use error::{Result, TierError};
pub use page::{AccessOp, MemRequest, PageAddr, RequestId};
pub use time::{SimDuration, SimTime};
