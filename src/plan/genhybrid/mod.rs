//! A generational collector whose mature generation spans two Immix-style
//! regions over heterogeneous memory: DRAM for write-intensive objects, NVM
//! for everything else.
//!
//! Nursery collections are handled by the surrounding generational
//! framework. This module owns the full-heap side: phase coordination across
//! the two mature regions, collection-time copy placement, and the two
//! full-heap trace strategies.

mod collector;
mod global;
mod trace;

pub use collector::{GenHybridCollector, MatureCopySelector};
pub use global::{GenHybrid, GenHybridArgs};
pub use trace::MatureTrace;

/// Specialized scanning method identifier for the full-heap mature closure.
pub const SCAN_MATURE: usize = 1;
