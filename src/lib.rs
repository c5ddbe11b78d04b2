//! The mature-generation core of a generational Immix collector whose mature
//! space spans two heterogeneous memories: a fast volatile region (DRAM) and
//! a larger, slower, persistence-capable region (NVM).
//!
//! The two mature regions are managed as one logical mature space. Each
//! object carries a write-intensity bit fixed at allocation time; when the
//! collector copies an object into the mature space, write-intensive objects
//! are placed in DRAM and all others in NVM.
//!
//! The surrounding runtime supplies the nursery generation, the region
//! (block/line) mechanics, and the work-stealing closure engine. This crate
//! supplies the phase coordination across the two regions, the per-worker
//! copy machinery, and the full-heap trace strategies.

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod plan;
pub mod policy;
pub mod util;

pub use crate::plan::genhybrid::{GenHybrid, GenHybridArgs, GenHybridCollector};
pub use crate::util::{Address, ObjectReference};
