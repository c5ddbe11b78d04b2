//! GC plans: the mature-generation coordinator and its seams to the
//! surrounding generational framework.

pub mod barriers;
pub mod genhybrid;
mod global;
mod phase;
pub mod tracing;

pub use global::{GenCollectorDelegate, GenPlan};
pub use phase::Phase;
pub use tracing::{ObjectQueue, SlotVisitor, Trace, VectorObjectQueue, VectorQueue};
