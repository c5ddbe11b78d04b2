//! Upward interfaces to the surrounding generational framework.
//!
//! The nursery generation, the base spaces, collection triggering and the
//! phase-scheduling machinery all live above this crate. The mature core
//! delegates everything it does not own through the two traits below.

use crate::plan::barriers::BarrierSelector;
use crate::plan::tracing::{ObjectQueue, SlotVisitor};
use crate::plan::Phase;
use crate::util::ObjectReference;

/// The global side of the surrounding generational framework.
///
/// The liveness and scanning operations may be called concurrently by
/// collector workers during a stop-the-world pause.
pub trait GenPlan: Sync {
    /// Run the framework's share of a global collection phase.
    fn collection_phase(&self, phase: Phase);

    /// Whether the current cycle collects the full heap. Established during
    /// SET_COLLECTION_KIND, fixed until the end of the cycle.
    fn gc_full_heap(&self) -> bool;

    fn is_emergency_collection(&self) -> bool;

    /// How many times this collection has been attempted.
    fn collection_attempt(&self) -> usize;

    fn is_user_triggered_collection(&self) -> bool;

    /// The write-barrier strategy the mutators run with.
    fn active_barrier(&self) -> BarrierSelector;

    /// Pages reserved by the nursery and the base spaces.
    fn get_pages_used(&self) -> usize;

    /// The framework's own collection reserve (nursery copy reserve etc.).
    fn get_collection_reserve(&self) -> usize;

    /// Pinning fallback for objects outside both mature regions.
    fn will_never_move(&self, object: ObjectReference) -> bool;

    /// Liveness for objects outside both mature regions (nursery residents,
    /// base spaces).
    fn is_live(&self, object: ObjectReference) -> bool;

    /// No-move prediction for objects outside both mature regions.
    fn will_not_move_in_current_collection(&self, object: ObjectReference) -> bool;

    /// Enumerate the reference slots of `object`. `scan` identifies the
    /// registered specialized scan driving the enumeration.
    fn scan_object(&self, scan: usize, object: ObjectReference, visitor: &mut dyn SlotVisitor);
}

/// The per-worker side of the surrounding generational framework: nursery
/// collection phases and the trace fallback for non-mature objects.
/// Instances move to their worker's thread at spawn.
pub trait GenCollectorDelegate: Send {
    /// Run the framework's share of a per-worker collection phase.
    fn collection_phase(&mut self, phase: Phase, primary: bool);

    /// Trace an object outside both mature regions, enqueueing it on first
    /// visit.
    fn trace_object(
        &mut self,
        queue: &mut dyn ObjectQueue,
        object: ObjectReference,
    ) -> ObjectReference;
}
