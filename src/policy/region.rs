//! The interface of a mature mark-region (Immix-style) space.
//!
//! Two live instances exist for the lifetime of the process: the DRAM mature
//! region and the NVM mature region. Block and line accounting, liveness
//! bookkeeping, copy-time forwarding and the defragmentation plan all live
//! behind this trait; the mature-generation core only coordinates the two
//! instances and supplies copy destinations.

use crate::plan::tracing::ObjectQueue;
use crate::util::copy::{CopyContext, CopySemantics};
use crate::util::{Address, ObjectReference};

/// Opaque identity of a space.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SpaceDescriptor(u32);

impl SpaceDescriptor {
    pub const fn new(raw: u32) -> Self {
        SpaceDescriptor(raw)
    }
}

/// A mature region consumed by the mature-generation core.
///
/// Invariant: the defrag-mode flag reported by [`in_defrag_collection`] is
/// decided before PREPARE and stays fixed until RELEASE of the same cycle,
/// so per-cycle queries of it are idempotent.
///
/// The liveness and trace operations are called concurrently by collector
/// workers on disjoint objects; implementations must be safe under that, but
/// may assume the world is stopped.
///
/// [`in_defrag_collection`]: RegionSpace::in_defrag_collection
pub trait RegionSpace: Sync {
    fn name(&self) -> &str;

    fn descriptor(&self) -> SpaceDescriptor;

    /// O(1) membership test, derivable from the object's address.
    fn in_space(&self, object: ObjectReference) -> bool;

    /// Pages currently reserved by this region, including pending copies.
    fn reserved_pages(&self) -> usize;

    /// Physical pages still available to this region's backing memory.
    fn available_physical_pages(&self) -> usize;

    /// Pages held back so a defragmenting collection can always complete
    /// without exhausting memory mid-cycle.
    fn defrag_headroom_pages(&self) -> usize;

    /// Decide whether the coming full-heap collection should defragment this
    /// region. Must be called before PREPARE of the same cycle.
    fn decide_whether_to_defrag(
        &self,
        emergency_collection: bool,
        full_heap: bool,
        collection_attempt: usize,
        user_triggered: bool,
    );

    /// One-time setup of the defragmentation machinery.
    fn initialize_defrag(&self);

    /// Is this region collecting in the current cycle?
    fn in_collection(&self) -> bool;

    /// Is this region running a defragmenting collection in the current
    /// cycle?
    fn in_defrag_collection(&self) -> bool;

    fn prepare(&self, full_heap: bool);

    /// Release the region at the end of a cycle. Returns whether the region
    /// actually defragmented during this cycle.
    fn release(&self, full_heap: bool) -> bool;

    /// Per-worker prepare chores (e.g. sweeping preparation for the worker's
    /// share of blocks). Called once per worker during full-heap PREPARE.
    fn collector_prepare(&self, major_gc: bool);

    /// Per-worker release chores. Called once per worker during full-heap
    /// RELEASE.
    fn collector_release(&self, major_gc: bool);

    fn is_live(&self, object: ObjectReference) -> bool;

    /// Trace `object` without moving it, marking it live and enqueueing it
    /// if this is its first visit.
    fn fast_trace_object(
        &self,
        queue: &mut dyn ObjectQueue,
        object: ObjectReference,
    ) -> ObjectReference;

    /// Trace `object`, evacuating it through `copy` if it sits in one of
    /// this region's defragmentation source blocks and is not pinned. The
    /// returned reference is the object's canonical identity from here on;
    /// the caller must rewrite the slot it came from.
    fn trace_object(
        &self,
        queue: &mut dyn ObjectQueue,
        object: ObjectReference,
        semantics: CopySemantics,
        copy: &mut dyn CopyContext,
    ) -> ObjectReference;

    /// Whether `object` is certain to survive this collection in place.
    /// Remembered-set maintenance uses this to decide whether a slot needs
    /// revisiting after the cycle.
    fn will_not_move_this_gc(&self, object: ObjectReference) -> bool;

    /// Install collection metadata for a copy that just landed in this
    /// region.
    fn post_copy(&self, object: ObjectReference, bytes: usize, major_gc: bool);

    /// Mark the lines covered by `object`, feeding the next cycle's
    /// defragmentation decision.
    fn mark_lines(&self, object: ObjectReference);

    /// Hand a clean or recyclable block to a per-worker copy allocator.
    /// `defrag` requests a defragmentation target block. Returns
    /// `Address::ZERO` on exhaustion.
    fn acquire_copy_block(&self, defrag: bool) -> Address;
}

/// Per-worker handle to a mature region, holding the worker's share of the
/// region's prepare/release chores.
pub struct RegionCollector {
    space: &'static dyn RegionSpace,
}

impl RegionCollector {
    pub fn new(space: &'static dyn RegionSpace) -> Self {
        RegionCollector { space }
    }

    pub fn prepare(&mut self, major_gc: bool) {
        self.space.collector_prepare(major_gc);
    }

    pub fn release(&mut self, major_gc: bool) {
        self.space.collector_release(major_gc);
    }
}
