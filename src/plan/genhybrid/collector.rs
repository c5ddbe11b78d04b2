use enum_map::{enum_map, Enum, EnumMap};

use super::global::GenHybrid;
use super::trace::MatureTrace;
use crate::plan::barriers::BarrierSelector;
use crate::plan::tracing::VectorObjectQueue;
use crate::plan::{GenCollectorDelegate, Phase};
use crate::policy::gc_work::{TraceKind, TRACE_KIND_DEFRAG, TRACE_KIND_FAST};
use crate::policy::region::RegionCollector;
use crate::util::alloc::{get_maximum_aligned_size, CopyAllocator, LargeObjectAllocator};
use crate::util::constants::MAX_MATURE_COPY_BYTES;
use crate::util::copy::{CopyContext, CopySemantics};
use crate::util::metadata::{log_bit, write_intensity_bit};
use crate::util::{Address, ObjectReference};

/// Selects one of the four mature copy allocators a worker owns.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Enum)]
pub enum MatureCopySelector {
    DramNormal,
    DramDefrag,
    NvmNormal,
    NvmDefrag,
}

impl MatureCopySelector {
    /// The destination of a mature copy. The region is a pure function of
    /// the source object's write-intensity bit; the allocator variant
    /// follows the chosen region's own defrag mode. The requested copy
    /// semantics play no part in this.
    pub fn select(write_intensive: bool, dram_defrag: bool, nvm_defrag: bool) -> Self {
        if write_intensive {
            if dram_defrag {
                MatureCopySelector::DramDefrag
            } else {
                MatureCopySelector::DramNormal
            }
        } else if nvm_defrag {
            MatureCopySelector::NvmDefrag
        } else {
            MatureCopySelector::NvmNormal
        }
    }
}

/// The copy machinery of one collector worker: four region copy allocators
/// and the two large-object allocators. Regions call back into this through
/// the [`CopyContext`] trait when they evacuate an object.
pub(super) struct GenHybridCopyContext {
    plan: &'static GenHybrid,
    allocators: EnumMap<MatureCopySelector, CopyAllocator>,
    los_dram: LargeObjectAllocator,
    los_nvm: LargeObjectAllocator,
}

impl GenHybridCopyContext {
    pub(super) fn new(plan: &'static GenHybrid) -> Self {
        GenHybridCopyContext {
            plan,
            allocators: enum_map! {
                MatureCopySelector::DramNormal => CopyAllocator::new(plan.immix_dram, false),
                MatureCopySelector::DramDefrag => CopyAllocator::new(plan.immix_dram, true),
                MatureCopySelector::NvmNormal => CopyAllocator::new(plan.immix_nvm, false),
                MatureCopySelector::NvmDefrag => CopyAllocator::new(plan.immix_nvm, true),
            },
            los_dram: LargeObjectAllocator::new(plan.los_dram),
            los_nvm: LargeObjectAllocator::new(plan.los_nvm),
        }
    }

    fn prepare(&mut self, full_heap: bool) {
        self.allocators[MatureCopySelector::DramNormal].reset();
        self.allocators[MatureCopySelector::NvmNormal].reset();
        if full_heap {
            self.allocators[MatureCopySelector::DramDefrag].reset();
            self.allocators[MatureCopySelector::NvmDefrag].reset();
        }
    }

    fn release(&mut self) {
        self.allocators[MatureCopySelector::DramNormal].reset();
        self.allocators[MatureCopySelector::NvmNormal].reset();
    }
}

impl CopyContext for GenHybridCopyContext {
    fn alloc_copy(
        &mut self,
        original: ObjectReference,
        bytes: usize,
        align: usize,
        offset: usize,
        semantics: CopySemantics,
    ) -> Address {
        debug_assert!(
            self.plan.global_phase() == Phase::Closure,
            "collection-time copy outside CLOSURE"
        );
        match semantics {
            CopySemantics::LosDram => {
                debug_assert!(get_maximum_aligned_size(bytes, align) > MAX_MATURE_COPY_BYTES);
                self.los_dram.alloc(bytes, align, offset)
            }
            CopySemantics::LosNvm => {
                debug_assert!(get_maximum_aligned_size(bytes, align) > MAX_MATURE_COPY_BYTES);
                self.los_nvm.alloc(bytes, align, offset)
            }
            _ => {
                debug_assert!(bytes <= MAX_MATURE_COPY_BYTES);
                #[cfg(debug_assertions)]
                {
                    // The requested semantics must agree with what the
                    // regions are actually doing this cycle.
                    if self.plan.in_mature_collection() {
                        debug_assert!(
                            semantics == CopySemantics::MatureMajor,
                            "minor copy requested during a mature region collection"
                        );
                    } else {
                        debug_assert!(
                            semantics == CopySemantics::MatureMinor,
                            "major copy requested outside a mature region collection"
                        );
                    }
                }
                let selector = MatureCopySelector::select(
                    write_intensity_bit::is_write_intensive(original),
                    self.plan.immix_dram.in_defrag_collection(),
                    self.plan.immix_nvm.in_defrag_collection(),
                );
                self.allocators[selector].alloc(bytes, align, offset)
            }
        }
    }

    fn post_copy(
        &mut self,
        object: ObjectReference,
        _type_ref: Address,
        bytes: usize,
        semantics: CopySemantics,
    ) {
        match semantics {
            CopySemantics::LosDram => self.plan.los_dram.initialize_header(object, false),
            CopySemantics::LosNvm => self.plan.los_nvm.initialize_header(object, false),
            _ => {
                let major_gc = semantics == CopySemantics::MatureMajor;
                // The copy carries the original's write-intensity bit, so
                // this resolves to the same region alloc_copy chose.
                if write_intensity_bit::is_write_intensive(object) {
                    debug_assert!(
                        self.plan.immix_dram.in_collection() == major_gc,
                        "copy semantics disagree with the DRAM region's collection mode"
                    );
                    self.plan.immix_dram.post_copy(object, bytes, major_gc);
                } else {
                    debug_assert!(
                        self.plan.immix_nvm.in_collection() == major_gc,
                        "copy semantics disagree with the NVM region's collection mode"
                    );
                    self.plan.immix_nvm.post_copy(object, bytes, major_gc);
                }
            }
        }
        if self.plan.gen().active_barrier() == BarrierSelector::ObjectBarrier {
            log_bit::mark_as_unlogged(object);
        }
    }
}

/// Per-worker state for the hybrid mature generation: the copy machinery,
/// the worker's gray stack, and the per-worker region chores. One instance
/// exists per collector worker, created at worker spawn and reused (reset,
/// not recreated) across cycles.
pub struct GenHybridCollector {
    plan: &'static GenHybrid,
    gen: Box<dyn GenCollectorDelegate>,
    copy: GenHybridCopyContext,
    /// Per-worker gray stack, reused across cycles.
    values: VectorObjectQueue,
    immix_dram: RegionCollector,
    immix_nvm: RegionCollector,
}

impl GenHybridCollector {
    pub fn new(plan: &'static GenHybrid, gen: Box<dyn GenCollectorDelegate>) -> Self {
        GenHybridCollector {
            plan,
            gen,
            copy: GenHybridCopyContext::new(plan),
            values: VectorObjectQueue::new(),
            immix_dram: RegionCollector::new(plan.immix_dram),
            immix_nvm: RegionCollector::new(plan.immix_nvm),
        }
    }

    /// Run this worker's share of a collection phase.
    pub fn collection_phase(&mut self, phase: Phase, primary: bool) {
        let full_heap = self.plan.gen().gc_full_heap();
        match phase {
            Phase::Prepare => {
                self.gen.collection_phase(phase, primary);
                debug_assert!(self.values.is_empty());
                self.copy.prepare(full_heap);
                if full_heap {
                    self.immix_dram.prepare(true);
                    self.immix_nvm.prepare(true);
                }
            }
            Phase::Closure => {
                if full_heap {
                    self.run_mature_closure();
                } else {
                    self.gen.collection_phase(phase, primary);
                }
            }
            Phase::Release => {
                debug_assert!(self.values.is_empty(), "gray objects left over at RELEASE");
                if full_heap {
                    self.immix_dram.release(true);
                    self.immix_nvm.release(true);
                    self.copy.release();
                }
                self.gen.collection_phase(phase, primary);
            }
            _ => self.gen.collection_phase(phase, primary),
        }
    }

    /// The trace strategy for the current full-heap cycle: defragmenting iff
    /// either region defragments. Stable within a cycle because both
    /// regions' defrag flags are fixed between PREPARE and RELEASE.
    pub fn full_heap_trace_kind(&self) -> TraceKind {
        if self.plan.immix_dram.in_defrag_collection()
            || self.plan.immix_nvm.in_defrag_collection()
        {
            TRACE_KIND_DEFRAG
        } else {
            TRACE_KIND_FAST
        }
    }

    fn run_mature_closure(&mut self) {
        match self.full_heap_trace_kind() {
            TRACE_KIND_DEFRAG => MatureTrace::<TRACE_KIND_DEFRAG>::new(
                self.plan,
                &mut self.values,
                &mut self.copy,
                &mut *self.gen,
            )
            .complete_trace(),
            _ => MatureTrace::<TRACE_KIND_FAST>::new(
                self.plan,
                &mut self.values,
                &mut self.copy,
                &mut *self.gen,
            )
            .complete_trace(),
        }
    }
}

// The worker is the copy context the rest of the system sees; the nursery
// collector drives promotion through these during a minor collection.
impl CopyContext for GenHybridCollector {
    fn alloc_copy(
        &mut self,
        original: ObjectReference,
        bytes: usize,
        align: usize,
        offset: usize,
        semantics: CopySemantics,
    ) -> Address {
        self.copy.alloc_copy(original, bytes, align, offset, semantics)
    }

    fn post_copy(
        &mut self,
        object: ObjectReference,
        type_ref: Address,
        bytes: usize,
        semantics: CopySemantics,
    ) {
        self.copy.post_copy(object, type_ref, bytes, semantics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::region::RegionSpace;
    use crate::util::metadata::log_bit;
    use crate::util::test_util::*;

    fn drive_to_closure(h: &MockHarness, c: &mut GenHybridCollector, full_heap: bool) {
        h.gen.set_full_heap(full_heap);
        h.plan.collection_phase(Phase::SetCollectionKind);
        h.plan.collection_phase(Phase::Prepare);
        c.collection_phase(Phase::Prepare, true);
        h.plan.collection_phase(Phase::Closure);
    }

    #[test]
    fn selector_is_a_pure_function_of_bit_and_defrag_state() {
        use MatureCopySelector::*;
        for dram_defrag in [false, true] {
            for nvm_defrag in [false, true] {
                // The region only ever follows the bit.
                let wi = MatureCopySelector::select(true, dram_defrag, nvm_defrag);
                assert!(matches!(wi, DramNormal | DramDefrag));
                assert_eq!(wi == DramDefrag, dram_defrag);
                let not_wi = MatureCopySelector::select(false, dram_defrag, nvm_defrag);
                assert!(matches!(not_wi, NvmNormal | NvmDefrag));
                assert_eq!(not_wi == NvmDefrag, nvm_defrag);
            }
        }
    }

    #[test]
    fn minor_copy_of_write_intensive_object_draws_from_dram_normal() {
        let h = MockHarness::new();
        let mut c = h.collector();
        drive_to_closure(&h, &mut c, false);
        let original = leak_object(0);
        crate::util::metadata::write_intensity_bit::set_write_intensive(original);
        let to = c.alloc_copy(original, 64, 8, 0, CopySemantics::MatureMinor);
        assert!(!to.is_zero());
        assert!(h.dram.in_space(ObjectReference::from_raw_address(to)));
        assert!(h.dram.copy_blocks_acquired(false) > 0);
        assert_eq!(h.dram.copy_blocks_acquired(true), 0);
        assert_eq!(h.nvm.copy_blocks_acquired(false), 0);
        assert_eq!(h.nvm.copy_blocks_acquired(true), 0);
    }

    #[test]
    fn major_copy_into_defragging_nvm_draws_from_nvm_defrag() {
        let h = MockHarness::new();
        let mut c = h.collector();
        h.nvm.program_defrag(true);
        drive_to_closure(&h, &mut c, true);
        let original = leak_object(0);
        let to = c.alloc_copy(original, 64, 8, 0, CopySemantics::MatureMajor);
        assert!(!to.is_zero());
        assert!(h.nvm.in_space(ObjectReference::from_raw_address(to)));
        assert!(h.nvm.copy_blocks_acquired(true) > 0);
        assert_eq!(h.nvm.copy_blocks_acquired(false), 0);
    }

    #[test]
    fn destination_region_follows_the_bit_not_the_request() {
        let h = MockHarness::new();
        let mut c = h.collector();
        drive_to_closure(&h, &mut c, true);
        let write_intensive = leak_object(0);
        crate::util::metadata::write_intensity_bit::set_write_intensive(write_intensive);
        let quiet = leak_object(0);
        // Same requested semantics, different bits: different regions.
        let a = c.alloc_copy(write_intensive, 64, 8, 0, CopySemantics::MatureMajor);
        let b = c.alloc_copy(quiet, 64, 8, 0, CopySemantics::MatureMajor);
        assert!(h.dram.in_space(ObjectReference::from_raw_address(a)));
        assert!(h.nvm.in_space(ObjectReference::from_raw_address(b)));
    }

    #[test]
    fn oversized_copies_route_to_the_large_object_spaces() {
        let h = MockHarness::new();
        let mut c = h.collector();
        drive_to_closure(&h, &mut c, false);
        let original = leak_object(0);
        let bytes = MAX_MATURE_COPY_BYTES + 8;
        let to = c.alloc_copy(original, bytes, 8, 0, CopySemantics::LosNvm);
        assert!(!to.is_zero());
        assert!(h.los_nvm.pages_allocated() > 0);
        assert_eq!(h.los_dram.pages_allocated(), 0);

        let copied = ObjectReference::from_raw_address(to);
        c.post_copy(copied, Address::ZERO, bytes, CopySemantics::LosNvm);
        assert_eq!(h.los_nvm.headers_initialized(), 1);
    }

    #[test]
    fn trace_kind_follows_region_defrag_flags() {
        let h = MockHarness::new();
        let mut c = h.collector();
        h.dram.program_defrag(true);
        h.gen.set_full_heap(true);
        h.plan.collection_phase(Phase::SetCollectionKind);
        h.plan.collection_phase(Phase::Prepare);
        c.collection_phase(Phase::Prepare, true);
        // Stable for the rest of the cycle.
        assert_eq!(c.full_heap_trace_kind(), TRACE_KIND_DEFRAG);
        assert_eq!(c.full_heap_trace_kind(), TRACE_KIND_DEFRAG);
        h.plan.collection_phase(Phase::Closure);
        c.collection_phase(Phase::Closure, true);
        assert_eq!(c.full_heap_trace_kind(), TRACE_KIND_DEFRAG);
        c.collection_phase(Phase::Release, true);
        h.plan.collection_phase(Phase::Release);
        // The next non-defragging cycle selects the fast trace.
        h.dram.program_defrag(false);
        h.plan.collection_phase(Phase::SetCollectionKind);
        h.plan.collection_phase(Phase::Prepare);
        c.collection_phase(Phase::Prepare, true);
        assert_eq!(c.full_heap_trace_kind(), TRACE_KIND_FAST);
    }

    #[test]
    fn post_copy_rearms_the_object_barrier() {
        let h = MockHarness::new();
        let mut c = h.collector();
        drive_to_closure(&h, &mut c, false);
        let original = leak_object(0);
        let to = c.alloc_copy(original, object_size(0), 8, 0, CopySemantics::MatureMinor);
        unsafe {
            to.store::<u64>(0);
            (to + crate::util::constants::BYTES_IN_WORD).store::<usize>(0);
        }
        let copied = ObjectReference::from_raw_address(to);
        c.post_copy(copied, Address::ZERO, object_size(0), CopySemantics::MatureMinor);
        assert!(log_bit::is_unlogged(copied));
        assert!(h.nvm.is_marked(copied));
    }

    #[test]
    fn no_barrier_means_no_rearming() {
        let h = MockHarness::new();
        let mut c = h.collector();
        h.gen.set_barrier(BarrierSelector::NoBarrier);
        drive_to_closure(&h, &mut c, false);
        let original = leak_object(0);
        let to = c.alloc_copy(original, object_size(0), 8, 0, CopySemantics::MatureMinor);
        unsafe {
            to.store::<u64>(0);
            (to + crate::util::constants::BYTES_IN_WORD).store::<usize>(0);
        }
        let copied = ObjectReference::from_raw_address(to);
        c.post_copy(copied, Address::ZERO, object_size(0), CopySemantics::MatureMinor);
        assert!(!log_bit::is_unlogged(copied));
    }

    #[test]
    fn full_heap_cycles_run_the_per_worker_region_chores() {
        let h = MockHarness::new();
        let mut c = h.collector();
        h.run_cycle(std::slice::from_mut(&mut c), &[], true);
        assert_eq!(h.dram.collector_prepare_count(), 1);
        assert_eq!(h.dram.collector_release_count(), 1);
        assert_eq!(h.nvm.collector_prepare_count(), 1);
        assert_eq!(h.nvm.collector_release_count(), 1);

        h.run_cycle(std::slice::from_mut(&mut c), &[], false);
        assert_eq!(h.dram.collector_prepare_count(), 1);
        assert_eq!(h.dram.collector_release_count(), 1);
    }
}
