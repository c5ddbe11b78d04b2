use std::sync::atomic::AtomicBool;

use atomic::{Atomic, Ordering};

use crate::plan::genhybrid::SCAN_MATURE;
use crate::plan::tracing;
use crate::plan::GenPlan;
use crate::plan::Phase;
use crate::plan::Trace;
use crate::policy::largeobjectspace::LosSpace;
use crate::policy::region::RegionSpace;
use crate::util::metadata::pin_bit;
use crate::util::options::Options;
use crate::util::ObjectReference;

/// Everything a [`GenHybrid`] is built from. The two regions and the two
/// large object spaces are constructed by the embedding runtime and live for
/// the process lifetime.
pub struct GenHybridArgs {
    pub immix_dram: &'static dyn RegionSpace,
    pub immix_nvm: &'static dyn RegionSpace,
    pub los_dram: &'static dyn LosSpace,
    pub los_nvm: &'static dyn LosSpace,
    pub gen: &'static dyn GenPlan,
    pub options: Options,
}

/// The global side of the hybrid mature generation: drives the two regions
/// through each collection cycle and aggregates their accounting.
pub struct GenHybrid {
    /// The mature region backed by fast volatile memory.
    pub immix_dram: &'static dyn RegionSpace,
    /// The mature region backed by capacity (NVM) memory.
    pub immix_nvm: &'static dyn RegionSpace,
    pub(crate) los_dram: &'static dyn LosSpace,
    pub(crate) los_nvm: &'static dyn LosSpace,
    gen: &'static dyn GenPlan,
    /// The trace for a full-heap collection.
    pub mature_trace: Trace,
    /// Whether each region defragmented in the last completed cycle.
    /// Written at RELEASE, read until overwritten by the next RELEASE.
    last_gc_was_defrag_dram: AtomicBool,
    last_gc_was_defrag_nvm: AtomicBool,
    global_phase: Atomic<Phase>,
    initialized: AtomicBool,
    options: Options,
}

impl GenHybrid {
    pub fn new(args: GenHybridArgs) -> Self {
        debug_assert!(
            args.immix_dram.descriptor() != args.immix_nvm.descriptor(),
            "the two mature regions must be distinct spaces"
        );
        GenHybrid {
            immix_dram: args.immix_dram,
            immix_nvm: args.immix_nvm,
            los_dram: args.los_dram,
            los_nvm: args.los_nvm,
            gen: args.gen,
            mature_trace: Trace::new(),
            last_gc_was_defrag_dram: AtomicBool::new(false),
            last_gc_was_defrag_nvm: AtomicBool::new(false),
            global_phase: Atomic::new(Phase::Complete),
            initialized: AtomicBool::new(false),
            options: args.options,
        }
    }

    /// One-time setup before any collection: register the mature scan
    /// identifier and initialize the defragmentation machinery of both
    /// regions. Idempotent; reinvocation is a no-op.
    pub fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::register_specialized_scan(SCAN_MATURE, "mature");
        self.immix_dram.initialize_defrag();
        self.immix_nvm.initialize_defrag();
    }

    /// Run this plan's share of a global collection phase, delegating
    /// everything nursery- or base-related upward.
    pub fn collection_phase(&self, phase: Phase) {
        self.global_phase.store(phase, Ordering::SeqCst);

        if phase == Phase::SetCollectionKind {
            self.gen.collection_phase(phase);
            if self.gen.gc_full_heap() {
                let emergency = self.gen.is_emergency_collection();
                let attempt = self.gen.collection_attempt();
                let user_triggered = self.gen.is_user_triggered_collection();
                debug!(
                    "deciding whether to defrag: emergency={} attempt={} user_triggered={}",
                    emergency, attempt, user_triggered
                );
                self.immix_dram
                    .decide_whether_to_defrag(emergency, true, attempt, user_triggered);
                self.immix_nvm
                    .decide_whether_to_defrag(emergency, true, attempt, user_triggered);
            }
            return;
        }

        if self.trace_full_heap() {
            match phase {
                Phase::Prepare => {
                    self.gen.collection_phase(phase);
                    self.mature_trace.prepare();
                    self.immix_dram.prepare(true);
                    self.immix_nvm.prepare(true);
                    trace!(
                        "mature prepare: {} defrag={} {} defrag={}",
                        self.immix_dram.name(),
                        self.immix_dram.in_defrag_collection(),
                        self.immix_nvm.name(),
                        self.immix_nvm.in_defrag_collection()
                    );
                    return;
                }
                Phase::Closure => {
                    // Re-prepare the global trace to seed per-worker closures.
                    self.mature_trace.prepare();
                    return;
                }
                Phase::Release => {
                    self.mature_trace.release();
                    let dram_defragged = self.immix_dram.release(true);
                    let nvm_defragged = self.immix_nvm.release(true);
                    self.last_gc_was_defrag_dram
                        .store(dram_defragged, Ordering::Relaxed);
                    self.last_gc_was_defrag_nvm
                        .store(nvm_defragged, Ordering::Relaxed);
                    self.gen.collection_phase(phase);
                    return;
                }
                _ => {}
            }
        } else if phase == Phase::Release {
            self.last_gc_was_defrag_dram.store(false, Ordering::Relaxed);
            self.last_gc_was_defrag_nvm.store(false, Ordering::Relaxed);
        }

        self.gen.collection_phase(phase);
    }

    /// Pages reserved for use given the pending allocation: both mature
    /// regions plus the inherited (nursery and base) reserve. The
    /// allocation-triggering heuristic compares this against the heap size.
    pub fn get_pages_used(&self) -> usize {
        self.immix_dram.reserved_pages()
            + self.immix_nvm.reserved_pages()
            + self.gen.get_pages_used()
    }

    /// Physical pages still available across both mature regions.
    pub fn get_mature_physical_pages_avail(&self) -> usize {
        self.immix_dram.available_physical_pages() + self.immix_nvm.available_physical_pages()
    }

    /// The inherited reserve plus both regions' defragmentation headroom, so
    /// a defragmenting cycle can always complete without exhausting memory.
    pub fn get_collection_reserve(&self) -> usize {
        self.gen.get_collection_reserve()
            + self.immix_dram.defrag_headroom_pages()
            + self.immix_nvm.defrag_headroom_pages()
    }

    /// Pin `object` if it resides in either mature region. A `true` answer
    /// is permanent: the object will never be relocated again.
    pub fn will_never_move(&self, object: ObjectReference) -> bool {
        if self.immix_dram.in_space(object) || self.immix_nvm.in_space(object) {
            pin_bit::pin_object(object);
            return true;
        }
        self.gen.will_never_move(object)
    }

    /// Whether the most recently completed collection reclaimed everything
    /// it could, i.e. at least one region ran a defragmenting pass.
    pub fn last_collection_was_exhaustive(&self) -> bool {
        self.last_gc_was_defrag_dram.load(Ordering::Relaxed)
            || self.last_gc_was_defrag_nvm.load(Ordering::Relaxed)
    }

    pub fn last_gc_was_defrag_dram(&self) -> bool {
        self.last_gc_was_defrag_dram.load(Ordering::Relaxed)
    }

    pub fn last_gc_was_defrag_nvm(&self) -> bool {
        self.last_gc_was_defrag_nvm.load(Ordering::Relaxed)
    }

    pub fn gen(&self) -> &'static dyn GenPlan {
        self.gen
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub(crate) fn mark_lines_at_scan_time(&self) -> bool {
        self.options.mark_lines_at_scan_time
    }

    pub(crate) fn global_phase(&self) -> Phase {
        self.global_phase.load(Ordering::SeqCst)
    }

    /// Is either mature region collecting in the current cycle?
    pub(crate) fn in_mature_collection(&self) -> bool {
        self.immix_dram.in_collection() || self.immix_nvm.in_collection()
    }

    /// Is either mature region defragmenting in the current cycle?
    pub(crate) fn in_mature_defrag(&self) -> bool {
        self.immix_dram.in_defrag_collection() || self.immix_nvm.in_defrag_collection()
    }

    fn trace_full_heap(&self) -> bool {
        self.gen.gc_full_heap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::metadata::pin_bit;
    use crate::util::test_util::*;
    use rand::{Rng, SeedableRng};

    #[test]
    fn pages_used_and_reserve_sum_both_regions() {
        let h = MockHarness::new();
        h.dram.set_reserved_pages(100);
        h.dram.set_defrag_headroom_pages(10);
        h.nvm.set_reserved_pages(50);
        h.nvm.set_defrag_headroom_pages(5);
        h.gen.set_collection_reserve(20);
        h.gen.set_pages_used(7);
        assert_eq!(h.plan.get_collection_reserve(), 35);
        assert_eq!(h.plan.get_pages_used(), 157);
    }

    #[test]
    fn accounting_identities_hold_for_arbitrary_inputs() {
        let h = MockHarness::new();
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
        for _ in 0..64 {
            let (dr, nr, du, nu, dh, nh, base_used, base_reserve) = (
                rng.gen_range(0..1 << 20),
                rng.gen_range(0..1 << 20),
                rng.gen_range(0..1 << 20),
                rng.gen_range(0..1 << 20),
                rng.gen_range(0..1 << 16),
                rng.gen_range(0..1 << 16),
                rng.gen_range(0..1 << 20),
                rng.gen_range(0..1 << 16),
            );
            h.dram.set_reserved_pages(dr);
            h.nvm.set_reserved_pages(nr);
            h.dram.set_available_physical_pages(du);
            h.nvm.set_available_physical_pages(nu);
            h.dram.set_defrag_headroom_pages(dh);
            h.nvm.set_defrag_headroom_pages(nh);
            h.gen.set_pages_used(base_used);
            h.gen.set_collection_reserve(base_reserve);
            assert_eq!(h.plan.get_pages_used(), dr + nr + base_used);
            assert_eq!(h.plan.get_mature_physical_pages_avail(), du + nu);
            assert_eq!(h.plan.get_collection_reserve(), base_reserve + dh + nh);
        }
    }

    #[test]
    fn defrag_flags_follow_release() {
        let h = MockHarness::new();
        let mut c = h.collector();
        h.dram.program_defrag(true);
        h.run_cycle(std::slice::from_mut(&mut c), &[], true);
        assert!(h.plan.last_collection_was_exhaustive());
        assert!(h.plan.last_gc_was_defrag_dram());
        assert!(!h.plan.last_gc_was_defrag_nvm());

        // A nursery-only cycle clears both flags at RELEASE.
        h.run_cycle(std::slice::from_mut(&mut c), &[], false);
        assert!(!h.plan.last_collection_was_exhaustive());
        assert!(!h.plan.last_gc_was_defrag_dram());
    }

    #[test]
    fn full_heap_without_defrag_is_not_exhaustive() {
        let h = MockHarness::new();
        let mut c = h.collector();
        h.run_cycle(std::slice::from_mut(&mut c), &[], true);
        assert!(!h.plan.last_collection_was_exhaustive());
    }

    #[test]
    fn initialize_is_idempotent() {
        let h = MockHarness::new();
        // The harness already initialized once.
        h.plan.initialize();
        h.plan.initialize();
        assert_eq!(h.dram.defrag_init_count(), 1);
        assert_eq!(h.nvm.defrag_init_count(), 1);
    }

    #[test]
    fn will_never_move_pins_mature_residents() {
        let h = MockHarness::new();
        let mature = h.dram.alloc_object(0);
        assert!(h.plan.will_never_move(mature));
        assert!(pin_bit::is_pinned(mature));
        // Repeated answers stay true.
        assert!(h.plan.will_never_move(mature));

        let outside = leak_object(0);
        assert!(!h.plan.will_never_move(outside));
        assert!(!pin_bit::is_pinned(outside));
    }

    #[test]
    fn defrag_decision_runs_before_prepare_with_collection_inputs() {
        let h = MockHarness::new();
        h.gen.set_full_heap(true);
        h.gen.set_emergency(true);
        h.gen.set_collection_attempt(3);
        h.gen.set_user_triggered(true);
        h.plan.collection_phase(Phase::SetCollectionKind);
        assert_eq!(h.dram.last_defrag_request(), Some((true, true, 3, true)));
        assert_eq!(h.nvm.last_defrag_request(), Some((true, true, 3, true)));
    }

    #[test]
    fn nursery_cycle_skips_defrag_decision() {
        let h = MockHarness::new();
        h.gen.set_full_heap(false);
        h.plan.collection_phase(Phase::SetCollectionKind);
        assert_eq!(h.dram.last_defrag_request(), None);
    }

    #[test]
    fn phases_delegate_upward() {
        let h = MockHarness::new();
        let mut c = h.collector();
        h.run_cycle(std::slice::from_mut(&mut c), &[], true);
        let phases = h.gen.phases();
        for expected in [
            Phase::SetCollectionKind,
            Phase::Initiate,
            Phase::Prepare,
            Phase::Release,
            Phase::Complete,
        ] {
            assert!(phases.contains(&expected), "{:?} not delegated", expected);
        }
        // The full-heap closure is handled here, not upward.
        assert!(!phases.contains(&Phase::Closure));

        let before = h.gen.phases().len();
        h.run_cycle(std::slice::from_mut(&mut c), &[], false);
        let phases = h.gen.phases()[before..].to_vec();
        assert!(phases.contains(&Phase::Closure));
    }
}
