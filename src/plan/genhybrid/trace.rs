use super::collector::GenHybridCopyContext;
use super::global::GenHybrid;
use super::SCAN_MATURE;
use crate::plan::tracing::{self, SlotVisitor, VectorObjectQueue};
use crate::plan::GenCollectorDelegate;
use crate::policy::gc_work::{TraceKind, TRACE_KIND_DEFRAG};
use crate::util::copy::CopySemantics;
use crate::util::{Address, ObjectReference};

/// A per-worker transitive closure over the heap graph for a full-heap
/// collection of the hybrid mature generation.
///
/// Two instantiations exist. `TRACE_KIND_FAST` marks mature objects in
/// place. `TRACE_KIND_DEFRAG` dispatches to the owning region's evacuating
/// trace, which decides per its region-local defragmentation plan whether to
/// move each object; the reference it returns is the object's canonical
/// identity for every subsequent edge rewrite. Objects outside both mature
/// regions fall back to the surrounding generational framework either way.
///
/// These routines run while collector invariants are suspended: they must
/// not block or yield, and they allocate nothing beyond the pre-sized gray
/// buffers.
pub struct MatureTrace<'a, const KIND: TraceKind> {
    plan: &'static GenHybrid,
    values: &'a mut VectorObjectQueue,
    copy: &'a mut GenHybridCopyContext,
    gen: &'a mut dyn GenCollectorDelegate,
}

impl<'a, const KIND: TraceKind> MatureTrace<'a, KIND> {
    pub(super) fn new(
        plan: &'static GenHybrid,
        values: &'a mut VectorObjectQueue,
        copy: &'a mut GenHybridCopyContext,
        gen: &'a mut dyn GenCollectorDelegate,
    ) -> Self {
        MatureTrace {
            plan,
            values,
            copy,
            gen,
        }
    }

    pub fn is_live(&self, object: ObjectReference) -> bool {
        if KIND == TRACE_KIND_DEFRAG {
            debug_assert!(
                self.plan.in_mature_defrag(),
                "defrag mature trace used while neither region defragments"
            );
        }
        if object.is_null() {
            return false;
        }
        if self.plan.immix_dram.in_space(object) {
            return self.plan.immix_dram.is_live(object);
        }
        if self.plan.immix_nvm.in_space(object) {
            return self.plan.immix_nvm.is_live(object);
        }
        self.plan.gen().is_live(object)
    }

    /// Trace `object`, returning its canonical identity: the unchanged
    /// reference if it is retained in place, or the forwarded reference if
    /// the owning region evacuated it.
    pub fn trace_object(&mut self, object: ObjectReference) -> ObjectReference {
        if KIND == TRACE_KIND_DEFRAG {
            debug_assert!(
                self.plan.in_mature_defrag(),
                "defrag mature trace used while neither region defragments"
            );
        }
        if object.is_null() {
            return object;
        }
        let plan = self.plan;
        let new_object = if plan.immix_dram.in_space(object) {
            if KIND == TRACE_KIND_DEFRAG {
                plan.immix_dram.trace_object(
                    &mut *self.values,
                    object,
                    CopySemantics::MatureMajor,
                    &mut *self.copy,
                )
            } else {
                plan.immix_dram.fast_trace_object(&mut *self.values, object)
            }
        } else if plan.immix_nvm.in_space(object) {
            if KIND == TRACE_KIND_DEFRAG {
                plan.immix_nvm.trace_object(
                    &mut *self.values,
                    object,
                    CopySemantics::MatureMajor,
                    &mut *self.copy,
                )
            } else {
                plan.immix_nvm.fast_trace_object(&mut *self.values, object)
            }
        } else {
            self.gen.trace_object(&mut *self.values, object)
        };
        self.spill_excess();
        new_object
    }

    /// Whether `object` is certain to keep its identity through this
    /// collection. Remembered-set maintenance uses this to decide whether a
    /// slot needs revisiting after the cycle.
    pub fn will_not_move_in_current_collection(&self, object: ObjectReference) -> bool {
        if self.plan.immix_dram.in_space(object) {
            return self.plan.immix_dram.will_not_move_this_gc(object);
        }
        if self.plan.immix_nvm.in_space(object) {
            return self.plan.immix_nvm.will_not_move_this_gc(object);
        }
        self.plan.gen().will_not_move_in_current_collection(object)
    }

    /// Drain this worker's share of the closure to a local fixed point,
    /// pulling roots and spilled gray objects from the global trace.
    pub fn complete_trace(&mut self) {
        debug_assert!(
            tracing::specialized_scan_registered(SCAN_MATURE),
            "mature scan not registered; GenHybrid::initialize must run before collecting"
        );
        let trace = &self.plan.mature_trace;
        debug_assert!(trace.is_active(), "mature closure without a prepared trace");
        loop {
            while let Some(object) = self.values.pop() {
                self.scan_object(object);
            }
            if let Some(slot) = trace.poll_root_slot() {
                self.process_slot(slot);
                continue;
            }
            if let Some(object) = trace.poll_value() {
                self.scan_object(object);
                continue;
            }
            break;
        }
    }

    fn process_slot(&mut self, slot: Address) {
        let object: ObjectReference = unsafe { slot.load() };
        if object.is_null() {
            return;
        }
        let new_object = self.trace_object(object);
        if new_object != object {
            unsafe { slot.store(new_object) };
        }
    }

    fn scan_object(&mut self, object: ObjectReference) {
        #[cfg(debug_assertions)]
        if self.plan.options().verbose >= 9 {
            trace!("SO[{:?}]", object);
        }
        let plan = self.plan;
        plan.gen().scan_object(SCAN_MATURE, object, self);
        if plan.mark_lines_at_scan_time() {
            // At most one of these matches; the line marks feed the owning
            // region's next defragmentation decision.
            if plan.immix_dram.in_space(object) {
                plan.immix_dram.mark_lines(object);
            }
            if plan.immix_nvm.in_space(object) {
                plan.immix_nvm.mark_lines(object);
            }
        }
    }

    fn spill_excess(&mut self) {
        if self.values.is_full() {
            for object in self.values.take() {
                self.plan.mature_trace.spill_value(object);
            }
        }
    }
}

impl<'a, const KIND: TraceKind> SlotVisitor for MatureTrace<'a, KIND> {
    fn visit_slot(&mut self, slot: Address) {
        self.process_slot(slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Phase;
    use crate::policy::region::RegionSpace;
    use crate::util::metadata::write_intensity_bit;
    use crate::util::test_util::*;

    #[test]
    fn defrag_closure_keeps_one_identity_per_object() {
        let h = MockHarness::new();
        let mut c = h.collector();

        // a (DRAM, write-intensive, evacuated) -> b (NVM) -> d (DRAM), with
        // two independent roots reaching a.
        let a = h.dram.alloc_object(1);
        write_intensity_bit::set_write_intensive(a);
        let b = h.nvm.alloc_object(1);
        let d = h.dram.alloc_object(0);
        write_intensity_bit::set_write_intensive(d);
        set_slot(a, 0, b);
        set_slot(b, 0, d);

        let mut root1 = a;
        let mut root2 = a;
        let roots = [
            crate::util::Address::from_mut_ptr(&mut root1),
            crate::util::Address::from_mut_ptr(&mut root2),
        ];

        h.dram.program_defrag(true);
        h.dram.mark_defrag_source(a);
        h.run_cycle(std::slice::from_mut(&mut c), &roots, true);

        // a survives under exactly one forwarded identity, and every
        // reachable pointer to it was rewritten.
        let a_new = h.dram.forwarding_of(a).expect("a was not evacuated");
        assert_ne!(a_new, a);
        assert_eq!(root1, a_new);
        assert_eq!(root2, a_new);
        // The write-intensity bit steered the copy back into DRAM and
        // survived the move.
        assert!(h.dram.in_space(a_new));
        assert!(write_intensity_bit::is_write_intensive(a_new));
        // The rest of the graph was retained in place and marked.
        assert_eq!(get_slot(a_new, 0), b);
        assert_eq!(get_slot(b, 0), d);
        assert!(h.nvm.is_marked(b));
        assert!(h.dram.is_marked(d));
        assert!(h.nvm.forwarding_of(b).is_none());
    }

    #[test]
    fn pinned_objects_are_never_evacuated() {
        let h = MockHarness::new();
        let mut c = h.collector();
        let a = h.dram.alloc_object(0);
        write_intensity_bit::set_write_intensive(a);
        assert!(h.plan.will_never_move(a));

        let mut root = a;
        let roots = [crate::util::Address::from_mut_ptr(&mut root)];
        h.dram.program_defrag(true);
        h.dram.mark_defrag_source(a);
        h.run_cycle(std::slice::from_mut(&mut c), &roots, true);

        assert_eq!(root, a);
        assert!(h.dram.forwarding_of(a).is_none());
        assert!(h.dram.is_marked(a));
    }

    #[test]
    fn fast_closure_marks_in_place() {
        let h = MockHarness::new();
        let mut c = h.collector();
        let a = h.dram.alloc_object(1);
        write_intensity_bit::set_write_intensive(a);
        let b = h.nvm.alloc_object(0);
        set_slot(a, 0, b);

        let mut root = a;
        let roots = [crate::util::Address::from_mut_ptr(&mut root)];
        h.run_cycle(std::slice::from_mut(&mut c), &roots, true);

        assert_eq!(root, a);
        assert!(h.dram.is_marked(a));
        assert!(h.nvm.is_marked(b));
        assert!(h.dram.forwarding_of(a).is_none());
        assert!(h.nvm.forwarding_of(b).is_none());
    }

    #[test]
    fn objects_outside_both_regions_fall_back_to_the_framework() {
        let h = MockHarness::new();
        let mut c = h.collector();
        let nursery = leak_object(0);
        let a = h.nvm.alloc_object(1);
        set_slot(a, 0, nursery);

        let mut root = a;
        let roots = [crate::util::Address::from_mut_ptr(&mut root)];
        h.run_cycle(std::slice::from_mut(&mut c), &roots, true);

        assert!(h.nvm.is_marked(a));
        assert_eq!(h.gen.nursery_live_count(), 1);
    }

    #[test]
    fn scan_time_line_marking_follows_the_option() {
        let h = MockHarness::new();
        let mut c = h.collector();
        let a = h.dram.alloc_object(0);
        let mut root = a;
        let roots = [crate::util::Address::from_mut_ptr(&mut root)];
        h.run_cycle(std::slice::from_mut(&mut c), &roots, true);
        assert!(h.dram.lines_marked() > 0);

        let mut options = crate::util::options::Options::default();
        options.mark_lines_at_scan_time = false;
        let h2 = MockHarness::with_options(options);
        let mut c2 = h2.collector();
        let a2 = h2.dram.alloc_object(0);
        let mut root2 = a2;
        let roots2 = [crate::util::Address::from_mut_ptr(&mut root2)];
        h2.run_cycle(std::slice::from_mut(&mut c2), &roots2, true);
        assert_eq!(h2.dram.lines_marked(), 0);
    }

    #[test]
    fn liveness_dispatches_to_the_owning_region() {
        let h = MockHarness::new();
        h.dram.program_defrag(true);
        h.gen.set_full_heap(true);
        h.plan.collection_phase(Phase::SetCollectionKind);
        h.plan.collection_phase(Phase::Prepare);

        let mut values = crate::plan::tracing::VectorObjectQueue::new();
        let mut copy = GenHybridCopyContext::new(h.plan);
        let mut delegate = h.collector_delegate();
        let mut trace = MatureTrace::<TRACE_KIND_DEFRAG>::new(
            h.plan,
            &mut values,
            &mut copy,
            &mut *delegate,
        );

        assert!(!trace.is_live(crate::util::ObjectReference::NULL));
        let a = h.dram.alloc_object(0);
        assert!(!trace.is_live(a));
        let traced = trace.trace_object(a);
        assert_eq!(traced, a);
        assert!(trace.is_live(a));
        // Untraced NVM residents stay dead.
        let b = h.nvm.alloc_object(0);
        assert!(!trace.is_live(b));
        // Drain what trace_object enqueued so RELEASE-side checks stay
        // meaningful elsewhere.
        while values.pop().is_some() {}
    }

    #[test]
    fn no_move_prediction_dispatches_to_the_owning_region() {
        let h = MockHarness::new();
        h.dram.program_defrag(true);
        h.gen.set_full_heap(true);
        h.plan.collection_phase(Phase::SetCollectionKind);
        h.plan.collection_phase(Phase::Prepare);

        let moving = h.dram.alloc_object(0);
        h.dram.mark_defrag_source(moving);
        let staying = h.dram.alloc_object(0);
        let outside = leak_object(0);

        let mut values = crate::plan::tracing::VectorObjectQueue::new();
        let mut copy = GenHybridCopyContext::new(h.plan);
        let mut delegate = h.collector_delegate();
        let trace = MatureTrace::<TRACE_KIND_DEFRAG>::new(
            h.plan,
            &mut values,
            &mut copy,
            &mut *delegate,
        );

        assert!(!trace.will_not_move_in_current_collection(moving));
        assert!(trace.will_not_move_in_current_collection(staying));
        assert!(trace.will_not_move_in_current_collection(outside));
    }

    #[test]
    fn concurrent_workers_agree_on_forwarded_identities() {
        let h = MockHarness::new();
        let mut workers = vec![h.collector(), h.collector()];

        // Alternating DRAM evacuation candidates and NVM residents, each
        // reachable from its own root.
        let mut objects = vec![];
        for i in 0..64 {
            let object = if i % 2 == 0 {
                let o = h.dram.alloc_object(1);
                write_intensity_bit::set_write_intensive(o);
                h.dram.mark_defrag_source(o);
                o
            } else {
                h.nvm.alloc_object(1)
            };
            objects.push(object);
        }
        // Link neighbours so workers cross each other's territory.
        for i in 0..objects.len() - 1 {
            set_slot(objects[i], 0, objects[i + 1]);
        }

        let mut roots: Vec<_> = objects.clone();
        let root_slots: Vec<_> = roots
            .iter_mut()
            .map(|r| crate::util::Address::from_mut_ptr(r))
            .collect();

        h.dram.program_defrag(true);
        h.gen.set_full_heap(true);
        h.plan.collection_phase(Phase::SetCollectionKind);
        h.plan.collection_phase(Phase::Prepare);
        for (i, w) in workers.iter_mut().enumerate() {
            w.collection_phase(Phase::Prepare, i == 0);
        }
        h.plan.collection_phase(Phase::Closure);
        for slot in &root_slots {
            h.plan.mature_trace.add_root_slot(*slot);
        }
        std::thread::scope(|scope| {
            for w in workers.iter_mut() {
                scope.spawn(move || w.collection_phase(Phase::Closure, false));
            }
        });
        for (i, w) in workers.iter_mut().enumerate() {
            w.collection_phase(Phase::Release, i == 0);
        }
        h.plan.collection_phase(Phase::Release);

        // Every DRAM-resident candidate was evacuated exactly once and each
        // root agrees with the forwarding table; NVM candidates did not move
        // (only DRAM defragmented).
        for (i, &object) in objects.iter().enumerate() {
            if i % 2 == 0 {
                let forwarded = h.dram.forwarding_of(object).expect("missing forwarding");
                assert_eq!(roots[i], forwarded);
                assert!(h.dram.in_space(forwarded));
            } else {
                assert!(h.nvm.forwarding_of(object).is_none());
                assert_eq!(roots[i], object);
                assert!(h.nvm.is_marked(object));
            }
        }
    }
}
