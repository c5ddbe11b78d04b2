//! Mock binding for tests: arena-backed mature regions, large object
//! spaces, and a scripted generational parent.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::plan::barriers::BarrierSelector;
use crate::plan::genhybrid::{GenHybrid, GenHybridArgs, GenHybridCollector, SCAN_MATURE};
use crate::plan::tracing::{ObjectQueue, SlotVisitor};
use crate::plan::{GenCollectorDelegate, GenPlan, Phase};
use crate::policy::largeobjectspace::LosSpace;
use crate::policy::region::{RegionSpace, SpaceDescriptor};
use crate::util::constants::{BYTES_IN_BLOCK, BYTES_IN_PAGE, BYTES_IN_WORD};
use crate::util::copy::{CopyContext, CopySemantics};
use crate::util::metadata::pin_bit;
use crate::util::options::Options;
use crate::util::{Address, ObjectReference};

/// Test objects are self-describing: an 8-byte header whose first byte is
/// the status byte, an 8-byte reference-slot count, then the slots.
pub const OBJECT_HEADER_BYTES: usize = 2 * BYTES_IN_WORD;

pub fn object_size(slots: usize) -> usize {
    OBJECT_HEADER_BYTES + slots * BYTES_IN_WORD
}

pub fn object_slot_count(object: ObjectReference) -> usize {
    unsafe { (object.to_address() + BYTES_IN_WORD).load::<usize>() }
}

pub fn object_size_of(object: ObjectReference) -> usize {
    object_size(object_slot_count(object))
}

pub fn slot_address(object: ObjectReference, index: usize) -> Address {
    debug_assert!(index < object_slot_count(object));
    object.to_address() + OBJECT_HEADER_BYTES + index * BYTES_IN_WORD
}

pub fn set_slot(object: ObjectReference, index: usize, target: ObjectReference) {
    unsafe { slot_address(object, index).store(target) }
}

pub fn get_slot(object: ObjectReference, index: usize) -> ObjectReference {
    unsafe { slot_address(object, index).load() }
}

fn leak_arena(bytes: usize, align: usize) -> Address {
    let mem: &'static mut [u8] = Box::leak(vec![0u8; bytes + align].into_boxed_slice());
    Address::from_mut_ptr(mem.as_mut_ptr()).align_up(align)
}

/// An object outside any mock region, standing in for a nursery resident.
pub fn leak_object(slots: usize) -> ObjectReference {
    let address = leak_arena(object_size(slots), BYTES_IN_WORD);
    unsafe {
        address.store::<u64>(0);
        (address + BYTES_IN_WORD).store::<usize>(slots);
    }
    let object = ObjectReference::from_raw_address(address);
    for i in 0..slots {
        set_slot(object, i, ObjectReference::NULL);
    }
    object
}

static NEXT_DESCRIPTOR: AtomicU32 = AtomicU32::new(1);

/// A mature region over a leaked arena. Marking, forwarding and the defrag
/// decision are scripted well enough to drive full cycles through the core.
pub struct MockRegion {
    name: &'static str,
    descriptor: SpaceDescriptor,
    start: Address,
    end: Address,
    /// Next arena block not yet handed out.
    block_cursor: AtomicUsize,
    /// Bump range for direct test allocation into this region.
    bump: Mutex<(Address, Address)>,
    marked: Mutex<HashSet<ObjectReference>>,
    forwarding: Mutex<HashMap<ObjectReference, ObjectReference>>,
    defrag_sources: Mutex<HashSet<ObjectReference>>,
    /// What the next `decide_whether_to_defrag` should decide.
    programmed_defrag: AtomicBool,
    pending_defrag: AtomicBool,
    in_collection: AtomicBool,
    in_defrag: AtomicBool,
    reserved_pages: AtomicUsize,
    available_physical_pages: AtomicUsize,
    defrag_headroom_pages: AtomicUsize,
    defrag_init_count: AtomicUsize,
    collector_prepares: AtomicUsize,
    collector_releases: AtomicUsize,
    normal_blocks: AtomicUsize,
    defrag_blocks: AtomicUsize,
    lines_marked: AtomicUsize,
    last_defrag_request: Mutex<Option<(bool, bool, usize, bool)>>,
}

impl MockRegion {
    pub fn leaked(name: &'static str, blocks: usize) -> &'static MockRegion {
        let start = leak_arena(blocks * BYTES_IN_BLOCK, BYTES_IN_BLOCK);
        Box::leak(Box::new(MockRegion {
            name,
            descriptor: SpaceDescriptor::new(NEXT_DESCRIPTOR.fetch_add(1, Ordering::SeqCst)),
            start,
            end: start + blocks * BYTES_IN_BLOCK,
            block_cursor: AtomicUsize::new(0),
            bump: Mutex::new((Address::ZERO, Address::ZERO)),
            marked: Mutex::new(HashSet::new()),
            forwarding: Mutex::new(HashMap::new()),
            defrag_sources: Mutex::new(HashSet::new()),
            programmed_defrag: AtomicBool::new(false),
            pending_defrag: AtomicBool::new(false),
            in_collection: AtomicBool::new(false),
            in_defrag: AtomicBool::new(false),
            reserved_pages: AtomicUsize::new(0),
            available_physical_pages: AtomicUsize::new(0),
            defrag_headroom_pages: AtomicUsize::new(0),
            defrag_init_count: AtomicUsize::new(0),
            collector_prepares: AtomicUsize::new(0),
            collector_releases: AtomicUsize::new(0),
            normal_blocks: AtomicUsize::new(0),
            defrag_blocks: AtomicUsize::new(0),
            lines_marked: AtomicUsize::new(0),
            last_defrag_request: Mutex::new(None),
        }))
    }

    fn take_block(&self) -> Address {
        let index = self.block_cursor.fetch_add(1, Ordering::SeqCst);
        let block = self.start + index * BYTES_IN_BLOCK;
        assert!(block + BYTES_IN_BLOCK <= self.end, "mock region out of blocks");
        block
    }

    /// Allocate a test object with `slots` (initially null) reference slots.
    pub fn alloc_object(&self, slots: usize) -> ObjectReference {
        let bytes = object_size(slots);
        let mut bump = self.bump.lock().unwrap();
        if bump.0 + bytes > bump.1 || bump.0.is_zero() {
            let block = self.take_block();
            *bump = (block, block + BYTES_IN_BLOCK);
        }
        let address = bump.0;
        bump.0 += bytes;
        unsafe {
            address.store::<u64>(0);
            (address + BYTES_IN_WORD).store::<usize>(slots);
        }
        let object = ObjectReference::from_raw_address(address);
        for i in 0..slots {
            set_slot(object, i, ObjectReference::NULL);
        }
        object
    }

    pub fn program_defrag(&self, defrag: bool) {
        self.programmed_defrag.store(defrag, Ordering::SeqCst);
    }

    pub fn mark_defrag_source(&self, object: ObjectReference) {
        self.defrag_sources.lock().unwrap().insert(object);
    }

    pub fn set_reserved_pages(&self, pages: usize) {
        self.reserved_pages.store(pages, Ordering::SeqCst);
    }

    pub fn set_available_physical_pages(&self, pages: usize) {
        self.available_physical_pages.store(pages, Ordering::SeqCst);
    }

    pub fn set_defrag_headroom_pages(&self, pages: usize) {
        self.defrag_headroom_pages.store(pages, Ordering::SeqCst);
    }

    pub fn is_marked(&self, object: ObjectReference) -> bool {
        self.marked.lock().unwrap().contains(&object)
    }

    pub fn forwarding_of(&self, object: ObjectReference) -> Option<ObjectReference> {
        self.forwarding.lock().unwrap().get(&object).copied()
    }

    pub fn copy_blocks_acquired(&self, defrag: bool) -> usize {
        if defrag {
            self.defrag_blocks.load(Ordering::SeqCst)
        } else {
            self.normal_blocks.load(Ordering::SeqCst)
        }
    }

    pub fn lines_marked(&self) -> usize {
        self.lines_marked.load(Ordering::SeqCst)
    }

    pub fn defrag_init_count(&self) -> usize {
        self.defrag_init_count.load(Ordering::SeqCst)
    }

    pub fn collector_prepare_count(&self) -> usize {
        self.collector_prepares.load(Ordering::SeqCst)
    }

    pub fn collector_release_count(&self) -> usize {
        self.collector_releases.load(Ordering::SeqCst)
    }

    pub fn last_defrag_request(&self) -> Option<(bool, bool, usize, bool)> {
        *self.last_defrag_request.lock().unwrap()
    }
}

impl RegionSpace for MockRegion {
    fn name(&self) -> &str {
        self.name
    }

    fn descriptor(&self) -> SpaceDescriptor {
        self.descriptor
    }

    fn in_space(&self, object: ObjectReference) -> bool {
        let address = object.to_address();
        self.start <= address && address < self.end
    }

    fn reserved_pages(&self) -> usize {
        self.reserved_pages.load(Ordering::SeqCst)
    }

    fn available_physical_pages(&self) -> usize {
        self.available_physical_pages.load(Ordering::SeqCst)
    }

    fn defrag_headroom_pages(&self) -> usize {
        self.defrag_headroom_pages.load(Ordering::SeqCst)
    }

    fn decide_whether_to_defrag(
        &self,
        emergency_collection: bool,
        full_heap: bool,
        collection_attempt: usize,
        user_triggered: bool,
    ) {
        *self.last_defrag_request.lock().unwrap() = Some((
            emergency_collection,
            full_heap,
            collection_attempt,
            user_triggered,
        ));
        self.pending_defrag.store(
            full_heap && self.programmed_defrag.load(Ordering::SeqCst),
            Ordering::SeqCst,
        );
    }

    fn initialize_defrag(&self) {
        self.defrag_init_count.fetch_add(1, Ordering::SeqCst);
    }

    fn in_collection(&self) -> bool {
        self.in_collection.load(Ordering::SeqCst)
    }

    fn in_defrag_collection(&self) -> bool {
        self.in_defrag.load(Ordering::SeqCst)
    }

    fn prepare(&self, full_heap: bool) {
        assert!(full_heap, "mock region only takes part in full-heap cycles");
        self.marked.lock().unwrap().clear();
        self.forwarding.lock().unwrap().clear();
        self.in_collection.store(true, Ordering::SeqCst);
        self.in_defrag
            .store(self.pending_defrag.load(Ordering::SeqCst), Ordering::SeqCst);
    }

    fn release(&self, full_heap: bool) -> bool {
        let defragged = full_heap && self.in_defrag.load(Ordering::SeqCst);
        self.in_collection.store(false, Ordering::SeqCst);
        self.in_defrag.store(false, Ordering::SeqCst);
        self.pending_defrag.store(false, Ordering::SeqCst);
        self.defrag_sources.lock().unwrap().clear();
        defragged
    }

    fn collector_prepare(&self, major_gc: bool) {
        assert!(major_gc);
        self.collector_prepares.fetch_add(1, Ordering::SeqCst);
    }

    fn collector_release(&self, major_gc: bool) {
        assert!(major_gc);
        self.collector_releases.fetch_add(1, Ordering::SeqCst);
    }

    fn is_live(&self, object: ObjectReference) -> bool {
        self.is_marked(object) || self.forwarding_of(object).is_some()
    }

    fn fast_trace_object(
        &self,
        queue: &mut dyn ObjectQueue,
        object: ObjectReference,
    ) -> ObjectReference {
        debug_assert!(self.in_space(object));
        if self.marked.lock().unwrap().insert(object) {
            queue.enqueue(object);
        }
        object
    }

    fn trace_object(
        &self,
        queue: &mut dyn ObjectQueue,
        object: ObjectReference,
        semantics: CopySemantics,
        copy: &mut dyn CopyContext,
    ) -> ObjectReference {
        debug_assert!(self.in_space(object));
        // Hold the forwarding table across the evacuation so concurrent
        // tracers agree on a single copy.
        let mut forwarding = self.forwarding.lock().unwrap();
        if let Some(new_object) = forwarding.get(&object) {
            return *new_object;
        }
        let evacuate = self.in_defrag_collection()
            && self.defrag_sources.lock().unwrap().contains(&object)
            && !pin_bit::is_pinned(object);
        if evacuate {
            let bytes = object_size_of(object);
            let to = copy.alloc_copy(object, bytes, BYTES_IN_WORD, 0, semantics);
            assert!(!to.is_zero(), "copy destination exhausted");
            unsafe {
                std::ptr::copy_nonoverlapping(
                    object.to_address().to_ptr::<u8>(),
                    to.to_mut_ptr::<u8>(),
                    bytes,
                );
            }
            let new_object = ObjectReference::from_raw_address(to);
            copy.post_copy(new_object, Address::ZERO, bytes, semantics);
            forwarding.insert(object, new_object);
            queue.enqueue(new_object);
            new_object
        } else {
            if self.marked.lock().unwrap().insert(object) {
                queue.enqueue(object);
            }
            object
        }
    }

    fn will_not_move_this_gc(&self, object: ObjectReference) -> bool {
        !(self.in_defrag_collection()
            && self.defrag_sources.lock().unwrap().contains(&object)
            && !pin_bit::is_pinned(object))
    }

    fn post_copy(&self, object: ObjectReference, _bytes: usize, major_gc: bool) {
        debug_assert!(self.in_space(object));
        debug_assert!(major_gc == self.in_collection());
        self.marked.lock().unwrap().insert(object);
    }

    fn mark_lines(&self, object: ObjectReference) {
        debug_assert!(self.in_space(object));
        self.lines_marked.fetch_add(1, Ordering::SeqCst);
    }

    fn acquire_copy_block(&self, defrag: bool) -> Address {
        if defrag {
            self.defrag_blocks.fetch_add(1, Ordering::SeqCst);
        } else {
            self.normal_blocks.fetch_add(1, Ordering::SeqCst);
        }
        self.take_block()
    }
}

/// A large object space over a leaked arena.
pub struct MockLos {
    start: Address,
    end: Address,
    cursor: AtomicUsize,
    pages_allocated: AtomicUsize,
    headers: Mutex<Vec<ObjectReference>>,
}

impl MockLos {
    pub fn leaked(pages: usize) -> &'static MockLos {
        let start = leak_arena(pages * BYTES_IN_PAGE, BYTES_IN_PAGE);
        Box::leak(Box::new(MockLos {
            start,
            end: start + pages * BYTES_IN_PAGE,
            cursor: AtomicUsize::new(0),
            pages_allocated: AtomicUsize::new(0),
            headers: Mutex::new(vec![]),
        }))
    }

    pub fn pages_allocated(&self) -> usize {
        self.pages_allocated.load(Ordering::SeqCst)
    }

    pub fn headers_initialized(&self) -> usize {
        self.headers.lock().unwrap().len()
    }

    pub fn in_space(&self, object: ObjectReference) -> bool {
        let address = object.to_address();
        self.start <= address && address < self.end
    }
}

impl LosSpace for MockLos {
    fn allocate_pages(&self, pages: usize) -> Address {
        let offset = self
            .cursor
            .fetch_add(pages * BYTES_IN_PAGE, Ordering::SeqCst);
        if self.start + offset + pages * BYTES_IN_PAGE > self.end {
            return Address::ZERO;
        }
        self.pages_allocated.fetch_add(pages, Ordering::SeqCst);
        self.start + offset
    }

    fn initialize_header(&self, object: ObjectReference, _alloc: bool) {
        self.headers.lock().unwrap().push(object);
    }
}

/// The scripted generational framework above the mature core.
pub struct MockGen {
    full_heap: AtomicBool,
    emergency: AtomicBool,
    user_triggered: AtomicBool,
    attempt: AtomicUsize,
    barrier: Mutex<BarrierSelector>,
    pages_used: AtomicUsize,
    collection_reserve: AtomicUsize,
    phases: Mutex<Vec<Phase>>,
    collector_phases: Mutex<Vec<Phase>>,
    nursery_live: Mutex<HashSet<ObjectReference>>,
}

impl MockGen {
    pub fn leaked() -> &'static MockGen {
        Box::leak(Box::new(MockGen {
            full_heap: AtomicBool::new(false),
            emergency: AtomicBool::new(false),
            user_triggered: AtomicBool::new(false),
            attempt: AtomicUsize::new(1),
            barrier: Mutex::new(BarrierSelector::ObjectBarrier),
            pages_used: AtomicUsize::new(0),
            collection_reserve: AtomicUsize::new(0),
            phases: Mutex::new(vec![]),
            collector_phases: Mutex::new(vec![]),
            nursery_live: Mutex::new(HashSet::new()),
        }))
    }

    pub fn set_full_heap(&self, full_heap: bool) {
        self.full_heap.store(full_heap, Ordering::SeqCst);
    }

    pub fn set_emergency(&self, emergency: bool) {
        self.emergency.store(emergency, Ordering::SeqCst);
    }

    pub fn set_user_triggered(&self, user_triggered: bool) {
        self.user_triggered.store(user_triggered, Ordering::SeqCst);
    }

    pub fn set_collection_attempt(&self, attempt: usize) {
        self.attempt.store(attempt, Ordering::SeqCst);
    }

    pub fn set_barrier(&self, barrier: BarrierSelector) {
        *self.barrier.lock().unwrap() = barrier;
    }

    pub fn set_pages_used(&self, pages: usize) {
        self.pages_used.store(pages, Ordering::SeqCst);
    }

    pub fn set_collection_reserve(&self, pages: usize) {
        self.collection_reserve.store(pages, Ordering::SeqCst);
    }

    pub fn phases(&self) -> Vec<Phase> {
        self.phases.lock().unwrap().clone()
    }

    pub fn collector_phases(&self) -> Vec<Phase> {
        self.collector_phases.lock().unwrap().clone()
    }

    pub fn nursery_live_count(&self) -> usize {
        self.nursery_live.lock().unwrap().len()
    }
}

impl GenPlan for MockGen {
    fn collection_phase(&self, phase: Phase) {
        self.phases.lock().unwrap().push(phase);
    }

    fn gc_full_heap(&self) -> bool {
        self.full_heap.load(Ordering::SeqCst)
    }

    fn is_emergency_collection(&self) -> bool {
        self.emergency.load(Ordering::SeqCst)
    }

    fn collection_attempt(&self) -> usize {
        self.attempt.load(Ordering::SeqCst)
    }

    fn is_user_triggered_collection(&self) -> bool {
        self.user_triggered.load(Ordering::SeqCst)
    }

    fn active_barrier(&self) -> BarrierSelector {
        *self.barrier.lock().unwrap()
    }

    fn get_pages_used(&self) -> usize {
        self.pages_used.load(Ordering::SeqCst)
    }

    fn get_collection_reserve(&self) -> usize {
        self.collection_reserve.load(Ordering::SeqCst)
    }

    fn will_never_move(&self, _object: ObjectReference) -> bool {
        false
    }

    fn is_live(&self, object: ObjectReference) -> bool {
        self.nursery_live.lock().unwrap().contains(&object)
    }

    fn will_not_move_in_current_collection(&self, _object: ObjectReference) -> bool {
        true
    }

    fn scan_object(&self, scan: usize, object: ObjectReference, visitor: &mut dyn SlotVisitor) {
        debug_assert_eq!(scan, SCAN_MATURE);
        for index in 0..object_slot_count(object) {
            visitor.visit_slot(slot_address(object, index));
        }
    }
}

struct MockGenCollector {
    gen: &'static MockGen,
}

impl GenCollectorDelegate for MockGenCollector {
    fn collection_phase(&mut self, phase: Phase, _primary: bool) {
        self.gen.collector_phases.lock().unwrap().push(phase);
    }

    fn trace_object(
        &mut self,
        queue: &mut dyn ObjectQueue,
        object: ObjectReference,
    ) -> ObjectReference {
        if self.gen.nursery_live.lock().unwrap().insert(object) {
            queue.enqueue(object);
        }
        object
    }
}

/// A plan wired to mocks, with everything leaked to satisfy the
/// process-lifetime references the real system uses.
pub struct MockHarness {
    pub plan: &'static GenHybrid,
    pub dram: &'static MockRegion,
    pub nvm: &'static MockRegion,
    pub los_dram: &'static MockLos,
    pub los_nvm: &'static MockLos,
    pub gen: &'static MockGen,
}

impl MockHarness {
    pub fn new() -> MockHarness {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> MockHarness {
        let dram = MockRegion::leaked("immix-dram", 32);
        let nvm = MockRegion::leaked("immix-nvm", 32);
        let los_dram = MockLos::leaked(64);
        let los_nvm = MockLos::leaked(64);
        let gen = MockGen::leaked();
        let plan: &'static GenHybrid = Box::leak(Box::new(GenHybrid::new(GenHybridArgs {
            immix_dram: dram,
            immix_nvm: nvm,
            los_dram,
            los_nvm,
            gen,
            options,
        })));
        plan.initialize();
        MockHarness {
            plan,
            dram,
            nvm,
            los_dram,
            los_nvm,
            gen,
        }
    }

    pub fn collector(&self) -> GenHybridCollector {
        GenHybridCollector::new(self.plan, Box::new(MockGenCollector { gen: self.gen }))
    }

    pub fn collector_delegate(&self) -> Box<dyn GenCollectorDelegate> {
        Box::new(MockGenCollector { gen: self.gen })
    }

    /// Drive a whole collection cycle through the phase protocol: the
    /// global side of each phase, then every worker's side, with RELEASE
    /// running workers first.
    pub fn run_cycle(
        &self,
        collectors: &mut [GenHybridCollector],
        root_slots: &[Address],
        full_heap: bool,
    ) {
        self.gen.set_full_heap(full_heap);
        self.plan.collection_phase(Phase::SetCollectionKind);
        self.plan.collection_phase(Phase::Initiate);
        self.plan.collection_phase(Phase::Prepare);
        for (i, collector) in collectors.iter_mut().enumerate() {
            collector.collection_phase(Phase::Prepare, i == 0);
        }
        self.plan.collection_phase(Phase::Closure);
        if full_heap {
            for slot in root_slots {
                self.plan.mature_trace.add_root_slot(*slot);
            }
        }
        for (i, collector) in collectors.iter_mut().enumerate() {
            collector.collection_phase(Phase::Closure, i == 0);
        }
        for (i, collector) in collectors.iter_mut().enumerate() {
            collector.collection_phase(Phase::Release, i == 0);
        }
        self.plan.collection_phase(Phase::Release);
        self.plan.collection_phase(Phase::Complete);
    }
}

impl Default for MockHarness {
    fn default() -> Self {
        Self::new()
    }
}
