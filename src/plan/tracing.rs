//! Gray-object queues and the global trace shared by collector workers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crossbeam::deque::{Injector, Steal};

use crate::util::{Address, ObjectReference};

/// This trait represents an object queue to enqueue objects during tracing.
pub trait ObjectQueue {
    /// Enqueue an object into the queue.
    fn enqueue(&mut self, object: ObjectReference);
}

/// A visitor over the reference slots of one object.
pub trait SlotVisitor {
    fn visit_slot(&mut self, slot: Address);
}

pub type VectorObjectQueue = VectorQueue<ObjectReference>;

/// An implementation of `ObjectQueue` using a `Vec`, doubling as the
/// per-worker mark stack.
pub struct VectorQueue<T> {
    /// Enqueued nodes.
    buffer: Vec<T>,
}

impl<T> VectorQueue<T> {
    /// Reserve a capacity of this on first enqueue to avoid frequent resizing.
    const CAPACITY: usize = 4096;

    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Return the contents of the underlying vector. It will empty the queue.
    pub fn take(&mut self) -> Vec<T> {
        std::mem::take(&mut self.buffer)
    }

    /// Check if the buffer size reaches `CAPACITY`.
    pub fn is_full(&self) -> bool {
        self.buffer.len() >= Self::CAPACITY
    }

    pub fn push(&mut self, v: T) {
        if self.buffer.is_empty() {
            self.buffer.reserve(Self::CAPACITY);
        }
        self.buffer.push(v);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.buffer.pop()
    }
}

impl<T> Default for VectorQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectQueue for VectorQueue<ObjectReference> {
    fn enqueue(&mut self, v: ObjectReference) {
        self.push(v);
    }
}

/// The global trace for a full-heap mature collection. Root slots are seeded
/// by the root-scanning machinery between PREPARE and CLOSURE; gray objects
/// spilled by one worker may be drained by any other.
pub struct Trace {
    root_slots: Injector<Address>,
    values: Injector<ObjectReference>,
    active: AtomicBool,
}

impl Trace {
    pub fn new() -> Self {
        Trace {
            root_slots: Injector::new(),
            values: Injector::new(),
            active: AtomicBool::new(false),
        }
    }

    /// Activate the trace for the coming closure. Also invoked at CLOSURE to
    /// seed per-worker closures; reinvocation within a cycle is a no-op.
    pub fn prepare(&self) {
        self.active.store(true, Ordering::SeqCst);
    }

    /// Deactivate the trace. All work must have been drained.
    pub fn release(&self) {
        debug_assert!(
            self.root_slots.is_empty() && self.values.is_empty(),
            "trace released with work remaining"
        );
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Seed the trace with the address of a root slot.
    pub fn add_root_slot(&self, slot: Address) {
        debug_assert!(self.is_active(), "root reported outside a trace");
        self.root_slots.push(slot);
    }

    /// Share a gray object with other workers.
    pub fn spill_value(&self, object: ObjectReference) {
        debug_assert!(self.is_active(), "gray object spilled outside a trace");
        self.values.push(object);
    }

    pub fn poll_root_slot(&self) -> Option<Address> {
        steal(&self.root_slots)
    }

    pub fn poll_value(&self) -> Option<ObjectReference> {
        steal(&self.values)
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}

fn steal<T>(injector: &Injector<T>) -> Option<T> {
    loop {
        match injector.steal() {
            Steal::Success(v) => return Some(v),
            Steal::Empty => return None,
            Steal::Retry => continue,
        }
    }
}

lazy_static! {
    /// Scan identifiers registered before the first collection, mapping each
    /// to the trace that owns it. Registration is one-time setup; the table
    /// is only consulted by verification builds.
    static ref SPECIALIZED_SCANS: Mutex<HashMap<usize, &'static str>> = Mutex::new(HashMap::new());
}

pub fn register_specialized_scan(id: usize, owner: &'static str) {
    let mut scans = SPECIALIZED_SCANS.lock().unwrap();
    if scans.insert(id, owner).is_none() {
        trace!("registered specialized scan {} for {}", id, owner);
    }
}

pub fn specialized_scan_registered(id: usize) -> bool {
    SPECIALIZED_SCANS.lock().unwrap().contains_key(&id)
}
