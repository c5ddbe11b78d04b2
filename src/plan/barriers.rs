//! Write barrier contract.
//!
//! The mature core only needs two things from the barrier: to know which
//! strategy the mutators run with, and to re-arm the per-object log bit when
//! an object is copied. The object-remembering barrier itself is included
//! here because its logging discipline defines the meaning of that bit.

use crate::util::metadata::log_bit;
use crate::util::ObjectReference;

/// BarrierSelector describes which barrier to use.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BarrierSelector {
    NoBarrier,
    /// Remember whole mutated objects, at most once per barrier arming.
    ObjectBarrier,
}

/// The remembered-set consumer the barrier hands full mod buffers to.
pub trait ModBufSink: Sync {
    fn enqueue_mod_buf(&self, modbuf: Vec<ObjectReference>);
}

pub trait Barrier: Send {
    fn flush(&mut self);
    /// Called after a reference write into `src`.
    fn object_reference_write_post(&mut self, src: ObjectReference);
}

pub struct NoBarrier;

impl Barrier for NoBarrier {
    fn flush(&mut self) {}
    fn object_reference_write_post(&mut self, _src: ObjectReference) {}
}

/// The object-remembering barrier: logs a mutated object the first time it
/// is written after each arming, and buffers it for the remembered set.
pub struct ObjectBarrier {
    sink: &'static dyn ModBufSink,
    modbuf: Vec<ObjectReference>,
}

impl ObjectBarrier {
    const CAPACITY: usize = 4096;

    pub fn new(sink: &'static dyn ModBufSink) -> Self {
        ObjectBarrier {
            sink,
            modbuf: vec![],
        }
    }

    fn enqueue_node(&mut self, object: ObjectReference) {
        // If the object is unlogged, log it and push it to the mod buffer.
        if log_bit::attempt_log(object) {
            self.modbuf.push(object);
            if self.modbuf.len() >= Self::CAPACITY {
                self.flush();
            }
        }
    }
}

impl Barrier for ObjectBarrier {
    #[cold]
    fn flush(&mut self) {
        let mut modbuf = vec![];
        std::mem::swap(&mut modbuf, &mut self.modbuf);
        if !modbuf.is_empty() {
            self.sink.enqueue_mod_buf(modbuf);
        }
    }

    fn object_reference_write_post(&mut self, src: ObjectReference) {
        self.enqueue_node(src);
    }
}
