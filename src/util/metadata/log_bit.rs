//! The log bit used by the object-remembering write barrier. 1 means
//! unlogged (the barrier will remember the object on its next reference
//! write), 0 means logged.

use atomic::Ordering;

use super::{status_byte, UNLOGGED_BIT};
use crate::util::ObjectReference;

/// Re-arm the barrier for `object`. Called after a copy so the object
/// re-triggers the barrier on its next mutation.
pub fn mark_as_unlogged(object: ObjectReference) {
    status_byte(object).fetch_or(UNLOGGED_BIT, Ordering::SeqCst);
}

/// Attempt to atomically log an object.
/// Returns true if the object was not logged previously.
pub fn attempt_log(object: ObjectReference) -> bool {
    let byte = status_byte(object);
    loop {
        let old = byte.load(Ordering::SeqCst);
        if old & UNLOGGED_BIT == 0 {
            return false;
        }
        if byte
            .compare_exchange(old, old & !UNLOGGED_BIT, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return true;
        }
    }
}

pub fn is_unlogged(object: ObjectReference) -> bool {
    status_byte(object).load(Ordering::SeqCst) & UNLOGGED_BIT != 0
}
