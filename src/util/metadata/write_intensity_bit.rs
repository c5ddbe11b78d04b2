//! The write-intensity bit: the single stable boolean the copy path reads to
//! steer an object to DRAM or NVM.

use atomic::Ordering;

use super::{status_byte, WRITE_INTENSIVE_BIT};
use crate::util::ObjectReference;

/// Classify `object` as write-intensive. Called once, at allocation, from
/// the type-level classification table. The bit is never cleared.
pub fn set_write_intensive(object: ObjectReference) {
    debug_assert!(
        !is_write_intensive(object),
        "{:x}: write-intensity bit already set",
        object,
    );
    status_byte(object).fetch_or(WRITE_INTENSIVE_BIT, Ordering::SeqCst);
}

pub fn is_write_intensive(object: ObjectReference) -> bool {
    status_byte(object).load(Ordering::SeqCst) & WRITE_INTENSIVE_BIT != 0
}
