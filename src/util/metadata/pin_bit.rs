//! The pin bit. Pinning is one-way: once set, the object is never relocated
//! by any subsequent collection.

use atomic::Ordering;

use super::{status_byte, PINNED_BIT};
use crate::util::ObjectReference;

pub fn pin_object(object: ObjectReference) {
    status_byte(object).fetch_or(PINNED_BIT, Ordering::SeqCst);
}

pub fn is_pinned(object: ObjectReference) -> bool {
    status_byte(object).load(Ordering::SeqCst) & PINNED_BIT != 0
}
