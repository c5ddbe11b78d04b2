//! In-header object metadata.
//!
//! Each object carries a one-byte status field at the start of its header.
//! The bits below are the only header state this crate owns; everything else
//! in the header belongs to the surrounding runtime.

pub mod log_bit;
pub mod pin_bit;
pub mod write_intensity_bit;

use std::sync::atomic::AtomicU8;

use crate::util::ObjectReference;

/// 1 means unlogged: the object barrier will remember the object on its next
/// reference write. 0 means logged.
pub(crate) const UNLOGGED_BIT: u8 = 0b0000_0001;
/// Set once an object must never be relocated again.
pub(crate) const PINNED_BIT: u8 = 0b0000_0010;
/// Set at allocation for objects of write-intensive types. Immutable
/// thereafter; copy placement reads it on every mature copy.
pub(crate) const WRITE_INTENSIVE_BIT: u8 = 0b0000_0100;

pub(crate) fn status_byte(object: ObjectReference) -> &'static AtomicU8 {
    debug_assert!(!object.is_null());
    unsafe { &*object.to_address().to_ptr::<AtomicU8>() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atomic::Ordering;
    use crate::util::Address;

    #[test]
    fn bits_are_disjoint() {
        assert_eq!(UNLOGGED_BIT & PINNED_BIT, 0);
        assert_eq!(UNLOGGED_BIT & WRITE_INTENSIVE_BIT, 0);
        assert_eq!(PINNED_BIT & WRITE_INTENSIVE_BIT, 0);
    }

    #[test]
    fn status_byte_is_first_header_byte() {
        let mut header: u64 = 0;
        let object = ObjectReference::from_raw_address(Address::from_mut_ptr(&mut header));
        status_byte(object).store(0xa5, Ordering::SeqCst);
        assert_eq!(header & 0xff, 0xa5);
    }
}
