//! An abstraction over raw memory addresses and object references.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// An arbitrary address. `Address` is a thin wrapper around `usize` so that
/// address arithmetic never silently mixes with ordinary integers, and so
/// that dereferencing is an explicit, unsafe operation.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, Hash, PartialOrd, Ord, PartialEq, Default)]
pub struct Address(usize);

impl Address {
    /// The zero address. Allocators return this on exhaustion.
    pub const ZERO: Self = Address(0);

    /// Create an `Address` from a raw `usize`.
    ///
    /// # Safety
    /// The caller asserts the value is an address the rest of the system may
    /// legitimately manipulate.
    pub const unsafe fn from_usize(raw: usize) -> Address {
        Address(raw)
    }

    pub fn from_ptr<T>(ptr: *const T) -> Address {
        Address(ptr as usize)
    }

    pub fn from_mut_ptr<T>(ptr: *mut T) -> Address {
        Address(ptr as usize)
    }

    pub const fn as_usize(self) -> usize {
        self.0
    }

    pub fn to_ptr<T>(self) -> *const T {
        self.0 as *const T
    }

    pub fn to_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn align_up(self, align: usize) -> Address {
        Address(crate::util::conversions::raw_align_up(self.0, align))
    }

    pub const fn align_down(self, align: usize) -> Address {
        Address(crate::util::conversions::raw_align_down(self.0, align))
    }

    pub const fn is_aligned_to(self, align: usize) -> bool {
        crate::util::conversions::raw_is_aligned(self.0, align)
    }

    /// Load a value of type `T` from this address.
    ///
    /// # Safety
    /// The address must point to initialized memory holding a valid `T`.
    pub unsafe fn load<T: Copy>(self) -> T {
        *(self.0 as *const T)
    }

    /// Store a value of type `T` to this address.
    ///
    /// # Safety
    /// The address must point to writable memory suitable for a `T`.
    pub unsafe fn store<T>(self, value: T) {
        *(self.0 as *mut T) = value;
    }
}

impl Add<usize> for Address {
    type Output = Address;
    fn add(self, offset: usize) -> Address {
        Address(self.0 + offset)
    }
}

impl AddAssign<usize> for Address {
    fn add_assign(&mut self, offset: usize) {
        self.0 += offset;
    }
}

impl Sub<usize> for Address {
    type Output = Address;
    fn sub(self, offset: usize) -> Address {
        Address(self.0 - offset)
    }
}

impl Sub<Address> for Address {
    type Output = usize;
    fn sub(self, other: Address) -> usize {
        debug_assert!(self.0 >= other.0, "address underflow");
        self.0 - other.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// A reference to a heap object. The reference is opaque to this crate apart
/// from its address identity; layout questions (field enumeration, object
/// size) are answered by the surrounding runtime.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, Hash, PartialOrd, Ord, PartialEq)]
pub struct ObjectReference(usize);

impl ObjectReference {
    /// The null reference.
    pub const NULL: Self = ObjectReference(0);

    pub fn from_raw_address(address: Address) -> ObjectReference {
        ObjectReference(address.as_usize())
    }

    pub fn to_address(self) -> Address {
        unsafe { Address::from_usize(self.0) }
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    pub const fn value(self) -> usize {
        self.0
    }
}

impl fmt::Debug for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align() {
        let a = unsafe { Address::from_usize(0x1001) };
        assert_eq!(a.align_up(0x1000).as_usize(), 0x2000);
        assert_eq!(a.align_down(0x1000).as_usize(), 0x1000);
        assert!(!a.is_aligned_to(8));
        assert!(a.align_up(8).is_aligned_to(8));
    }

    #[test]
    fn load_store() {
        let mut word: usize = 0;
        let a = Address::from_mut_ptr(&mut word);
        unsafe { a.store::<usize>(42) };
        assert_eq!(unsafe { a.load::<usize>() }, 42);
    }

    #[test]
    fn null_object() {
        assert!(ObjectReference::NULL.is_null());
        let o = ObjectReference::from_raw_address(unsafe { Address::from_usize(0x1000) });
        assert!(!o.is_null());
        assert_eq!(o.to_address().as_usize(), 0x1000);
    }
}
