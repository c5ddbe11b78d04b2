//! Per-worker allocator fronting a large object space.

use crate::policy::largeobjectspace::LosSpace;
use crate::util::alloc::allocator::{align_allocation_no_fill, get_maximum_aligned_size};
use crate::util::conversions;
use crate::util::Address;

pub struct LargeObjectAllocator {
    /// Space this allocator allocates from.
    space: &'static dyn LosSpace,
}

impl LargeObjectAllocator {
    pub fn new(space: &'static dyn LosSpace) -> Self {
        LargeObjectAllocator { space }
    }

    pub fn alloc(&mut self, bytes: usize, align: usize, offset: usize) -> Address {
        let maxbytes = get_maximum_aligned_size(bytes, align);
        let pages = conversions::bytes_to_pages_up(maxbytes);
        let cell = self.space.allocate_pages(pages);
        if cell.is_zero() {
            return cell;
        }
        debug_assert!(conversions::is_page_aligned(cell), "los cell is not page-aligned");
        align_allocation_no_fill(cell, align, offset)
    }
}
