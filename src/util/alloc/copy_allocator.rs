//! The per-worker copy allocator used during evacuation.

use crate::policy::region::RegionSpace;
use crate::util::alloc::allocator::{align_allocation_no_fill, fill_alignment_gap};
use crate::util::constants::{BYTES_IN_BLOCK, MAX_MATURE_COPY_BYTES, MAX_STRAIGHT_COPY_BYTES};
use crate::util::conversions;
use crate::util::Address;

/// A bump allocator over blocks drawn from one mature region. Each collector
/// worker owns four of these (one per region and mode); they are never
/// shared, so no synchronization happens on the bump pointers.
///
/// Copies larger than [`MAX_STRAIGHT_COPY_BYTES`] bump from a separate
/// overflow range so that medium objects do not leave long tails of waste in
/// the main range.
pub struct CopyAllocator {
    /// The region this allocator copies into.
    space: &'static dyn RegionSpace,
    /// Draws defragmentation target blocks when true.
    defrag: bool,
    /// Bump pointer
    cursor: Address,
    /// Limit for bump pointer
    limit: Address,
    /// Bump pointer for overflow allocation
    large_cursor: Address,
    /// Limit for bump pointer for overflow allocation
    large_limit: Address,
}

impl CopyAllocator {
    pub fn new(space: &'static dyn RegionSpace, defrag: bool) -> Self {
        CopyAllocator {
            space,
            defrag,
            cursor: Address::ZERO,
            limit: Address::ZERO,
            large_cursor: Address::ZERO,
            large_limit: Address::ZERO,
        }
    }

    /// Forget the current bump ranges. Called at PREPARE and RELEASE; the
    /// blocks themselves stay with the region.
    pub fn reset(&mut self) {
        self.cursor = Address::ZERO;
        self.limit = Address::ZERO;
        self.large_cursor = Address::ZERO;
        self.large_limit = Address::ZERO;
    }

    pub fn is_defrag(&self) -> bool {
        self.defrag
    }

    /// Allocate `bytes` for a copy. Returns `Address::ZERO` if the region
    /// cannot supply another block.
    pub fn alloc(&mut self, bytes: usize, align: usize, offset: usize) -> Address {
        debug_assert!(
            bytes <= MAX_MATURE_COPY_BYTES,
            "copy of {} bytes exceeds the mature copy limit",
            bytes
        );
        if bytes > MAX_STRAIGHT_COPY_BYTES {
            return self.overflow_alloc(bytes, align, offset);
        }
        let start = align_allocation_no_fill(self.cursor, align, offset);
        if start + bytes > self.limit {
            return self.alloc_slow(bytes, align, offset);
        }
        fill_alignment_gap(self.cursor, start);
        self.cursor = start + bytes;
        start
    }

    fn overflow_alloc(&mut self, bytes: usize, align: usize, offset: usize) -> Address {
        let start = align_allocation_no_fill(self.large_cursor, align, offset);
        if start + bytes > self.large_limit {
            let block = self.space.acquire_copy_block(self.defrag);
            if block.is_zero() {
                return Address::ZERO;
            }
            debug_assert!(conversions::is_block_aligned(block));
            self.large_cursor = block;
            self.large_limit = block + BYTES_IN_BLOCK;
            let start = align_allocation_no_fill(self.large_cursor, align, offset);
            self.large_cursor = start + bytes;
            return start;
        }
        fill_alignment_gap(self.large_cursor, start);
        self.large_cursor = start + bytes;
        start
    }

    fn alloc_slow(&mut self, bytes: usize, align: usize, offset: usize) -> Address {
        let block = self.space.acquire_copy_block(self.defrag);
        if block.is_zero() {
            return Address::ZERO;
        }
        debug_assert!(conversions::is_block_aligned(block));
        self.cursor = block;
        self.limit = block + BYTES_IN_BLOCK;
        let start = align_allocation_no_fill(self.cursor, align, offset);
        debug_assert!(start + bytes <= self.limit);
        self.cursor = start + bytes;
        start
    }
}
