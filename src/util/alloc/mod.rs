//! Collection-time allocators.

pub(crate) mod allocator;
mod copy_allocator;
mod large_object_allocator;

pub use allocator::get_maximum_aligned_size;
pub use copy_allocator::CopyAllocator;
pub use large_object_allocator::LargeObjectAllocator;
