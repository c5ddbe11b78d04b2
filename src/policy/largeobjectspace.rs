use crate::util::{Address, ObjectReference};

/// The interface of a large object space. Two instances back the mature
/// generation, one per memory flavor, matching the two mature regions.
pub trait LosSpace: Sync {
    /// Allocate `pages` contiguous pages. Returns `Address::ZERO` on
    /// exhaustion.
    fn allocate_pages(&self, pages: usize) -> Address;

    /// Initialize the large-object header for a freshly allocated or copied
    /// object. `alloc` distinguishes mutator allocation from collection-time
    /// copies.
    fn initialize_header(&self, object: ObjectReference, alloc: bool);
}
