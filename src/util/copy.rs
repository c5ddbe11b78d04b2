//! Collection-time copy semantics and the copy context seam that regions
//! call back into when they evacuate an object.

use crate::util::{Address, ObjectReference};

/// The allocation semantics of a collection-time copy. The requested
/// semantics never select the destination region for a regular mature copy;
/// they only describe the kind of collection performing the copy and are
/// cross-checked against the regions' actual state.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, enum_map::Enum)]
pub enum CopySemantics {
    /// A nursery survivor promoted during a nursery-only collection.
    MatureMinor,
    /// A mature-space copy during a full-heap collection.
    MatureMajor,
    /// An oversized copy bound for the DRAM large object space.
    LosDram,
    /// An oversized copy bound for the NVM large object space.
    LosNvm,
}

impl CopySemantics {
    pub fn is_los(&self) -> bool {
        matches!(self, CopySemantics::LosDram | CopySemantics::LosNvm)
    }
}

/// A GC worker's copy allocation interface. Regions call back through this
/// trait to obtain a destination when they decide to evacuate an object.
///
/// Implementations run while heap invariants are suspended: they must not
/// block, yield, or allocate from the Rust heap.
pub trait CopyContext {
    /// Obtain space for a copy of `original`. Returns `Address::ZERO` if the
    /// destination is exhausted.
    fn alloc_copy(
        &mut self,
        original: ObjectReference,
        bytes: usize,
        align: usize,
        offset: usize,
        semantics: CopySemantics,
    ) -> Address;

    /// Complete the copy of `object`: install collection metadata in the
    /// destination space and re-arm the write barrier if one is in use.
    fn post_copy(
        &mut self,
        object: ObjectReference,
        type_ref: Address,
        bytes: usize,
        semantics: CopySemantics,
    );
}
