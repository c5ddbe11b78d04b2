/// The phases of a collection cycle, delegated into this crate by the
/// surrounding phase-scheduling framework. The framework provides the global
/// barriers between phases: every worker finishes PREPARE before any worker
/// enters CLOSURE, and the closure reaches a global fixed point before any
/// worker enters RELEASE.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, bytemuck::NoUninit)]
pub enum Phase {
    /// Decide nursery-only vs full-heap, and per-region defragmentation.
    SetCollectionKind,
    /// Start of the cycle proper.
    Initiate,
    /// Put spaces and allocators into collection state.
    Prepare,
    /// Compute the transitive closure over the object graph.
    Closure,
    /// Reconcile space state, capture per-cycle flags.
    Release,
    /// End of the cycle.
    Complete,
}
