/// Used to identify the trace when a policy has different kinds of traces,
/// e.g. the defrag vs fast trace of the mature regions.
pub type TraceKind = u8;

/// Full-heap trace that marks mature objects in place.
pub const TRACE_KIND_FAST: TraceKind = 0;
/// Full-heap trace that opportunistically evacuates mature objects out of
/// the defragmentation source blocks of whichever region is defragmenting.
pub const TRACE_KIND_DEFRAG: TraceKind = 1;
