use static_assertions::const_assert;

/// log2 of the number of bytes in a machine word.
pub const LOG_BYTES_IN_WORD: usize = 3;
pub const BYTES_IN_WORD: usize = 1 << LOG_BYTES_IN_WORD;

/// log2 of the number of bytes in a page.
pub const LOG_BYTES_IN_PAGE: usize = 12;
pub const BYTES_IN_PAGE: usize = 1 << LOG_BYTES_IN_PAGE;

/// log2 of the number of bytes in a region block. Blocks are the granularity
/// at which copy allocators draw memory from a mature region.
pub const LOG_BYTES_IN_BLOCK: usize = 15;
pub const BYTES_IN_BLOCK: usize = 1 << LOG_BYTES_IN_BLOCK;
pub const PAGES_IN_BLOCK: usize = 1 << (LOG_BYTES_IN_BLOCK - LOG_BYTES_IN_PAGE);

/// log2 of the number of bytes in a region line.
pub const LOG_BYTES_IN_LINE: usize = 8;
pub const BYTES_IN_LINE: usize = 1 << LOG_BYTES_IN_LINE;

/// The minimum alignment of any allocation.
pub const MIN_ALIGNMENT: usize = BYTES_IN_WORD;

/// The largest copy the mature copy path will place inside a region block.
/// Anything larger must be routed to a large object space.
pub const MAX_MATURE_COPY_BYTES: usize = BYTES_IN_BLOCK >> 1;

/// Copies larger than this bump from the overflow range of the copy block
/// rather than the main range.
pub const MAX_STRAIGHT_COPY_BYTES: usize = BYTES_IN_LINE;

const_assert!(MAX_MATURE_COPY_BYTES < BYTES_IN_BLOCK);
const_assert!(MAX_STRAIGHT_COPY_BYTES < MAX_MATURE_COPY_BYTES);
