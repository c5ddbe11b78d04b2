//! Utilities used by the rest of the crate: addresses, allocators, header
//! metadata, constants, options.

/// An abstraction over memory addresses and object references.
pub mod address;
/// Collection-time allocators.
pub mod alloc;
/// Constants for pages, blocks, lines and copy thresholds.
pub mod constants;
/// Calculation, conversion and rounding for memory related numbers.
pub mod conversions;
/// Copy semantics and the copy context seam.
pub mod copy;
/// Logger initialization.
pub mod logger;
/// In-header object metadata bits.
pub mod metadata;
/// Startup options.
pub mod options;

/// Mock binding for tests. Gated on `mock_test` as well so downstream
/// benches can reuse it.
#[cfg(any(test, feature = "mock_test"))]
pub mod test_util;

pub use self::address::Address;
pub use self::address::ObjectReference;
