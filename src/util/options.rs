//! Startup options, read once from the environment at plan construction.

use std::env;
use std::str::FromStr;

/// Options controlling the mature-generation core. Every field is read
/// exactly once, when the plan is built; nothing re-reads the environment
/// during a collection.
#[derive(Clone, Debug)]
pub struct Options {
    /// Verbosity for collection tracing. Levels at 9 and above log every
    /// scanned object.
    pub verbose: usize,
    /// Mark region lines while scanning objects during a full-heap trace.
    /// The line counts feed the next cycle's defragmentation decision.
    pub mark_lines_at_scan_time: bool,
}

impl Options {
    pub fn from_env() -> Self {
        Options {
            verbose: env_or("HYBRID_IMMIX_VERBOSE", 0),
            mark_lines_at_scan_time: env_or("HYBRID_IMMIX_MARK_LINES_AT_SCAN_TIME", true),
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Options {
            verbose: 0,
            mark_lines_at_scan_time: true,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(val) => val.parse().unwrap_or_else(|_| {
            warn!("ignoring unparsable {}={:?}", key, val);
            default
        }),
        Err(_) => default,
    }
}
