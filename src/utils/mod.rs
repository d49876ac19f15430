//! Utility functions and helpers.

pub mod clock;
pub mod format;
pub mod fs;

// Re-exports for convenience
pub use clock::{Clock, FixedClock, SystemClock, format_timestamp, parse_timestamp};
pub use format::*;
pub use fs::*;
