//! Utility functions.

mod backoff;
mod format;

pub use backoff::linear_backoff;
pub use format::{format_duration, truncate};
