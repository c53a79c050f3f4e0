//! Command-line interface for metagen.

mod commands;
pub mod icons;

pub use commands::{is_verbose, run};
