//! rjust - a recipe runner
//!
//! rjust reads a justfile (plus everything it imports), evaluates its
//! variables, orders the requested recipe after its prerequisites and runs
//! each recipe line through the shell.

// Public modules
pub mod cli;
pub mod config;
pub mod error;
pub mod runner;

// Re-export commonly used types
pub use error::{Result, RjustError};

/// Current version of rjust
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
