//! CLI interface and argument parsing
//!
//! This module handles command-line parsing, recipe listing and dumping,
//! and shell completion.

pub mod app;

// Re-export main types
pub use app::*;
