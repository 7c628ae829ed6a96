//! Recipe file parsing and validation
//!
//! This module handles tokenizing and parsing recipe files, resolving their
//! imports into one namespace, and validating the references in it.

pub mod import;
pub mod lexer;
pub mod parse;
pub mod schema;
pub mod types;

// Re-export main types
pub use import::*;
pub use parse::*;
pub use schema::*;
pub use types::*;
