//! Recipe execution engine
//!
//! This module evaluates variables, builds the dependency graph, plans an
//! invocation and runs the planned recipe lines through the shell.

pub mod command;
pub mod context;
pub mod evaluate;
pub mod execute;
pub mod graph;
pub mod plan;

// Re-export main types
pub use command::*;
pub use context::*;
pub use evaluate::*;
pub use execute::*;
pub use graph::*;
pub use plan::*;
