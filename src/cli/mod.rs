//! CLI command handlers
//!
//! Argument parsing, command implementations, and help text.

pub mod args;
pub mod commands;
pub mod fragments;
pub mod help;
pub mod router;

// Re-export the main CLI structures for convenience
pub use args::{Cli, Commands};
pub use fragments::load_fragments;
pub use help::{generate_help, get_log_level};
pub use router::execute_command;
