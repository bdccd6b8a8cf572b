//! CLI command implementations for herakles-cpulimit.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: /proc and configuration validation
//! - `config`: Configuration file generation
//! - `tree`: Process family inspection

pub mod check;
pub mod config;
pub mod tree;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use tree::command_tree;
