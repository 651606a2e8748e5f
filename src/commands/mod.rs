//! CLI command implementations for procnotify.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Runtime requirement and configuration validation
//! - `config`: Configuration file generation

pub mod check;
pub mod config;

// Re-export command functions
pub use check::command_check_requirements;
pub use config::command_config;
