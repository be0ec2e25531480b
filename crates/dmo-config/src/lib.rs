//! DMO repeater configuration management
//!
//! - TOML configuration file parsing
//! - Repeater configuration structures and runtime counters

pub mod stack_config;
pub mod toml_config;

pub use stack_config::*;
pub use toml_config::*;
