//! CLI command implementations.

pub mod actions;
pub mod config;
pub mod rewrite;
