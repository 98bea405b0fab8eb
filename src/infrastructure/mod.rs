//! Infrastructure layer module
//!
//! Adapters satisfying the domain ports plus process-wide plumbing:
//! - In-memory document model
//! - HTTP streaming transformation client
//! - Configuration management
//! - Logging infrastructure

pub mod config;
pub mod document;
pub mod logging;
pub mod transform;
