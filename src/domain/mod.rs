//! Domain layer for the composer
//!
//! This module contains the core model of a rewrite: actions, scopes,
//! transform sessions, and the port traits for the two external collaborators
//! (the document surface and the transformation service).

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{ComposerError, DocumentError, ErrorKind, TransformError};
