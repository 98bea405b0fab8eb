//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces of the two external collaborators:
//! - Document: the position-addressable editing surface
//! - TransformService: the streaming text-transformation backend
//!
//! The pipeline services only talk to these traits, so any editor model or
//! transport can be plugged in.

pub mod document;
pub mod transform_service;

pub use document::{Document, SharedDocument};
pub use transform_service::{ChunkStream, TransformRequest, TransformService};
