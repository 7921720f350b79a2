//! Python dependency resolution for pydeps.
//!
//! This crate turns the imports extracted from a generated Python target's
//! sources into that target's `deps`. It includes:
//! - Import records and fallback candidates
//! - Directive parsing and per-package resolution scopes
//! - The third-party manifest and module map
//! - Import specs provided by generated rules (index population)
//! - Interpreter discovery and the standard-library classifier
//! - The resolution engine

pub mod config;
mod error_bridges;
pub mod interpreter;
pub mod manifest;
pub mod modules;
pub mod provides;
pub mod resolve;
pub mod stdlib;
