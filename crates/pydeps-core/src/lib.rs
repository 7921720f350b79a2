//! Core infrastructure for pydeps.
//!
//! This crate provides language-agnostic infrastructure:
//! - Target labels and relativization
//! - The import index (`(lang, import) -> providing targets`)
//! - Dependency sets and the `deps` attribute they render to
//! - Error types and exit codes
//! - JSON output types for CLI responses

pub mod deps;
pub mod error;
pub mod index;
pub mod label;
pub mod output;
