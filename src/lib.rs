//! pydeps: deterministic dependency resolution for generated Python targets.
//!
//! Given the rules a build-file generator produced and the imports each
//! rule's sources make, pydeps computes every rule's `deps` attribute. The
//! resolution kernel lives in `pydeps-python`; shared label, index and
//! output types live in `pydeps-core`. This crate is the CLI front door.

// Shared infrastructure - re-exported from pydeps-core
pub use pydeps_core::deps;
pub use pydeps_core::error;
pub use pydeps_core::index;
pub use pydeps_core::label;
pub use pydeps_core::output;

// Language adapter
pub use pydeps_python as python;

// Front door
pub mod cli;
