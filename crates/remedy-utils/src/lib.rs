//! Shared infrastructure for the remedy workspace
//!
//! Error taxonomy, tracing setup, home-directory resolution, and atomic
//! file writes used by every other crate.

pub mod error;
pub mod fs;
pub mod logging;
pub mod paths;

pub use error::RemedyError;

/// Convenience result alias used across the workspace
pub type Result<T> = std::result::Result<T, RemedyError>;
