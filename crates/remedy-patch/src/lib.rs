//! Layered unified-diff application
//!
//! Parses unified diffs and applies them through an ordered chain of
//! strategies, from strict structured application down to a guarded
//! whole-file fallback. See [`engine::PatchEngine`].

pub mod engine;
pub mod matching;
pub mod model;
pub mod parse;

pub use engine::{EngineConfig, PatchEngine};
pub use model::{AppliedFile, ApplyStrategy, ParsedDiff, PatchOutcome, content_hash_first8};
pub use parse::{normalize_line_endings, parse_diff};
