//! ast-grep integration: pattern matching and rewrite rendering.
//!
//! Matches are reported as [`MatchRecord`](crate::patch::MatchRecord)s in
//! document order, the same shape the `sg --json=stream` process emits.

pub mod errors;
pub mod lang;
pub mod matcher;

pub use errors::SearchError;
pub use lang::{detect, SupportLang};
pub use matcher::{PatternMatch, PatternMatcher};
