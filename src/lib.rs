//! sg-preview: replace-preview engine for structural search and rewrite
//!
//! Given a document's raw bytes and a stream of match records (byte range
//! plus replacement text) from an ast-grep search, sg-preview rebuilds the
//! rewritten document, keeps it as an in-memory preview under its own URI
//! scheme, and keeps the diff views showing those previews consistent as the
//! search pattern changes and edits are committed to disk.
//!
//! # Architecture
//!
//! ```text
//! Message ──► PreviewController ──► SearchResultStreamer ──► SearchBackend
//!                 │    │                     │ batches of MatchRecord
//!                 │    │                     ▼
//!                 │    └──────────────► PatchBuilder ──► PreviewStore / disk
//!                 ▼
//!        DiffSessionTracker ──► EditorHost
//! ```
//!
//! Everything that rewrites bytes goes through [`PatchBuilder`]: previews,
//! disk commits and post-commit refreshes.
//!
//! # Example
//!
//! ```
//! use sg_preview::{MatchRecord, PatchBuilder};
//!
//! let mut builder = PatchBuilder::new(b"abcdef");
//! builder.receive(&MatchRecord::new(2, 4, "XYZ"));
//! assert_eq!(builder.conclude(), b"abXYZef");
//! ```

pub mod cache;
pub mod config;
pub mod controller;
pub mod display;
pub mod edit;
pub mod patch;
pub mod search;
pub mod session;
pub mod sg;
pub mod store;
pub mod workspace;

// Re-exports
pub use config::{load_from_path, load_from_str, ConfigError, PreviewConfig};
pub use controller::{Message, PreviewController, PreviewError};
pub use display::{DisplayResult, Position, Selection};
pub use edit::{apply_changes, Change, CommitResult, EditError};
pub use patch::{ByteRange, MatchRecord, PatchBuilder, Received};
pub use search::{
    AstGrepBackend, CommandBackend, SearchBackend, SearchQuery, SearchRequest,
    SearchResultStreamer, StreamedPatch,
};
pub use session::{ChannelHost, DiffSession, DiffSessionTracker, EditorHost, HostCommand, Resource};
pub use sg::SearchError;
pub use store::PreviewStore;
pub use workspace::{SafetyError, WorkspaceRoots};
