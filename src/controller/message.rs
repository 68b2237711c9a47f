use crate::display::Selection;
use crate::edit::Change;
use crate::search::SearchQuery;
use crate::session::Resource;
use serde::{Deserialize, Serialize};

/// Inbound events from the UI and the editor host.
///
/// On the wire each message is a JSON object tagged by `"type"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// Navigate to a match in the real file.
    #[serde(rename_all = "camelCase")]
    OpenFile {
        file_path: String,
        #[serde(default)]
        locations_to_select: Selection,
    },
    /// Show the replace preview for one file.
    #[serde(rename_all = "camelCase")]
    PreviewDiff {
        file_path: String,
        #[serde(default)]
        locations_to_select: Option<Selection>,
        pattern: String,
        #[serde(default)]
        rewrite: String,
    },
    /// The search pattern or rewrite changed.
    Search(SearchQuery),
    /// Write accepted replacements to one file and refresh its results.
    #[serde(rename_all = "camelCase")]
    CommitChange {
        id: u64,
        file_path: String,
        changes: Vec<Change>,
        pattern: String,
        #[serde(default)]
        rewrite: String,
    },
    /// The host closed a document view.
    DocumentClosed { resource: Resource },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::OpenFile { .. } => "openFile",
            Message::PreviewDiff { .. } => "previewDiff",
            Message::Search(_) => "search",
            Message::CommitChange { .. } => "commitChange",
            Message::DocumentClosed { .. } => "documentClosed",
        }
    }
}
