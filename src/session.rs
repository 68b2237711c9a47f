//! Diff sessions and the editor host they are shown in.
//!
//! A preview lives under its own URI scheme so the host never mistakes it
//! for a real file. A [`DiffSession`] pairs the real document with that
//! preview resource. The [`DiffSessionTracker`] remembers which sessions
//! are open and closes them as a group when the search pattern changes.

use crate::display::{DisplayResult, Selection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

pub const FILE_SCHEME: &str = "file";

/// A document address: scheme plus canonical path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    pub scheme: String,
    pub path: PathBuf,
}

impl Resource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            scheme: FILE_SCHEME.to_string(),
            path: path.into(),
        }
    }

    pub fn with_scheme(&self, scheme: &str) -> Self {
        Self {
            scheme: scheme.to_string(),
            path: self.path.clone(),
        }
    }

    pub fn has_scheme(&self, scheme: &str) -> bool {
        self.scheme == scheme
    }
}

/// An open side-by-side view of a document and its preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSession {
    pub original: Resource,
    pub preview: Resource,
    pub title: String,
}

impl DiffSession {
    pub fn new(original: Resource, preview_scheme: &str) -> Self {
        let name = original
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let preview = original.with_scheme(preview_scheme);
        Self {
            title: format!("{name} ↔ {name} (Replace Preview)"),
            original,
            preview,
        }
    }

    pub fn id(&self) -> &Path {
        &self.original.path
    }
}

/// The editor the previews are rendered in.
pub trait EditorHost: Send {
    /// Navigate to `path` and select `selection`, keeping focus where it is.
    fn open_location(&mut self, path: &Path, selection: Selection);
    /// Show (or re-show) a diff between the original and its preview content.
    fn open_diff(&mut self, session: &DiffSession, preview_content: &str);
    /// Scroll the active view so `selection` is centred.
    fn reveal(&mut self, selection: Selection);
    fn close_diff(&mut self, preview: &Resource);
    fn refresh_search_result(&mut self, id: u64, results: Vec<DisplayResult>, file_name: &str);
    fn show_error(&mut self, message: &str);
}

/// Tracks open diff sessions, one per document.
#[derive(Debug, Default)]
pub struct DiffSessionTracker {
    sessions: HashMap<PathBuf, DiffSession>,
}

impl DiffSessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `session` in the host, replacing any session for the same document.
    pub fn open(&mut self, session: DiffSession, preview_content: &str, host: &mut dyn EditorHost) {
        host.open_diff(&session, preview_content);
        self.sessions.insert(session.id().to_path_buf(), session);
    }

    /// Close every session whose preview resource satisfies `predicate`.
    ///
    /// Returns the document identities whose sessions were closed.
    pub fn close_all<F>(&mut self, predicate: F, host: &mut dyn EditorHost) -> Vec<PathBuf>
    where
        F: Fn(&Resource) -> bool,
    {
        let closing: Vec<PathBuf> = self
            .sessions
            .iter()
            .filter(|(_, session)| predicate(&session.preview))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &closing {
            if let Some(session) = self.sessions.remove(id) {
                host.close_diff(&session.preview);
            }
        }
        closing
    }

    /// Drop the session for `id` after the host closed it on its own.
    pub fn forget(&mut self, id: &Path) -> Option<DiffSession> {
        self.sessions.remove(id)
    }

    pub fn is_open(&self, id: &Path) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &Path> {
        self.sessions.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Host side effects as serializable commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostCommand {
    OpenFile {
        path: PathBuf,
        selection: Selection,
    },
    OpenDiff {
        original: Resource,
        preview: Resource,
        title: String,
        content: String,
    },
    Reveal {
        selection: Selection,
    },
    CloseDiff {
        preview: Resource,
    },
    #[serde(rename_all = "camelCase")]
    RefreshSearchResult {
        id: u64,
        updated_results: Vec<DisplayResult>,
        file_name: String,
    },
    Error {
        message: String,
    },
}

/// Forwards every host call as a [`HostCommand`] over a channel.
#[derive(Debug, Clone)]
pub struct ChannelHost {
    tx: mpsc::UnboundedSender<HostCommand>,
}

impl ChannelHost {
    pub fn new(tx: mpsc::UnboundedSender<HostCommand>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<HostCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, command: HostCommand) {
        if self.tx.send(command).is_err() {
            tracing::debug!("host channel closed; dropping command");
        }
    }
}

impl EditorHost for ChannelHost {
    fn open_location(&mut self, path: &Path, selection: Selection) {
        self.send(HostCommand::OpenFile {
            path: path.to_path_buf(),
            selection,
        });
    }

    fn open_diff(&mut self, session: &DiffSession, preview_content: &str) {
        self.send(HostCommand::OpenDiff {
            original: session.original.clone(),
            preview: session.preview.clone(),
            title: session.title.clone(),
            content: preview_content.to_string(),
        });
    }

    fn reveal(&mut self, selection: Selection) {
        self.send(HostCommand::Reveal { selection });
    }

    fn close_diff(&mut self, preview: &Resource) {
        self.send(HostCommand::CloseDiff {
            preview: preview.clone(),
        });
    }

    fn refresh_search_result(&mut self, id: u64, results: Vec<DisplayResult>, file_name: &str) {
        self.send(HostCommand::RefreshSearchResult {
            id,
            updated_results: results,
            file_name: file_name.to_string(),
        });
    }

    fn show_error(&mut self, message: &str) {
        self.send(HostCommand::Error {
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(path: &str) -> DiffSession {
        DiffSession::new(Resource::file(path), "sgpreview")
    }

    #[test]
    fn session_title_and_preview_scheme() {
        let s = session("/ws/src/lib.rs");
        assert_eq!(s.title, "lib.rs ↔ lib.rs (Replace Preview)");
        assert_eq!(s.preview.scheme, "sgpreview");
        assert_eq!(s.preview.path, s.original.path);
    }

    #[test]
    fn close_all_closes_matching_sessions() {
        let (mut host, mut rx) = ChannelHost::channel();
        let mut tracker = DiffSessionTracker::new();
        tracker.open(session("/ws/a.rs"), "A", &mut host);
        tracker.open(session("/ws/b.rs"), "B", &mut host);

        let mut closed = tracker.close_all(|r| r.has_scheme("sgpreview"), &mut host);
        closed.sort();

        assert_eq!(closed, vec![PathBuf::from("/ws/a.rs"), PathBuf::from("/ws/b.rs")]);
        assert!(tracker.is_empty());

        let commands: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        let close_count = commands
            .iter()
            .filter(|c| matches!(c, HostCommand::CloseDiff { .. }))
            .count();
        assert_eq!(close_count, 2);
    }

    #[test]
    fn close_all_respects_predicate() {
        let (mut host, _rx) = ChannelHost::channel();
        let mut tracker = DiffSessionTracker::new();
        tracker.open(session("/ws/a.rs"), "A", &mut host);

        let closed = tracker.close_all(|r| r.has_scheme("other"), &mut host);

        assert!(closed.is_empty());
        assert!(tracker.is_open(Path::new("/ws/a.rs")));
    }

    #[test]
    fn reopening_replaces_session() {
        let (mut host, _rx) = ChannelHost::channel();
        let mut tracker = DiffSessionTracker::new();
        tracker.open(session("/ws/a.rs"), "A", &mut host);
        tracker.open(session("/ws/a.rs"), "A2", &mut host);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn host_command_wire_format() {
        let command = HostCommand::RefreshSearchResult {
            id: 7,
            updated_results: Vec::new(),
            file_name: "src/a.rs".to_string(),
        };
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["type"], "refreshSearchResult");
        assert_eq!(json["id"], 7);
        assert_eq!(json["fileName"], "src/a.rs");
        assert!(json["updatedResults"].as_array().unwrap().is_empty());
    }
}
