//! Preview lifecycle state machine.
//!
//! The controller owns every piece of mutable preview state: the preview
//! store, the open diff sessions, the last seen query and the set of
//! documents with a preview generation in flight. Messages are handled one
//! at a time. Transitions that need I/O are split in two:
//!
//! ```text
//! begin(message)  -> optional Task (reads, search stream, disk write)
//! Task.await      -> Completion      (touches no controller state)
//! finish(done)    -> store / sessions / host updates
//! ```
//!
//! [`PreviewController::run`] spawns tasks and keeps dispatching messages
//! while they are in flight. Each task is tagged with the pattern epoch it
//! started under, and when `discard_stale_results` is set a completion from
//! an older epoch is dropped instead of resurrecting a preview for a pattern
//! that is gone. [`PreviewController::dispatch`] runs all three steps inline.

pub mod error;
pub mod message;

pub use error::PreviewError;
pub use message::Message;

use crate::config::{PreviewConfig, PreviewSettings};
use crate::display::{DisplayResult, Selection};
use crate::edit::{commit_to_file, Change};
use crate::search::{backend_from_config, SearchQuery, SearchResultStreamer};
use crate::session::{DiffSession, DiffSessionTracker, EditorHost, Resource};
use crate::store::PreviewStore;
use crate::workspace::{SafetyError, WorkspaceRoots};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// The I/O half of a transition, returned by [`PreviewController::begin`].
pub type Task = Pin<Box<dyn Future<Output = Completion> + Send>>;

/// Result of the I/O half of a transition.
#[derive(Debug)]
pub enum Completion {
    Preview {
        id: PathBuf,
        epoch: u64,
        result: Result<GeneratedPreview, PreviewError>,
    },
    Commit {
        request_id: u64,
        id: PathBuf,
        file_name: String,
        epoch: u64,
        result: Result<RefreshedCommit, PreviewError>,
    },
}

#[derive(Debug)]
pub struct GeneratedPreview {
    pub content: Vec<u8>,
    pub focus: Option<Selection>,
}

#[derive(Debug)]
pub struct RefreshedCommit {
    pub preview: Vec<u8>,
    pub results: Vec<DisplayResult>,
}

pub struct PreviewController<H: EditorHost> {
    settings: PreviewSettings,
    workspace: WorkspaceRoots,
    streamer: SearchResultStreamer,
    host: H,
    store: PreviewStore,
    sessions: DiffSessionTracker,
    last_query: SearchQuery,
    epoch: u64,
    /// Documents with a preview generation in flight, by launch epoch
    pending: HashMap<PathBuf, u64>,
}

impl<H: EditorHost> PreviewController<H> {
    pub fn new(
        settings: PreviewSettings,
        workspace: WorkspaceRoots,
        streamer: SearchResultStreamer,
        host: H,
    ) -> Self {
        Self {
            settings,
            workspace,
            streamer,
            host,
            store: PreviewStore::new(),
            sessions: DiffSessionTracker::new(),
            last_query: SearchQuery::default(),
            epoch: 0,
            pending: HashMap::new(),
        }
    }

    /// Build a controller with the roots and backend named in `config`.
    pub fn from_config(config: &PreviewConfig, host: H) -> Result<Self, SafetyError> {
        let workspace = WorkspaceRoots::new(&config.workspace_roots, &config.forbidden)?;
        let streamer = SearchResultStreamer::new(backend_from_config(&config.search));
        Ok(Self::new(config.preview.clone(), workspace, streamer, host))
    }

    /// Handle one message to completion, including any I/O it starts.
    pub async fn dispatch(&mut self, message: Message) -> Result<(), PreviewError> {
        if let Some(task) = self.begin(message) {
            let completion = task.await;
            self.finish(completion)?;
        }
        Ok(())
    }

    /// Dispatch messages until `inbox` closes and every in-flight task is done.
    ///
    /// Failures are logged and shown through the host; they never stop the loop.
    pub async fn run(&mut self, mut inbox: mpsc::UnboundedReceiver<Message>) {
        let mut tasks = JoinSet::new();
        let mut inbox_open = true;

        while inbox_open || !tasks.is_empty() {
            tokio::select! {
                message = inbox.recv(), if inbox_open => match message {
                    Some(message) => {
                        if let Some(task) = self.begin(message) {
                            tasks.spawn(task);
                        }
                    }
                    None => inbox_open = false,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    let outcome = match joined {
                        Ok(completion) => self.finish(completion),
                        Err(e) => Err(PreviewError::Task(e.to_string())),
                    };
                    if let Err(e) = outcome {
                        self.report(&e);
                    }
                }
            }
        }
    }

    /// Apply the synchronous part of a transition, returning its I/O half.
    pub fn begin(&mut self, message: Message) -> Option<Task> {
        tracing::debug!(kind = message.kind(), "dispatch");
        let task = match message {
            Message::OpenFile {
                file_path,
                locations_to_select,
            } => {
                self.open_file(&file_path, locations_to_select);
                None
            }
            Message::PreviewDiff {
                file_path,
                locations_to_select,
                pattern,
                rewrite,
            } => self.preview_diff(
                &file_path,
                locations_to_select,
                SearchQuery::new(pattern, rewrite),
            ),
            Message::Search(query) => {
                self.refresh_diff(query);
                None
            }
            Message::CommitChange {
                id,
                file_path,
                changes,
                pattern,
                rewrite,
            } => self.commit_change(id, file_path, changes, SearchQuery::new(pattern, rewrite)),
            Message::DocumentClosed { resource } => {
                self.document_closed(&resource);
                None
            }
        };
        self.check_invariants();
        task
    }

    /// Apply the result of a finished task.
    ///
    /// A failed task leaves store and sessions exactly as they were.
    pub fn finish(&mut self, completion: Completion) -> Result<(), PreviewError> {
        let outcome = match completion {
            Completion::Preview { id, epoch, result } => {
                // A newer request for the same document may own the slot by now.
                if self.pending.get(&id) == Some(&epoch) {
                    self.pending.remove(&id);
                }
                let preview = result?;
                if self.is_stale(epoch) {
                    tracing::info!(path = %id.display(), epoch, "discarding preview for outdated pattern");
                    return Ok(());
                }
                self.show_preview(id, preview);
                Ok(())
            }
            Completion::Commit {
                request_id,
                id,
                file_name,
                epoch,
                result,
            } => {
                let refreshed = result?;
                if self.is_stale(epoch) {
                    tracing::info!(path = %id.display(), epoch, "discarding commit refresh for outdated pattern");
                    return Ok(());
                }
                self.apply_refresh(request_id, id, &file_name, refreshed);
                Ok(())
            }
        };
        self.check_invariants();
        outcome
    }

    fn open_file(&mut self, file_path: &str, selection: Selection) {
        let Some(path) = self.resolve(file_path, false) else {
            return;
        };
        self.host.open_location(&path, selection);
    }

    fn preview_diff(
        &mut self,
        file_path: &str,
        selection: Option<Selection>,
        query: SearchQuery,
    ) -> Option<Task> {
        let id = self.resolve(file_path, false)?;

        // Generations launched under an older pattern do not count.
        if self.pending.get(&id) == Some(&self.epoch) {
            tracing::debug!(path = %id.display(), "preview already being generated");
            return None;
        }

        if self.store.has(&id) {
            // Idempotent: show the stored preview again without searching.
            let content = self.store.text(&id);
            let session = DiffSession::new(Resource::file(&id), &self.settings.scheme);
            self.sessions.open(session, &content, &mut self.host);
            if let Some(selection) = selection {
                self.host.reveal(selection);
            }
            return None;
        }

        let epoch = self.epoch;
        self.pending.insert(id.clone(), epoch);
        let streamer = self.streamer.clone();
        Some(Box::pin(async move {
            let result = generate_preview(&streamer, &query, &id, selection).await;
            Completion::Preview { id, epoch, result }
        }))
    }

    fn show_preview(&mut self, id: PathBuf, preview: GeneratedPreview) {
        let text = String::from_utf8_lossy(&preview.content).into_owned();
        tracing::debug!(path = %id.display(), bytes = preview.content.len(), "preview ready");
        self.store.set(id.clone(), preview.content);

        let session = DiffSession::new(Resource::file(id), &self.settings.scheme);
        self.sessions.open(session, &text, &mut self.host);
        if let Some(focus) = preview.focus {
            self.host.reveal(focus);
        }
    }

    fn refresh_diff(&mut self, query: SearchQuery) {
        // Recorded before acting so the same change is never handled twice.
        let previous = std::mem::replace(&mut self.last_query, query);

        if !previous.same_pattern(&self.last_query) {
            self.invalidate("search pattern changed");
        } else if !previous.same_rewrite(&self.last_query) {
            // TODO: refresh open previews in place instead of closing them.
            self.invalidate("rewrite changed");
        }
    }

    fn invalidate(&mut self, reason: &str) {
        self.epoch += 1;
        let scheme = self.settings.scheme.clone();
        let closed = self
            .sessions
            .close_all(|preview| preview.has_scheme(&scheme), &mut self.host);
        // Every stored preview was computed under the previous query.
        let dropped = self.store.len();
        self.store.clear();
        tracing::debug!(
            reason,
            epoch = self.epoch,
            closed = closed.len(),
            dropped,
            "closing all diffs"
        );
    }

    fn commit_change(
        &mut self,
        request_id: u64,
        file_path: String,
        changes: Vec<Change>,
        query: SearchQuery,
    ) -> Option<Task> {
        let id = self.resolve(&file_path, true)?;
        let epoch = self.epoch;
        let streamer = self.streamer.clone();
        Some(Box::pin(async move {
            let result = commit_and_refresh(&streamer, &query, &id, &file_path, changes).await;
            Completion::Commit {
                request_id,
                id,
                file_name: file_path,
                epoch,
                result,
            }
        }))
    }

    fn apply_refresh(
        &mut self,
        request_id: u64,
        id: PathBuf,
        file_name: &str,
        refreshed: RefreshedCommit,
    ) {
        let text = String::from_utf8_lossy(&refreshed.preview).into_owned();
        self.store.set(id.clone(), refreshed.preview);

        // An open diff would otherwise keep showing the pre-commit preview.
        if self.sessions.is_open(&id) {
            let session = DiffSession::new(Resource::file(&id), &self.settings.scheme);
            self.sessions.open(session, &text, &mut self.host);
        }

        tracing::debug!(
            path = %id.display(),
            matches = refreshed.results.len(),
            "search results refreshed after commit"
        );
        self.host
            .refresh_search_result(request_id, refreshed.results, file_name);
    }

    fn document_closed(&mut self, resource: &Resource) {
        if !resource.has_scheme(&self.settings.scheme) {
            return;
        }
        self.sessions.forget(&resource.path);
        if self.store.delete(&resource.path).is_some() {
            tracing::debug!(path = %resource.path.display(), "preview released");
        }
    }

    fn resolve(&self, file_path: &str, writable: bool) -> Option<PathBuf> {
        let resolved = if writable {
            self.workspace.resolve_writable(file_path)
        } else {
            self.workspace.resolve(file_path)
        };
        match resolved {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::debug!(file_path, error = %e, "dropping request for unresolvable path");
                None
            }
        }
    }

    fn is_stale(&self, epoch: u64) -> bool {
        self.settings.discard_stale_results && epoch != self.epoch
    }

    fn report(&mut self, error: &PreviewError) {
        tracing::warn!(error = %error, "preview operation failed");
        self.host.show_error(&error.to_string());
    }

    fn check_invariants(&self) {
        debug_assert!(
            self.sessions.ids().all(|id| self.store.has(id)),
            "diff session open without a preview entry"
        );
    }

    pub fn store(&self) -> &PreviewStore {
        &self.store
    }

    pub fn sessions(&self) -> &DiffSessionTracker {
        &self.sessions
    }

    pub fn last_query(&self) -> &SearchQuery {
        &self.last_query
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn is_pending(&self, id: &Path) -> bool {
        self.pending.contains_key(id)
    }
}

async fn read_document(path: &Path) -> Result<Vec<u8>, PreviewError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| PreviewError::Read {
            path: path.to_path_buf(),
            source,
        })
}

async fn generate_preview(
    streamer: &SearchResultStreamer,
    query: &SearchQuery,
    path: &Path,
    selection: Option<Selection>,
) -> Result<GeneratedPreview, PreviewError> {
    let base = read_document(path).await?;
    let patch = streamer
        .patch(query, path, &base)
        .await
        .map_err(|source| PreviewError::Search {
            path: path.to_path_buf(),
            source,
        })?;

    let focus = selection.or_else(|| {
        patch
            .first_applied
            .map(|range| Selection::from_range(&base, range))
    });
    Ok(GeneratedPreview {
        content: patch.content,
        focus,
    })
}

async fn commit_and_refresh(
    streamer: &SearchResultStreamer,
    query: &SearchQuery,
    path: &Path,
    file_name: &str,
    changes: Vec<Change>,
) -> Result<RefreshedCommit, PreviewError> {
    let target = path.to_path_buf();
    let committed = tokio::task::spawn_blocking(move || commit_to_file(&target, &changes))
        .await
        .map_err(|e| PreviewError::Task(e.to_string()))??;
    tracing::info!(
        path = %path.display(),
        applied = committed.applied,
        skipped = committed.skipped,
        "committed changes"
    );

    // The write is not rolled back if the refresh below fails.
    let bytes = read_document(path).await?;
    let patch = streamer
        .patch(query, path, &bytes)
        .await
        .map_err(|source| PreviewError::Search {
            path: path.to_path_buf(),
            source,
        })?;

    let display_path = Path::new(file_name);
    let results = patch
        .records
        .iter()
        .map(|record| DisplayResult::project(display_path, &bytes, record))
        .collect();

    Ok(RefreshedCommit {
        preview: patch.content,
        results,
    })
}
