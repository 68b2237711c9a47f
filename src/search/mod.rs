//! Streaming adapter over the structural search collaborator.
//!
//! A [`SearchBackend`] runs one search+rewrite request and pushes match
//! records into a channel as they become available. The
//! [`SearchResultStreamer`] scopes a query to a single document, drains those
//! batches into a caller-supplied consumer and resolves once the backend
//! does. A backend failure fails the whole stream; callers must throw away
//! whatever they built from the batches already delivered.

pub mod command;
pub mod in_process;

use crate::config::{BackendKind, SearchConfig};
use crate::patch::{ByteRange, MatchRecord, PatchBuilder, Received};
use crate::sg::errors::SearchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

pub use command::CommandBackend;
pub use in_process::AstGrepBackend;

/// Batches buffered between a backend and the consumer.
const STREAM_CAPACITY: usize = 16;

/// The user's current search intent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub pattern: String,
    #[serde(default)]
    pub rewrite: String,
}

impl SearchQuery {
    pub fn new(pattern: impl Into<String>, rewrite: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            rewrite: rewrite.into(),
        }
    }

    pub fn same_pattern(&self, other: &SearchQuery) -> bool {
        self.pattern == other.pattern
    }

    pub fn same_rewrite(&self, other: &SearchQuery) -> bool {
        self.same_pattern(other) && self.rewrite == other.rewrite
    }
}

/// One invocation of the search collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: SearchQuery,
    pub include_files: Vec<PathBuf>,
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run `request`, sending match records for each file in document order.
    ///
    /// Resolves once, after the last batch was sent, with the overall outcome.
    async fn search(
        &self,
        request: SearchRequest,
        sink: mpsc::Sender<Vec<MatchRecord>>,
    ) -> Result<(), SearchError>;
}

/// Rewritten document produced by one streamed search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamedPatch {
    pub content: Vec<u8>,
    /// Every record the search delivered, including skipped overlaps
    pub records: Vec<MatchRecord>,
    /// Range of the first record the builder applied
    pub first_applied: Option<ByteRange>,
}

/// Construct the backend selected in the search config.
pub fn backend_from_config(config: &SearchConfig) -> Arc<dyn SearchBackend> {
    match config.backend {
        BackendKind::InProcess => Arc::new(AstGrepBackend::new(
            config.batch_size,
            config.language.clone(),
        )),
        BackendKind::Command => Arc::new(CommandBackend::new(&config.command, config.batch_size)),
    }
}

#[derive(Clone)]
pub struct SearchResultStreamer {
    backend: Arc<dyn SearchBackend>,
}

impl SearchResultStreamer {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }

    /// Search `path` with `query`, handing each batch to `on_batch`.
    ///
    /// Returns the number of records delivered.
    pub async fn stream<F>(
        &self,
        query: &SearchQuery,
        path: &Path,
        mut on_batch: F,
    ) -> Result<usize, SearchError>
    where
        F: FnMut(Vec<MatchRecord>),
    {
        let (tx, mut rx) = mpsc::channel(STREAM_CAPACITY);
        let request = SearchRequest {
            query: query.clone(),
            include_files: vec![path.to_path_buf()],
        };

        let search = self.backend.search(request, tx);
        let drain = async {
            let mut delivered = 0;
            while let Some(batch) = rx.recv().await {
                delivered += batch.len();
                on_batch(batch);
            }
            delivered
        };

        let (outcome, delivered) = tokio::join!(search, drain);
        outcome?;
        tracing::debug!(
            path = %path.display(),
            pattern = %query.pattern,
            matches = delivered,
            "search stream completed"
        );
        Ok(delivered)
    }

    /// Feed one streamed search over `path` through a builder on `base`.
    ///
    /// On failure the partial output is dropped with the builder.
    pub async fn patch(
        &self,
        query: &SearchQuery,
        path: &Path,
        base: &[u8],
    ) -> Result<StreamedPatch, SearchError> {
        let mut builder = PatchBuilder::new(base);
        let mut records = Vec::new();
        let mut first_applied = None;

        self.stream(query, path, |batch| {
            for record in batch {
                if builder.receive(&record) == Received::Applied && first_applied.is_none() {
                    first_applied = Some(record.range);
                }
                records.push(record);
            }
        })
        .await?;

        Ok(StreamedPatch {
            content: builder.conclude(),
            records,
            first_applied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted {
        batches: Vec<Vec<MatchRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl SearchBackend for Scripted {
        async fn search(
            &self,
            _request: SearchRequest,
            sink: mpsc::Sender<Vec<MatchRecord>>,
        ) -> Result<(), SearchError> {
            for batch in &self.batches {
                sink.send(batch.clone())
                    .await
                    .map_err(|_| SearchError::Cancelled)?;
            }
            if self.fail {
                return Err(SearchError::Malformed {
                    message: "truncated line".into(),
                });
            }
            Ok(())
        }
    }

    fn streamer(batches: Vec<Vec<MatchRecord>>, fail: bool) -> SearchResultStreamer {
        SearchResultStreamer::new(Arc::new(Scripted { batches, fail }))
    }

    #[test]
    fn query_identity_is_structural() {
        let a = SearchQuery::new("$A.clone()", "$A");
        assert!(a.same_pattern(&SearchQuery::new("$A.clone()", "x")));
        assert!(!a.same_rewrite(&SearchQuery::new("$A.clone()", "x")));
        assert!(a.same_rewrite(&SearchQuery::new("$A.clone()", "$A")));
        assert!(!a.same_pattern(&SearchQuery::new("$B.clone()", "$A")));
    }

    #[tokio::test]
    async fn stream_delivers_batches_in_order() {
        let streamer = streamer(
            vec![
                vec![MatchRecord::new(0, 1, "a")],
                vec![MatchRecord::new(2, 3, "b"), MatchRecord::new(4, 5, "c")],
            ],
            false,
        );

        let mut seen = Vec::new();
        let delivered = streamer
            .stream(&SearchQuery::new("p", "r"), Path::new("f.rs"), |batch| {
                seen.extend(batch.into_iter().map(|r| r.replacement))
            })
            .await
            .unwrap();

        assert_eq!(delivered, 3);
        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn patch_builds_from_all_batches() {
        let streamer = streamer(
            vec![
                vec![MatchRecord::new(1, 3, "Q")],
                vec![MatchRecord::new(2, 5, "R"), MatchRecord::new(5, 6, "!")],
            ],
            false,
        );

        let patch = streamer
            .patch(&SearchQuery::new("p", "r"), Path::new("f.rs"), b"abcdef")
            .await
            .unwrap();

        assert_eq!(patch.content, b"aQde!");
        assert_eq!(patch.records.len(), 3);
        assert_eq!(patch.first_applied, Some(ByteRange::new(1, 3)));
    }

    #[tokio::test]
    async fn failed_stream_yields_no_patch() {
        let streamer = streamer(vec![vec![MatchRecord::new(0, 1, "x")]], true);

        let result = streamer
            .patch(&SearchQuery::new("p", "r"), Path::new("f.rs"), b"abc")
            .await;

        assert!(matches!(result, Err(SearchError::Malformed { .. })));
    }
}
