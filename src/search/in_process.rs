use crate::patch::MatchRecord;
use crate::search::{SearchBackend, SearchRequest};
use crate::sg::errors::SearchError;
use crate::sg::lang::detect;
use crate::sg::matcher::PatternMatcher;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Runs ast-grep inside this process instead of spawning `sg`.
///
/// Each file is parsed on the blocking pool; its records are then sent in
/// batches of `batch_size`.
#[derive(Debug, Clone)]
pub struct AstGrepBackend {
    batch_size: usize,
    language: Option<String>,
}

impl AstGrepBackend {
    pub fn new(batch_size: usize, language: Option<String>) -> Self {
        Self {
            batch_size: batch_size.max(1),
            language,
        }
    }
}

impl Default for AstGrepBackend {
    fn default() -> Self {
        Self::new(64, None)
    }
}

#[async_trait]
impl SearchBackend for AstGrepBackend {
    async fn search(
        &self,
        request: SearchRequest,
        sink: mpsc::Sender<Vec<MatchRecord>>,
    ) -> Result<(), SearchError> {
        for path in request.include_files {
            let lang = detect(&path, self.language.as_deref())?;
            let bytes = tokio::fs::read(&path).await?;
            let source =
                String::from_utf8(bytes).map_err(|_| SearchError::NotUtf8 { path: path.clone() })?;

            let query = request.query.clone();
            let records = tokio::task::spawn_blocking(move || {
                PatternMatcher::new(&source, lang).rewrite_all(&query.pattern, &query.rewrite)
            })
            .await
            .map_err(|e| SearchError::Process {
                message: e.to_string(),
            })??;

            tracing::debug!(path = %path.display(), matches = records.len(), "ast-grep search");

            for batch in records.chunks(self.batch_size) {
                sink.send(batch.to_vec())
                    .await
                    .map_err(|_| SearchError::Cancelled)?;
            }
        }
        Ok(())
    }
}
