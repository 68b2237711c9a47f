use crate::edit::EditError;
use crate::sg::errors::SearchError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("search failed for {path}: {source}")]
    Search { path: PathBuf, source: SearchError },

    #[error("commit failed: {0}")]
    Edit(#[from] EditError),

    #[error("background task failed: {0}")]
    Task(String),
}
