use crate::patch::{ByteRange, MatchRecord, PatchBuilder, Received};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A user-accepted edit committed to the real document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub range: ByteRange,
    pub replacement: String,
}

impl From<Change> for MatchRecord {
    fn from(change: Change) -> Self {
        MatchRecord {
            range: change.range,
            replacement: change.replacement,
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Invalid byte range: [{byte_start}, {byte_end}) in file of length {file_len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        file_len: usize,
    },

    #[error("File I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Outcome of committing a change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResult {
    /// Rewritten document bytes, as written to disk.
    pub content: Vec<u8>,
    /// Changes that made it into the output.
    pub applied: usize,
    /// Changes dropped because they overlapped an earlier one.
    pub skipped: usize,
}

/// Apply `changes` to `original` in one builder pass.
///
/// Changes are stably sorted by start offset first; a change whose range
/// falls outside the document is an error rather than a silent skip.
pub fn apply_changes(original: &[u8], changes: &[Change]) -> Result<CommitResult, EditError> {
    let mut ordered: Vec<&Change> = changes.iter().collect();
    ordered.sort_by_key(|change| change.range.start);

    let mut builder = PatchBuilder::new(original);
    let mut skipped = 0;
    for change in ordered {
        let record = MatchRecord::from(change.clone());
        match builder.receive(&record) {
            Received::Applied => {}
            Received::Overlapping => skipped += 1,
            Received::OutOfBounds => {
                return Err(EditError::InvalidByteRange {
                    byte_start: change.range.start,
                    byte_end: change.range.end,
                    file_len: original.len(),
                })
            }
        }
    }

    let applied = builder.applied();
    Ok(CommitResult {
        content: builder.conclude(),
        applied,
        skipped,
    })
}

/// Read `path`, apply `changes` and write the result back atomically.
pub fn commit_to_file(path: &Path, changes: &[Change]) -> Result<CommitResult, EditError> {
    let original = std::fs::read(path).map_err(|source| EditError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let result = apply_changes(&original, changes)?;
    atomic_write(path, &result.content)?;
    Ok(result)
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or the file is left untouched.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    let io_err = |source: std::io::Error| EditError::Io {
        path: path.to_path_buf(),
        source,
    };

    // Same directory keeps the rename on one filesystem
    let parent = path.parent().ok_or_else(|| {
        io_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Path has no parent directory",
        ))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    temp.write_all(content).map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;
    temp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}
