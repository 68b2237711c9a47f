use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Maps UI-relative file paths to canonical document identities inside the
/// known workspace roots.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceRoots {
    /// Canonical roots; relative paths resolve against the first one
    roots: Vec<PathBuf>,
    /// Canonical directories that may be read but never written
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("No workspace root is configured")]
    NoWorkspace,

    #[error("Path is outside workspace: {path}")]
    OutsideWorkspace { path: PathBuf },

    #[error("Path is in forbidden directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("Failed to canonicalize {path}: {source}")]
    Canonicalize {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl WorkspaceRoots {
    /// Build from root directories and workspace-relative forbidden dirs.
    ///
    /// Forbidden entries that do not exist under a root are ignored.
    pub fn new<P, F>(roots: impl IntoIterator<Item = P>, forbidden: &[F]) -> Result<Self, SafetyError>
    where
        P: AsRef<Path>,
        F: AsRef<Path>,
    {
        let mut canonical_roots = Vec::new();
        for root in roots {
            canonical_roots.push(canonicalize(root.as_ref())?);
        }

        let mut forbidden_paths = Vec::new();
        for root in &canonical_roots {
            for dir in forbidden {
                if let Ok(path) = root.join(dir).canonicalize() {
                    forbidden_paths.push(path);
                }
            }
        }

        Ok(Self {
            roots: canonical_roots,
            forbidden_paths,
        })
    }

    /// A resolver that knows no roots; every resolution fails.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolve a file path to its canonical identity.
    ///
    /// Relative paths are joined to the first root. The result must lie
    /// inside one of the roots.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();
        let first = self.roots.first().ok_or(SafetyError::NoWorkspace)?;

        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            first.join(path)
        };
        let canonical = canonicalize_existing_prefix(&absolute)?;

        if !self.roots.iter().any(|root| canonical.starts_with(root)) {
            return Err(SafetyError::OutsideWorkspace { path: canonical });
        }

        Ok(canonical)
    }

    /// Like [`resolve`](Self::resolve), but also rejects forbidden directories.
    pub fn resolve_writable(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let canonical = self.resolve(path)?;

        for forbidden in &self.forbidden_paths {
            if canonical.starts_with(forbidden) {
                return Err(SafetyError::ForbiddenPath {
                    path: canonical,
                    forbidden: forbidden.clone(),
                });
            }
        }

        Ok(canonical)
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf, SafetyError> {
    path.canonicalize()
        .map_err(|source| SafetyError::Canonicalize {
            path: path.to_path_buf(),
            source,
        })
}

/// Canonicalize the longest existing ancestor of `path` and re-attach the rest.
///
/// A document that does not exist yet still gets an identity; reading it is
/// what fails, not resolving it. `.` and `..` in the missing tail are folded
/// lexically.
fn canonicalize_existing_prefix(path: &Path) -> Result<PathBuf, SafetyError> {
    if let Ok(canonical) = path.canonicalize() {
        return Ok(canonical);
    }

    let normalized = normalize_lexically(path);
    let mut missing = Vec::new();
    let mut existing = normalized.as_path();
    loop {
        match existing.canonicalize() {
            Ok(base) => {
                return Ok(missing.iter().rev().fold(base, |acc, name| acc.join(name)));
            }
            Err(source) => match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name.to_os_string());
                    existing = parent;
                }
                _ => {
                    return Err(SafetyError::Canonicalize {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            },
        }
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
