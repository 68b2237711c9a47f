use crate::session::FILE_SCHEME;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_SCHEME: &str = "sgpreview";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PreviewConfig {
    /// Relative file paths resolve against the first root
    pub workspace_roots: Vec<PathBuf>,
    /// Workspace-relative directories that commits may never write into
    pub forbidden: Vec<PathBuf>,
    pub search: SearchConfig,
    pub preview: PreviewSettings,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            workspace_roots: vec![PathBuf::from(".")],
            forbidden: vec![PathBuf::from("target"), PathBuf::from(".git")],
            search: SearchConfig::default(),
            preview: PreviewSettings::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    #[default]
    InProcess,
    Command,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub backend: BackendKind,
    /// Executable for the command backend
    pub command: String,
    /// Match records per delivered batch
    pub batch_size: usize,
    /// Grammar override; inferred from the file extension when unset
    pub language: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::InProcess,
            command: "sg".to_string(),
            batch_size: 64,
            language: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PreviewSettings {
    pub scheme: String,
    /// Drop in-flight results launched under a pattern that has since changed
    pub discard_stale_results: bool,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            discard_stale_results: true,
        }
    }
}

impl PreviewConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.search.batch_size == 0 {
            issues.push(ValidationIssue::OutOfRange {
                field: "search.batch_size",
                message: "must be at least 1".to_string(),
            });
        }
        if self.search.backend == BackendKind::Command && self.search.command.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "search.command",
            });
        }
        if let Some(language) = &self.search.language {
            if language.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    field: "search.language",
                });
            }
        }

        let scheme = self.preview.scheme.trim();
        if scheme.is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "preview.scheme",
            });
        } else if scheme == FILE_SCHEME {
            issues.push(ValidationIssue::ReservedScheme {
                scheme: scheme.to_string(),
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{}", join_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Error)]
pub enum ValidationIssue {
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("field '{field}' out of range: {message}")]
    OutOfRange {
        field: &'static str,
        message: String,
    },

    #[error("preview scheme '{scheme}' would shadow real files")]
    ReservedScheme { scheme: String },
}
