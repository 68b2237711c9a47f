//! Language selection via ast-grep-language.
//!
//! The grammar comes from an explicit override when one is configured,
//! otherwise from the file extension through `SupportLang`'s alias table
//! (`rs`, `py`, `ts`, `tsx`, `js`, `go`, ...).

use crate::sg::errors::SearchError;
pub use ast_grep_language::SupportLang;
use std::path::Path;
use std::str::FromStr;

/// Pick the grammar for `path`.
pub fn detect(path: &Path, language: Option<&str>) -> Result<SupportLang, SearchError> {
    let unsupported = || SearchError::UnsupportedLanguage {
        path: path.to_path_buf(),
    };

    let name = match language {
        Some(name) => name,
        None => path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(unsupported)?,
    };

    SupportLang::from_str(name).map_err(|_| unsupported())
}
