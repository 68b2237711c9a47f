use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("invalid pattern: {message}")]
    InvalidPattern { message: String },

    #[error("no supported language for {path}")]
    UnsupportedLanguage { path: PathBuf },

    #[error("{path} is not valid UTF-8")]
    NotUtf8 { path: PathBuf },

    #[error("malformed search output: {message}")]
    Malformed { message: String },

    #[error("search process failed: {message}")]
    Process { message: String },

    #[error("search stream was dropped before completing")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
