// src/error.rs
use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FindError {
    #[error("tracking store query failed: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("reference '{name}' matches {count} sequence files; use a more specific name")]
    AmbiguousReference { name: String, count: usize },

    #[error("reference '{name}' not found in the reference index")]
    MissingReference { name: String },

    #[error("destination '{}' already exists; use --force to overwrite it", .path.display())]
    DestinationExists { path: PathBuf },

    #[error("two files would both be written as '{name}'; narrow the search depth or file type")]
    DuplicateDestination { name: String },

    #[error("filetype '{filetype}' is not supported by the {kind} pipeline")]
    UnsupportedFileType { kind: String, filetype: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl FindError {
    /// Wrap an io::Error with the path it happened on.
    pub fn io<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        FindError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, FindError>;
