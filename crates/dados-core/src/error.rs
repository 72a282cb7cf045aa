// crates/dados-core/src/error.rs

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Coarse failure category surfaced to callers that need more than a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Extraction,
    Schema,
    Io,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Extraction => "extraction",
            ErrorKind::Schema => "schema",
            ErrorKind::Io => "io",
            ErrorKind::Config => "config",
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to extract archive '{}': {source}", archive.display())]
    Extraction {
        archive: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("'{}' is missing required column '{column}'", file.display())]
    MissingColumn { file: PathBuf, column: String },

    #[error("'{}' already has a column named '{column}'", file.display())]
    ColumnConflict { file: PathBuf, column: String },

    #[error("'{}' row {row}: unparseable created_at value '{value}'", file.display())]
    InvalidTimestamp {
        file: PathBuf,
        row: usize,
        value: String,
    },

    #[error("'{}' has no header row", file.display())]
    EmptyHeader { file: PathBuf },

    #[error("CSV parsing error in '{}': {source}", file.display())]
    Csv {
        file: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("File I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Extraction { .. } => ErrorKind::Extraction,
            PipelineError::MissingColumn { .. }
            | PipelineError::ColumnConflict { .. }
            | PipelineError::InvalidTimestamp { .. }
            | PipelineError::EmptyHeader { .. } => ErrorKind::Schema,
            PipelineError::Csv { source, .. } if source.is_io_error() => ErrorKind::Io,
            PipelineError::Csv { .. } => ErrorKind::Schema,
            PipelineError::Polars(polars::error::PolarsError::IO { .. }) => ErrorKind::Io,
            PipelineError::Polars(_) => ErrorKind::Schema,
            PipelineError::Io { .. } => ErrorKind::Io,
            PipelineError::Config(_) => ErrorKind::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
