use std::path::PathBuf;

use thiserror::Error;

use crate::types::CountryCode;

#[derive(Error, Debug)]
pub enum ReachError {
    #[error("Source file for {country} not found: {}", path.display())]
    SourceMissing { country: CountryCode, path: PathBuf },

    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    #[error("Missing column '{column}' in {}", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ReachResult<T> = Result<T, ReachError>;
