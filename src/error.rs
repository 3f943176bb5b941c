use crate::export::ExportFormat;
use crate::store::NoteId;

#[derive(Debug, thiserror::Error)]
pub enum NotepadError {
    #[error("note {0} not found")]
    NotFound(NoteId),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("{0} export is not supported yet")]
    UnsupportedFormat(ExportFormat),
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure crossing the key-value persistence boundary. Never fatal: the
/// in-memory store stays authoritative.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to read key {key}: {message}")]
    Read { key: String, message: String },
    #[error("failed to write key {key}: {message}")]
    Write { key: String, message: String },
    #[error("failed to encode value for {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode value for {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type NotepadResult<T> = std::result::Result<T, NotepadError>;
