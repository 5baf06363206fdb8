use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the collection store, the view store and the service.
///
/// The compiler itself never fails: malformed records are filtered and
/// cycles are broken, so nothing here originates in `record`, `tree` or `view`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON in '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("'{}' does not contain a JSON array of records", .0.display())]
    NotACollection(PathBuf),
    #[error("no record with id '{0}'")]
    NotFound(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::Json {
            path: path.into(),
            source,
        }
    }
}
