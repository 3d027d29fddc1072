use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or rejected the request.
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The backing table (or database) does not exist yet and must be provisioned.
    #[error("storage table `{table}` does not exist")]
    TableMissing { table: String },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct the setup error raised when `table` has not been created.
    pub fn table_missing(table: impl Into<String>) -> Self {
        StorageError::TableMissing {
            table: table.into(),
        }
    }

    /// Whether this failure means the storage schema still needs to be provisioned.
    pub fn is_table_missing(&self) -> bool {
        matches!(self, StorageError::TableMissing { .. })
    }
}
