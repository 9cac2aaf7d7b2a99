use std::fmt;

/// Error type for store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Database file or directory could not be prepared
    Io(String),
    /// SQLite failure
    Sqlite(rusqlite::Error),
    /// Row contents could not be decoded
    Corrupt(String),
    /// Status outside dispatched / on scene / resolved
    UnknownStatus(String),
    /// Cancellation token fired before the statement ran
    Cancelled,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(msg) => write!(f, "I/O error: {}", msg),
            StoreError::Sqlite(e) => write!(f, "sqlite error: {}", e),
            StoreError::Corrupt(msg) => write!(f, "corrupt row: {}", msg),
            StoreError::UnknownStatus(status) => write!(f, "unknown status: {}", status),
            StoreError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Sqlite(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}
