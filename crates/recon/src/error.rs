use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconError {
    /// Status string outside the recognized set (dispatched, on scene, resolved).
    UnknownStatus(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownStatus(status) => write!(f, "unknown status: {status}"),
        }
    }
}

impl std::error::Error for ReconError {}
