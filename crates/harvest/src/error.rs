use std::error::Error;
use std::fmt;

use callwatch_recon::Category;

/// One of the three reads a harvest starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestInput {
    Feed(Category),
    Store,
}

impl fmt::Display for HarvestInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarvestInput::Feed(category) => write!(f, "{} feed", category),
            HarvestInput::Store => write!(f, "stored active calls"),
        }
    }
}

#[derive(Debug)]
pub enum HarvestError {
    /// A read failed; nothing was written.
    Fetch {
        input: HarvestInput,
        source: Box<dyn Error + Send>,
    },
    /// A status outside the recognized set; nothing was written.
    UnknownStatus { category: Category, status: String },
    /// A store write failed. Earlier writes of this harvest stay applied.
    CommandExecution {
        category: Category,
        command: &'static str,
        sort_key: String,
        source: Box<dyn Error + Send>,
    },
    /// The caller's token fired (explicit cancel or deadline).
    Cancelled,
}

impl fmt::Display for HarvestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarvestError::Fetch { input, source } => {
                write!(f, "failed to fetch {}: {}", input, source)
            }
            HarvestError::UnknownStatus { category, status } => {
                write!(f, "unknown status {:?} in {} feed", status, category)
            }
            HarvestError::CommandExecution {
                category,
                command,
                sort_key,
                source,
            } => write!(
                f,
                "{} {} call {} failed: {}",
                command, category, sort_key, source
            ),
            HarvestError::Cancelled => write!(f, "harvest cancelled"),
        }
    }
}

impl Error for HarvestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HarvestError::Fetch { source, .. } => Some(source.as_ref()),
            HarvestError::CommandExecution { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
