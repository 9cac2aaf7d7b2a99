use serde::Serialize;

use crate::error::ReconError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Dispatched,
    OnScene,
    Resolved,
}

impl CallStatus {
    /// Normalized (lower-case) form, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dispatched => "dispatched",
            Self::OnScene => "on scene",
            Self::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle timestamp stamped when a status is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    Arrived,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub status: CallStatus,
    pub active: bool,
    pub stamp: Option<Milestone>,
}

/// Map a raw feed/store status (case-insensitive) to its transition.
pub fn resolve(raw: &str) -> Result<StatusTransition, ReconError> {
    let transition = match raw.to_lowercase().as_str() {
        "dispatched" => StatusTransition {
            status: CallStatus::Dispatched,
            active: true,
            stamp: None,
        },
        "on scene" => StatusTransition {
            status: CallStatus::OnScene,
            active: true,
            stamp: Some(Milestone::Arrived),
        },
        "resolved" => StatusTransition {
            status: CallStatus::Resolved,
            active: false,
            stamp: Some(Milestone::Resolved),
        },
        _ => return Err(ReconError::UnknownStatus(raw.to_string())),
    };
    Ok(transition)
}
