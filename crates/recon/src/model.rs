use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Zone the upstream feed reports `callReceived` in.
pub const FEED_TIME_ZONE: Tz = chrono_tz::America::New_York;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Police,
    Fire,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Police, Category::Fire];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Police => "police",
            Self::Fire => "fire",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "police" => Some(Self::Police),
            "fire" => Some(Self::Fire),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Input: what the source reports right now
// ---------------------------------------------------------------------------

/// One call as reported by the source feed. Immutable snapshot per poll.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveCall {
    pub id: String,
    pub category: Category,
    pub location: String,
    pub reason: String,
    pub status: String,
    /// Feed-local time, offset preserved.
    pub received: DateTime<FixedOffset>,
    pub area: String,
    pub priority: String,
    pub received_display: String,
}

// ---------------------------------------------------------------------------
// Persisted record
// ---------------------------------------------------------------------------

/// A call as persisted by the store.
///
/// `arrived` / `resolved` are `None` until the call first reaches that state.
/// `active` is the activity marker: present while the call is dispatched or
/// on scene, absent once resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedCall {
    pub sort_key: String,
    pub id: String,
    pub category: Category,
    pub reason: String,
    pub last_known_status: String,
    pub received: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrived: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<DateTime<Utc>>,
    pub active: bool,
    pub location: String,
    pub area: String,
    pub priority: String,
    pub house_number: String,
    pub street_name: String,
}

// ---------------------------------------------------------------------------
// Output: commands for the store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateCause {
    /// Still in the feed, status string differs from the stored one.
    StatusChanged,
    /// Stored as active but no longer reported by the feed.
    LeftFeed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Create(SavedCall),
    Update { call: SavedCall, cause: UpdateCause },
}

impl Command {
    pub fn call(&self) -> &SavedCall {
        match self {
            Self::Create(call) => call,
            Self::Update { call, .. } => call,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Update { cause: UpdateCause::StatusChanged, .. } => "update",
            Self::Update { cause: UpdateCause::LeftFeed, .. } => "resolve",
        }
    }
}

/// Result of reconciling one category.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub category: Category,
    pub commands: Vec<Command>,
    /// Ids present on both sides with an identical raw status.
    pub unchanged: Vec<String>,
}

impl Reconciliation {
    pub fn summary(&self) -> ReconSummary {
        let mut summary = ReconSummary {
            unchanged: self.unchanged.len(),
            ..ReconSummary::default()
        };
        for command in &self.commands {
            match command {
                Command::Create(_) => summary.created += 1,
                Command::Update { cause: UpdateCause::StatusChanged, .. } => summary.updated += 1,
                Command::Update { cause: UpdateCause::LeftFeed, .. } => summary.resolved += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub created: usize,
    pub updated: usize,
    pub resolved: usize,
    pub unchanged: usize,
}

impl ReconSummary {
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.resolved == 0
    }
}
