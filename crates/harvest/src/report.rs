use chrono::{DateTime, Utc};
use serde::Serialize;

use callwatch_recon::{Category, ReconSummary};

#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub category: Category,
    /// Calls the feed reported for this category.
    pub fetched: usize,
    #[serde(flatten)]
    pub summary: ReconSummary,
}

/// Outcome of one successful harvest.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Size of the stored-active snapshot both categories were diffed against.
    pub stored_active: usize,
    pub categories: Vec<CategoryReport>,
}

impl HarvestReport {
    pub fn category(&self, category: Category) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.category == category)
    }

    /// Commands written across both categories.
    pub fn writes(&self) -> usize {
        self.categories
            .iter()
            .map(|c| c.summary.created + c.summary.updated + c.summary.resolved)
            .sum()
    }

    pub fn is_noop(&self) -> bool {
        self.categories.iter().all(|c| c.summary.is_noop())
    }
}
