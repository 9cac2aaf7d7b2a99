//! Collaborator interfaces consumed by the harvest.
//!
//! Production clients (HTTP feed, SQLite store) and test doubles implement
//! the same traits; the harvester is constructed with them explicitly.

use crate::cancel::CancelToken;
use crate::model::{ActiveCall, Category, SavedCall};

/// Upstream calls-for-service feed. One request per category; idempotent.
pub trait CallSource: Send + Sync {
    type Error: std::error::Error + Send + 'static;

    fn active_calls(
        &self,
        category: Category,
        cancel: &CancelToken,
    ) -> Result<Vec<ActiveCall>, Self::Error>;
}

/// Persistent table of saved calls.
pub trait CallStore: Send + Sync {
    type Error: std::error::Error + Send + 'static;

    /// Every call currently carrying the activity marker, all categories.
    fn active_calls(&self, cancel: &CancelToken) -> Result<Vec<SavedCall>, Self::Error>;

    /// Write the whole record, replacing any row with the same sort key.
    fn create(&self, call: &SavedCall, cancel: &CancelToken) -> Result<(), Self::Error>;

    /// Upsert status, activity marker and milestone timestamps by sort key.
    fn update_status(&self, call: &SavedCall, cancel: &CancelToken) -> Result<(), Self::Error>;
}

impl<T: CallSource + ?Sized> CallSource for &T {
    type Error = T::Error;

    fn active_calls(
        &self,
        category: Category,
        cancel: &CancelToken,
    ) -> Result<Vec<ActiveCall>, Self::Error> {
        (**self).active_calls(category, cancel)
    }
}

impl<T: CallStore + ?Sized> CallStore for &T {
    type Error = T::Error;

    fn active_calls(&self, cancel: &CancelToken) -> Result<Vec<SavedCall>, Self::Error> {
        (**self).active_calls(cancel)
    }

    fn create(&self, call: &SavedCall, cancel: &CancelToken) -> Result<(), Self::Error> {
        (**self).create(call, cancel)
    }

    fn update_status(&self, call: &SavedCall, cancel: &CancelToken) -> Result<(), Self::Error> {
        (**self).update_status(call, cancel)
    }
}
