use chrono::{DateTime, Utc};

use crate::error::ReconError;
use crate::model::{Category, SavedCall, FEED_TIME_ZONE};
use crate::status::{resolve, Milestone};

/// Storage key: `YYYY/MM/DD#id#category`.
///
/// The date is the calendar day of `received` in the feed's zone, so the
/// key is the same whether the timestamp came from the feed or was read
/// back from storage in UTC.
pub fn sort_key(received: &DateTime<Utc>, id: &str, category: Category) -> String {
    let local_date = received.with_timezone(&FEED_TIME_ZONE).format("%Y/%m/%d");
    format!("{local_date}#{id}#{category}")
}

/// Lower-case the status and re-derive the sort key. Total over all inputs.
pub fn normalize(mut call: SavedCall) -> SavedCall {
    call.last_known_status = call.last_known_status.to_lowercase();
    call.sort_key = sort_key(&call.received, &call.id, call.category);
    call
}

/// Normalize, then apply the status transition: set the activity marker
/// and stamp the milestone timestamp with `now` unless it is already set.
pub fn apply_status(call: SavedCall, now: DateTime<Utc>) -> Result<SavedCall, ReconError> {
    let mut call = normalize(call);
    let transition = resolve(&call.last_known_status)?;
    call.active = transition.active;
    match transition.stamp {
        Some(Milestone::Arrived) => {
            call.arrived.get_or_insert(now);
        }
        Some(Milestone::Resolved) => {
            call.resolved.get_or_insert(now);
        }
        None => {}
    }
    Ok(call)
}
