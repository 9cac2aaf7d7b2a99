use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::address::split_location;
use crate::error::ReconError;
use crate::model::{ActiveCall, Category, Command, Reconciliation, SavedCall, UpdateCause};
use crate::normalize::apply_status;

/// Diff the feed's active calls for `category` against the calls the store
/// currently holds as active, returning the commands that bring the store
/// up to date.
///
/// - id in feed, not stored → `Create`
/// - id in both, raw status differs → `Update(StatusChanged)`
/// - id in both, raw status identical → unchanged, no command
/// - id stored, not in feed → `Update(LeftFeed)` with status `resolved`
///
/// Commands come out in feed order followed by leftovers in stored order.
/// `stored` may hold every category; only `category` is considered.
/// Every emitted record is normalized with its status transition applied
/// at `now`. An unrecognized status fails the whole category.
pub fn reconcile(
    category: Category,
    active: &[ActiveCall],
    stored: &[SavedCall],
    now: DateTime<Utc>,
) -> Result<Reconciliation, ReconError> {
    let mut open: HashMap<&str, &SavedCall> = stored
        .iter()
        .filter(|call| call.category == category)
        .map(|call| (call.id.as_str(), call))
        .collect();

    let mut commands = Vec::new();
    let mut unchanged = Vec::new();

    for feed_call in active {
        let mut candidate = candidate_from_feed(category, feed_call);

        match open.remove(feed_call.id.as_str()) {
            Some(existing) => {
                // Raw, pre-normalization comparison.
                if existing.last_known_status == candidate.last_known_status {
                    unchanged.push(candidate.id);
                    continue;
                }
                candidate.arrived = existing.arrived;
                candidate.resolved = existing.resolved;
                commands.push(Command::Update {
                    call: apply_status(candidate, now)?,
                    cause: UpdateCause::StatusChanged,
                });
            }
            None => {
                commands.push(Command::Create(apply_status(candidate, now)?));
            }
        }
    }

    // Whatever is left was open in the store but is gone from the feed.
    for call in stored {
        if call.category != category {
            continue;
        }
        let Some(existing) = open.remove(call.id.as_str()) else {
            continue;
        };
        let mut resolved = existing.clone();
        resolved.last_known_status = "resolved".to_string();
        commands.push(Command::Update {
            call: apply_status(resolved, now)?,
            cause: UpdateCause::LeftFeed,
        });
    }

    Ok(Reconciliation {
        category,
        commands,
        unchanged,
    })
}

/// Build the record the store should hold for a feed call. The status is
/// copied verbatim; normalization happens when a command is emitted.
fn candidate_from_feed(category: Category, call: &ActiveCall) -> SavedCall {
    let (house_number, street_name) = split_location(&call.location);
    SavedCall {
        sort_key: String::new(),
        id: call.id.clone(),
        category,
        reason: call.reason.clone(),
        last_known_status: call.status.clone(),
        received: call.received.with_timezone(&Utc),
        arrived: None,
        resolved: None,
        active: false,
        location: call.location.clone(),
        area: call.area.clone(),
        priority: call.priority.clone(),
        house_number,
        street_name,
    }
}
