//! `callwatch-harvest` — one harvest = fetch both feeds and the stored
//! active set in parallel, reconcile each category, write the commands.

mod error;
mod harvester;
mod report;

pub use error::{HarvestError, HarvestInput};
pub use harvester::{Clock, Harvester};
pub use report::{CategoryReport, HarvestReport};
