//! `callwatch-recon` — reconciliation engine for calls for service.
//!
//! Pure engine crate: receives the feed's active calls and the store's
//! active calls, returns the create/update commands that bring the store in
//! line. No network or storage dependencies; collaborators plug in through
//! the traits in [`ports`].

pub mod address;
pub mod cancel;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod ports;
pub mod status;

pub use cancel::CancelToken;
pub use engine::reconcile;
pub use error::ReconError;
pub use model::{ActiveCall, Category, Command, Reconciliation, ReconSummary, SavedCall, UpdateCause};
pub use ports::{CallSource, CallStore};
pub use status::CallStatus;
