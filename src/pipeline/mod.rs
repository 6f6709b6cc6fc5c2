//! Pipeline stages driven by the scheduler.
//!
//! - `reconcile`: Merge an ingested batch into the record store
//! - `format`: Render a stored bill as a bounded-length post
//! - `scheduler`: The ingest, shorten, publish and sleep loop

pub mod format;
pub mod reconcile;
pub mod scheduler;

pub use format::{PostFormatter, SponsorName, parse_sponsor};
pub use reconcile::{ReconcileReport, reconcile};
pub use scheduler::{CycleScheduler, CycleState, RunSummary, Termination};
