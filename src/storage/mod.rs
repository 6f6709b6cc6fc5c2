//! Storage abstractions for bill persistence.
//!
//! The store owns every persisted bill. Callers only ever hold transient
//! copies for the duration of one scheduler cycle.
//!
//! ## Row lifecycle
//!
//! ```text
//! inserted (posted=0, skipped=0)
//!     ├── short_url backfilled (optional, while unposted)
//!     ├── posted=1   after a confirmed publish
//!     └── skipped=1  after the content was rejected for good
//! ```

pub mod sqlite;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::models::{Bill, BillKey, BillRecord};

// Re-export for convenience
pub use sqlite::SqliteBillStore;

/// Row counts for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: u64,
    pub posted: u64,
    pub pending: u64,
    pub skipped: u64,
    pub unshortened: u64,
}

/// Trait for bill storage backends.
#[async_trait]
pub trait BillStore: Send + Sync {
    /// Cheap round trip proving the backend is reachable.
    async fn ping(&self) -> Result<()>;

    /// Insert the record unless its natural key is already stored.
    ///
    /// Returns `true` when a row was inserted. Duplicates are not errors.
    async fn upsert_if_absent(&self, record: &BillRecord) -> Result<bool>;

    /// Backfill the short URL of an unposted bill that has none yet.
    async fn set_short_url(&self, key: &BillKey, short_url: &str) -> Result<()>;

    /// Oldest (lowest id) bill that is neither posted nor skipped.
    async fn select_one_unposted(&self) -> Result<Option<Bill>>;

    /// Flip `posted` on exactly one unposted row.
    async fn mark_posted(&self, key: &BillKey) -> Result<()>;

    /// Retire an unposted bill whose content can never be published.
    async fn mark_skipped(&self, key: &BillKey) -> Result<()>;

    /// Selectable bills still lacking a short URL, oldest first.
    async fn list_unshortened(&self) -> Result<Vec<Bill>>;

    /// Look up a single bill by natural key.
    async fn find(&self, key: &BillKey) -> Result<Option<Bill>>;

    /// Row counts by status.
    async fn stats(&self) -> Result<StoreStats>;
}
