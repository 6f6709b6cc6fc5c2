//! Service layer for the bill watcher.
//!
//! This module contains the adapters the scheduler talks to:
//! - Feed ingestion (`FeedSource`)
//! - Link shortening (`IsGdShortener`)
//! - Publishing (`HttpPublisher`, `LogPublisher`)
//!
//! Each sits behind a narrow trait so the scheduler can be driven by
//! in-process fakes.

mod publisher;
mod shortener;
mod source;

use async_trait::async_trait;

use crate::error::{PublishError, Result};
use crate::models::BillRecord;

pub use publisher::{HttpPublisher, LogPublisher};
pub use shortener::{IsGdShortener, RequestBudget};
pub use source::{FeedEntry, FeedSource};

/// Produces normalized bill records from an upstream source.
#[async_trait]
pub trait BillSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<BillRecord>>;
}

/// Turns a long URL into a short one.
#[async_trait]
pub trait LinkShortener: Send + Sync {
    /// Every failure is reported as `AppError::ShorteningFailed`.
    async fn shorten(&self, long_url: &str) -> Result<String>;
}

/// Publishes formatted text to the outside world.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Confirm the credentials work before the first cycle.
    async fn verify_credentials(&self) -> std::result::Result<(), PublishError>;

    async fn publish(&self, text: &str) -> std::result::Result<(), PublishError>;
}
