// src/models/mod.rs

//! Domain models for the bill watcher.
//!
//! Bill identity and rows live in `bill`; everything read from the TOML
//! configuration file lives in `config`.

mod bill;
mod config;

// Re-export all public types
pub use bill::{
    Bill, BillKey, BillRecord, BillType, TITLE_MAX_CHARS, congress_url, ordinal_suffix,
};
pub use config::{
    BEARER_TOKEN_ENV, Config, DatabaseConfig, LoggingConfig, PublisherConfig, SchedulerConfig,
    ShortenerConfig, SourceConfig,
};
