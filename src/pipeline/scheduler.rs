// src/pipeline/scheduler.rs

//! The ingest, publish and sleep loop.
//!
//! ```text
//! Ingesting → Reconciling → Shortening → Selecting → Publishing → Updating
//!     ↑                                      │ (nothing to post)       │
//!     └──────────── Sleeping ←───────────────┴─────────────────────────┘
//!                      │
//!                      └── Terminated (max iterations, shutdown, fatal error)
//! ```
//!
//! Every phase is awaited in sequence on the caller's task. The sleep is the
//! only point where a shutdown request is observed.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, PublishError, Result};
use crate::models::{Bill, SchedulerConfig};
use crate::services::{BillSource, LinkShortener, Publisher};
use crate::storage::BillStore;

use super::format::PostFormatter;
use super::reconcile::reconcile;

/// Phase the scheduler is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CycleState {
    Ingesting,
    Reconciling,
    Shortening,
    Selecting,
    Publishing,
    Updating,
    Sleeping,
    Terminated,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a run ended without a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Termination {
    /// The configured number of sleeps completed
    MaxIterations,
    /// The shutdown token was cancelled
    Shutdown,
}

/// Counters collected over one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Cycles started
    pub iterations: u32,
    /// Sleeps that ran to completion
    pub sleeps: u32,
    /// Bills published and marked posted
    pub posts: u32,
    /// Cycles cut short by a recoverable error
    pub failed_iterations: u32,
    /// New bills stored by reconciliation
    pub inserted: usize,
    /// Short URLs persisted
    pub shortened: usize,
    /// Bills retired because their content was refused
    pub skipped: u32,
    pub termination: Termination,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self {
            iterations: 0,
            sleeps: 0,
            posts: 0,
            failed_iterations: 0,
            inserted: 0,
            shortened: 0,
            skipped: 0,
            termination: Termination::MaxIterations,
        }
    }
}

/// How a cycle failed.
enum CycleError {
    /// Stop the run
    Fatal(AppError),
    /// Log, count, and carry on with the sleep
    Recoverable(AppError),
}

impl From<AppError> for CycleError {
    fn from(err: AppError) -> Self {
        CycleError::Recoverable(err)
    }
}

type CycleResult<T> = std::result::Result<T, CycleError>;

/// Drives the bill watcher through its cycles.
pub struct CycleScheduler {
    store: Arc<dyn BillStore>,
    source: Arc<dyn BillSource>,
    shortener: Option<Arc<dyn LinkShortener>>,
    publisher: Arc<dyn Publisher>,
    formatter: PostFormatter,
    config: SchedulerConfig,
    state: CycleState,
}

impl CycleScheduler {
    pub fn new(
        store: Arc<dyn BillStore>,
        source: Arc<dyn BillSource>,
        publisher: Arc<dyn Publisher>,
        formatter: PostFormatter,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            source,
            shortener: None,
            publisher,
            formatter,
            config,
            state: CycleState::Ingesting,
        }
    }

    /// Enable the shortening phase.
    pub fn with_shortener(mut self, shortener: Arc<dyn LinkShortener>) -> Self {
        self.shortener = Some(shortener);
        self
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    fn enter(&mut self, state: CycleState) {
        log::trace!("{} -> {}", self.state, state);
        self.state = state;
    }

    /// Check the store and the publisher credentials before any cycle.
    pub async fn preflight(&self) -> Result<()> {
        self.store.ping().await?;
        log::info!("Record store reachable");

        self.publisher.verify_credentials().await?;
        log::info!("Publisher credentials verified");

        Ok(())
    }

    /// Run cycles until the iteration cap, a shutdown request, or a fatal error.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<RunSummary> {
        if let Err(e) = self.preflight().await {
            log::error!("Preflight failed: {}", e);
            self.enter(CycleState::Terminated);
            return Err(e);
        }

        let mut summary = RunSummary::default();
        log::info!(
            "Starting scheduler: {} iterations, {}s interval",
            self.config.max_iterations,
            self.config.interval_secs
        );

        loop {
            if shutdown.is_cancelled() {
                summary.termination = Termination::Shutdown;
                break;
            }

            let cycle = summary.iterations;
            summary.iterations += 1;
            log::info!(
                "Iteration {}/{}",
                summary.iterations,
                self.config.max_iterations
            );

            match self.run_cycle(cycle, &mut summary).await {
                Ok(()) => {}
                Err(CycleError::Recoverable(e)) => {
                    log::error!("Iteration {} failed: {}", summary.iterations, e);
                    summary.failed_iterations += 1;
                }
                Err(CycleError::Fatal(e)) => {
                    log::error!("Fatal error, stopping: {}", e);
                    self.enter(CycleState::Terminated);
                    log_summary(&summary);
                    return Err(e);
                }
            }

            self.enter(CycleState::Sleeping);
            if !self.sleep(&shutdown).await {
                log::info!("Shutdown requested");
                summary.termination = Termination::Shutdown;
                break;
            }
            summary.sleeps += 1;

            if summary.sleeps >= self.config.max_iterations {
                summary.termination = Termination::MaxIterations;
                break;
            }
        }

        self.enter(CycleState::Terminated);
        log_summary(&summary);
        Ok(summary)
    }

    /// Wait out the interval. Returns `false` when cancelled first.
    async fn sleep(&self, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => false,
            _ = tokio::time::sleep(self.config.interval()) => true,
        }
    }

    async fn run_cycle(&mut self, cycle: u32, summary: &mut RunSummary) -> CycleResult<()> {
        self.enter(CycleState::Ingesting);
        let records = if self.should_ingest(cycle) {
            match self.source.fetch().await {
                Ok(records) => {
                    log::info!("Fetched {} records", records.len());
                    records
                }
                Err(e) => {
                    log::warn!("Ingestion failed, continuing with an empty batch: {}", e);
                    Vec::new()
                }
            }
        } else {
            log::debug!("Skipping ingestion this cycle");
            Vec::new()
        };

        self.enter(CycleState::Reconciling);
        let report = reconcile(self.store.as_ref(), &records).await?;
        if report.received > 0 {
            log::info!(
                "Reconciled {} records: {} new, {} known, {} repeated",
                report.received,
                report.inserted,
                report.already_known,
                report.duplicates_in_batch
            );
        }
        summary.inserted += report.inserted;

        if let Some(shortener) = self.shortener.clone() {
            self.enter(CycleState::Shortening);
            summary.shortened += self.shorten_pending(shortener.as_ref()).await?;
        }

        self.enter(CycleState::Selecting);
        let Some(bill) = self.store.select_one_unposted().await? else {
            log::info!("No unposted bills");
            return Ok(());
        };

        self.enter(CycleState::Publishing);
        let text = match self.formatter.format(&bill) {
            Ok(text) => text,
            Err(e @ AppError::ContentTooLong { .. }) => {
                log::warn!("Skipping {}: {}", bill.key, e);
                self.enter(CycleState::Updating);
                self.store.mark_skipped(&bill.key).await?;
                summary.skipped += 1;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let outcome = self.publisher.publish(&text).await;

        self.enter(CycleState::Updating);
        self.apply_outcome(&bill, &text, outcome, summary).await
    }

    fn should_ingest(&self, cycle: u32) -> bool {
        cycle % self.config.ingest_every.max(1) == 0
    }

    /// Try to shorten every unshortened bill. Returns how many were stored.
    async fn shorten_pending(&self, shortener: &dyn LinkShortener) -> CycleResult<usize> {
        let pending = self.store.list_unshortened().await?;
        let mut stored = 0;

        for bill in &pending {
            match shortener.shorten(&bill.full_url).await {
                Ok(short_url) => {
                    self.store.set_short_url(&bill.key, &short_url).await?;
                    log::debug!("Shortened {} to {}", bill.key, short_url);
                    stored += 1;
                }
                Err(e) => log::warn!("{}; using the full URL for {}", e, bill.key),
            }
        }

        if !pending.is_empty() {
            log::info!("Shortened {}/{} links", stored, pending.len());
        }
        Ok(stored)
    }

    async fn apply_outcome(
        &self,
        bill: &Bill,
        text: &str,
        outcome: std::result::Result<(), PublishError>,
        summary: &mut RunSummary,
    ) -> CycleResult<()> {
        match outcome {
            Ok(()) => {
                log::info!("Published {}: {}", bill.key, text);
                // the post is live; carrying on without the flag would repost it
                self.store
                    .mark_posted(&bill.key)
                    .await
                    .map_err(CycleError::Fatal)?;
                summary.posts += 1;
                Ok(())
            }
            Err(e @ PublishError::Auth(_)) => Err(CycleError::Fatal(e.into())),
            Err(PublishError::Rejected(reason)) => {
                log::warn!("Publisher rejected {}, skipping it: {}", bill.key, reason);
                self.store.mark_skipped(&bill.key).await?;
                summary.skipped += 1;
                Ok(())
            }
            Err(e @ PublishError::Transient(_)) => {
                log::warn!("{} left unposted", bill.key);
                Err(CycleError::Recoverable(e.into()))
            }
        }
    }
}

fn log_summary(summary: &RunSummary) {
    log::info!(
        "Scheduler stopped ({:?}): {} iterations, {} sleeps, {} posts, {} failed, {} new bills, {} links shortened, {} skipped",
        summary.termination,
        summary.iterations,
        summary.sleeps,
        summary.posts,
        summary.failed_iterations,
        summary.inserted,
        summary.shortened,
        summary.skipped
    );
}
