// src/services/source.rs

//! Bill feed ingestion.
//!
//! Reads JSON arrays of bill entries from every configured location, keeps
//! the entries matching the relevance keywords and converts them into
//! normalized `BillRecord`s.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{BillKey, BillRecord, BillType, SourceConfig, congress_url};
use crate::services::BillSource;
use crate::utils::http;
use crate::utils::normalize_whitespace;

/// One bill as it appears in an upstream feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub bill_type: String,
    pub number: u32,
    #[serde(default)]
    pub sponsor: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub introduced: Option<NaiveDate>,
    #[serde(default)]
    pub updated: Option<NaiveDate>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
}

impl FeedEntry {
    /// Greedy keyword match against title, summary and subjects.
    ///
    /// `keywords` must already be lowercase. An empty list keeps everything.
    pub fn is_relevant(&self, keywords: &[String]) -> bool {
        if keywords.is_empty() {
            return true;
        }

        let title = self.title.to_lowercase();
        let summary = self.summary.as_deref().unwrap_or("").to_lowercase();
        let subjects: Vec<String> = self.subjects.iter().map(|s| s.to_lowercase()).collect();

        keywords.iter().any(|keyword| {
            title.contains(keyword.as_str())
                || summary.contains(keyword.as_str())
                || subjects.iter().any(|s| s == keyword)
        })
    }

    /// Convert into a record, building the congress.gov URL when the feed
    /// does not carry one.
    pub fn into_record(self, congress: u32) -> Result<BillRecord> {
        let bill_type: BillType = self.bill_type.parse()?;
        if self.number == 0 {
            return Err(AppError::validation(format!(
                "{} entry has bill number 0",
                bill_type
            )));
        }
        if normalize_whitespace(&self.title).is_empty() {
            return Err(AppError::validation(format!(
                "{}-{} has an empty title",
                bill_type, self.number
            )));
        }

        let key = BillKey::new(bill_type, self.number);
        let full_url = match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Url::parse(url)?.to_string(),
            _ => congress_url(congress, &key),
        };

        Ok(
            BillRecord::new(key, &self.sponsor, &self.title, full_url, self.introduced)
                .with_updated(self.updated),
        )
    }
}

/// Bill source reading JSON feeds over HTTP or from disk.
pub struct FeedSource {
    client: reqwest::Client,
    congress: u32,
    locations: Vec<String>,
    keywords: Vec<String>,
}

impl FeedSource {
    /// Create a feed source from configuration.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = http::create_async_client(&config.user_agent, config.timeout_secs)?;
        Ok(Self {
            client,
            congress: config.congress,
            locations: config.feeds.clone(),
            keywords: config
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        })
    }

    /// Substitute the congress session into a configured location.
    fn resolve_location(&self, location: &str) -> String {
        location.replace("{congress}", &self.congress.to_string())
    }

    async fn read_location(&self, location: &str) -> Result<String> {
        if location.starts_with("http://") || location.starts_with("https://") {
            return http::fetch_text(&self.client, location).await;
        }

        let path = if location.starts_with("file://") {
            Url::parse(location)?
                .to_file_path()
                .map_err(|_| AppError::ingest(location, "not a local file URL"))?
        } else {
            location.into()
        };
        Ok(tokio::fs::read_to_string(path).await?)
    }

    /// Fetch and decode the entries at one location.
    ///
    /// The body must be a JSON array. Elements that do not decode as a
    /// `FeedEntry` are logged and dropped.
    pub async fn fetch_location(&self, location: &str) -> Result<Vec<FeedEntry>> {
        let body = self.read_location(location).await?;
        let values: Vec<serde_json::Value> =
            serde_json::from_str(&body).map_err(|e| AppError::ingest(location, e))?;

        let mut entries = Vec::with_capacity(values.len());
        for (index, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<FeedEntry>(value) {
                Ok(entry) => entries.push(entry),
                Err(e) => log::warn!("Dropping malformed entry #{} in {}: {}", index, location, e),
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl BillSource for FeedSource {
    async fn fetch(&self) -> Result<Vec<BillRecord>> {
        if self.locations.is_empty() {
            log::warn!("No feeds configured, nothing to ingest");
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut failures = 0;
        let mut read = 0;
        let mut irrelevant = 0;

        for raw in &self.locations {
            let location = self.resolve_location(raw);
            log::info!("Reading feed {}", location);

            let entries = match self.fetch_location(&location).await {
                Ok(entries) => entries,
                Err(e) => {
                    failures += 1;
                    log::warn!("Failed to read feed {}: {}", location, e);
                    continue;
                }
            };

            read += entries.len();
            for entry in entries {
                if !entry.is_relevant(&self.keywords) {
                    irrelevant += 1;
                    continue;
                }
                match entry.into_record(self.congress) {
                    Ok(record) => records.push(record),
                    Err(e) => log::warn!("Dropping entry from {}: {}", location, e),
                }
            }
        }

        if failures == self.locations.len() {
            return Err(AppError::ingest(
                "feeds",
                format!("all {failures} locations failed"),
            ));
        }

        log::info!(
            "Found {} relevant bills ({} entries read, {} filtered out)",
            records.len(),
            read,
            irrelevant
        );
        Ok(records)
    }
}
