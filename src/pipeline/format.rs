// src/pipeline/format.rs

//! Post formatting.
//!
//! ```text
//! Bill <abbrev> <number>: "<title>" (<sponsor>, <introduced>) | <url>
//! ```
//!
//! The title is the only elastic part. Sponsor attribution and the link are
//! always kept whole.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::{Bill, PublisherConfig};
use crate::utils::{char_len, truncate_graphemes};

/// `Rep. Last, First ...` or `Sen. Last Last2, First ...`
const SPONSOR_PATTERN: &str =
    r"^(?P<position>Sen\.|Rep\.|Del\.|Resident Commissioner)\s+(?P<last>[\w'\-]+(?:\s[\w'\-]+)?),\s+(?P<first>[\w'\-]+)";

static SPONSOR_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(SPONSOR_PATTERN).ok());

const ELLIPSIS: &str = "...";

/// Sponsor name split into the parts used for attribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SponsorName {
    pub position: String,
    pub last: String,
    pub first: String,
}

impl SponsorName {
    /// "Last, First", the lookup key for the handle map.
    pub fn lookup_key(&self) -> String {
        format!("{}, {}", self.last, self.first)
    }
}

/// Parse a congressional sponsor string such as `Rep. Doe, John [R-TX-1]`.
pub fn parse_sponsor(sponsor: &str) -> Option<SponsorName> {
    let caps = SPONSOR_RE.as_ref()?.captures(sponsor.trim())?;
    Some(SponsorName {
        position: caps.name("position")?.as_str().to_string(),
        last: caps.name("last")?.as_str().to_string(),
        first: caps.name("first")?.as_str().to_string(),
    })
}

/// Renders stored bills into bounded-length posts.
#[derive(Debug, Clone)]
pub struct PostFormatter {
    max_length: usize,
    handles: HashMap<String, String>,
}

impl PostFormatter {
    pub fn new(max_length: usize, handles: HashMap<String, String>) -> Self {
        Self {
            max_length,
            handles,
        }
    }

    pub fn from_config(config: &PublisherConfig) -> Self {
        Self::new(config.max_length, config.handles.clone())
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Who to credit: a known handle, else "Rep. Last", else the raw text.
    pub fn attribution(&self, sponsor: &str) -> String {
        match parse_sponsor(sponsor) {
            Some(name) => match self.handles.get(&name.lookup_key()) {
                Some(handle) => handle.clone(),
                None => format!("{} {}", name.position, name.last),
            },
            None => sponsor.trim().to_string(),
        }
    }

    /// Format a bill, shortening or dropping the title to fit.
    pub fn format(&self, bill: &Bill) -> Result<String> {
        let head = format!(
            "Bill {} {}:",
            bill.key.bill_type.abbreviation(),
            bill.key.number
        );

        let mut details = Vec::new();
        let attribution = self.attribution(&bill.sponsor);
        if !attribution.is_empty() {
            details.push(attribution);
        }
        if let Some(date) = bill.introduced {
            details.push(date.format("%Y-%m-%d").to_string());
        }

        let tail = if details.is_empty() {
            format!(" | {}", bill.link())
        } else {
            format!(" ({}) | {}", details.join(", "), bill.link())
        };

        let fixed = char_len(&head) + char_len(&tail);
        if fixed > self.max_length {
            return Err(AppError::ContentTooLong {
                length: fixed,
                limit: self.max_length,
            });
        }

        let title = self.fit_title(bill.title.trim(), self.max_length - fixed);
        Ok(format!("{head}{title}{tail}"))
    }

    /// Quoted title segment (with its leading space) of at most `room` chars.
    fn fit_title(&self, title: &str, room: usize) -> String {
        // space plus two quotes
        const QUOTED: usize = 3;

        if title.is_empty() {
            return String::new();
        }
        if char_len(title) + QUOTED <= room {
            return format!(" \"{title}\"");
        }

        let overhead = QUOTED + ELLIPSIS.len();
        if room <= overhead {
            return String::new();
        }

        let cut = truncate_graphemes(title, room - overhead).trim_end();
        if cut.is_empty() {
            return String::new();
        }
        format!(" \"{cut}{ELLIPSIS}\"")
    }
}
