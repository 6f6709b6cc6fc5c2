//! Bill identity and record structures.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::{normalize_whitespace, truncate_graphemes};

/// Upper bound on stored title length, in characters.
pub const TITLE_MAX_CHARS: usize = 1000;

const CONGRESS_BILL_URL: &str = "https://www.congress.gov/bill/";

/// Kind of congressional measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BillType {
    Hr,
    S,
    Hres,
    Sres,
    Hjres,
    Sjres,
    Hconres,
    Sconres,
}

impl BillType {
    pub const ALL: [BillType; 8] = [
        BillType::Hr,
        BillType::S,
        BillType::Hres,
        BillType::Sres,
        BillType::Hjres,
        BillType::Sjres,
        BillType::Hconres,
        BillType::Sconres,
    ];

    /// Code used in the store and in upstream feeds (`HR`, `SJRES`, ...).
    pub fn code(&self) -> &'static str {
        match self {
            BillType::Hr => "HR",
            BillType::S => "S",
            BillType::Hres => "HRES",
            BillType::Sres => "SRES",
            BillType::Hjres => "HJRES",
            BillType::Sjres => "SJRES",
            BillType::Hconres => "HCONRES",
            BillType::Sconres => "SCONRES",
        }
    }

    /// Citation abbreviation used in posts.
    pub fn abbreviation(&self) -> &'static str {
        match self {
            BillType::Hr => "H.R.",
            BillType::S => "S.",
            BillType::Hres => "H.Res.",
            BillType::Sres => "S.Res.",
            BillType::Hjres => "H.J.Res.",
            BillType::Sjres => "S.J.Res.",
            BillType::Hconres => "H.Con.Res.",
            BillType::Sconres => "S.Con.Res.",
        }
    }

    /// Path segment on congress.gov.
    pub fn url_path(&self) -> &'static str {
        match self {
            BillType::Hr => "house-bill",
            BillType::S => "senate-bill",
            BillType::Hres => "house-resolution",
            BillType::Sres => "senate-resolution",
            BillType::Hjres => "house-joint-resolution",
            BillType::Sjres => "senate-joint-resolution",
            BillType::Hconres => "house-concurrent-resolution",
            BillType::Sconres => "senate-concurrent-resolution",
        }
    }
}

impl fmt::Display for BillType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for BillType {
    type Err = AppError;

    /// Accepts `hr`, `HR` and dotted forms such as `H.J.Res.`.
    fn from_str(s: &str) -> Result<Self> {
        let code: String = s
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        BillType::ALL
            .into_iter()
            .find(|t| t.code() == code)
            .ok_or_else(|| AppError::validation(format!("unknown bill type '{s}'")))
    }
}

impl TryFrom<String> for BillType {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<BillType> for String {
    fn from(value: BillType) -> Self {
        value.code().to_string()
    }
}

/// Natural key of a bill: type plus number, unique per congress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BillKey {
    pub bill_type: BillType,
    pub number: u32,
}

impl BillKey {
    pub fn new(bill_type: BillType, number: u32) -> Self {
        Self { bill_type, number }
    }
}

impl fmt::Display for BillKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.bill_type, self.number)
    }
}

/// A bill as yielded by a source, before it reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillRecord {
    pub key: BillKey,
    pub sponsor: String,
    pub title: String,
    pub full_url: String,
    pub introduced: Option<NaiveDate>,
    pub updated: Option<NaiveDate>,
}

impl BillRecord {
    /// Build a record, collapsing whitespace and bounding the title.
    pub fn new(
        key: BillKey,
        sponsor: &str,
        title: &str,
        full_url: impl Into<String>,
        introduced: Option<NaiveDate>,
    ) -> Self {
        let title = normalize_whitespace(title);
        Self {
            key,
            sponsor: normalize_whitespace(sponsor),
            title: truncate_graphemes(&title, TITLE_MAX_CHARS).to_string(),
            full_url: full_url.into(),
            introduced,
            updated: None,
        }
    }

    pub fn with_updated(mut self, updated: Option<NaiveDate>) -> Self {
        self.updated = updated;
        self
    }
}

/// A bill row as persisted in the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bill {
    pub id: i64,
    pub key: BillKey,
    pub sponsor: String,
    pub title: String,
    pub full_url: String,
    pub short_url: Option<String>,
    pub introduced: Option<NaiveDate>,
    pub updated: Option<NaiveDate>,
    pub posted: bool,
    pub skipped: bool,
}

impl Bill {
    /// Link to put in a post: the short URL when one exists.
    pub fn link(&self) -> &str {
        self.short_url.as_deref().unwrap_or(&self.full_url)
    }
}

/// English ordinal suffix for a congress session (`115` -> `th`).
pub fn ordinal_suffix(n: u32) -> &'static str {
    match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// Canonical congress.gov page for a bill in the given session.
pub fn congress_url(congress: u32, key: &BillKey) -> String {
    format!(
        "{CONGRESS_BILL_URL}{congress}{}-congress/{}/{}",
        ordinal_suffix(congress),
        key.bill_type.url_path(),
        key.number
    )
}
