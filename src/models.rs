// Core data structures for the binday pipeline

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A candidate property offered by the remote address lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Address {
    pub postcode: String,
    pub id: Option<String>,   // opaque option value assigned by the remote form
    pub text: Option<String>, // visible option text, used for exact-match selection
}

impl Address {
    /// Create an address with only a postcode (lookup not yet performed)
    pub fn from_postcode(postcode: impl Into<String>) -> Self {
        Self {
            postcode: postcode.into(),
            ..Default::default()
        }
    }

    /// Builder: set the remote option value
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder: set the visible option text
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// True when the address carries enough detail to select an option
    pub fn has_selection(&self) -> bool {
        self.id.as_deref().is_some_and(|v| !v.trim().is_empty())
            || self.text.as_deref().is_some_and(|v| !v.trim().is_empty())
    }

    /// Human-readable label for lists and logs
    pub fn label(&self) -> &str {
        self.text
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or(&self.postcode)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Terminal outcome of one scrape attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionResult {
    /// A collection date was extracted from the schedule grid
    Success(NaiveDate),
    /// The site reported no data; carries the details panel text verbatim
    NoData(String),
    /// The chosen address could not be selected on the form
    InvalidAddress(String),
    /// Neither result panel appeared within the bounded wait
    Timeout(String),
    /// A result panel appeared but its content could not be interpreted
    ParseFailure(String),
}

impl CollectionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The extracted date, when there is one
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::Success(date) => Some(*date),
            _ => None,
        }
    }
}

impl std::fmt::Display for CollectionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success(date) => write!(f, "collection date {}", date.format("%Y-%m-%d")),
            Self::NoData(msg) => write!(f, "no data: {msg}"),
            Self::InvalidAddress(msg) => write!(f, "{msg}"),
            Self::Timeout(msg) => write!(f, "timed out: {msg}"),
            Self::ParseFailure(msg) => write!(f, "parse failure: {msg}"),
        }
    }
}

/// Envelope shared by notifiers and the status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionAttributes {
    pub title: String,
    pub date: NaiveDate,
    pub day_of_week: String,
    pub days_until: i64,
    pub last_update: DateTime<Utc>,
}

impl CollectionAttributes {
    /// Build the envelope for a date, measuring days_until from today
    pub fn new(title: impl Into<String>, date: NaiveDate) -> Self {
        Self::relative_to(title, date, chrono::Local::now().date_naive())
    }

    /// Build the envelope measuring days_until from an explicit reference day
    pub fn relative_to(title: impl Into<String>, date: NaiveDate, today: NaiveDate) -> Self {
        Self {
            title: title.into(),
            date,
            day_of_week: date.format("%A").to_string(),
            days_until: (date - today).num_days(),
            last_update: Utc::now(),
        }
    }

    /// The date in the wire format every consumer expects
    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}
